//! ReportExtractor - structured findings and tasks from model output
//!
//! The model is asked to finish with a fenced ```json block. When there is
//! none, the widest `{...}` span in the text is tried instead. Two shapes
//! are understood and may be mixed in one object:
//!
//! - health check: `findings[]` entries of `{project, status, issues[]}`
//! - deep analysis: `projects[]` entries of
//!   `{name, healthScore, ciStatus, risks[], summary, tasks[]}`
//!
//! Candidate tasks come from a top-level `tasks[]` and from each project's
//! `tasks[]`.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use super::ParseError;
use crate::domain::{Finding, Priority, ProjectRegistry, ProjectReport, Severity, TaskType};

static FENCED_JSON_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"```json\s*([\s\S]*?)```").ok());
static BRACES_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\{[\s\S]*\}").ok());

/// Health score below which a project gets a finding
pub const LOW_HEALTH_THRESHOLD: u32 = 70;
/// Health score below which that finding is an error rather than a warning
pub const CRITICAL_HEALTH_THRESHOLD: u32 = 50;

/// A task proposed by the model, not yet persisted
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateTask {
    pub project_id: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub task_type: TaskType,
    pub context: Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedReport {
    pub summary: Option<String>,
    pub findings: Vec<Finding>,
    pub project_reports: Vec<ProjectReport>,
    pub tasks: Vec<CandidateTask>,
}

impl ParsedReport {
    pub fn is_empty(&self) -> bool {
        self.findings.is_empty() && self.project_reports.is_empty() && self.tasks.is_empty()
    }
}

/// Locate the JSON candidate: a fenced block first, then the widest brace span
pub fn locate_json(text: &str) -> Option<&str> {
    let fenced = FENCED_JSON_RE
        .as_ref()
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim());
    if let Some(block) = fenced {
        debug!(len = block.len(), "locate_json: found fenced block");
        return Some(block);
    }

    let braces = BRACES_RE.as_ref().and_then(|re| re.find(text)).map(|m| m.as_str());
    debug!(found = braces.is_some(), "locate_json: brace fallback");
    braces
}

/// Map a health-check status word to a severity
pub fn severity_from_status(status: &str) -> Severity {
    match status.trim().to_lowercase().as_str() {
        "critical" => Severity::Critical,
        "warning" => Severity::Warning,
        _ => Severity::Info,
    }
}

fn severity_from_str(s: &str) -> Severity {
    match s.trim().to_lowercase().as_str() {
        "critical" => Severity::Critical,
        "error" => Severity::Error,
        "warning" => Severity::Warning,
        _ => Severity::Info,
    }
}

fn str_field<'a>(entry: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| entry.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

fn string_items(entry: &Value, key: &str) -> Vec<String> {
    entry
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s.trim().to_string()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn score_field(entry: &Value) -> Option<u32> {
    let score = entry.get("healthScore").or_else(|| entry.get("health_score"))?;
    score
        .as_u64()
        .or_else(|| score.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
        .map(|s| s.min(u64::from(u32::MAX)) as u32)
}

/// Turns model output into findings, project reports and candidate tasks
pub struct ReportExtractor {
    projects: ProjectRegistry,
}

impl ReportExtractor {
    pub fn new(projects: ProjectRegistry) -> Self {
        Self { projects }
    }

    pub fn extract(&self, text: &str) -> Result<ParsedReport, ParseError> {
        debug!(text_len = text.len(), "ReportExtractor::extract: called");
        let candidate = locate_json(text).ok_or(ParseError::NoJson)?;
        let value: Value = serde_json::from_str(candidate).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

        let findings = value.get("findings").and_then(Value::as_array);
        let projects = value.get("projects").and_then(Value::as_array);
        let tasks = value.get("tasks").and_then(Value::as_array);
        if findings.is_none() && projects.is_none() && tasks.is_none() {
            return Err(ParseError::UnexpectedShape(shape_of(&value)));
        }

        let mut report = ParsedReport {
            summary: str_field(&value, &["summary"]).map(str::to_string),
            ..Default::default()
        };

        for entry in findings.into_iter().flatten() {
            match self.finding(entry) {
                Some(f) => report.findings.push(f),
                None => debug!(%entry, "ReportExtractor::extract: skipping unrecognized finding"),
            }
        }

        for entry in projects.into_iter().flatten() {
            self.project(entry, &mut report);
        }

        for entry in tasks.into_iter().flatten() {
            let project = str_field(entry, &["project", "projectId", "project_id"]).map(|p| self.projects.resolve_id(p));
            match project {
                Some(project_id) => {
                    if let Some(task) = candidate_task(entry, project_id) {
                        report.tasks.push(task);
                    }
                }
                None => warn!(%entry, "Model proposed a task without a project, skipping"),
            }
        }

        debug!(
            findings = report.findings.len(),
            projects = report.project_reports.len(),
            tasks = report.tasks.len(),
            "ReportExtractor::extract: done"
        );
        Ok(report)
    }

    fn finding(&self, entry: &Value) -> Option<Finding> {
        let project = str_field(entry, &["project", "projectId", "name"]).unwrap_or("unknown");
        let project_id = self.projects.resolve_id(project);

        // Health shape: {project, status?, issues}; a missing status reads as info
        let status = str_field(entry, &["status"]);
        let health = status.is_some() || (entry.get("issues").is_some() && entry.get("severity").is_none());
        if health {
            let status = status.map(str::to_lowercase).unwrap_or_else(|| "unknown".to_string());
            return Some(Finding {
                severity: severity_from_status(&status),
                category: "health".to_string(),
                title: format!("{} health: {}", project, status),
                description: string_items(entry, "issues").join(", "),
                project_id,
            });
        }

        // Generic shape: {severity, category, title, description}
        let severity = str_field(entry, &["severity"])?;
        let title = str_field(entry, &["title"])?;
        Some(Finding {
            severity: severity_from_str(severity),
            category: str_field(entry, &["category"]).unwrap_or("general").to_string(),
            title: title.to_string(),
            description: str_field(entry, &["description"]).unwrap_or_default().to_string(),
            project_id,
        })
    }

    fn project(&self, entry: &Value, report: &mut ParsedReport) {
        let Some(name) = str_field(entry, &["name", "id", "project"]) else {
            warn!(%entry, "Project entry without a name, skipping");
            return;
        };
        let project_id = self.projects.resolve_id(name);
        let health_score = score_field(entry);
        let ci_status = str_field(entry, &["ciStatus", "ci_status"]).map(str::to_lowercase);
        let risks = string_items(entry, "risks");
        let summary = str_field(entry, &["summary"]).map(str::to_string);

        for risk in &risks {
            report.findings.push(Finding {
                severity: Severity::Warning,
                category: "risk".to_string(),
                title: format!("{} risk", name),
                description: risk.clone(),
                project_id: project_id.clone(),
            });
        }

        if let Some(score) = health_score.filter(|s| *s < LOW_HEALTH_THRESHOLD) {
            let severity = if score < CRITICAL_HEALTH_THRESHOLD {
                Severity::Error
            } else {
                Severity::Warning
            };
            report.findings.push(Finding {
                severity,
                category: "health".to_string(),
                title: format!("{} health score {}/100", name, score),
                description: summary
                    .clone()
                    .unwrap_or_else(|| format!("Health score is below {}", LOW_HEALTH_THRESHOLD)),
                project_id: project_id.clone(),
            });
        }

        if ci_status.as_deref() == Some("failing") {
            report.findings.push(Finding {
                severity: Severity::Error,
                category: "ci-cd".to_string(),
                title: format!("{} CI failing", name),
                description: "The latest CI runs are failing".to_string(),
                project_id: project_id.clone(),
            });
        }

        for task in entry.get("tasks").and_then(Value::as_array).into_iter().flatten() {
            if let Some(task) = candidate_task(task, project_id.clone()) {
                report.tasks.push(task);
            }
        }

        report.project_reports.push(ProjectReport {
            project_id,
            health_score,
            ci_status,
            risks,
            summary,
        });
    }
}

fn candidate_task(entry: &Value, project_id: String) -> Option<CandidateTask> {
    let Some(title) = str_field(entry, &["title"]) else {
        warn!(%entry, "Model proposed a task without a title, skipping");
        return None;
    };
    let priority = str_field(entry, &["priority"])
        .map(|p| Priority::from(p.to_string()))
        .unwrap_or_default();
    let task_type = str_field(entry, &["type", "taskType"])
        .and_then(|t| t.parse().ok())
        .unwrap_or_default();
    Some(CandidateTask {
        project_id,
        title: title.to_string(),
        description: str_field(entry, &["description"]).unwrap_or_default().to_string(),
        priority,
        task_type,
        context: entry.get("context").cloned().unwrap_or(Value::Null),
    })
}

fn shape_of(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            format!("keys [{}]", keys.join(", "))
        }
        Value::Array(_) => "array".to_string(),
        other => format!("{}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Project;

    fn extractor() -> ReportExtractor {
        ReportExtractor::new(ProjectRegistry::new(vec![Project {
            id: "api".to_string(),
            name: "Acme API".to_string(),
            repo: "acme/api".to_string(),
            path: None,
            enabled: true,
        }]))
    }

    #[test]
    fn test_health_check_finding() {
        let text = r#"Here is the report.

```json
{"findings":[{"project":"X","status":"critical","issues":["a","b"]}]}
```
"#;
        let report = extractor().extract(text).unwrap();
        assert_eq!(report.findings.len(), 1);
        let f = &report.findings[0];
        assert_eq!(f.severity, Severity::Critical);
        assert_eq!(f.category, "health");
        assert_eq!(f.description, "a, b");
        assert_eq!(f.project_id, "X");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(severity_from_status("healthy"), Severity::Info);
        assert_eq!(severity_from_status("warning"), Severity::Warning);
        assert_eq!(severity_from_status("Critical"), Severity::Critical);
        assert_eq!(severity_from_status("on fire"), Severity::Info);
    }

    #[test]
    fn test_deep_analysis_findings() {
        let text = r#"```json
{"projects":[{"name":"X","healthScore":40,"ciStatus":"failing","risks":["r1"]}]}
```"#;
        let report = extractor().extract(text).unwrap();
        assert_eq!(report.findings.len(), 3);

        assert_eq!(report.findings[0].category, "risk");
        assert_eq!(report.findings[0].description, "r1");
        assert_eq!(report.findings[1].category, "health");
        assert_eq!(report.findings[1].severity, Severity::Error);
        assert_eq!(report.findings[2].category, "ci-cd");

        assert_eq!(report.project_reports.len(), 1);
        assert_eq!(report.project_reports[0].health_score, Some(40));
        assert_eq!(report.project_reports[0].ci_status.as_deref(), Some("failing"));
    }

    #[test]
    fn test_health_score_thresholds() {
        let ex = extractor();
        let warn = ex.extract(r#"{"projects":[{"name":"api","healthScore":65}]}"#).unwrap();
        assert_eq!(warn.findings.len(), 1);
        assert_eq!(warn.findings[0].severity, Severity::Warning);

        let fine = ex.extract(r#"{"projects":[{"name":"api","healthScore":70,"ciStatus":"passing"}]}"#).unwrap();
        assert!(fine.findings.is_empty());
        assert_eq!(fine.project_reports.len(), 1);
    }

    #[test]
    fn test_brace_fallback() {
        let text = r#"Summary first. {"findings":[{"project":"Acme API","status":"warning","issues":["slow CI"]}]} done."#;
        let report = extractor().extract(text).unwrap();
        assert_eq!(report.findings[0].severity, Severity::Warning);
        assert_eq!(report.findings[0].project_id, "api");
    }

    #[test]
    fn test_parse_errors_are_values() {
        let ex = extractor();
        assert_eq!(ex.extract("no json here"), Err(ParseError::NoJson));
        assert!(matches!(ex.extract("```json\n{broken\n```"), Err(ParseError::InvalidJson(_))));
        assert!(matches!(ex.extract(r#"{"hello": 1}"#), Err(ParseError::UnexpectedShape(_))));
    }

    #[test]
    fn test_fenced_block_wins_over_braces() {
        let text = "{\"not\": \"this\"}\n```json\n{\"findings\": []}\n```";
        let report = extractor().extract(text).unwrap();
        assert!(report.is_empty());
    }

    #[test]
    fn test_tasks_from_both_places() {
        let text = r#"```json
{
  "summary": "Two projects reviewed",
  "tasks": [
    {"project": "acme/api", "title": "Fix flaky test", "priority": "high", "type": "bug"},
    {"title": "Orphan task"}
  ],
  "projects": [
    {"name": "web", "healthScore": 90, "tasks": [
      {"title": "Upgrade deps", "description": "bump", "priority": "whenever"}
    ]}
  ]
}
```"#;
        let report = extractor().extract(text).unwrap();
        assert_eq!(report.summary.as_deref(), Some("Two projects reviewed"));
        assert_eq!(report.tasks.len(), 2);

        let upgrade = report.tasks.iter().find(|t| t.title == "Upgrade deps").unwrap();
        assert_eq!(upgrade.project_id, "web");
        assert_eq!(upgrade.priority, Priority::Unspecified);
        assert_eq!(upgrade.task_type, TaskType::Development);

        let fix = report.tasks.iter().find(|t| t.title == "Fix flaky test").unwrap();
        assert_eq!(fix.project_id, "api");
        assert_eq!(fix.priority, Priority::High);
        assert_eq!(fix.task_type, TaskType::Bugfix);
    }

    #[test]
    fn test_health_finding_without_status_is_info() {
        let text = r#"{"findings":[{"project":"X","issues":["a"]},{"project":"Y","status":"degraded","issues":["b"]}]}"#;
        let report = extractor().extract(text).unwrap();
        let found: Vec<(&str, Severity)> = report
            .findings
            .iter()
            .map(|f| (f.project_id.as_str(), f.severity))
            .collect();
        assert_eq!(found, vec![("X", Severity::Info), ("Y", Severity::Info)]);
        assert_eq!(report.findings[0].category, "health");
        assert_eq!(report.findings[0].title, "X health: unknown");
        assert_eq!(report.findings[0].description, "a");
    }

    #[test]
    fn test_task_for_unlisted_project_is_kept() {
        let text = r#"{"tasks":[{"project":"mobile","title":"Add crash reporting"}]}"#;
        let report = extractor().extract(text).unwrap();
        assert_eq!(report.tasks.len(), 1);
        assert_eq!(report.tasks[0].project_id, "mobile");
    }

    #[test]
    fn test_generic_finding_shape() {
        let text = r#"{"findings":[{"project":"api","severity":"error","category":"security","title":"Leaked token","description":"rotate it"}, {"nothing": true}]}"#;
        let report = extractor().extract(text).unwrap();
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].severity, Severity::Error);
        assert_eq!(report.findings[0].category, "security");
    }
}
