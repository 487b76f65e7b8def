//! Analysis reports and findings

use chrono::{DateTime, Utc};
use kvstore::Record;
use serde::{Deserialize, Serialize};

use super::id::generate_id;

pub const REPORTS_COLLECTION: &str = "reports";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// One structured observation about a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub category: String,
    pub title: String,
    pub description: String,
    pub project_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    HealthCheck,
    DeepAnalysis,
    Manual,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HealthCheck => "health_check",
            Self::DeepAnalysis => "deep_analysis",
            Self::Manual => "manual",
        }
    }
}

impl std::fmt::Display for ReportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-project section of a deep analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectReport {
    pub project_id: String,
    pub health_score: Option<u32>,
    pub ci_status: Option<String>,
    #[serde(default)]
    pub risks: Vec<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub id: String,
    #[serde(rename = "type")]
    pub report_type: ReportType,
    pub project_ids: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub summary: String,
    pub findings: Vec<Finding>,
    /// Ids of tasks created from this report
    pub generated_tasks: Vec<String>,
    pub project_reports: Option<Vec<ProjectReport>>,
}

impl AnalysisReport {
    pub fn start(report_type: ReportType, project_ids: Vec<String>) -> Self {
        Self {
            id: generate_id("report", report_type.as_str()),
            report_type,
            project_ids,
            started_at: Utc::now(),
            completed_at: None,
            summary: String::new(),
            findings: Vec::new(),
            generated_tasks: Vec::new(),
            project_reports: None,
        }
    }

    /// Fill in the completion fields; findings are appended, never replaced
    pub fn complete(
        &mut self,
        summary: impl Into<String>,
        findings: Vec<Finding>,
        generated_tasks: Vec<String>,
        project_reports: Vec<ProjectReport>,
    ) {
        self.summary = summary.into();
        self.findings.extend(findings);
        self.generated_tasks.extend(generated_tasks);
        if !project_reports.is_empty() {
            self.project_reports = Some(project_reports);
        }
        self.completed_at = Some(Utc::now());
    }

    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }
}

impl Record for AnalysisReport {
    fn id(&self) -> &str {
        &self.id
    }

    fn collection_name() -> &'static str {
        REPORTS_COLLECTION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(severity: Severity) -> Finding {
        Finding {
            severity,
            category: "health".to_string(),
            title: "t".to_string(),
            description: "d".to_string(),
            project_id: "p".to_string(),
        }
    }

    #[test]
    fn test_report_lifecycle() {
        let mut report = AnalysisReport::start(ReportType::HealthCheck, vec!["p".to_string()]);
        assert!(!report.is_complete());
        assert!(report.id.contains("-report-health-check"));

        report.complete(
            "all good",
            vec![finding(Severity::Warning), finding(Severity::Critical)],
            vec!["task-1".to_string()],
            vec![],
        );
        assert!(report.is_complete());
        assert_eq!(report.summary, "all good");
        assert_eq!(report.count_by_severity(Severity::Warning), 1);
        assert_eq!(report.generated_tasks, vec!["task-1".to_string()]);
        assert!(report.project_reports.is_none());
    }

    #[test]
    fn test_report_type_serde() {
        let json = serde_json::to_string(&ReportType::DeepAnalysis).unwrap();
        assert_eq!(json, "\"deep_analysis\"");
        assert_eq!(serde_json::to_string(&Severity::Error).unwrap(), "\"error\"");
    }
}
