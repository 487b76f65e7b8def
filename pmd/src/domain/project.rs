//! Projects under management

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A repository the agent watches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Project {
    pub id: String,

    #[serde(default)]
    pub name: String,

    /// GitHub `owner/name`
    pub repo: String,

    /// Local working copy used for code generation
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Project {
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() { &self.id } else { &self.name }
    }

    /// Match a model-supplied reference against id, name or repo
    pub fn matches(&self, reference: &str) -> bool {
        let r = reference.trim();
        r.eq_ignore_ascii_case(&self.id)
            || r.eq_ignore_ascii_case(&self.name)
            || r.eq_ignore_ascii_case(&self.repo)
            || self
                .repo
                .rsplit('/')
                .next()
                .is_some_and(|short| r.eq_ignore_ascii_case(short))
    }
}

/// Lookup over the configured projects
#[derive(Debug, Clone, Default)]
pub struct ProjectRegistry {
    projects: Vec<Project>,
}

impl ProjectRegistry {
    pub fn new(projects: Vec<Project>) -> Self {
        Self { projects }
    }

    pub fn get(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn enabled(&self) -> impl Iterator<Item = &Project> {
        self.projects.iter().filter(|p| p.enabled)
    }

    pub fn all(&self) -> &[Project] {
        &self.projects
    }

    /// Resolve a free-form reference to a project id, falling back to the
    /// reference itself
    pub fn resolve_id(&self, reference: &str) -> String {
        self.projects
            .iter()
            .find(|p| p.matches(reference))
            .map(|p| p.id.clone())
            .unwrap_or_else(|| reference.trim().to_string())
    }
}
