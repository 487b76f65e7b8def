//! Product ideas incubated by the idea tools

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use kvstore::Record;
use serde::{Deserialize, Serialize};

use super::id::generate_id;

pub const IDEAS_COLLECTION: &str = "ideas";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IdeaStatus {
    #[default]
    Draft,
    Analyzed,
    Planned,
    RepoCreated,
    Launched,
}

impl std::fmt::Display for IdeaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Analyzed => write!(f, "analyzed"),
            Self::Planned => write!(f, "planned"),
            Self::RepoCreated => write!(f, "repo_created"),
            Self::Launched => write!(f, "launched"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Idea {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: IdeaStatus,
    pub analysis: Option<serde_json::Value>,
    pub plan: Option<String>,
    pub repo_name: Option<String>,
    pub repo_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Idea {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        let title = title.into();
        let now = Utc::now();
        Self {
            id: generate_id("idea", &title),
            title,
            description: description.into(),
            status: IdeaStatus::Draft,
            analysis: None,
            plan: None,
            repo_name: None,
            repo_path: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_status(&mut self, status: IdeaStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

impl Record for Idea {
    fn id(&self) -> &str {
        &self.id
    }

    fn collection_name() -> &'static str {
        IDEAS_COLLECTION
    }
}
