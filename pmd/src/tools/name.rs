//! Tool names the model may call

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    RepoStatus,
    ListIssues,
    ListPrs,
    RunStatus,
    CreateIssue,
    CommentIssue,
    IdeaAnalyze,
    IdeaSavePlan,
    IdeaCreateRepo,
    IdeaGenerateCode,
}

impl ToolName {
    pub const ALL: [ToolName; 10] = [
        Self::RepoStatus,
        Self::ListIssues,
        Self::ListPrs,
        Self::RunStatus,
        Self::CreateIssue,
        Self::CommentIssue,
        Self::IdeaAnalyze,
        Self::IdeaSavePlan,
        Self::IdeaCreateRepo,
        Self::IdeaGenerateCode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RepoStatus => "repo_status",
            Self::ListIssues => "list_issues",
            Self::ListPrs => "list_prs",
            Self::RunStatus => "run_status",
            Self::CreateIssue => "create_issue",
            Self::CommentIssue => "comment_issue",
            Self::IdeaAnalyze => "idea_analyze",
            Self::IdeaSavePlan => "idea_save_plan",
            Self::IdeaCreateRepo => "idea_create_repo",
            Self::IdeaGenerateCode => "idea_generate_code",
        }
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Exact match only
impl std::str::FromStr for ToolName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| format!("unknown tool: {}", s))
    }
}
