//! Task priority and its execution rank

use serde::{Deserialize, Serialize};

/// Priority of a task
///
/// Deserializes leniently: any unrecognized string becomes `Unspecified`,
/// which ranks after every named level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
    Unspecified,
}

impl Priority {
    /// Execution rank: lower runs first
    pub fn rank(&self) -> u8 {
        match self {
            Self::Critical => 1,
            Self::High => 2,
            Self::Medium => 3,
            Self::Low => 4,
            Self::Unspecified => 5,
        }
    }
}

impl From<String> for Priority {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(Self::Unspecified)
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
            Self::Unspecified => write!(f, "unspecified"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Ok(Self::Critical),
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}
