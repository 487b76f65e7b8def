//! Agent orchestration: the tool-calling loop, report extraction and
//! analysis runs

mod analysis;
mod engine;
mod error;
mod extractor;
pub mod prompts;

pub use analysis::{AnalysisTimeouts, Analyzer, last_report_key};
pub use engine::{AgentLoop, AgentLoopConfig, AgentRun, StopCause};
pub use error::{AgentError, AnalysisError, ParseError};
pub use extractor::{CandidateTask, ParsedReport, ReportExtractor, locate_json, severity_from_status};
pub use prompts::{PromptError, PromptLoader};
