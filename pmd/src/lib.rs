//! pmagent - autonomous project manager agent
//!
//! Periodically asks a model to assess the health of a set of repositories,
//! turns its answer into findings and backlog tasks, and executes approved
//! tasks through a code-generation program.
//!
//! # Core Concepts
//!
//! - **Reads are free, writes wait**: read-only tools run immediately; every
//!   mutating tool becomes a pending action a human must approve
//! - **Tasks need a human too**: extracted tasks start pending and only
//!   approved backlog tasks are executed
//! - **One writer**: all persistent state goes through a single actor
//!
//! # Modules
//!
//! - [`agent`] - Tool-calling loop, report extraction and analysis runs
//! - [`approval`] - Pending action state machine and execution
//! - [`tasks`] - Task lifecycle and backlog selection
//! - [`executor`] - Task execution through code generation
//! - [`scheduler`] - Cron-driven jobs
//! - [`tools`] - Tool registry and builtin tools
//! - [`llm`] - LLM client trait and Anthropic implementation
//! - [`collab`] - External programs: GitHub, code generation, git, crawlers
//! - [`state`] - State actor over the keyed store
//! - [`app`] - Component wiring

pub mod agent;
pub mod app;
pub mod approval;
pub mod cli;
pub mod collab;
pub mod config;
pub mod domain;
pub mod events;
pub mod executor;
pub mod llm;
pub mod scheduler;
pub mod state;
pub mod tasks;
pub mod tools;
