//! pmd - autonomous project manager agent
//!
//! CLI entry point: run the scheduler, trigger analyses, and review the
//! tasks and actions the agent proposes.

use std::fs;
use std::path::PathBuf;

use clap::{CommandFactory, FromArgMatches};
use colored::Colorize;
use eyre::{Context, Result, eyre};
use tracing::{debug, info};

use pmagent::app::App;
use pmagent::cli::{ActionCommand, Cli, Command, OutputFormat, TaskCommand, generate_after_help};
use pmagent::config::{APP_DIR, Config};
use pmagent::domain::{
    ActionStatus, AnalysisReport, GeneratedBy, KanbanStatus, PendingAction, Priority, ReportType, Severity, Task,
    TaskStatus, TaskType,
};
use pmagent::executor::TaskOutcome;
use pmagent::llm::create_client;
use pmagent::tasks::TaskFilter;

/// Recorded as `decided_by` for decisions made from this CLI
const CLI_DECIDER: &str = "cli";

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("pmagent.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Cli::command().after_help(generate_after_help());
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(projects = config.projects.len(), model = %config.llm.model, "pmd loaded config");

    let app = App::open(config)?;
    let format = cli.format;

    debug!(command = ?cli.command, "main: dispatching command");
    let result = match cli.command {
        Command::Run => cmd_run(&app).await,
        Command::Analyze { deep } => cmd_analyze(&app, deep, format).await,
        Command::ExecuteNext => cmd_execute_next(&app).await,
        Command::Task { command } => match command {
            TaskCommand::List {
                project,
                status,
                kanban,
            } => cmd_task_list(&app, project, status, kanban, format).await,
            TaskCommand::Add {
                project,
                title,
                description,
                priority,
                task_type,
            } => cmd_task_add(&app, project, title, description, &priority, &task_type, format).await,
            TaskCommand::Approve { id } => cmd_task_decide(&app, &id, true, format).await,
            TaskCommand::Reject { id } => cmd_task_decide(&app, &id, false, format).await,
            TaskCommand::Move { id, column } => cmd_task_move(&app, &id, &column, format).await,
        },
        Command::Action { command } => match command {
            ActionCommand::List { all } => cmd_action_list(&app, all, format).await,
            ActionCommand::Approve { id, execute } => cmd_action_approve(&app, &id, execute, format).await,
            ActionCommand::Reject { id } => cmd_action_reject(&app, &id, format).await,
            ActionCommand::Expire => cmd_action_expire(&app).await,
            ActionCommand::Execute { id } => cmd_action_execute(&app, &id, format).await,
        },
    };

    app.shutdown().await?;
    result
}

/// Start every scheduled job and block until Ctrl-C
async fn cmd_run(app: &App) -> Result<()> {
    debug!("cmd_run: called");
    let llm = create_client(&app.config().llm).context("Failed to create LLM client")?;
    let scheduler = app.scheduler(llm)?;

    println!("{} ({})", "pmd scheduler".bold(), scheduler.timezone());
    for (name, expression) in scheduler.jobs() {
        println!("  {:<20} {}", name.cyan(), expression);
    }

    let handle = scheduler.start();
    println!("Running; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
    info!("Ctrl-C received");
    handle.shutdown().await;
    Ok(())
}

async fn cmd_analyze(app: &App, deep: bool, format: OutputFormat) -> Result<()> {
    debug!(deep, "cmd_analyze: called");
    let kind = if deep {
        ReportType::DeepAnalysis
    } else {
        ReportType::HealthCheck
    };
    let llm = create_client(&app.config().llm).context("Failed to create LLM client")?;
    let report = {
        let analyzer = app.analyzer(llm);
        analyzer.run(kind).await.context(format!("{} failed", kind))?
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_report(&report),
    }
    Ok(())
}

fn print_report(report: &AnalysisReport) {
    println!("{} {}", report.report_type.to_string().bold(), report.id.dimmed());
    println!("{}", report.summary);
    if !report.findings.is_empty() {
        println!();
        for finding in &report.findings {
            println!(
                "  {} [{}] {}: {}",
                severity_label(finding.severity),
                finding.project_id,
                finding.category,
                finding.title
            );
        }
    }
    println!();
    println!(
        "{} findings ({} critical, {} error), {} tasks created",
        report.findings.len(),
        report.count_by_severity(Severity::Critical),
        report.count_by_severity(Severity::Error),
        report.generated_tasks.len()
    );
}

fn severity_label(severity: Severity) -> String {
    let label = format!("{:<8}", severity.to_string());
    match severity {
        Severity::Critical => label.red().bold().to_string(),
        Severity::Error => label.red().to_string(),
        Severity::Warning => label.yellow().to_string(),
        Severity::Info => label.dimmed().to_string(),
    }
}

async fn cmd_execute_next(app: &App) -> Result<()> {
    debug!("cmd_execute_next: called");
    let Some(task) = app.tasks().find_next_executable().await? else {
        println!("No approved tasks in the backlog");
        return Ok(());
    };

    println!("Executing {} {}", task.id.dimmed(), task.title);
    match app.executor().execute_task(task).await? {
        TaskOutcome::Completed { commit: Some(sha) } => println!("{} committed {}", "done".green(), sha),
        TaskOutcome::Completed { commit: None } => println!("{} (no changes to commit)", "done".green()),
        TaskOutcome::Failed(reason) => println!("{} {}", "failed".red(), reason),
    }
    Ok(())
}

async fn cmd_task_list(
    app: &App,
    project: Option<String>,
    status: Option<String>,
    kanban: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    debug!(?project, ?status, ?kanban, "cmd_task_list: called");
    let filter = TaskFilter {
        project_id: project.map(|p| app.projects().resolve_id(&p)),
        status: status.map(|s| s.parse::<TaskStatus>()).transpose().map_err(|e| eyre!(e))?,
        kanban_status: kanban.map(|k| k.parse::<KanbanStatus>()).transpose().map_err(|e| eyre!(e))?,
    };
    let tasks = app.tasks().list(&filter).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tasks)?),
        OutputFormat::Text => {
            if tasks.is_empty() {
                println!("No tasks");
            }
            for task in &tasks {
                print_task_line(task);
            }
        }
    }
    Ok(())
}

fn print_task_line(task: &Task) {
    let status = match task.status {
        TaskStatus::Approved => task.status.to_string().green(),
        TaskStatus::Rejected | TaskStatus::Failed => task.status.to_string().red(),
        TaskStatus::Completed => task.status.to_string().blue(),
        _ => task.status.to_string().yellow(),
    };
    println!(
        "{}  {:<11} {:<11} {:<8} {:<10} {}",
        task.id.dimmed(),
        status,
        task.kanban_status,
        task.priority,
        task.project_id,
        task.title
    );
}

async fn cmd_task_add(
    app: &App,
    project: String,
    title: String,
    description: String,
    priority: &str,
    task_type: &str,
    format: OutputFormat,
) -> Result<()> {
    debug!(%project, %title, "cmd_task_add: called");
    let priority: Priority = priority.parse().map_err(|e: String| eyre!(e))?;
    let task_type: TaskType = task_type.parse().map_err(|e: String| eyre!(e))?;
    let project_id = app.projects().resolve_id(&project);

    let task = Task::new(project_id, title, description, GeneratedBy::Manual)
        .with_priority(priority)
        .with_type(task_type);
    let task = app.tasks().create(task).await?;
    print_task(&task, "created", format)
}

async fn cmd_task_decide(app: &App, input: &str, approve: bool, format: OutputFormat) -> Result<()> {
    debug!(%input, approve, "cmd_task_decide: called");
    let id = app.tasks().resolve(input).await?;
    if approve {
        let task = app.tasks().approve_task(&id).await?;
        print_task(&task, "approved", format)
    } else {
        let task = app.tasks().reject_task(&id).await?;
        print_task(&task, "rejected", format)
    }
}

async fn cmd_task_move(app: &App, input: &str, column: &str, format: OutputFormat) -> Result<()> {
    debug!(%input, %column, "cmd_task_move: called");
    let column: KanbanStatus = column.parse::<KanbanStatus>().map_err(|e| eyre!(e))?;
    let id = app.tasks().resolve(input).await?;
    let task = app.tasks().set_kanban(&id, column).await?;
    print_task(&task, &format!("moved to {}", task.kanban_status), format)
}

fn print_task(task: &Task, verb: &str, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(task)?),
        OutputFormat::Text => println!("Task {} {}", task.id, verb),
    }
    Ok(())
}

async fn cmd_action_list(app: &App, all: bool, format: OutputFormat) -> Result<()> {
    debug!(all, "cmd_action_list: called");
    let actions = if all {
        app.approvals().list_all().await?
    } else {
        app.approvals().list_pending().await?
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&actions)?),
        OutputFormat::Text => {
            if actions.is_empty() {
                println!("No actions");
            }
            for action in &actions {
                print_action_line(action);
            }
        }
    }
    Ok(())
}

fn print_action_line(action: &PendingAction) {
    let status = match action.status {
        ActionStatus::Pending => action.status.to_string().yellow(),
        ActionStatus::Approved => action.status.to_string().green(),
        ActionStatus::Rejected | ActionStatus::Expired => action.status.to_string().red(),
    };
    println!(
        "{}  {:<9} {:<14} expires {}  {}",
        action.id.dimmed(),
        status,
        action.action.action_type,
        action.expires_at.format("%Y-%m-%d %H:%M"),
        action.action.description
    );
    if let Some(execution) = &action.last_execution {
        let outcome = if execution.success {
            "succeeded".green()
        } else {
            "failed".red()
        };
        println!("      last run {} {}", execution.at.format("%Y-%m-%d %H:%M"), outcome);
    }
}

async fn cmd_action_approve(app: &App, input: &str, execute: bool, format: OutputFormat) -> Result<()> {
    debug!(%input, execute, "cmd_action_approve: called");
    let id = app.approvals().resolve(input).await?;
    let action = app.approvals().approve(&id, CLI_DECIDER).await?;
    print_action(&action, "approved", format)?;
    if execute {
        run_action(app, &id, format).await?;
    }
    Ok(())
}

async fn cmd_action_reject(app: &App, input: &str, format: OutputFormat) -> Result<()> {
    debug!(%input, "cmd_action_reject: called");
    let id = app.approvals().resolve(input).await?;
    let action = app.approvals().reject(&id, CLI_DECIDER).await?;
    print_action(&action, "rejected", format)
}

async fn cmd_action_expire(app: &App) -> Result<()> {
    debug!("cmd_action_expire: called");
    let count = app.approvals().expire_old(chrono::Utc::now()).await?;
    println!("Expired {} pending action(s)", count);
    Ok(())
}

async fn cmd_action_execute(app: &App, input: &str, format: OutputFormat) -> Result<()> {
    debug!(%input, "cmd_action_execute: called");
    let id = app.approvals().resolve(input).await?;
    run_action(app, &id, format).await
}

async fn run_action(app: &App, id: &str, format: OutputFormat) -> Result<()> {
    let result = app.approvals().execute(id, app.actions()).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => {
            if result.success {
                println!("{} executed", id.green());
            } else {
                println!(
                    "{} failed: {}",
                    id.red(),
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }
    Ok(())
}

fn print_action(action: &PendingAction, verb: &str, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(action)?),
        OutputFormat::Text => println!("Action {} {}", action.id, verb),
    }
    Ok(())
}
