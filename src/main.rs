use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use data_crew::config::CrewConfig;
use data_crew::crew::TaskReport;
use data_crew::error::Result;
use data_crew::llm::{ChatRole, DeepSeekBackend};
use data_crew::system::AgentSystem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Strategy {
    /// Fixed three-stage pipeline.
    Pipeline,
    /// Dynamic dependency-graph walk.
    Workflow,
    /// Run both, pipeline first.
    Both,
}

#[derive(Parser)]
#[command(name = "data-crew", about = "Multi-agent coordinator for data-platform tasks")]
struct Cli {
    /// Task to process.
    #[arg(default_value = "分析销售数据，生成每月销售报表")]
    task: String,

    /// Execution strategy.
    #[arg(long, value_enum, default_value_t = Strategy::Both)]
    strategy: Strategy,

    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("data_crew=debug")
    } else {
        EnvFilter::new("data_crew=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = CrewConfig::load(cli.config.as_deref()).await?;
    let backend = Arc::new(DeepSeekBackend::new(config.llm)?);
    let system = AgentSystem::new(backend)?;

    if matches!(cli.strategy, Strategy::Pipeline | Strategy::Both) {
        println!("Executing fixed pipeline:");
        let results = system.process_task(&cli.task).await?;
        print_results(&system, &results)?;
    }

    if matches!(cli.strategy, Strategy::Workflow | Strategy::Both) {
        println!("Executing dynamic workflow:");
        let results = system.execute_workflow(&cli.task).await?;
        print_results(&system, &results)?;
    }

    Ok(())
}

fn print_results(
    system: &AgentSystem,
    results: &std::collections::HashMap<String, TaskReport>,
) -> Result<()> {
    println!("\nExecution Results:");
    println!("=================\n");

    let mut roles: Vec<&String> = results.keys().collect();
    roles.sort();
    for role in roles {
        println!("Agent: {role}");
        if let Some(agent) = system.agent_by_role(role) {
            println!("Messages:");
            for message in agent.transcript() {
                let role_tag = match message.role {
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                };
                println!("[{}] ({role_tag}): {}", message.sender, message.content);
            }
        }
        println!("\nFinal Result:");
        println!("{}", serde_json::to_string_pretty(&results[role])?);
        println!("{}\n", "-".repeat(80));
    }
    Ok(())
}
