use autocoder::agent::{AgentConfig, AutonomousResult, BrainCoder, BrainPlanner, DevelopmentLoop};
use autocoder::brain::{Brain, BrainConfig};
use autocoder::executor::{ApprovalMode, ExecutionEngine, ExecutorConfig};
use autocoder::safety::{SafetyConfig, SafetyGate};
use clap::Parser;
use rustyline::Editor;
use rustyline::history::FileHistory;
use std::path::PathBuf;
use std::process;
use tokio::signal;
use tracing::{Level, info, warn};
use tracing_subscriber::fmt;

type Dev = DevelopmentLoop<BrainPlanner, BrainCoder, ExecutionEngine>;

/// CLI arguments
#[derive(Debug, Parser)]
#[command(name = "autocoder")]
#[command(about = "Plan, generate, run and repair code for a task inside a guarded workspace")]
struct Args {
    /// Maximum code-generation iterations per task
    #[arg(short, long)]
    max_iterations: Option<u32>,

    /// Workspace directory for generated code
    #[arg(short, long)]
    workspace: Option<PathBuf>,

    /// How approval-gated commands are decided: prompt, approve or deny
    #[arg(long)]
    approval: Option<ApprovalMode>,

    /// History file path for interactive mode
    #[arg(long)]
    history_file: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,

    /// Task description; omit to start an interactive session
    task: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    let mut executor_config = ExecutorConfig::from_env();
    if let Some(workspace) = args.workspace {
        executor_config.workspace_dir = workspace;
    }
    if let Some(mode) = args.approval {
        executor_config.approval_mode = mode;
    }

    let mut agent_config = AgentConfig::from_env()?;
    if let Some(max) = args.max_iterations {
        agent_config.max_iterations = max;
    }

    let mut safety_config = SafetyConfig::from_env()?;
    safety_config.allow_directory(executor_config.workspace_dir.display().to_string());

    let planner_config = BrainConfig::from_env("PLANNER")?;
    let coder_config = BrainConfig::from_env("CODER")?;
    info!(
        planner_model = %planner_config.default_model,
        coder_model = %coder_config.default_model,
        workspace = %executor_config.workspace_dir.display(),
        max_iterations = agent_config.max_iterations,
        "Configuration loaded"
    );

    let planner = BrainPlanner::new(Brain::new(planner_config)?);
    let coder = BrainCoder::new(Brain::new(coder_config)?);
    let engine = ExecutionEngine::new(executor_config, SafetyGate::new(safety_config))?;
    let mut dev = DevelopmentLoop::new(planner, coder, engine, agent_config);

    let task = args.task.join(" ");
    if !task.trim().is_empty() {
        let succeeded = tokio::select! {
            result = run_task(&mut dev, &task) => result.success,
            _ = signal::ctrl_c() => {
                warn!("Received interrupt, abandoning run");
                false
            }
        };
        if !succeeded {
            process::exit(1);
        }
        return Ok(());
    }

    let history_file = args.history_file.unwrap_or_else(|| {
        dirs::home_dir()
            .map(|p| p.join(".autocoder_history"))
            .unwrap_or_else(|| PathBuf::from(".autocoder_history"))
    });
    interactive(&mut dev, history_file).await
}

async fn run_task(dev: &mut Dev, task: &str) -> AutonomousResult {
    let max_iterations = dev.config().max_iterations;
    let result = dev.run(task, max_iterations).await;
    println!("{}", result.summary());
    if !result.success
        && let Some(last) = result.execution_results.last()
    {
        for fix in &last.suggested_fixes {
            println!("  hint: {}", fix);
        }
    }
    result
}

async fn interactive(dev: &mut Dev, history_file: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let mut rl: Editor<(), FileHistory> = Editor::new()?;

    if history_file.exists()
        && let Err(e) = rl.load_history(&history_file)
    {
        eprintln!("[warning] Failed to load history: {}", e);
    }

    println!("autocoder v{}", env!("CARGO_PKG_VERSION"));
    println!("Workspace: {}", dev.runner().workspace().display());
    println!("Describe a task and press Enter. Ctrl+D to quit.");
    println!();

    loop {
        match rl.readline("task> ") {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(input);
                run_task(dev, input).await;
                println!();
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("[error] Readline error: {}", e);
                break;
            }
        }
    }

    if let Err(e) = rl.save_history(&history_file) {
        eprintln!("[warning] Failed to save history: {}", e);
    }

    println!("\nGoodbye!");
    Ok(())
}
