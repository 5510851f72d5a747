use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use nbctl::config::{Overrides, Resolved, Settings};
use nbctl::error::format_report;
use nbctl::gcp::client::ClientFactory;
use nbctl::notebook::{NotebookService, OperationHandle, OperationPoller, WaitConfig};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Manage Vertex AI Workbench notebook instances
#[derive(Parser, Debug)]
#[command(name = "nbctl", version, about, long_about = None)]
struct Args {
    /// GCP project to use
    #[arg(short, long, global = true)]
    project: Option<String>,

    /// Location (zone) of the instances
    #[arg(short, long, global = true)]
    location: Option<String>,

    /// Service account key file
    #[arg(long, global = true)]
    credentials: Option<PathBuf>,

    /// Bearer token to use instead of a key file
    #[arg(long, global = true, env = "NBCTL_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Notebooks API endpoint
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Settings file (default: <config dir>/nbctl/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    /// Block all write operations
    #[arg(long, global = true)]
    readonly: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List instance names
    List,
    /// Create an instance from the configured template
    Create {
        instance_id: String,
        /// Wait until the operation finishes
        #[arg(long)]
        wait: bool,
    },
    /// Print the JupyterLab URL of an instance
    Url { instance_id: String },
    /// Show an instance
    Describe { instance_id: String },
    /// Start a stopped instance
    Start {
        instance_id: String,
        #[arg(long)]
        wait: bool,
    },
    /// Stop a running instance
    Stop {
        instance_id: String,
        #[arg(long)]
        wait: bool,
    },
    /// Delete an instance
    Delete {
        instance_id: String,
        #[arg(long)]
        wait: bool,
    },
    /// Show a long-running operation, e.g. one printed by `create`
    Operation { name: String },
}

impl Command {
    fn is_mutation(&self) -> bool {
        matches!(
            self,
            Command::Create { .. } | Command::Start { .. } | Command::Stop { .. } | Command::Delete { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter = std::env::var("RUST_LOG").ok().and_then(|f| EnvFilter::try_new(f).ok());
    let tracing_level = match (level.to_tracing_level(), &env_filter) {
        (Some(level), _) => level,
        (None, Some(_)) => Level::TRACE,
        (None, None) => return None,
    };

    let log_path = get_log_path();
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Warning: cannot open log file {}: {}", log_path.display(), e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);
    let filter = env_filter.unwrap_or_else(|| EnvFilter::new(tracing_level.as_str().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("nbctl started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("nbctl").join("nbctl.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".nbctl").join("nbctl.log");
    }
    PathBuf::from("nbctl.log")
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let _log_guard = setup_logging(args.log_level);

    if let Err(err) = run(args).await {
        tracing::error!("{:#}", err);
        eprintln!("Error: {}", format_report(&err));
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn run(args: Args) -> Result<()> {
    if args.readonly && args.command.is_mutation() {
        anyhow::bail!("Read-only mode: {:?} is not allowed", args.command);
    }

    let settings = Settings::load(args.config.as_deref())?;
    let overrides = Overrides {
        project_id: args.project.clone(),
        location: args.location.clone(),
        credentials_path: args.credentials.clone(),
        access_token: args.access_token.clone(),
        endpoint: args.endpoint.clone(),
    };
    let Resolved {
        project_id,
        location,
        client,
        template,
    } = settings.resolve(&overrides)?;

    tracing::info!("Using project: {}, location: {}", project_id, location);

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling in-flight request");
            ctrl_c.cancel();
        }
    });

    let factory = ClientFactory::new(client);
    let service = NotebookService::new(factory.clone(), template).with_cancellation(cancel.clone());
    let output = args.output;
    let (p, l) = (project_id.as_str(), location.as_str());

    let handle = match &args.command {
        Command::List => {
            let names = service.list_instances(p, l).await?;
            match output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&names)?),
                OutputFormat::Text => names.iter().for_each(|n| println!("{}", n)),
            }
            return Ok(());
        }
        Command::Url { instance_id } => {
            let url = service.get_access_url(p, l, instance_id).await?;
            match output {
                OutputFormat::Json => println!("{}", json!({ "url": url })),
                OutputFormat::Text => println!("{}", url),
            }
            return Ok(());
        }
        Command::Describe { instance_id } => {
            let instance = service.describe_instance(p, l, instance_id).await?;
            match output {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "name": instance.name,
                        "state": instance.state,
                        "machineType": instance.machine_type(),
                        "accessUrl": instance.access_url(),
                        "createTime": instance.create_time,
                    }))?
                ),
                OutputFormat::Text => {
                    println!("Name:         {}", instance.name);
                    println!("State:        {}", instance.state.as_deref().unwrap_or("-"));
                    println!("Machine type: {}", instance.machine_type().unwrap_or("-"));
                    println!("Access URL:   {}", instance.access_url().as_deref().unwrap_or("-"));
                    println!(
                        "Created:      {}",
                        instance
                            .create_time
                            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                            .unwrap_or_else(|| "-".to_string())
                    );
                }
            }
            return Ok(());
        }
        Command::Operation { name } => {
            let poller = OperationPoller::new(factory.clone(), WaitConfig::default());
            let operation = poller.get(p, l, &OperationHandle::new(name.as_str())).await?;
            match output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&operation)?),
                OutputFormat::Text => {
                    println!("Name:  {}", operation.name);
                    println!("Done:  {}", operation.done);
                    if let Some(status) = &operation.error {
                        println!("Error: {} ({})", status.message, status.code);
                    }
                }
            }
            return Ok(());
        }
        Command::Create { instance_id, .. } => service.create_instance(p, l, instance_id).await?,
        Command::Start { instance_id, .. } => service.start_instance(p, l, instance_id).await?,
        Command::Stop { instance_id, .. } => service.stop_instance(p, l, instance_id).await?,
        Command::Delete { instance_id, .. } => service.delete_instance(p, l, instance_id).await?,
    };

    let wait = matches!(
        args.command,
        Command::Create { wait: true, .. }
            | Command::Start { wait: true, .. }
            | Command::Stop { wait: true, .. }
            | Command::Delete { wait: true, .. }
    );

    if wait {
        wait_for(&factory, p, l, &handle, &cancel, output).await
    } else {
        print_handle(&handle, false, output);
        Ok(())
    }
}

async fn wait_for(
    factory: &ClientFactory,
    project: &str,
    location: &str,
    handle: &OperationHandle,
    cancel: &CancellationToken,
    output: OutputFormat,
) -> Result<()> {
    if output == OutputFormat::Text {
        eprintln!("Waiting for {} ...", handle);
    }

    let poller = OperationPoller::new(factory.clone(), WaitConfig::default());
    poller
        .wait(project, location, handle, cancel)
        .await
        .with_context(|| format!("Operation {} did not complete", handle))?;

    print_handle(handle, true, output);
    Ok(())
}

fn print_handle(handle: &OperationHandle, done: bool, output: OutputFormat) {
    match output {
        OutputFormat::Json => println!("{}", json!({ "operation": handle, "done": done })),
        OutputFormat::Text => println!("{}", handle),
    }
}
