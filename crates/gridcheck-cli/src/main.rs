//! Command-line runner for gridcheck scenarios.
//!
//! # Usage
//!
//! ```bash
//! # Run every scenario against the default endpoint
//! gridcheck run
//!
//! # Run two scenarios, starting Appium first if it isn't up
//! gridcheck run row-celebration win-celebration --bootstrap
//!
//! # JSON report, evidence under ./evidence
//! gridcheck -f json --evidence-dir ./evidence run
//!
//! # What screen is the app on?
//! gridcheck probe
//!
//! # Is the endpoint up?
//! gridcheck status
//!
//! # Start Appium and leave it running
//! gridcheck bootstrap
//! ```

mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gridcheck_core::action::Actions;
use gridcheck_core::bootstrap::{ensure_endpoint, EndpointHandle};
use gridcheck_core::clock::TokioClock;
use gridcheck_core::config::HarnessConfig;
use gridcheck_core::controls::Difficulty;
use gridcheck_core::driver::DriverFactory;
use gridcheck_core::evidence::EvidenceStore;
use gridcheck_core::navigation::Navigator;
use gridcheck_core::scenario::{Scenario, ScenarioRunner};
use gridcheck_core::scenarios;
use gridcheck_core::webdriver::{WebDriverClient, WebDriverFactory};

use output::{BootstrapRow, OutputFormat, ProbeRow, ScenarioRow, StatusRow};

/// End-to-end checks for the Sudoku app over Appium.
#[derive(Parser)]
#[command(name = "gridcheck")]
#[command(about = "Run end-to-end checks against the Sudoku app through a WebDriver endpoint")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.gridcheck/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// WebDriver endpoint URL
    #[arg(long, env = "GRIDCHECK_ENDPOINT")]
    endpoint: Option<String>,

    /// Device UDID
    #[arg(long, env = "GRIDCHECK_UDID")]
    udid: Option<String>,

    /// Root directory for screenshots and page-source dumps
    #[arg(long, env = "GRIDCHECK_EVIDENCE_DIR")]
    evidence_dir: Option<PathBuf>,

    /// Difficulty for scenarios that start a game
    #[arg(short, long)]
    difficulty: Option<Difficulty>,

    /// Output format: text or json
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Debug logging on stderr
    #[arg(short, long)]
    verbose: bool,

    /// Also write logs to gridcheck.log in the run's evidence directory
    #[arg(long)]
    log_file: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run scenarios (all of them when none are named)
    Run {
        /// Scenario names, see `gridcheck list`
        names: Vec<String>,
        /// Start the automation server first if it isn't reachable
        #[arg(long)]
        bootstrap: bool,
    },

    /// List the available scenarios
    List,

    /// Open a session and report which screen the app is on
    Probe,

    /// Check whether the endpoint answers
    Status,

    /// Start the automation server if it isn't running, and leave it running
    Bootstrap {
        /// Server log file (default: <evidence-dir>/appium.log)
        #[arg(long)]
        log: Option<PathBuf>,
    },
}

#[derive(Debug)]
enum CliError {
    /// Nothing ran: bad arguments, unreachable endpoint, unusable config.
    Setup(String),
    /// Scenarios ran and at least one failed.
    Failed(usize),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            CliError::Failed(_) => ExitCode::from(1),
            CliError::Setup(_) => ExitCode::from(2),
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Setup(msg) => write!(f, "{}", msg),
            CliError::Failed(count) => write!(f, "{} scenario(s) failed", count),
        }
    }
}

fn setup<E: std::fmt::Display>(err: E) -> CliError {
    CliError::Setup(err.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(cli.verbose, None);
            eprintln!("Error: {}", e);
            return e.exit_code();
        }
    };

    let prepared = match &cli.command {
        Command::Run { names, .. } => match prepare_run(names, &config) {
            Ok(prepared) => Some(prepared),
            Err(e) => {
                init_tracing(cli.verbose, None);
                eprintln!("Error: {}", e);
                return e.exit_code();
            }
        },
        _ => None,
    };

    let log_dir = cli.log_file.then(|| log_file_dir(&config, prepared.as_ref()));
    init_tracing(cli.verbose, log_dir);

    match run(cli, config, prepared).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

/// Scenarios and evidence store for a `run`, settled before logging starts.
struct PreparedRun {
    selected: Vec<Arc<dyn Scenario>>,
    store: EvidenceStore,
}

fn prepare_run(names: &[String], config: &HarnessConfig) -> Result<PreparedRun, CliError> {
    let selected = select_scenarios(names)?;
    let store = EvidenceStore::create(&config.evidence_dir).map_err(setup)?;
    Ok(PreparedRun { selected, store })
}

/// Where `--log-file` writes: the run directory for `run`, else the
/// evidence root.
fn log_file_dir(config: &HarnessConfig, prepared: Option<&PreparedRun>) -> PathBuf {
    prepared
        .map(|p| p.store.run_dir().to_path_buf())
        .unwrap_or_else(|| config.evidence_dir.clone())
}

/// stderr logging, plus a plain-text file in `log_dir` when given.
fn init_tracing(verbose: bool, log_dir: Option<PathBuf>) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let file_layer = log_dir
        .filter(|dir| std::fs::create_dir_all(dir).is_ok())
        .map(|dir| {
            let appender = tracing_appender::rolling::never(dir, "gridcheck.log");
            fmt::layer().with_ansi(false).with_writer(appender)
        });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
}

/// Config file (explicit or default) with command-line overrides applied.
fn load_config(cli: &Cli) -> Result<HarnessConfig, CliError> {
    let mut config = match &cli.config {
        Some(path) => HarnessConfig::load_from(path).map_err(setup)?,
        None => HarnessConfig::load(),
    };
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(udid) = &cli.udid {
        config.capabilities.udid = Some(udid.clone());
    }
    if let Some(dir) = &cli.evidence_dir {
        config.evidence_dir = dir.clone();
    }
    if let Some(difficulty) = cli.difficulty {
        config.difficulty = difficulty;
    }
    Ok(config)
}

/// Scenarios named on the command line, or the whole catalogue.
fn select_scenarios(names: &[String]) -> Result<Vec<Arc<dyn Scenario>>, CliError> {
    if names.is_empty() {
        return Ok(scenarios::catalog());
    }
    names
        .iter()
        .map(|name| {
            scenarios::by_name(name).ok_or_else(|| {
                let known: Vec<&str> = scenarios::catalog().iter().map(|s| s.name()).collect();
                CliError::Setup(format!("Unknown scenario '{}' (known: {})", name, known.join(", ")))
            })
        })
        .collect()
}

async fn require_reachable(config: &HarnessConfig) -> Result<(), CliError> {
    let client = WebDriverClient::new(&config.endpoint, Duration::from_secs(2)).map_err(setup)?;
    if client.is_reachable().await {
        Ok(())
    } else {
        Err(CliError::Setup(format!(
            "Endpoint {} is unreachable (try `gridcheck bootstrap`)",
            config.endpoint
        )))
    }
}

async fn run(cli: Cli, config: HarnessConfig, prepared: Option<PreparedRun>) -> Result<(), CliError> {
    let format = cli.format;
    match cli.command {
        Command::List => {
            let rows: Vec<ScenarioRow> = scenarios::catalog()
                .iter()
                .map(|s| ScenarioRow {
                    name: s.name(),
                    description: s.description(),
                })
                .collect();
            println!("{}", output::render_list(&rows, format));
            Ok(())
        }

        Command::Status => {
            let client = WebDriverClient::new(&config.endpoint, Duration::from_secs(2)).map_err(setup)?;
            let row = StatusRow {
                endpoint: config.endpoint.clone(),
                reachable: client.is_reachable().await,
            };
            println!("{}", output::render_item(&row, format));
            if row.reachable {
                Ok(())
            } else {
                Err(CliError::Setup(format!("Endpoint {} is unreachable", config.endpoint)))
            }
        }

        Command::Bootstrap { log } => {
            let log = log.unwrap_or_else(|| config.evidence_dir.join("appium.log"));
            let handle = ensure_endpoint(&config, &log).await.map_err(setup)?;
            let row = BootstrapRow {
                endpoint: handle.endpoint().to_string(),
                spawned: handle.spawned(),
                pid: handle.pid(),
                log: handle.log_path().map(|p| p.display().to_string()),
            };
            handle.detach();
            println!("{}", output::render_item(&row, format));
            Ok(())
        }

        Command::Probe => {
            require_reachable(&config).await?;
            let factory = WebDriverFactory::from_config(&config).map_err(setup)?;
            let driver = factory.open().await.map_err(setup)?;
            let actions = Actions::new(driver.clone(), Arc::new(TokioClock::new()))
                .with_locate_timeout(config.locate_timeout());
            let state = Navigator::new(Arc::new(actions), config.difficulty).probe().await;
            if let Err(e) = driver.close().await {
                warn!(error = %e, "session close failed");
            }
            let row = ProbeRow {
                endpoint: config.endpoint.clone(),
                state: state.to_string(),
            };
            println!("{}", output::render_item(&row, format));
            Ok(())
        }

        Command::Run { names, bootstrap } => {
            let PreparedRun { selected, store } = match prepared {
                Some(prepared) => prepared,
                None => prepare_run(&names, &config)?,
            };

            // Kept alive for the run; a server started here stops with it.
            let _server: Option<EndpointHandle> = if bootstrap {
                let log = config.evidence_dir.join("appium.log");
                Some(ensure_endpoint(&config, &log).await.map_err(setup)?)
            } else {
                require_reachable(&config).await?;
                None
            };

            let factory = WebDriverFactory::from_config(&config).map_err(setup)?;
            info!(run_dir = %store.run_dir().display(), scenarios = selected.len(), "starting run");
            let runner = ScenarioRunner::new(config, Arc::new(factory), Arc::new(TokioClock::new()), store);

            let cancel = runner.cancel_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupted, stopping after the current step");
                    cancel.cancel();
                }
            });

            let report = runner.run_all(&selected).await;
            println!("{}", output::render_report(&report, format));

            let failed = report.failed().count();
            if failed == 0 {
                Ok(())
            } else {
                Err(CliError::Failed(failed))
            }
        }
    }
}
