use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use price_oracle::config::OracleConfig;
use price_oracle::ledger::{FileLedger, RunLedger, RunStatus, TaskKind};
use price_oracle::oracle::Oracle;
use price_oracle::store::DirectoryStore;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "oracle", version, about = "Forecast daily card prices")]
struct Cli {
    /// Configuration file (defaults to ../oracle.toml, then oracle.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train the shared model on the price history
    Learn {
        /// Ignore any saved model and start from scratch
        #[arg(long)]
        reset: bool,
    },
    /// Forecast every series and replace the target table
    Predict,
}

impl Command {
    fn task(&self) -> TaskKind {
        match self {
            Command::Learn { .. } => TaskKind::Learn,
            Command::Predict => TaskKind::Predict,
        }
    }
}

fn init_logging(level: &str, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(command: &Command, config: OracleConfig) -> Result<()> {
    let source = config.history_source();
    let store_root = config.folders.store.clone();

    match command {
        Command::Learn { reset } => {
            let mut oracle = Oracle::new(config, Box::new(source), *reset)?;
            if !oracle.learn()? {
                info!("nothing to learn from");
            }
        }
        Command::Predict => {
            let mut oracle = Oracle::new(config, Box::new(source), false)?;
            let path = oracle.predict()?;
            info!(path = %path.display(), "wrote forecasts");
            let mut store = DirectoryStore::new(store_root);
            oracle.insert_predictions(&mut store)?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match OracleConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config.logging.level, cli.verbose);

    match launch(&cli.command, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn launch(command: &Command, config: OracleConfig) -> Result<()> {
    let mut ledger = FileLedger::open(&config.folders.ledger).context("opening run ledger")?;
    let task = command.task();
    let id = ledger.create_entry(task.as_str())?;
    ledger.set_status(RunStatus::Ongoing.as_str())?;
    info!(id, %task, "run started");

    let outcome = run(command, config);
    let status = if outcome.is_ok() {
        RunStatus::Finished
    } else {
        RunStatus::Failed
    };
    ledger.set_status(status.as_str())?;
    info!(id, %status, "run ended");
    outcome.with_context(|| format!("{} run failed", task))
}
