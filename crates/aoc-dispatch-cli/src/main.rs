//! aoc - run per-day puzzle solvers from the terminal.

mod colors;
mod list;
mod run;
mod shell;
mod terminal;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use aoc_dispatch_core::{DispatchConfig, Isolation, Part, Selection, SolverKey};

#[derive(Parser)]
#[command(name = "aoc")]
#[command(about = "Run per-day puzzle solvers in an isolated context")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding compiled solver modules [env: AOC_MODULES_DIR]
    #[arg(long, global = true)]
    modules_dir: Option<PathBuf>,

    /// Execution context flavour: process or thread [env: AOC_ISOLATION]
    #[arg(long, global = true)]
    isolation: Option<Isolation>,

    /// Path to the aoc-worker binary [env: AOC_WORKER_PATH]
    #[arg(long, global = true)]
    worker: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run both parts of a day headlessly
    Run {
        #[arg(short, long)]
        year: u16,

        #[arg(short, long)]
        day: u8,

        /// Puzzle input file (reads stdin when omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Start an interactive session
    Shell {
        #[arg(short, long)]
        year: u16,

        #[arg(short, long)]
        day: u8,
    },

    /// List available solver modules
    List {
        /// Only this year
        #[arg(short, long)]
        year: Option<u16>,
    },

    /// Print the module path for a key
    Resolve {
        #[arg(short, long)]
        year: u16,

        #[arg(short, long)]
        day: u8,

        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=2))]
        part: u8,
    },
}

impl Cli {
    /// Environment configuration overridden by explicit flags.
    fn config(&self) -> anyhow::Result<DispatchConfig> {
        let mut config = DispatchConfig::from_env()?;
        if let Some(dir) = &self.modules_dir {
            config.modules_dir = dir.clone();
        }
        if let Some(isolation) = self.isolation {
            config.isolation = isolation;
        }
        if let Some(worker) = &self.worker {
            config.worker_path = Some(worker.clone());
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config()?;
    tracing::debug!("Configuration: {:?}", config);

    match cli.command {
        Commands::Run { year, day, input } => {
            run::execute(&config, Selection::new(year, day), input.as_deref()).await?;
        }

        Commands::Shell { year, day } => {
            shell::execute(&config, Selection::new(year, day)).await?;
        }

        Commands::List { year } => list::execute(&config, year)?,

        Commands::Resolve { year, day, part } => {
            let part = Part::try_from(part).map_err(anyhow::Error::msg)?;
            list::resolve(&config, SolverKey::new(year, day, part)?)?;
        }
    }

    Ok(())
}
