//! carton CLI - module descriptor synthesis from resolved dependency trees

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

mod describe;

#[derive(Parser)]
#[command(name = "carton")]
#[command(version)]
#[command(about = "Synthesize module descriptors from resolved dependency trees", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Describe the module built from an artifact and its dependencies
    Describe {
        /// Root artifact coordinate (group:artifact:version)
        coordinate: String,

        /// Directory holding resolved dependency trees
        #[arg(long, default_value = ".")]
        repo: PathBuf,

        /// Config file with a [module] table (defaults to ./carton.toml when present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Index of modules already installed in the runtime
        #[arg(long)]
        registry: Option<PathBuf>,

        /// Do not contact remote repositories
        #[arg(long)]
        offline: bool,

        /// Print the descriptor as JSON instead of manifest text
        #[arg(long)]
        json: bool,
    },

    /// Print the version range synthesized for a version
    Range {
        /// Artifact version
        version: String,

        /// Digit sensitivity, 0 (exact) to 4 (open-ended)
        #[arg(default_value = "0")]
        digits: String,
    },
}

fn init_logging(verbose: u8) {
    let level_filter = match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .with_env_var("CARTON_LOG")
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Describe {
            coordinate,
            repo,
            config,
            registry,
            offline,
            json,
        } => {
            let options = describe::DescribeOptions {
                coordinate,
                repo,
                config,
                registry,
                offline,
                json,
            };
            describe::describe(&options)?;
        }

        Commands::Range { version, digits } => {
            println!("{}", describe::range(&version, &digits));
        }
    }

    Ok(())
}
