use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use symgraph::config::{Config, LoggingConfig};

mod cli;

#[derive(Parser)]
#[command(name = "symgraph")]
#[command(author = "Symgraph Project Team")]
#[command(version)]
#[command(about = "Incremental symbol and relationship index for multi-language projects", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a project
    Index {
        /// Project directory to index
        #[arg(default_value = ".")]
        project: PathBuf,

        /// Ignore recorded hashes and re-parse every file
        #[arg(short, long)]
        rebuild: bool,

        /// Worker pool size
        #[arg(short, long)]
        workers: Option<usize>,

        /// LCOV or JSON coverage report
        #[arg(short, long)]
        coverage: Option<PathBuf>,

        /// Write the index result as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List supported languages
    Languages,
}

fn init_logging(debug: bool, verbose: bool, logging: &LoggingConfig) {
    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        logging.level.as_str()
    };

    // RUST_LOG wins over flags and config
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match logging.format.as_str() {
        "compact" | "json" => builder.compact().init(),
        _ => builder.init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Index {
            project,
            rebuild,
            workers,
            coverage,
            output,
        } => {
            let config_path = Config::path_in(&project);
            let loaded = Config::from_file(&config_path);
            let logging = loaded
                .as_ref()
                .map(|config| config.logging.clone())
                .unwrap_or_default();
            init_logging(cli.debug, cli.verbose, &logging);

            let config = match loaded {
                Ok(config) => {
                    info!("Loaded configuration from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::debug!("Could not load config from {}: {}", config_path.display(), e);
                    info!("Using default configuration");
                    Config::default()
                }
            };

            info!("Indexing project: {}", project.display());
            cli::index::index_project(
                &project,
                &config,
                cli::index::IndexOptions {
                    rebuild,
                    workers,
                    coverage,
                    output,
                },
            )
            .await?;
        }

        Commands::Languages => {
            init_logging(cli.debug, cli.verbose, &LoggingConfig::default());
            cli::languages::list_languages();
        }
    }

    Ok(())
}
