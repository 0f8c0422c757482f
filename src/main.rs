use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use skillsheet::{logging, AppConfig};

mod commands;

#[derive(Parser)]
#[command(
    author,
    version = env!("CARGO_PKG_VERSION"),
    about = "Engineer skill sheets with reconciled skill, qualification and process links",
    long_about = None
)]
struct Cli {
    /// Config file (default: ~/.skillsheet/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema and default process stages
    Init {
        /// Database path (overrides config)
        #[arg(long)]
        db: Option<String>,
    },

    /// Import reference master data from a TOML file
    Seed {
        /// Master data file
        file: PathBuf,

        /// Database path (overrides config)
        #[arg(long)]
        db: Option<String>,
    },

    /// Run the HTTP server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long)]
        port: Option<u16>,

        /// Database path (overrides config)
        #[arg(long)]
        db: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Init { db } => {
            override_db(&mut config, db)?;
            logging::init(&config.logging.filter);
            commands::init::execute(&config)?;
        }
        Commands::Seed { file, db } => {
            override_db(&mut config, db)?;
            logging::init(&config.logging.filter);
            commands::seed::execute(&config, &file)?;
        }
        Commands::Serve { host, port, db } => {
            override_db(&mut config, db)?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            config.validate()?;
            logging::init(&config.logging.filter);
            commands::serve::execute(&config)?;
        }
    }

    Ok(())
}

fn override_db(config: &mut AppConfig, db: Option<String>) -> Result<()> {
    if let Some(path) = db {
        config.database.path = path;
        config.validate()?;
    }
    Ok(())
}
