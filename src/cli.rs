//! Command-line interface for the Side-Stacker server.

use clap::{Parser, Subcommand};

/// Side-Stacker - connect-four-style game server over WebSockets
#[derive(Parser, Debug)]
#[command(name = "side_stacker")]
#[command(about = "Side-Stacker game server (PvP, PvE, AI-vs-AI)", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the game server
    Serve {
        /// Path to the server config file
        #[arg(short, long, default_value = "side_stacker.toml")]
        config: std::path::PathBuf,

        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Path to the database file (overrides config)
        #[arg(long)]
        db_path: Option<String>,
    },

    /// Apply pending database migrations and exit
    Migrate {
        /// Path to the server config file
        #[arg(short, long, default_value = "side_stacker.toml")]
        config: std::path::PathBuf,

        /// Path to the database file (overrides config)
        #[arg(long)]
        db_path: Option<String>,
    },
}
