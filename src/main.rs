use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;

mod commands;

/// altpub - Republish an AltStore source to an app-store developer API
#[derive(Parser)]
#[command(name = "altpub")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,
}

/// Arguments of the default upload run
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// API token (falls back to ALTPUB_TOKEN, then auth.token in the config)
    pub token: Option<String>,

    /// Only process the first N catalog entries
    pub limit: Option<usize>,

    /// Use this config file instead of ~/.altpub/config.toml
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override api.base_url
    #[arg(long)]
    pub base_url: Option<String>,

    /// Override catalog.url
    #[arg(long)]
    pub catalog_url: Option<String>,

    /// Override paths.ledger
    #[arg(long)]
    pub ledger: Option<String>,

    /// Override paths.work_dir
    #[arg(long)]
    pub work_dir: Option<String>,

    /// Override upload.chunk_size_mb
    #[arg(long)]
    pub chunk_size_mb: Option<u64>,

    /// Show what would be published without contacting the store API
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect or edit the record of uploaded bundle identifiers
    Ledger {
        /// Ledger file (defaults to paths.ledger from the config)
        #[arg(long)]
        file: Option<PathBuf>,

        #[command(subcommand)]
        action: LedgerAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum LedgerAction {
    /// List uploaded bundle identifiers
    List,

    /// Remove a bundle identifier so the next run publishes it again
    Forget {
        /// Bundle identifier (e.g., com.example.app)
        bundle_id: String,
    },

    /// Remove every bundle identifier
    Clear {
        /// Confirm clearing the ledger
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., upload.chunk_size_mb)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        None => commands::run::run(cli.run),
        Some(Commands::Ledger { file, action }) => commands::ledger::run(file, &action),
        Some(Commands::Config { action }) => commands::config::run(&action),
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "altpub", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
