//! Snapwatch CLI - snapwatch command

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use sw_core::BackendKind;

mod cmd;
mod config;
mod daemon;
mod locks;
mod logging;
mod util;

use config::Config;

/// Snapwatch - snapshots a directory whenever it changes
#[derive(Parser)]
#[command(name = "snapwatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Config file (default: search ./snapwatch.toml, user config dir, /etc/snapwatch)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level or filter directive (overrides RUST_LOG and config)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Directory to watch
    #[arg(long, global = true)]
    watch_dir: Option<PathBuf>,

    /// Directory holding snapshots
    #[arg(long, global = true)]
    snapshot_dir: Option<PathBuf>,

    /// Keep at most this many snapshots (count retention)
    #[arg(long, global = true)]
    max_snapshots: Option<usize>,

    /// Snapshot backend: btrfs or copy
    #[arg(long, global = true)]
    backend: Option<BackendKind>,
}

impl GlobalArgs {
    /// Command-line flags override file and environment
    fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.watch_dir {
            config.watch_dir = dir.clone();
        }
        if let Some(dir) = &self.snapshot_dir {
            config.snapshot_dir = dir.clone();
        }
        if let Some(max) = self.max_snapshots {
            config.retention.max_snapshots = max;
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the watch daemon
    Start {
        /// Run in foreground (for debugging and service managers)
        #[arg(long)]
        foreground: bool,
    },
    /// Stop the daemon
    Stop,
    /// Show daemon and snapshot status
    Status,
    /// Create a snapshot immediately
    Snapshot {
        /// Reason recorded in the log
        #[arg(long, default_value = "manual")]
        reason: String,
    },
    /// List snapshots, oldest first
    List {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
    /// Show aggregate snapshot information
    Info {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
    /// Show disk, snapshot and daemon statistics
    Stats {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
    /// List the top-level contents of the watch directory
    Files {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the last lines of the daemon log file
    Logs {
        /// Number of lines
        #[arg(short = 'n', long, default_value_t = 20)]
        lines: usize,
    },
    /// Apply the retention policy now
    Cleanup,
    /// Delete a snapshot by name
    Delete {
        /// Snapshot name
        name: String,
    },
    /// View and edit configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Print one value
    Get {
        /// Key, e.g. retention.mode
        key: String,
    },
    /// Set one value and save
    Set {
        key: String,
        value: String,
    },
    /// Write an example configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Show which config file is used
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let explicit = cli.global.config.as_deref();

    // Config commands must work on a broken or missing config
    if let Commands::Config(config_cmd) = &cli.command {
        return match config_cmd {
            ConfigCommands::Show => cmd::config::run_show(explicit).await,
            ConfigCommands::Get { key } => cmd::config::run_get(explicit, key).await,
            ConfigCommands::Set { key, value } => cmd::config::run_set(explicit, key, value).await,
            ConfigCommands::Init { force } => cmd::config::run_init(explicit, *force).await,
            ConfigCommands::Path => cmd::config::run_path(explicit).await,
        };
    }

    let (mut config, _source) = Config::load(explicit)?;
    config.apply_env()?;
    cli.global.apply(&mut config);
    config.validate()?;

    // Only the daemon writes to the log file
    let daemon = matches!(cli.command, Commands::Start { foreground: true });
    let log_file = if daemon { config.log_file.as_deref() } else { None };
    let _guard = logging::init(cli.global.log_level.as_deref(), &config.log_level, log_file)?;

    match cli.command {
        Commands::Start { foreground } => cmd::start::run(&config, foreground).await,
        Commands::Stop => cmd::stop::run(&config).await,
        Commands::Status => cmd::status::run(&config).await,
        Commands::Snapshot { reason } => cmd::snapshot::run(&config, &reason).await,
        Commands::List { json } => cmd::list::run(&config, json).await,
        Commands::Info { json } => cmd::info::run(&config, json).await,
        Commands::Stats { json } => cmd::stats::run(&config, json).await,
        Commands::Files { json } => cmd::files::run(&config, json).await,
        Commands::Logs { lines } => cmd::logs::run(&config, lines).await,
        Commands::Cleanup => cmd::cleanup::run(&config).await,
        Commands::Delete { name } => cmd::delete::run(&config, &name).await,
        Commands::Config(_) => Ok(()),
    }
}
