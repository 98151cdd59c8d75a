mod config_commands;
mod connector;
mod event;
mod event_log;
mod run_commands;

use std::path::PathBuf;

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "kvnts", about = "kvnts: forward cluster events to chat channels")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery of ./kvnts.toml and ~/.config/kvnts/).
    #[arg(long, global = true, env = "KVNTS_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Forward events read as JSON lines (default when no subcommand is given).
    Run {
        /// Read events from this file instead of stdin.
        #[arg(long)]
        events: Option<PathBuf>,
    },
    /// Validate the configuration file and report errors/warnings.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr; stdout may be part of a pipeline.
    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    match cli.command.unwrap_or(Commands::Run { events: None }) {
        Commands::Check { verbose } => config_commands::handle_check(cli.config.as_deref(), verbose),
        Commands::Run { events } => {
            info!(version = env!("CARGO_PKG_VERSION"), "kvnts starting");

            let config = match cli.config {
                Some(ref path) => kvnts_config::load_config(path)
                    .with_context(|| format!("failed to load {}", path.display()))?,
                None => kvnts_config::discover_and_load(),
            };
            run_commands::handle_run(config, events).await
        },
    }
}
