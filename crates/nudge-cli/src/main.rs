mod cmd;
mod context;
mod output;

use clap::{Parser, Subcommand};
use cmd::{channels::ChannelsSubcommand, db::DbSubcommand};
use context::Context;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "nudge",
    about = "Deadline reminder engine: sweep stale reminders, pick the due ones, notify students",
    version,
    propagate_version = true
)]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, env = "NUDGE_DB", default_value = "nudge.db")]
    db: PathBuf,

    /// Engine policy YAML (tick interval, recency window, overdue grace, send timeout)
    #[arg(long, global = true, env = "NUDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP trigger endpoints and run the periodic ticker
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "3000")]
        port: u16,

        /// Only serve the endpoints; rely on an external scheduler to call them
        #[arg(long)]
        no_ticker: bool,

        /// Bearer token for POST /api/cron/reminders
        #[arg(long, env = "CRON_SECRET", hide_env_values = true)]
        cron_secret: Option<String>,
    },

    /// Run one reminder cycle now and print the report
    Trigger,

    /// List reminders that will fire soon
    Upcoming {
        /// Look-ahead window in minutes
        #[arg(long, default_value = "60")]
        minutes: u32,
    },

    /// Inspect and exercise notification channels
    Channels {
        #[command(subcommand)]
        subcommand: ChannelsSubcommand,
    },

    /// Manage the reminder database
    Db {
        #[command(subcommand)]
        subcommand: DbSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let ctx = Context::new(cli.db, cli.config, cli.json);

    let result = match cli.command {
        Commands::Serve {
            port,
            no_ticker,
            cron_secret,
        } => cmd::serve::run(&ctx, port, !no_ticker, cron_secret),
        Commands::Trigger => cmd::trigger::run(&ctx),
        Commands::Upcoming { minutes } => cmd::upcoming::run(&ctx, minutes),
        Commands::Channels { subcommand } => cmd::channels::run(&ctx, subcommand),
        Commands::Db { subcommand } => cmd::db::run(&ctx, subcommand),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
