use clap::{Parser, Subcommand};
use colored::Colorize;
use ridedesk_core::{CliErrorDisplay, LoggingConfig, RidedeskConfig, RidedeskError};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

use commands::{
    cmd_config, cmd_roster, cmd_stats, cmd_watch, handle_sessions_command, CliContext,
    SessionsCommand,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "ridedesk")]
#[command(version = VERSION)]
#[command(about = "Ridedesk - support chat console for riders and drivers")]
#[command(long_about = r#"
Ridedesk routes rider and driver support chats to human agents. Each session
is assigned to the first agent on the roster who serves that user type and
still has a free slot; everyone else waits in the queue.

State lives in a JSON snapshot file. Use '--snapshot' to point at a different
file, 'ridedesk sessions create' to open a chat and 'ridedesk watch' to follow
the queue live.
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(
        short,
        long,
        global = true,
        env = "RIDEDESK_SNAPSHOT_PATH",
        help = "Snapshot file to read and write"
    )]
    snapshot: Option<PathBuf>,

    #[arg(
        short,
        long,
        global = true,
        default_value = "text",
        help = "Output format (text, json)"
    )]
    format: String,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Show the agent roster and current load")]
    Roster,

    #[command(about = "Show queue and capacity statistics")]
    Stats,

    #[command(about = "Create, inspect and close support chat sessions")]
    Sessions {
        #[command(subcommand)]
        action: Option<SessionsCommand>,
    },

    #[command(about = "Follow session changes until Ctrl-C")]
    Watch {
        #[arg(short, long, help = "Refresh interval in milliseconds")]
        interval_ms: Option<u64>,

        #[arg(long, help = "Only watch sessions in this status")]
        status: Option<String>,
    },

    #[command(about = "Print the effective configuration")]
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = RidedeskConfig::load();
    let logging = loaded
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    init_logging(cli.verbose, &logging);

    let result = match loaded {
        Ok(config) => run(cli, config).await,
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<RidedeskError>() {
                Some(err) => eprintln!("{}: {}", "Error".red().bold(), CliErrorDisplay::new(err)),
                None => eprintln!("{}: {:#}", "Error".red().bold(), e),
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool, logging: &LoggingConfig) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&logging.level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let json = logging.json_format;

    tracing_subscriber::registry()
        .with(json.then(|| {
            fmt::layer()
                .json()
                .with_target(false)
                .with_writer(std::io::stderr)
        }))
        .with((!json).then(|| {
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
        }))
        .with(filter)
        .init();
}

async fn run(cli: Cli, mut config: RidedeskConfig) -> anyhow::Result<()> {
    if let Some(path) = cli.snapshot {
        config.storage.snapshot_path = path;
    }
    config.validate()?;

    let ctx = CliContext::new(config, cli.format);

    match cli.command {
        Commands::Roster => cmd_roster(&ctx).await,
        Commands::Stats => cmd_stats(&ctx).await,
        Commands::Sessions { action } => handle_sessions_command(&ctx, action).await,
        Commands::Watch {
            interval_ms,
            status,
        } => cmd_watch(&ctx, interval_ms, status.as_deref()).await,
        Commands::Config => cmd_config(&ctx),
    }
}
