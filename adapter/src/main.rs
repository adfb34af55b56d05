use std::path::PathBuf;
use std::time::Duration;

use adapter::{
    initialize_logging, play_online, AdapterConfig, GameConfig, SessionOptions, ShutdownSignal,
    DEFAULT_BOT_TIMEOUT_MS, DEFAULT_SERVER,
};
use clap::Parser;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;

/// Plays one online game with a bot that only knows the offline protocol.
#[derive(Parser)]
struct Args {
    /// Name of a bot from the config file, or the command line that starts the bot
    bot: String,

    /// Port of the game server
    port: u16,

    /// Game server to connect to [default: punter.inf.ed.ac.uk]
    #[arg(long)]
    server: Option<String>,

    /// Write a transcript of the game to this file
    #[arg(short, long)]
    record: Option<PathBuf>,

    /// Free text stored in the transcript's first line
    #[arg(long)]
    header: Option<String>,

    /// JSON file with known bots and default settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Minimum milliseconds between two messages to the server
    #[arg(long)]
    send_delay_ms: Option<u64>,

    /// Give up if the bot takes longer than this many milliseconds to answer [default: 10000]
    #[arg(long)]
    bot_timeout_ms: Option<u64>,

    /// Give up if the server is silent for this many milliseconds
    #[arg(long)]
    server_timeout_ms: Option<u64>,

    /// A log level among "off", "error", "warn", "info", "debug", "trace"
    #[arg(short, long, default_value = "info")]
    log_level: LevelFilter,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    initialize_logging(args.log_level);

    let file_config = match &args.config {
        Some(path) => AdapterConfig::load(path)?,
        None => AdapterConfig::default(),
    };

    let config = GameConfig {
        server: args
            .server
            .or(file_config.server.clone())
            .unwrap_or_else(|| String::from(DEFAULT_SERVER)),
        port: args.port,
        bot: file_config.resolve_bot(&args.bot)?,
        record: args.record,
        header: args.header,
        options: SessionOptions {
            send_delay: Duration::from_millis(
                args.send_delay_ms.or(file_config.send_delay_ms).unwrap_or(0),
            ),
            bot_timeout: Some(Duration::from_millis(
                args.bot_timeout_ms
                    .or(file_config.bot_timeout_ms)
                    .unwrap_or(DEFAULT_BOT_TIMEOUT_MS),
            )),
            server_timeout: args
                .server_timeout_ms
                .or(file_config.server_timeout_ms)
                .map(Duration::from_millis),
        },
    };

    let outcome = play_online(&config, ShutdownSignal::new())?;
    info!(
        turns = outcome.turns_played,
        timeouts = outcome.timeouts,
        "Game finished"
    );

    for entry in &outcome.ranking {
        let label = if entry.punter == outcome.punter {
            "me:    "
        } else {
            "punter:"
        };
        println!("{} {}, score: {}", label, entry.punter, entry.score);
    }
    Ok(())
}
