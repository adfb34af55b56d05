use std::path::PathBuf;

use adapter::{initialize_logging, scan_directory};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::filter::LevelFilter;

/// Prints where the recorded bot finished, for every transcript in a directory.
#[derive(Parser)]
struct Args {
    /// Directory of transcripts
    dir: PathBuf,

    /// Only report games played by the bot with this name
    #[arg(long)]
    filter_bot: Option<String>,

    /// A log level among "off", "error", "warn", "info", "debug", "trace"
    #[arg(short, long, default_value = "warn")]
    log_level: LevelFilter,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    initialize_logging(args.log_level);

    let mut reported = 0;
    let mut skipped = 0;
    for (path, result) in scan_directory(&args.dir)? {
        match result {
            Ok(Some(placement)) => {
                if let Some(name) = &args.filter_bot {
                    if &placement.bot_name != name {
                        continue;
                    }
                }
                println!(
                    "{}/{}\t{}\t{}",
                    placement.rank,
                    placement.total,
                    placement.bot_name,
                    path.display()
                );
                reported += 1;
            }
            Ok(None) => {
                debug!(path = %path.display(), "Game did not finish");
                skipped += 1;
            }
            Err(err) => {
                debug!(path = %path.display(), %err, "Could not parse transcript");
                skipped += 1;
            }
        }
    }
    info!(reported, skipped, "Done");
    Ok(())
}
