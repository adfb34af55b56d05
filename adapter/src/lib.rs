mod bridge;
mod config;
mod error;
mod scoreboard;
mod server;
mod session;
mod transcript;
pub use bridge::*;
pub use config::*;
pub use error::*;
pub use scoreboard::*;
pub use server::*;
pub use session::*;
pub use transcript::*;

use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Logs go to stderr so stdout stays free for results, or for the protocol
/// in the case of a bot.
pub fn initialize_logging(level: LevelFilter) {
    let format = tracing_subscriber::fmt::format()
        .with_target(false)
        .compact();

    let filter = Targets::new().with_default(level);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(format)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}
