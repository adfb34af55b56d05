use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_SERVER: &str = "punter.inf.ed.ac.uk";

/// How long one bot reply may take unless configured otherwise. Covers process
/// start-up as well as the bot's thinking time.
pub const DEFAULT_BOT_TIMEOUT_MS: u64 = 10_000;

/// A bot executable and its arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BotCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl BotCommand {
    /// Splits a command line on whitespace. There is no quoting.
    pub fn parse(line: &str) -> anyhow::Result<Self> {
        let mut parts = line.split_whitespace().map(String::from);
        let program = parts.next().context("Bot command is empty")?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl std::fmt::Display for BotCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Contents of the optional JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdapterConfig {
    /// Known bots by name, each mapped to a command line.
    #[serde(default)]
    pub bots: BTreeMap<String, String>,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub send_delay_ms: Option<u64>,
    #[serde(default)]
    pub bot_timeout_ms: Option<u64>,
    #[serde(default)]
    pub server_timeout_ms: Option<u64>,
}

impl AdapterConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file '{}'", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid config file '{}'", path.display()))
    }

    /// A name from the bot table, or else a command line.
    pub fn resolve_bot(&self, bot: &str) -> anyhow::Result<BotCommand> {
        match self.bots.get(bot) {
            Some(command) => BotCommand::parse(command)
                .with_context(|| format!("Bad command for bot '{}'", bot)),
            None => BotCommand::parse(bot),
        }
    }
}

/// Knobs for one session. By default sends are not throttled, bot replies
/// are bounded by [`DEFAULT_BOT_TIMEOUT_MS`] and the server may take as long
/// as it likes.
#[derive(Clone, Debug)]
pub struct SessionOptions {
    /// Minimum time between two sends to the server.
    pub send_delay: Duration,
    /// How long a single bot reply may take. `None` waits forever.
    pub bot_timeout: Option<Duration>,
    /// Read timeout on the server socket.
    pub server_timeout: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            send_delay: Duration::ZERO,
            bot_timeout: Some(Duration::from_millis(DEFAULT_BOT_TIMEOUT_MS)),
            server_timeout: None,
        }
    }
}

/// Everything needed to play one online game.
#[derive(Clone, Debug)]
pub struct GameConfig {
    pub server: String,
    pub port: u16,
    pub bot: BotCommand,
    /// Transcript location, if one should be written.
    pub record: Option<PathBuf>,
    /// Free text stored in the transcript's metadata line.
    pub header: Option<String>,
    pub options: SessionOptions,
}
