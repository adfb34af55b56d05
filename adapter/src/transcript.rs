use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use punter::Message;
use serde::Serialize;
use tracing::warn;

/// Which way a recorded frame travelled, seen from the adapter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Sent to the server.
    Outbound,
    /// Received from the server.
    Inbound,
}

impl Direction {
    pub fn marker(self) -> &'static str {
        match self {
            Direction::Outbound => ">>",
            Direction::Inbound => "<<",
        }
    }
}

/// The first line of every transcript.
#[derive(Serialize)]
struct Metadata<'a> {
    metadata: u8,
    server: &'a str,
    port: u16,
    started_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    extra: Option<&'a str>,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Append-only, line-oriented log of a session's server traffic.
///
/// Never fails the session: if the file cannot be created or written, the
/// transcript switches itself off and says so once.
pub struct Transcript {
    writer: Option<Box<dyn Write + Send>>,
}

impl Transcript {
    pub fn disabled() -> Self {
        Self { writer: None }
    }

    /// Creates the file, and any missing parent directories.
    pub fn create(path: &Path, server: &str, port: u16, header: Option<&str>) -> Self {
        let metadata = Metadata {
            metadata: 0,
            server,
            port,
            started_ms: now_ms(),
            extra: header,
        };
        match Self::open(path).and_then(|file| Self::start(file, &metadata)) {
            Ok(transcript) => transcript,
            Err(err) => {
                warn!(path = %path.display(), %err, "Could not create transcript, not recording this game");
                Self::disabled()
            }
        }
    }

    fn open(path: &Path) -> io::Result<BufWriter<File>> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        Ok(BufWriter::new(File::create(path)?))
    }

    /// Writes the metadata line, then records everything else into `writer`.
    fn start<W: Write + Send + 'static>(mut writer: W, metadata: &Metadata) -> io::Result<Self> {
        serde_json::to_writer(&mut writer, metadata)?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(Self {
            writer: Some(Box::new(writer)),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.writer.is_some()
    }

    /// Lines are flushed right away so the file can be tailed while the game runs.
    pub fn record(&mut self, direction: Direction, msg: &Message) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        let result = msg
            .to_json()
            .map_err(io::Error::from)
            .and_then(|json| writeln!(writer, "{} {}", direction.marker(), json))
            .and_then(|()| writer.flush());
        if let Err(err) = result {
            warn!(%err, "Could not write to transcript, not recording the rest of this game");
            self.writer = None;
        }
    }
}
