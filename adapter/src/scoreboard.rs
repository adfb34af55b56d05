use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use punter::{standing, Message, PunterId, ProtocolViolation};
use serde_json::value::RawValue;
use serde_json::Value;
use thiserror::Error;

/// Why a transcript could not be read.
#[derive(Debug, Error)]
pub enum ScoreboardError {
    #[error("could not read transcript")]
    Io(#[from] std::io::Error),
    #[error("line {line} is not a transcript record")]
    BadLine { line: usize },
    #[error("line {line} is not valid JSON")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("line {line} is not a protocol message")]
    Protocol {
        line: usize,
        #[source]
        source: ProtocolViolation,
    },
    #[error("no handshake naming the bot")]
    NoName,
    #[error("no setup assigning a punter id")]
    NoSetup,
    #[error("punter {0} is missing from the final scores")]
    NotScored(PunterId),
}

/// Where the recorded bot finished.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placement {
    pub rank: usize,
    pub total: usize,
    pub bot_name: String,
}

#[derive(Default)]
struct Scan {
    bot_name: Option<String>,
    punter: Option<PunterId>,
    last: Option<Message>,
}

/// Splits `">> {json}"` or `"<< {json}"`. Metadata lines give `None`.
fn parse_line(idx: usize, line: &str) -> Result<Option<Message>, ScoreboardError> {
    let line_no = idx + 1;
    let payload = match line.split_once(' ') {
        Some((">>" | "<<", payload)) => payload,
        _ => {
            let value: Value = serde_json::from_str(line)
                .map_err(|source| ScoreboardError::Json { line: line_no, source })?;
            return match value.get("metadata") {
                Some(_) => Ok(None),
                None => Err(ScoreboardError::BadLine { line: line_no }),
            };
        }
    };
    let payload: Box<RawValue> = serde_json::from_str(payload)
        .map_err(|source| ScoreboardError::Json { line: line_no, source })?;
    Message::from_raw(&payload)
        .map(Some)
        .map_err(|source| ScoreboardError::Protocol { line: line_no, source })
}

/// Recovers the recorded bot's final placement.
///
/// Returns `Ok(None)` when the transcript does not end in a stop message,
/// i.e. the game never finished.
pub fn extract<R: BufRead>(reader: R) -> Result<Option<Placement>, ScoreboardError> {
    let mut scan = Scan::default();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let Some(msg) = parse_line(idx, &line)? else {
            continue;
        };
        match &msg {
            Message::Handshake(hello) if scan.bot_name.is_none() => {
                scan.bot_name = Some(hello.me.clone());
            }
            Message::Setup(setup) if scan.punter.is_none() => scan.punter = Some(setup.punter),
            _ => {}
        }
        scan.last = Some(msg);
    }

    let bot_name = scan.bot_name.ok_or(ScoreboardError::NoName)?;
    let punter = scan.punter.ok_or(ScoreboardError::NoSetup)?;
    let Some(Message::Stop(stop)) = scan.last else {
        return Ok(None);
    };
    let placement = standing(punter, &stop.scores).ok_or(ScoreboardError::NotScored(punter))?;
    Ok(Some(Placement {
        rank: placement.rank,
        total: placement.total,
        bot_name,
    }))
}

pub fn extract_file(path: &Path) -> Result<Option<Placement>, ScoreboardError> {
    extract(BufReader::new(File::open(path)?))
}

/// Every regular file in `dir`, sorted by path, with its extraction result.
pub fn scan_directory(
    dir: &Path,
) -> std::io::Result<Vec<(PathBuf, Result<Option<Placement>, ScoreboardError>)>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            paths.push(entry.path());
        }
    }
    paths.sort();
    Ok(paths
        .into_iter()
        .map(|path| {
            let result = extract_file(&path);
            (path, result)
        })
        .collect())
}
