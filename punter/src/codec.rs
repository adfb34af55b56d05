//! Length-prefixed framing: `<decimal length>:<json payload>`, with nothing
//! between one payload and the next prefix.
//!
//! No upper bound is placed on the declared length. The payload buffer grows
//! only as bytes actually arrive, but a peer can still make us hold as much as
//! it is willing to send.

use std::io::{self, BufRead, Read, Write};

use serde_json::value::RawValue;

use crate::{DecodeError, FramingError, Message};

/// `u64::MAX` has 20 digits; anything longer cannot be a length.
const MAX_PREFIX_DIGITS: usize = 20;

/// Prepends the length prefix to an already serialized payload.
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut bytes = format!("{}:", payload.len()).into_bytes();
    bytes.extend_from_slice(payload);
    bytes
}

pub fn encode(msg: &Message) -> Result<Vec<u8>, serde_json::Error> {
    Ok(frame(&serde_json::to_vec(msg)?))
}

/// Parses one payload, without its prefix.
pub fn decode(payload: &[u8]) -> Result<Message, DecodeError> {
    let payload: Box<RawValue> = serde_json::from_slice(payload).map_err(FramingError::Json)?;
    Ok(Message::from_raw(&payload)?)
}

pub fn write_message<W: Write>(writer: &mut W, msg: &Message) -> io::Result<()> {
    writer.write_all(&encode(msg)?)?;
    writer.flush()
}

pub fn read_message<R: BufRead>(reader: &mut R) -> Result<Message, DecodeError> {
    let payload = read_frame(reader)?;
    decode(&payload)
}

/// Reads one frame and returns its payload bytes.
///
/// Whitespace before the prefix is skipped, since some bots end every frame
/// with a newline.
pub fn read_frame<R: BufRead>(reader: &mut R) -> Result<Vec<u8>, FramingError> {
    let mut prefix = String::new();
    loop {
        let byte = match next_byte(reader)? {
            Some(byte) => byte,
            None if prefix.is_empty() => return Err(FramingError::Closed),
            None => return Err(FramingError::BadPrefix { prefix }),
        };
        match byte {
            b':' => break,
            b'0'..=b'9' if prefix.len() < MAX_PREFIX_DIGITS => prefix.push(byte as char),
            _ if byte.is_ascii_whitespace() && prefix.is_empty() => {}
            _ => {
                prefix.push(byte as char);
                return Err(FramingError::BadPrefix { prefix });
            }
        }
    }

    let expected: usize = match prefix.parse() {
        Ok(len) => len,
        Err(_) => return Err(FramingError::BadPrefix { prefix }),
    };
    let mut payload = Vec::new();
    let read = Read::take(&mut *reader, expected as u64).read_to_end(&mut payload)?;
    if read < expected {
        return Err(FramingError::Truncated { expected, read });
    }
    Ok(payload)
}

fn next_byte<R: BufRead>(reader: &mut R) -> io::Result<Option<u8>> {
    loop {
        let byte = match reader.fill_buf() {
            Ok(buf) => match buf.first() {
                Some(&byte) => byte,
                None => return Ok(None),
            },
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        reader.consume(1);
        return Ok(Some(byte));
    }
}
