use std::io::{BufReader, Write};
use std::net::{Shutdown, TcpStream};
use std::time::{Duration, Instant};

use punter::{encode, read_message, Message};
use tracing::{debug, info, trace};

use crate::error::{Peer, SessionError};

/// The session's view of the game server.
pub trait ServerLink {
    fn connect(&mut self) -> Result<(), SessionError>;
    fn send(&mut self, msg: &Message) -> Result<(), SessionError>;
    fn receive(&mut self) -> Result<Message, SessionError>;
    /// Safe to call more than once, and before `connect`.
    fn disconnect(&mut self);
}

struct Connected {
    writer: TcpStream,
    reader: BufReader<TcpStream>,
}

/// A TCP connection to the game server.
pub struct ServerConnection {
    address: String,
    send_delay: Duration,
    read_timeout: Option<Duration>,
    stream: Option<Connected>,
    last_send: Option<Instant>,
}

fn not_connected() -> SessionError {
    SessionError::Network(std::io::Error::new(
        std::io::ErrorKind::NotConnected,
        "not connected to the server",
    ))
}

impl ServerConnection {
    /// `address` is anything [`TcpStream::connect`] accepts, e.g. `host:port`.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            send_delay: Duration::ZERO,
            read_timeout: None,
            stream: None,
            last_send: None,
        }
    }

    /// Spaces out consecutive sends by at least `delay`.
    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = delay;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn throttle(&self) {
        if let Some(last) = self.last_send {
            let elapsed = last.elapsed();
            if elapsed < self.send_delay {
                std::thread::sleep(self.send_delay - elapsed);
            }
        }
    }
}

impl ServerLink for ServerConnection {
    fn connect(&mut self) -> Result<(), SessionError> {
        let stream = TcpStream::connect(&self.address).map_err(SessionError::Network)?;
        stream
            .set_read_timeout(self.read_timeout)
            .map_err(SessionError::Network)?;
        // Frames are small and strictly request/response.
        stream.set_nodelay(true).map_err(SessionError::Network)?;
        let reader = BufReader::new(stream.try_clone().map_err(SessionError::Network)?);
        info!(address = %self.address, "Connected to server");
        self.stream = Some(Connected {
            writer: stream,
            reader,
        });
        Ok(())
    }

    fn send(&mut self, msg: &Message) -> Result<(), SessionError> {
        self.throttle();
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        let bytes = encode(msg).map_err(|err| SessionError::Network(err.into()))?;
        stream.writer.write_all(&bytes).map_err(SessionError::Network)?;
        stream.writer.flush().map_err(SessionError::Network)?;
        self.last_send = Some(Instant::now());
        trace!(kind = msg.kind(), bytes = bytes.len(), "Sent to server");
        Ok(())
    }

    fn receive(&mut self) -> Result<Message, SessionError> {
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        let msg = read_message(&mut stream.reader)
            .map_err(|err| SessionError::decode(Peer::Server, err))?;
        trace!(kind = msg.kind(), "Received from server");
        Ok(msg)
    }

    fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            // The peer may already have closed its end.
            if let Err(err) = stream.writer.shutdown(Shutdown::Both) {
                debug!(%err, "Socket shutdown failed");
            }
            info!(address = %self.address, "Disconnected from server");
        }
    }
}

impl Drop for ServerConnection {
    fn drop(&mut self) {
        self.disconnect();
    }
}
