use std::io::{self, BufReader};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use punter::{read_message, write_message, Message};
use tracing::{debug, trace, warn};

use crate::config::BotCommand;
use crate::error::{Peer, SessionError};

/// One running bot, good for exactly one exchange.
pub trait BotLink {
    fn write(&mut self, msg: &Message) -> Result<(), SessionError>;
    fn read(&mut self) -> Result<Message, SessionError>;
    /// Terminates the bot. Calling it again is a no-op.
    fn kill(&mut self) -> Result<(), SessionError>;
}

/// Starts a fresh bot whenever the session needs one.
pub trait BotLauncher {
    type Link: BotLink;

    fn launch(&mut self) -> Result<Self::Link, SessionError>;
}

/// A bot child process talking frames over its stdin/stdout.
///
/// Stderr is inherited, so whatever the bot logs shows up next to our own logs.
pub struct BotProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    // Taken while a reader thread owns it; gone for good if that read timed out.
    stdout: Option<BufReader<ChildStdout>>,
    read_timeout: Option<Duration>,
    reaped: bool,
}

fn pipe_gone(what: &str) -> SessionError {
    SessionError::ProcessIo(io::Error::new(io::ErrorKind::BrokenPipe, format!("bot {} is closed", what)))
}

impl BotProcess {
    pub fn spawn(command: &BotCommand, read_timeout: Option<Duration>) -> Result<Self, SessionError> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| SessionError::Spawn {
                command: command.to_string(),
                source,
            })?;
        debug!(pid = child.id(), %command, "Spawned bot");

        Ok(Self {
            stdin: child.stdin.take(),
            stdout: child.stdout.take().map(BufReader::new),
            child,
            read_timeout,
            reaped: false,
        })
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    fn read_with_deadline(&mut self, timeout: Duration) -> Result<Message, SessionError> {
        let mut stdout = self.stdout.take().ok_or_else(|| pipe_gone("stdout"))?;
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let result = read_message(&mut stdout);
            // The receiver is gone if we already gave up on this read.
            let _ = tx.send((result, stdout));
        });

        match rx.recv_timeout(timeout) {
            Ok((result, stdout)) => {
                self.stdout = Some(stdout);
                result.map_err(|err| SessionError::decode(Peer::Bot, err))
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(pid = self.id(), ?timeout, "Bot did not answer in time");
                // Killing the bot closes the pipe, which ends the reader thread.
                self.kill()?;
                Err(SessionError::BotTimedOut(timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(pipe_gone("reader")),
        }
    }
}

impl BotLink for BotProcess {
    fn write(&mut self, msg: &Message) -> Result<(), SessionError> {
        let stdin = self.stdin.as_mut().ok_or_else(|| pipe_gone("stdin"))?;
        write_message(stdin, msg).map_err(SessionError::ProcessIo)?;
        debug!(pid = self.child.id(), kind = msg.kind(), "Wrote to bot");
        Ok(())
    }

    fn read(&mut self) -> Result<Message, SessionError> {
        let msg = match self.read_timeout {
            Some(timeout) => self.read_with_deadline(timeout)?,
            None => {
                let stdout = self.stdout.as_mut().ok_or_else(|| pipe_gone("stdout"))?;
                read_message(stdout).map_err(|err| SessionError::decode(Peer::Bot, err))?
            }
        };
        debug!(pid = self.child.id(), kind = msg.kind(), "Read from bot");
        Ok(msg)
    }

    fn kill(&mut self) -> Result<(), SessionError> {
        if self.reaped {
            return Ok(());
        }
        // Closing stdin first lets well-behaved bots see EOF.
        self.stdin.take();
        match self.child.try_wait().map_err(SessionError::ProcessIo)? {
            Some(status) => trace!(pid = self.child.id(), %status, "Bot had already exited"),
            None => {
                self.child.kill().map_err(SessionError::ProcessIo)?;
                let status = self.child.wait().map_err(SessionError::ProcessIo)?;
                trace!(pid = self.child.id(), %status, "Killed bot");
            }
        }
        self.reaped = true;
        Ok(())
    }
}

impl Drop for BotProcess {
    fn drop(&mut self) {
        if let Err(err) = self.kill() {
            warn!(pid = self.child.id(), %err, "Could not reap bot process");
        }
    }
}

/// Launches [`BotProcess`]es from a fixed command line.
pub struct ProcessLauncher {
    command: BotCommand,
    read_timeout: Option<Duration>,
}

impl ProcessLauncher {
    pub fn new(command: BotCommand, read_timeout: Option<Duration>) -> Self {
        Self {
            command,
            read_timeout,
        }
    }
}

impl BotLauncher for ProcessLauncher {
    type Link = BotProcess;

    fn launch(&mut self) -> Result<BotProcess, SessionError> {
        BotProcess::spawn(&self.command, self.read_timeout)
    }
}
