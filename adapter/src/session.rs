use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use punter::{
    ranked, standing, HandshakeReply, Message, OpaqueState, PunterId, ScoreEntry, Standing, Stop,
    Turn,
};
use tracing::{debug, error, info, trace, warn};

use crate::bridge::{BotLauncher, BotLink, ProcessLauncher};
use crate::config::GameConfig;
use crate::error::{Peer, SessionError};
use crate::server::{ServerConnection, ServerLink};
use crate::transcript::{Direction, Transcript};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Connecting,
    Handshaking,
    AwaitingSetup,
    Ready,
    Playing,
    Terminated,
}

/// Asks a running session to stop. Honoured between turns only; a turn that
/// has started always runs to completion or failure.
#[derive(Clone, Debug, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a finished game went for us.
#[derive(Clone, Debug, PartialEq)]
pub struct GameOutcome {
    pub punter: PunterId,
    /// Best first. Equal scores stay in the order the server sent them.
    pub ranking: Vec<ScoreEntry>,
    /// `None` if the server left us out of the final scores.
    pub standing: Option<Standing>,
    pub turns_played: usize,
    pub timeouts: usize,
}

/// Relays one game between the server and a bot that is restarted every turn.
///
/// The bot never learns it was restarted: each new process gets the server's
/// first handshake reply, and the state the previous process returned.
pub struct Session<S, L> {
    server: S,
    launcher: L,
    transcript: Transcript,
    shutdown: ShutdownSignal,
    phase: Phase,
    punter: Option<PunterId>,
    // Owned here between turns; moved into exactly one turn message at a time.
    state: Option<OpaqueState>,
    turns_played: usize,
    timeouts: usize,
}

impl<S: ServerLink, L: BotLauncher> Session<S, L> {
    pub fn new(server: S, launcher: L, transcript: Transcript) -> Self {
        Self {
            server,
            launcher,
            transcript,
            shutdown: ShutdownSignal::default(),
            phase: Phase::Connecting,
            punter: None,
            state: None,
            turns_played: 0,
            timeouts: 0,
        }
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Known once the setup has arrived.
    pub fn punter(&self) -> Option<PunterId> {
        self.punter
    }

    /// Plays the game to its end. Any error is fatal; the server connection
    /// and every bot process are released before this returns either way.
    pub fn run(mut self) -> Result<GameOutcome, SessionError> {
        let result = self.play();
        if let Err(err) = &result {
            let mut cause = err as &dyn std::error::Error;
            while let Some(source) = cause.source() {
                debug!("caused by: {}", source);
                cause = source;
            }
            error!(phase = ?self.phase, %err, root_cause = %cause, "Session failed");
        }
        self.server.disconnect();
        result
    }

    fn play(&mut self) -> Result<GameOutcome, SessionError> {
        self.server.connect()?;

        self.phase = Phase::Handshaking;
        let (handshake, punter) = self.with_bot(|session, bot| {
            let handshake = session.handshake(bot)?;
            session.phase = Phase::AwaitingSetup;
            let punter = session.setup(bot)?;
            Ok((handshake, punter))
        })?;
        self.phase = Phase::Ready;

        loop {
            if self.shutdown.is_requested() {
                info!(turns = self.turns_played, "Stopping between turns");
                return Err(SessionError::Cancelled);
            }
            match self.receive()? {
                Message::Stop(stop) => {
                    self.phase = Phase::Terminated;
                    return Ok(self.finish(punter, stop));
                }
                Message::Timeout(timeout) => {
                    self.timeouts += 1;
                    warn!(seconds = timeout.timeout, "Server reports a missed turn");
                }
                Message::Turn(turn) => {
                    self.phase = Phase::Playing;
                    self.with_bot(|session, bot| session.play_turn(bot, &handshake, turn))?;
                }
                other => return Err(SessionError::unexpected(Peer::Server, "turn", other.kind())),
            }
        }
    }

    /// Runs `exchange` against a freshly launched bot, then kills the bot no
    /// matter how the exchange went.
    fn with_bot<T>(
        &mut self,
        exchange: impl FnOnce(&mut Self, &mut L::Link) -> Result<T, SessionError>,
    ) -> Result<T, SessionError> {
        let mut bot = self.launcher.launch()?;
        let result = exchange(self, &mut bot);
        match (result, bot.kill()) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) | (Err(err), Ok(())) => Err(err),
            (Err(err), Err(kill_err)) => {
                warn!(%kill_err, "Could not kill bot after a failed exchange");
                Err(err)
            }
        }
    }

    fn send(&mut self, msg: &Message) -> Result<(), SessionError> {
        self.server.send(msg)?;
        self.transcript.record(Direction::Outbound, msg);
        debug!(kind = msg.kind(), "Sent to server");
        Ok(())
    }

    fn receive(&mut self) -> Result<Message, SessionError> {
        let msg = self.server.receive()?;
        self.transcript.record(Direction::Inbound, &msg);
        debug!(kind = msg.kind(), "Received from server");
        Ok(msg)
    }

    fn handshake(&mut self, bot: &mut L::Link) -> Result<HandshakeReply, SessionError> {
        let hello = match bot.read()? {
            Message::Handshake(hello) => hello,
            other => return Err(SessionError::unexpected(Peer::Bot, "handshake", other.kind())),
        };
        info!(name = %hello.me, "Bot introduced itself");
        self.send(&Message::Handshake(hello))?;

        let reply = match self.receive()? {
            Message::HandshakeReply(reply) => reply,
            other => {
                return Err(SessionError::unexpected(
                    Peer::Server,
                    "handshake reply",
                    other.kind(),
                ))
            }
        };
        bot.write(&Message::HandshakeReply(reply.clone()))?;
        Ok(reply)
    }

    fn setup(&mut self, bot: &mut L::Link) -> Result<PunterId, SessionError> {
        let setup = match self.receive()? {
            Message::Setup(setup) => setup,
            other => return Err(SessionError::unexpected(Peer::Server, "setup", other.kind())),
        };
        let punter = setup.punter;
        self.punter = Some(punter);
        info!(
            punter,
            punters = setup.punters,
            sites = setup.map.sites.len(),
            rivers = setup.map.rivers.len(),
            mines = setup.map.mines.len(),
            "Game set up"
        );
        bot.write(&Message::Setup(setup))?;

        let mut ready = match bot.read()? {
            Message::Ready(ready) => ready,
            other => return Err(SessionError::unexpected(Peer::Bot, "ready", other.kind())),
        };
        if ready.ready != punter {
            warn!(punter, ready = ready.ready, "Bot acknowledged a different punter id");
        }
        self.state = Some(ready.state.take().ok_or(SessionError::MissingState { kind: "ready" })?);
        self.send(&Message::Ready(ready))?;
        Ok(punter)
    }

    fn play_turn(
        &mut self,
        bot: &mut L::Link,
        handshake: &HandshakeReply,
        mut turn: Turn,
    ) -> Result<(), SessionError> {
        // The fresh process announces itself again; the server already knows it.
        match bot.read()? {
            Message::Handshake(_) => {}
            other => return Err(SessionError::unexpected(Peer::Bot, "handshake", other.kind())),
        }
        bot.write(&Message::HandshakeReply(handshake.clone()))?;

        turn.state = self.state.take();
        trace!(moves = turn.moves.moves.len(), "Handing turn to bot");
        bot.write(&Message::Turn(turn))?;

        let mut mv = match bot.read()? {
            Message::Move(mv) => mv,
            other => return Err(SessionError::unexpected(Peer::Bot, "move", other.kind())),
        };
        self.state = Some(mv.state.take().ok_or(SessionError::MissingState { kind: "move" })?);
        self.turns_played += 1;
        self.send(&Message::Move(mv))
    }

    fn finish(&self, punter: PunterId, stop: Stop) -> GameOutcome {
        let standing = standing(punter, &stop.scores);
        match standing {
            Some(Standing { rank, total }) => info!(punter, rank, total, "Game over"),
            None => warn!(punter, "Game over, but the server sent no score for us"),
        }
        GameOutcome {
            punter,
            ranking: ranked(&stop.scores),
            standing,
            turns_played: self.turns_played,
            timeouts: self.timeouts,
        }
    }
}

/// Connects to the configured server and plays one full game, starting
/// `config.bot` anew for every turn.
pub fn play_online(config: &GameConfig, shutdown: ShutdownSignal) -> Result<GameOutcome, SessionError> {
    let server = ServerConnection::new(format!("{}:{}", config.server, config.port))
        .with_send_delay(config.options.send_delay)
        .with_read_timeout(config.options.server_timeout);
    let launcher = ProcessLauncher::new(config.bot.clone(), config.options.bot_timeout);
    let transcript = match &config.record {
        Some(path) => Transcript::create(path, &config.server, config.port, config.header.as_deref()),
        None => Transcript::disabled(),
    };
    info!(server = %server.address(), bot = %config.bot, "Starting session");
    Session::new(server, launcher, transcript)
        .with_shutdown(shutdown)
        .run()
}
