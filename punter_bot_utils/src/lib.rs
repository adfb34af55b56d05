use std::io::{BufRead, Write};

use anyhow::{bail, Context};
use punter::{
    read_message, write_message, Handshake, Message, Move, OpaqueState, PlayerMove, Ready, Setup,
};

/// A trait to simplify writing bots that run once per turn.
///
/// Everything a bot needs to remember between turns has to go into the
/// [`OpaqueState`] it returns; the next invocation is a fresh process.
pub trait Bot {
    fn name(&self) -> &str;

    /// Answers the setup. The returned state comes back with the first turn.
    fn setup(&mut self, setup: &Setup) -> anyhow::Result<OpaqueState>;

    fn play(
        &mut self,
        moves: &[PlayerMove],
        state: OpaqueState,
    ) -> anyhow::Result<(PlayerMove, OpaqueState)>;

    /// Runs one invocation over stdin/stdout.
    /// Stderr can be used for logging.
    fn run(&mut self) -> anyhow::Result<()>
    where
        Self: Sized,
    {
        let mut stdin = std::io::stdin().lock();
        let mut stdout = std::io::stdout().lock();
        self.run_once(&mut stdin, &mut stdout)
    }

    /// Announces itself, reads the acknowledgement, then answers exactly one
    /// setup or turn.
    fn run_once<R: BufRead, W: Write>(&mut self, input: &mut R, output: &mut W) -> anyhow::Result<()>
    where
        Self: Sized,
    {
        let hello = Message::Handshake(Handshake::new(self.name()));
        write_message(output, &hello)?;
        match read_message(input).context("Reading handshake reply")? {
            Message::HandshakeReply(_) => {}
            other => bail!("Expected a handshake reply, got {}", other.kind()),
        }

        let reply = match read_message(input).context("Reading request")? {
            Message::Setup(setup) => Message::Ready(Ready {
                ready: setup.punter,
                state: Some(self.setup(&setup)?),
                extra: Default::default(),
            }),
            Message::Turn(turn) => {
                let state = turn.state.context("Turn arrived without state")?;
                let (action, state) = self.play(&turn.moves.moves, state)?;
                Message::Move(Move {
                    action,
                    state: Some(state),
                })
            }
            // Nothing to answer.
            Message::Stop(_) | Message::Timeout(_) => return Ok(()),
            other => bail!("Unexpected {} message", other.kind()),
        };
        write_message(output, &reply)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use punter::{encode, HandshakeReply, Pass, Turn};
    use serde_json::json;

    use super::*;

    struct Counter;

    impl Bot for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn setup(&mut self, setup: &Setup) -> anyhow::Result<OpaqueState> {
            Ok(OpaqueState::from_value(&json!({"punter": setup.punter, "turns": 0}))?)
        }

        fn play(
            &mut self,
            _moves: &[PlayerMove],
            state: OpaqueState,
        ) -> anyhow::Result<(PlayerMove, OpaqueState)> {
            let value = state.to_value()?;
            let punter = value["punter"].as_u64().unwrap_or_default();
            let turns = value["turns"].as_u64().unwrap_or_default() + 1;
            Ok((
                PlayerMove::Pass(Pass { punter }),
                OpaqueState::from_value(&json!({"punter": punter, "turns": turns}))?,
            ))
        }
    }

    fn frames(messages: &[Message]) -> Vec<u8> {
        messages.iter().flat_map(|msg| encode(msg).unwrap()).collect()
    }

    #[test]
    fn answers_a_turn_with_carried_state() {
        let reply = Message::HandshakeReply(HandshakeReply::new("counter"));
        let turn = Message::Turn(Turn {
            state: Some(OpaqueState::from_value(&json!({"punter": 2, "turns": 4})).unwrap()),
            ..Turn::new(vec![])
        });
        let mut input = Cursor::new(frames(&[reply, turn]));
        let mut output = Vec::new();
        Counter.run_once(&mut input, &mut output).unwrap();

        let mut output = Cursor::new(output);
        assert_eq!(read_message(&mut output).unwrap().kind(), "handshake");
        let Message::Move(mv) = read_message(&mut output).unwrap() else {
            panic!("expected a move");
        };
        assert_eq!(mv.action, PlayerMove::Pass(Pass { punter: 2 }));
        assert_eq!(mv.state.unwrap().to_value().unwrap(), json!({"punter": 2, "turns": 5}));
    }

    #[test]
    fn rejects_missing_reply() {
        let mut input = Cursor::new(Vec::new());
        assert!(Counter.run_once(&mut input, &mut Vec::new()).is_err());
    }
}
