use anyhow::Context;
use punter::{OpaqueState, Pass, PlayerMove, Setup};
use punter_bot_utils::Bot;
use serde_json::json;

/// Always passes. Remembers its punter id and how many turns it has seen,
/// which makes it handy for checking that state survives between runs.
struct PassBot;

fn main() -> anyhow::Result<()> {
    PassBot.run()
}

impl Bot for PassBot {
    fn name(&self) -> &str {
        "pass_bot"
    }

    fn setup(&mut self, setup: &Setup) -> anyhow::Result<OpaqueState> {
        Ok(OpaqueState::from_value(&json!({"punter": setup.punter, "turns": 0}))?)
    }

    fn play(
        &mut self,
        _moves: &[PlayerMove],
        state: OpaqueState,
    ) -> anyhow::Result<(PlayerMove, OpaqueState)> {
        let state = state.to_value()?;
        let punter = state["punter"].as_u64().context("State lost the punter id")?;
        let turns = state["turns"].as_u64().context("State lost the turn count")?;
        eprintln!("pass_bot: punter {} passing on turn {}", punter, turns + 1);
        Ok((
            PlayerMove::Pass(Pass { punter }),
            OpaqueState::from_value(&json!({"punter": punter, "turns": turns + 1}))?,
        ))
    }
}
