use quickcheck::{Arbitrary, Gen};
use serde_json::{Map, Value};

use crate::{
    Claim, GameMap, Handshake, HandshakeReply, Message, Move, OpaqueState, Pass,
    PlayerMove, Ready, River, ScoreEntry, Setup, Site, Splurge, Stop, Timeout, Turn,
};

// Floats are drawn from small integers so they survive a trip through JSON text.
fn coordinate(g: &mut Gen) -> Option<f64> {
    Option::<i16>::arbitrary(g).map(f64::from)
}

fn json_value(g: &mut Gen, depth: usize) -> Value {
    let choices = if depth == 0 { 4 } else { 6 };
    match u8::arbitrary(g) % choices {
        0 => Value::Null,
        1 => Value::Bool(bool::arbitrary(g)),
        2 => Value::from(i64::arbitrary(g)),
        3 => Value::String(String::arbitrary(g)),
        4 => {
            let len = usize::arbitrary(g) % 4;
            Value::Array((0..len).map(|_| json_value(g, depth - 1)).collect())
        }
        _ => {
            let len = usize::arbitrary(g) % 4;
            let mut object = Map::new();
            for _ in 0..len {
                object.insert(String::arbitrary(g), json_value(g, depth - 1));
            }
            Value::Object(object)
        }
    }
}

impl Arbitrary for OpaqueState {
    fn arbitrary(g: &mut Gen) -> Self {
        OpaqueState::from_value(&json_value(g, 3)).unwrap()
    }
}

impl Arbitrary for ScoreEntry {
    fn arbitrary(g: &mut Gen) -> Self {
        ScoreEntry {
            punter: u64::arbitrary(g),
            score: i64::arbitrary(g),
        }
    }
}

impl Arbitrary for Claim {
    fn arbitrary(g: &mut Gen) -> Self {
        Claim {
            punter: u64::arbitrary(g),
            source: u64::arbitrary(g),
            target: u64::arbitrary(g),
        }
    }
}

impl Arbitrary for PlayerMove {
    fn arbitrary(g: &mut Gen) -> Self {
        match u8::arbitrary(g) % 4 {
            0 => PlayerMove::Claim(Claim::arbitrary(g)),
            1 => PlayerMove::Pass(Pass {
                punter: u64::arbitrary(g),
            }),
            2 => PlayerMove::Splurge(Splurge {
                punter: u64::arbitrary(g),
                route: Vec::arbitrary(g),
            }),
            _ => PlayerMove::Option(Claim::arbitrary(g)),
        }
    }
}

impl Arbitrary for GameMap {
    fn arbitrary(g: &mut Gen) -> Self {
        let sites = Vec::<u64>::arbitrary(g)
            .into_iter()
            .map(|id| Site {
                id,
                x: coordinate(g),
                y: coordinate(g),
            })
            .collect();
        let rivers = Vec::<(u64, u64)>::arbitrary(g)
            .into_iter()
            .map(|(source, target)| River { source, target })
            .collect();
        GameMap {
            sites,
            rivers,
            mines: Vec::arbitrary(g),
        }
    }
}

impl Arbitrary for Message {
    fn arbitrary(g: &mut Gen) -> Self {
        match u8::arbitrary(g) % 8 {
            0 => Message::Handshake(Handshake::new(String::arbitrary(g))),
            1 => Message::HandshakeReply(HandshakeReply::new(String::arbitrary(g))),
            2 => Message::Setup(Setup {
                punter: u64::arbitrary(g),
                punters: u64::arbitrary(g),
                map: GameMap::arbitrary(g),
                extra: Map::new(),
            }),
            3 => Message::Ready(Ready {
                ready: u64::arbitrary(g),
                state: Option::arbitrary(g),
                extra: Map::new(),
            }),
            4 => Message::Turn(Turn {
                state: Option::arbitrary(g),
                ..Turn::new(Vec::arbitrary(g))
            }),
            5 => Message::Move(Move {
                action: PlayerMove::arbitrary(g),
                state: Option::arbitrary(g),
            }),
            6 => Message::Stop(Stop {
                moves: Vec::arbitrary(g),
                scores: Vec::arbitrary(g),
                extra: Map::new(),
            }),
            _ => Message::Timeout(Timeout {
                timeout: f64::from(u16::arbitrary(g)),
            }),
        }
    }
}
