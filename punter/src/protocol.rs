use std::fmt;

use serde::de::{DeserializeOwned, Deserializer, Error as _, MapAccess, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::value::RawValue;
use serde_json::{Map, Value};

use crate::{ProtocolViolation, ScoreEntry};

pub type PunterId = u64;
pub type SiteId = u64;

/// Data a bot hands back to its next invocation.
///
/// Kept as the exact JSON text the bot produced and never parsed, so numbers
/// of any size, key order and spacing all survive the trip. Any JSON value is
/// allowed, including `null`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpaqueState(Box<RawValue>);

impl OpaqueState {
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        serde_json::value::to_raw_value(value).map(Self)
    }

    /// Parses the state. Only bots should need this.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(self.0.get())
    }

    pub fn as_json(&self) -> &str {
        self.0.get()
    }
}

impl PartialEq for OpaqueState {
    fn eq(&self, other: &Self) -> bool {
        self.as_json() == other.as_json()
    }
}

/// Identity announcement sent by a punter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Handshake {
    pub me: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Handshake {
    pub fn new(me: impl Into<String>) -> Self {
        Self {
            me: me.into(),
            extra: Map::new(),
        }
    }
}

/// The server's acknowledgement of a [`Handshake`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HandshakeReply {
    pub you: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HandshakeReply {
    pub fn new(you: impl Into<String>) -> Self {
        Self {
            you: you.into(),
            extra: Map::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: SiteId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct River {
    pub source: SiteId,
    pub target: SiteId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameMap {
    pub sites: Vec<Site>,
    pub rivers: Vec<River>,
    pub mines: Vec<SiteId>,
}

/// One-time game configuration from the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Setup {
    /// The id assigned to the receiving punter.
    pub punter: PunterId,
    /// How many punters take part.
    pub punters: u64,
    pub map: GameMap,
    /// Keys this crate does not model (`settings`, ...), forwarded as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// `state` is never deserialized by serde: `Message::from_raw` cuts it out of
// the payload text and attaches it afterwards.

/// A bot's acknowledgement of [`Setup`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ready {
    pub ready: PunterId,
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub state: Option<OpaqueState>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub punter: PunterId,
    pub source: SiteId,
    pub target: SiteId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pass {
    pub punter: PunterId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Splurge {
    pub punter: PunterId,
    pub route: Vec<SiteId>,
}

/// A single punter's action, as it appears on the wire: `{"claim": {...}}` etc.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerMove {
    Claim(Claim),
    Pass(Pass),
    Splurge(Splurge),
    Option(Claim),
}

impl PlayerMove {
    pub fn punter(&self) -> PunterId {
        match self {
            PlayerMove::Claim(claim) | PlayerMove::Option(claim) => claim.punter,
            PlayerMove::Pass(pass) => pass.punter,
            PlayerMove::Splurge(splurge) => splurge.punter,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveList {
    pub moves: Vec<PlayerMove>,
}

/// The server's report of everybody's last move.
///
/// The server never sends `state`; the adapter injects it before handing the
/// turn to a bot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    #[serde(rename = "move")]
    pub moves: MoveList,
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub state: Option<OpaqueState>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Turn {
    pub fn new(moves: Vec<PlayerMove>) -> Self {
        Self {
            moves: MoveList { moves },
            state: None,
            extra: Map::new(),
        }
    }
}

/// A bot's chosen action for one turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Move {
    #[serde(flatten)]
    pub action: PlayerMove,
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub state: Option<OpaqueState>,
}

/// End of the game. On the wire this is nested as `{"stop": {...}}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    #[serde(default)]
    pub moves: Vec<PlayerMove>,
    pub scores: Vec<ScoreEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Sent by the server when a punter missed its turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Timeout {
    pub timeout: f64,
}

/// Every message of the protocol, distinguished by which keys are present.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    Handshake(Handshake),
    HandshakeReply(HandshakeReply),
    Setup(Setup),
    Ready(Ready),
    Turn(Turn),
    Move(Move),
    Stop(Stop),
    Timeout(Timeout),
}

const MOVE_KEYS: [&str; 4] = ["claim", "pass", "splurge", "option"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Stop,
    Timeout,
    Turn,
    Ready,
    Move,
    Setup,
    HandshakeReply,
    Handshake,
}

impl Kind {
    /// Keys are checked in a fixed order, so e.g. a turn that also carries a
    /// `stop` key is a stop.
    fn detect(has: impl Fn(&str) -> bool) -> Option<Kind> {
        let kind = if has("stop") {
            Kind::Stop
        } else if has("timeout") {
            Kind::Timeout
        } else if has("move") {
            Kind::Turn
        } else if has("ready") {
            Kind::Ready
        } else if MOVE_KEYS.iter().any(|&key| has(key)) {
            Kind::Move
        } else if has("map") {
            Kind::Setup
        } else if has("you") {
            Kind::HandshakeReply
        } else if has("me") {
            Kind::Handshake
        } else {
            return None;
        };
        Some(kind)
    }

    fn name(self) -> &'static str {
        match self {
            Kind::Handshake => "handshake",
            Kind::HandshakeReply => "handshake reply",
            Kind::Setup => "setup",
            Kind::Ready => "ready",
            Kind::Turn => "turn",
            Kind::Move => "move",
            Kind::Stop => "stop",
            Kind::Timeout => "timeout",
        }
    }

    fn carries_state(self) -> bool {
        matches!(self, Kind::Ready | Kind::Turn | Kind::Move)
    }
}

/// A JSON object with its values left unparsed, in payload order.
struct RawObject(Vec<(String, Box<RawValue>)>);

impl<'de> Deserialize<'de> for RawObject {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ObjectVisitor;

        impl<'de> Visitor<'de> for ObjectVisitor {
            type Value = RawObject;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RawObject, A::Error> {
                let mut entries = Vec::new();
                while let Some(entry) = map.next_entry()? {
                    entries.push(entry);
                }
                Ok(RawObject(entries))
            }
        }

        deserializer.deserialize_map(ObjectVisitor)
    }
}

fn parse<T: DeserializeOwned>(kind: Kind, value: Value) -> Result<T, ProtocolViolation> {
    serde_json::from_value(value).map_err(|source| ProtocolViolation::Malformed {
        kind: kind.name(),
        source,
    })
}

impl Message {
    /// A short lowercase name, used in logs and errors.
    pub fn kind(&self) -> &'static str {
        let kind = match self {
            Message::Handshake(_) => Kind::Handshake,
            Message::HandshakeReply(_) => Kind::HandshakeReply,
            Message::Setup(_) => Kind::Setup,
            Message::Ready(_) => Kind::Ready,
            Message::Turn(_) => Kind::Turn,
            Message::Move(_) => Kind::Move,
            Message::Stop(_) => Kind::Stop,
            Message::Timeout(_) => Kind::Timeout,
        };
        kind.name()
    }

    /// Classifies a syntactically valid JSON payload.
    ///
    /// The `state` of a ready, turn or move message is cut out as raw text
    /// before anything else is parsed.
    pub fn from_raw(payload: &RawValue) -> Result<Self, ProtocolViolation> {
        let text = payload.get();
        let RawObject(entries) = serde_json::from_str(text)
            .map_err(|_| ProtocolViolation::NotAnObject(text.to_owned()))?;
        let kind = Kind::detect(|key| entries.iter().any(|(name, _)| name == key))
            .ok_or_else(|| ProtocolViolation::UnknownMessage(text.to_owned()))?;

        let mut state = None;
        let mut object = Map::new();
        for (key, value) in entries {
            if key == "state" && kind.carries_state() {
                state = Some(OpaqueState(value));
                continue;
            }
            let value = serde_json::from_str(value.get()).map_err(|source| {
                ProtocolViolation::Malformed {
                    kind: kind.name(),
                    source,
                }
            })?;
            object.insert(key, value);
        }

        let mut msg = match kind {
            Kind::Stop => {
                let stop = object.remove("stop").unwrap_or_default();
                Message::Stop(parse(kind, stop)?)
            }
            Kind::Timeout => Message::Timeout(parse(kind, Value::Object(object))?),
            Kind::Turn => Message::Turn(parse(kind, Value::Object(object))?),
            Kind::Ready => Message::Ready(parse(kind, Value::Object(object))?),
            Kind::Move => Message::Move(parse(kind, Value::Object(object))?),
            Kind::Setup => Message::Setup(parse(kind, Value::Object(object))?),
            Kind::HandshakeReply => Message::HandshakeReply(parse(kind, Value::Object(object))?),
            Kind::Handshake => Message::Handshake(parse(kind, Value::Object(object))?),
        };
        match &mut msg {
            Message::Ready(ready) => ready.state = state,
            Message::Turn(turn) => turn.state = state,
            Message::Move(mv) => mv.state = state,
            _ => {}
        }
        Ok(msg)
    }

    /// The payload as a JSON string, without framing.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Serialize)]
struct StopEnvelope<'a> {
    stop: &'a Stop,
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Message::Handshake(msg) => msg.serialize(serializer),
            Message::HandshakeReply(msg) => msg.serialize(serializer),
            Message::Setup(msg) => msg.serialize(serializer),
            Message::Ready(msg) => msg.serialize(serializer),
            Message::Turn(msg) => msg.serialize(serializer),
            Message::Move(msg) => msg.serialize(serializer),
            Message::Stop(stop) => StopEnvelope { stop }.serialize(serializer),
            Message::Timeout(msg) => msg.serialize(serializer),
        }
    }
}

/// Only works with `serde_json`, which is the one format that can hand out
/// raw JSON text.
impl<'de> Deserialize<'de> for Message {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let payload = Box::<RawValue>::deserialize(deserializer)?;
        Message::from_raw(&payload).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn from_json(text: &str) -> Result<Message, ProtocolViolation> {
        let payload = RawValue::from_string(text.to_owned()).unwrap();
        Message::from_raw(&payload)
    }

    fn classify(value: Value) -> Message {
        from_json(&value.to_string()).unwrap()
    }

    #[test]
    fn dispatch_by_keys() {
        assert_eq!(classify(json!({"me": "bob"})).kind(), "handshake");
        assert_eq!(classify(json!({"you": "bob"})).kind(), "handshake reply");
        assert_eq!(
            classify(json!({"punter": 1, "punters": 2, "map": {"sites": [], "rivers": [], "mines": []}}))
                .kind(),
            "setup"
        );
        assert_eq!(classify(json!({"ready": 1, "state": [1]})).kind(), "ready");
        assert_eq!(classify(json!({"move": {"moves": []}})).kind(), "turn");
        assert_eq!(classify(json!({"pass": {"punter": 0}, "state": 3})).kind(), "move");
        assert_eq!(classify(json!({"stop": {"moves": [], "scores": []}})).kind(), "stop");
        assert_eq!(classify(json!({"timeout": 10.0})).kind(), "timeout");
        assert_eq!(
            classify(json!({"move": {"moves": []}, "stop": {"moves": [], "scores": []}})).kind(),
            "stop"
        );
    }

    #[test]
    fn setup_keeps_unmodelled_keys() {
        let value = json!({
            "punter": 0,
            "punters": 2,
            "map": {"sites": [{"id": 4, "x": 1.0, "y": 2.5}], "rivers": [{"source": 4, "target": 5}], "mines": [4]},
            "settings": {"futures": true}
        });
        let Message::Setup(setup) = classify(value.clone()) else {
            panic!("not a setup");
        };
        assert_eq!(setup.extra["settings"], json!({"futures": true}));
        assert_eq!(serde_json::to_value(Message::Setup(setup)).unwrap(), value);
    }

    #[test]
    fn handshakes_and_turns_keep_unmodelled_keys() {
        let hello = r#"{"me":"bob","version":"1.2"}"#;
        assert_eq!(from_json(hello).unwrap().to_json().unwrap(), hello);

        let reply = r#"{"you":"bob","motd":"hi"}"#;
        assert_eq!(from_json(reply).unwrap().to_json().unwrap(), reply);

        let turn = r#"{"move":{"moves":[{"pass":{"punter":0}}]},"round":7}"#;
        let Ok(Message::Turn(parsed)) = from_json(turn) else {
            panic!("not a turn");
        };
        assert_eq!(parsed.extra["round"], json!(7));
        assert_eq!(Message::Turn(parsed).to_json().unwrap(), turn);
    }

    #[test]
    fn setup_without_punter_is_malformed() {
        let err = from_json(r#"{"punters": 2, "map": {"sites": [], "rivers": [], "mines": []}}"#)
            .unwrap_err();
        assert!(matches!(err, ProtocolViolation::Malformed { kind: "setup", .. }));
    }

    #[test]
    fn stop_without_scores_is_malformed() {
        let err = from_json(r#"{"stop": {"moves": []}}"#).unwrap_err();
        assert!(matches!(err, ProtocolViolation::Malformed { kind: "stop", .. }));
    }

    #[test]
    fn unknown_and_non_object_payloads() {
        assert!(matches!(
            from_json(r#"{"hello": 1}"#),
            Err(ProtocolViolation::UnknownMessage(_))
        ));
        assert!(matches!(
            from_json("[1, 2]"),
            Err(ProtocolViolation::NotAnObject(_))
        ));
        assert!(matches!(
            from_json(r#""me""#),
            Err(ProtocolViolation::NotAnObject(_))
        ));
    }

    #[test]
    fn null_state_is_a_state() {
        let Message::Move(mv) = classify(json!({"pass": {"punter": 3}, "state": null})) else {
            panic!("not a move");
        };
        assert_eq!(mv.state.as_ref().map(OpaqueState::as_json), Some("null"));
        assert_eq!(mv.action.punter(), 3);

        let Message::Move(mv) = classify(json!({"pass": {"punter": 3}})) else {
            panic!("not a move");
        };
        assert_eq!(mv.state, None);
    }

    #[test]
    fn state_key_order_survives() {
        let text = r#"{"claim":{"punter":1,"source":2,"target":3},"state":{"zeta":1,"alpha":[true,{"b":0,"a":1}]}}"#;
        let msg: Message = serde_json::from_str(text).unwrap();
        assert_eq!(msg.to_json().unwrap(), text);
    }

    #[test]
    fn state_text_is_carried_verbatim() {
        let state = r#"{"big": 123456789012345678901234567890, "huge": 1e400, "neg": -0.0}"#;
        let text = format!(r#"{{"pass":{{"punter":0}},"state":{}}}"#, state);
        let Message::Move(mv) = from_json(&text).unwrap() else {
            panic!("not a move");
        };
        assert_eq!(mv.state.as_ref().map(OpaqueState::as_json), Some(state));

        // Handed to the next bot inside a turn, byte for byte.
        let turn = Message::Turn(Turn {
            state: mv.state,
            ..Turn::new(vec![])
        });
        assert_eq!(
            turn.to_json().unwrap(),
            format!(r#"{{"move":{{"moves":[]}},"state":{}}}"#, state)
        );
    }

    #[test]
    fn state_outside_stateful_messages_is_an_ordinary_key() {
        let Message::Setup(setup) = classify(json!({
            "punter": 0,
            "punters": 2,
            "map": {"sites": [], "rivers": [], "mines": []},
            "state": {"ignored": true}
        })) else {
            panic!("not a setup");
        };
        assert_eq!(setup.extra["state"], json!({"ignored": true}));
    }

    #[test]
    fn stop_serializes_nested() {
        let stop = Message::Stop(Stop {
            moves: vec![PlayerMove::Pass(Pass { punter: 0 })],
            scores: vec![ScoreEntry { punter: 0, score: 5 }],
            extra: Map::new(),
        });
        assert_eq!(
            serde_json::to_value(&stop).unwrap(),
            json!({"stop": {"moves": [{"pass": {"punter": 0}}], "scores": [{"punter": 0, "score": 5}]}})
        );
    }
}
