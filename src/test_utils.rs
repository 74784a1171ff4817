//! Common test utilities

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::ProtocolConfig;
use crate::error::{PlayerId, ProtocolError};
use crate::game::{Envelope, GameRound, ProtocolMessage};

pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Helpers shared across test modules.
pub mod serde {
    use std::fmt::Debug;

    /// Assert that a value survives a serde_json round-trip using structural equality.
    pub fn assert_round_trip_eq<T>(value: &T)
    where
        T: ::serde::Serialize + ::serde::de::DeserializeOwned + PartialEq + Debug,
    {
        let json = serde_json::to_string(value)
            .expect("serialization should succeed during round-trip testing");
        let restored: T = serde_json::from_str(&json)
            .expect("deserialization should succeed during round-trip testing");
        assert_eq!(restored, *value, "serde_json round-trip altered the value");
    }

    /// Assert that serde_json emits the same payload before and after round-tripping.
    pub fn assert_round_trip_json<T>(value: &T)
    where
        T: ::serde::Serialize + ::serde::de::DeserializeOwned,
    {
        let json = serde_json::to_value(value)
            .expect("serialization to value should succeed during round-trip testing");
        let restored: T = serde_json::from_value(json.clone())
            .expect("deserialization from value should succeed during round-trip testing");
        let json_after = serde_json::to_value(restored)
            .expect("re-serialization should succeed during round-trip testing");
        assert_eq!(
            json_after, json,
            "serde_json round-trip altered the payload"
        );
    }
}

/// Players 1 (seat 0) and 2 (seat 1) of round 7.
pub fn round_pair(config: ProtocolConfig, seed: u64) -> (GameRound, GameRound) {
    let a = GameRound::new(7, 1, vec![1, 2], config.clone(), seeded_rng(seed))
        .expect("valid round for player 1");
    let b = GameRound::new(7, 2, vec![1, 2], config, seeded_rng(seed.wrapping_add(1)))
        .expect("valid round for player 2");
    (a, b)
}

/// Rewrites messages sent by one player before they reach the other.
pub struct Tamper {
    player: Option<PlayerId>,
    edit: Box<dyn FnMut(&mut ProtocolMessage)>,
}

impl Tamper {
    pub fn none() -> Self {
        Self {
            player: None,
            edit: Box::new(|_| {}),
        }
    }

    pub fn outgoing(player: PlayerId, edit: impl FnMut(&mut ProtocolMessage) + 'static) -> Self {
        Self {
            player: Some(player),
            edit: Box::new(edit),
        }
    }
}

fn enqueue(
    sender: &GameRound,
    messages: Vec<ProtocolMessage>,
    tamper: &mut Tamper,
    queue: &mut VecDeque<Envelope>,
) {
    for mut message in messages {
        if tamper.player == Some(sender.local()) {
            (tamper.edit)(&mut message);
        }
        queue.push_back(sender.envelope(message));
    }
}

/// Starts both rounds and delivers messages in order until neither side has
/// anything left to say. An aborting side notifies its peer once.
pub fn pump(a: &mut GameRound, b: &mut GameRound, mut tamper: Tamper) {
    let mut queue = VecDeque::new();
    let opening = a.start().expect("player 1 starts");
    enqueue(a, opening, &mut tamper, &mut queue);
    let opening = b.start().expect("player 2 starts");
    enqueue(b, opening, &mut tamper, &mut queue);

    while let Some(envelope) = queue.pop_front() {
        let target: &mut GameRound = if envelope.sender == a.local() { &mut *b } else { &mut *a };
        if target.phase().is_terminal() {
            continue;
        }
        match target.handle(envelope) {
            Ok(out) => enqueue(target, out, &mut tamper, &mut queue),
            Err(ProtocolError::PeerAborted(_)) => {}
            Err(_) => {
                if let Some(notice) = target.abort_notice() {
                    queue.push_back(target.envelope(notice));
                }
            }
        }
    }
}
