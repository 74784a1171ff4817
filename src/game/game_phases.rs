//! Round phase definitions and transitions

use serde::{Deserialize, Serialize};

use crate::error::{AbortReason, PlayerId};

/// Why and by whom a round was ended early.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbortInfo {
    pub reason: AbortReason,
    pub offender: Option<PlayerId>,
}

/// Phases of a single hand of the card protocol
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum RoundPhase {
    /// Exchanging deck table commitments
    Init,
    /// Both players agreed on the encoded deck
    DeckPrepared,
    /// `rounds` shuffles have been proven and accepted
    Shuffled { rounds: usize },
    /// Every seat has shuffled
    Verified,
    /// The draw plan has been executed
    HandsDrawn,
    /// Both hands revealed and checked
    Opened,
    /// Showdown settled
    Complete,
    Aborted(AbortInfo),
}

impl RoundPhase {
    /// Check if the round can no longer change
    pub fn is_terminal(&self) -> bool {
        matches!(self, RoundPhase::Complete | RoundPhase::Aborted(_))
    }

    /// Phase reached by one more accepted shuffle out of `seats`.
    pub fn after_shuffle(&self, seats: usize) -> Option<RoundPhase> {
        let done = match self {
            RoundPhase::DeckPrepared => 0,
            RoundPhase::Shuffled { rounds } => *rounds,
            _ => return None,
        };
        if done + 1 >= seats {
            Some(RoundPhase::Verified)
        } else {
            Some(RoundPhase::Shuffled { rounds: done + 1 })
        }
    }

    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            RoundPhase::Init => "Exchanging deck commitments",
            RoundPhase::DeckPrepared => "Deck agreed, waiting for first shuffle",
            RoundPhase::Shuffled { .. } => "Shuffling deck",
            RoundPhase::Verified => "Drawing hands",
            RoundPhase::HandsDrawn => "Revealing hands",
            RoundPhase::Opened => "Hands revealed",
            RoundPhase::Complete => "Round complete",
            RoundPhase::Aborted(_) => "Round aborted",
        }
    }
}
