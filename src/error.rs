use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type PlayerId = u64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Domain error: {0}")]
    Domain(&'static str),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Group element is not one of the 52 encoded cards")]
    UnknownCard,

    #[error("Card at deck index {index} did not decode to a valid card")]
    Decode { index: usize },

    #[error("Shuffle proof rejected: {reason}")]
    ShuffleProofFailed { reason: String },

    #[error("Deck index {index} is already claimed or invalid")]
    IndexConflict { index: usize },

    #[error("Not enough unclaimed cards: requested {requested}, available {available}")]
    InsufficientCards { requested: usize, available: usize },

    #[error("Opening of deck index {index} does not verify: {reason}")]
    InvalidOpening { index: usize, reason: &'static str },

    #[error("Out-of-sequence message: expected {expected}, got {got}")]
    ProtocolSequence { expected: String, got: String },

    #[error("Timed out waiting for peer message")]
    Timeout,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Peer aborted the round: {0:?}")]
    PeerAborted(AbortReason),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ProtocolError {
    pub fn shuffle_proof(reason: impl Into<String>) -> Self {
        ProtocolError::ShuffleProofFailed {
            reason: reason.into(),
        }
    }

    pub fn sequence(expected: impl Into<String>, got: impl Into<String>) -> Self {
        ProtocolError::ProtocolSequence {
            expected: expected.into(),
            got: got.into(),
        }
    }

    /// Reason code reported to the peer when this error ends a round.
    pub fn abort_reason(&self) -> AbortReason {
        match self {
            ProtocolError::Domain(_) => AbortReason::Domain,
            ProtocolError::Format(_) => AbortReason::Format,
            ProtocolError::UnknownCard => AbortReason::UnknownCard,
            ProtocolError::Decode { .. } => AbortReason::Decode,
            ProtocolError::ShuffleProofFailed { .. } => AbortReason::ShuffleProofFailed,
            ProtocolError::IndexConflict { .. } | ProtocolError::InsufficientCards { .. } => {
                AbortReason::IndexConflict
            }
            ProtocolError::InvalidOpening { .. } => AbortReason::InvalidOpening,
            ProtocolError::ProtocolSequence { .. } => AbortReason::ProtocolSequence,
            ProtocolError::Timeout | ProtocolError::Transport(_) => AbortReason::Timeout,
            ProtocolError::PeerAborted(reason) => *reason,
            ProtocolError::Config(_) => AbortReason::Domain,
        }
    }

    /// Integrity failures point at the peer that produced the offending data.
    pub fn blames_sender(&self) -> bool {
        !matches!(
            self,
            ProtocolError::Timeout
                | ProtocolError::Transport(_)
                | ProtocolError::PeerAborted(_)
                | ProtocolError::Config(_)
                | ProtocolError::InsufficientCards { .. }
        )
    }
}

/// Serializable reason carried by `Abort` messages and the `Aborted` phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    Domain,
    Format,
    UnknownCard,
    Decode,
    ShuffleProofFailed,
    IndexConflict,
    InvalidOpening,
    ProtocolSequence,
    Timeout,
    Cancelled,
}
