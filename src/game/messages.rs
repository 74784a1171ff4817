use serde::{Deserialize, Serialize};

use crate::dealing::CardOpening;
use crate::error::{AbortReason, PlayerId};
use crate::shuffling::group::GroupElement;
use crate::shuffling::{ChaumPedersenProof, Digest, RoundOpening};

pub type RoundId = u64;

/// Every message exchanged between the two players of a round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtocolMessage {
    DeckInit {
        deck_commitment: Digest,
        /// `G·x` for the sender's masking scalar `x`.
        #[serde(with = "crate::crypto_serde::curve")]
        public_key: GroupElement,
    },
    ShuffleCommit {
        #[serde(with = "crate::crypto_serde::curve_vec")]
        deck: Vec<GroupElement>,
        commitments: Vec<Digest>,
    },
    ShuffleChallengeAck,
    ShuffleOpening {
        round: usize,
        opening: RoundOpening,
    },
    ShuffleAccepted {
        deck_digest: Digest,
    },
    DrawRequest {
        indices: Vec<usize>,
        /// True when the sender is drawing for itself (blind exchange).
        for_self: bool,
    },
    DrawResponse {
        indices: Vec<usize>,
        #[serde(with = "crate::crypto_serde::curve_vec")]
        ciphertexts: Vec<GroupElement>,
    },
    OpenReveal {
        index: usize,
        #[serde(with = "crate::crypto_serde::curve")]
        card: GroupElement,
        proof: ChaumPedersenProof,
    },
    Abort {
        reason: AbortReason,
        offender: Option<PlayerId>,
    },
}

impl ProtocolMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolMessage::DeckInit { .. } => "deck_init",
            ProtocolMessage::ShuffleCommit { .. } => "shuffle_commit",
            ProtocolMessage::ShuffleChallengeAck => "shuffle_challenge_ack",
            ProtocolMessage::ShuffleOpening { .. } => "shuffle_opening",
            ProtocolMessage::ShuffleAccepted { .. } => "shuffle_accepted",
            ProtocolMessage::DrawRequest { .. } => "draw_request",
            ProtocolMessage::DrawResponse { .. } => "draw_response",
            ProtocolMessage::OpenReveal { .. } => "open_reveal",
            ProtocolMessage::Abort { .. } => "abort",
        }
    }
}

impl From<CardOpening> for ProtocolMessage {
    fn from(opening: CardOpening) -> Self {
        ProtocolMessage::OpenReveal {
            index: opening.index,
            card: opening.encoded_card,
            proof: opening.proof,
        }
    }
}

/// A message stamped with its round and the authenticated sender.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub round_id: RoundId,
    pub sender: PlayerId,
    pub message: ProtocolMessage,
}
