use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dealing::DrawMode;
use crate::error::ProtocolError;
use crate::shuffling::proof::RECOMMENDED_ROUNDS;
use crate::shuffling::DECK_SIZE;

const LOG_TARGET: &str = "mental_poker::config";

/// Seats taking part in a round; draws and shuffles are strictly two-party.
pub const SEATS: usize = 2;

/// One draw of `count` cards for the player in `seat`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawStep {
    pub mode: DrawMode,
    pub seat: usize,
    pub count: usize,
}

/// Ordered draws executed in lockstep by both players after shuffling.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawPlan {
    pub steps: Vec<DrawStep>,
}

impl DrawPlan {
    /// Each seat draws its own hand through a blind exchange.
    pub fn heads_up(hand_size: usize) -> Self {
        Self::uniform(DrawMode::Blind, hand_size)
    }

    /// Each seat is dealt its hand by the other seat.
    pub fn dealt(hand_size: usize) -> Self {
        Self::uniform(DrawMode::Dealt, hand_size)
    }

    fn uniform(mode: DrawMode, count: usize) -> Self {
        Self {
            steps: (0..SEATS).map(|seat| DrawStep { mode, seat, count }).collect(),
        }
    }

    pub fn total_cards(&self) -> usize {
        self.steps.iter().map(|step| step.count).sum()
    }
}

impl Default for DrawPlan {
    fn default() -> Self {
        Self::heads_up(5)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Cut-and-choose rounds per shuffle proof; soundness error is 2^-rounds.
    pub shuffle_rounds: usize,
    pub message_timeout_ms: u64,
    /// Buffered frames per direction of the in-memory transport.
    pub channel_capacity: usize,
    pub draw_plan: DrawPlan,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            shuffle_rounds: RECOMMENDED_ROUNDS,
            message_timeout_ms: 30_000,
            channel_capacity: 64,
            draw_plan: DrawPlan::default(),
        }
    }
}

impl ProtocolConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ProtocolError> {
        let config: ProtocolConfig = serde_json::from_str(raw)
            .map_err(|err| ProtocolError::Config(format!("invalid config json: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn message_timeout(&self) -> Duration {
        Duration::from_millis(self.message_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.shuffle_rounds == 0 {
            return Err(ProtocolError::Config(
                "shuffle_rounds must be at least 1".to_string(),
            ));
        }
        if self.shuffle_rounds < RECOMMENDED_ROUNDS {
            tracing::warn!(
                target: LOG_TARGET,
                shuffle_rounds = self.shuffle_rounds,
                recommended = RECOMMENDED_ROUNDS,
                "shuffle proof soundness below recommended level"
            );
        }
        if self.message_timeout_ms == 0 {
            return Err(ProtocolError::Config(
                "message_timeout_ms must be positive".to_string(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(ProtocolError::Config(
                "channel_capacity must be positive".to_string(),
            ));
        }
        for step in &self.draw_plan.steps {
            if step.seat >= SEATS {
                return Err(ProtocolError::Config(format!(
                    "draw step targets seat {} but only {SEATS} seats exist",
                    step.seat
                )));
            }
            if step.count == 0 {
                return Err(ProtocolError::Config(
                    "draw steps must move at least one card".to_string(),
                ));
            }
        }
        if self.draw_plan.total_cards() > DECK_SIZE {
            return Err(ProtocolError::Config(format!(
                "draw plan needs {} cards, deck holds {DECK_SIZE}",
                self.draw_plan.total_cards()
            )));
        }
        Ok(())
    }
}
