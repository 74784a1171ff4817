use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{PlayerId, ProtocolError};
use crate::shuffling::group::GroupElement;
use crate::shuffling::{Card, Deck, DeckCodec, MaskingKey, DECK_SIZE};

const LOG_TARGET: &str = "mental_poker::dealing::draw";

/// How the cards of one draw step reach their recipient.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawMode {
    /// The recipient picks positions and asks the counterpart to strip its layer.
    Blind,
    /// The counterpart picks positions, strips its layer and hands them over.
    Dealt,
}

/// Per-player deck positions already drawn this round. Sets are pairwise
/// disjoint.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClaimedIndexSets {
    claims: BTreeMap<PlayerId, BTreeSet<usize>>,
}

impl ClaimedIndexSets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_claimed(&self, index: usize) -> bool {
        self.claims.values().any(|set| set.contains(&index))
    }

    /// Lowest `count` positions nobody holds yet.
    pub fn select_fresh(&self, count: usize) -> Result<Vec<usize>, ProtocolError> {
        let available = DECK_SIZE - self.total_claimed();
        if count > available {
            return Err(ProtocolError::InsufficientCards {
                requested: count,
                available,
            });
        }
        Ok((0..DECK_SIZE)
            .filter(|index| !self.is_claimed(*index))
            .take(count)
            .collect())
    }

    /// Claims every index or none of them.
    pub fn claim(&mut self, player: PlayerId, indices: &[usize]) -> Result<(), ProtocolError> {
        let mut requested = BTreeSet::new();
        for &index in indices {
            if index >= DECK_SIZE || self.is_claimed(index) || !requested.insert(index) {
                tracing::warn!(target: LOG_TARGET, player, index, "rejected claim");
                return Err(ProtocolError::IndexConflict { index });
            }
        }
        self.claims.entry(player).or_default().extend(requested);
        Ok(())
    }

    pub fn claimed_by(&self, player: PlayerId) -> BTreeSet<usize> {
        self.claims.get(&player).cloned().unwrap_or_default()
    }

    pub fn total_claimed(&self) -> usize {
        self.claims.values().map(BTreeSet::len).sum()
    }
}

/// Players whose masking layer is still applied to a ciphertext.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LayerSet {
    players: BTreeSet<PlayerId>,
}

impl LayerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, player: PlayerId) {
        self.players.insert(player);
    }

    pub fn strip(&mut self, player: PlayerId) -> Result<(), ProtocolError> {
        if !self.players.remove(&player) {
            return Err(ProtocolError::sequence(
                format!("a layer held by player {player}"),
                "strip of a missing layer",
            ));
        }
        Ok(())
    }

    pub fn contains(&self, player: PlayerId) -> bool {
        self.players.contains(&player)
    }

    pub fn is_plaintext(&self) -> bool {
        self.players.is_empty()
    }
}

/// A decoded card together with the position it was drawn from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandCard {
    pub index: usize,
    /// Ciphertext as received, carrying only the recipient's layer.
    pub partial: GroupElement,
    pub card: Card,
}

/// Removes `key`'s layer from the deck entries at `indices`.
pub fn strip_own_layer(
    deck: &Deck,
    indices: &[usize],
    key: &MaskingKey,
) -> Result<Vec<GroupElement>, ProtocolError> {
    let selected = indices
        .iter()
        .map(|&index| {
            deck.get(index)
                .copied()
                .ok_or(ProtocolError::IndexConflict { index })
        })
        .collect::<Result<Vec<_>, _>>()?;
    key.unmask_all(&selected)
}

/// Removes the recipient's own layer from the partials it was handed and decodes them.
#[tracing::instrument(target = LOG_TARGET, skip_all, fields(cards = indices.len()))]
pub fn finish_draw(
    partials: &[GroupElement],
    indices: &[usize],
    key: &MaskingKey,
    codec: &DeckCodec,
) -> Result<Vec<HandCard>, ProtocolError> {
    if partials.len() != indices.len() {
        return Err(ProtocolError::Format(format!(
            "{} ciphertexts for {} indices",
            partials.len(),
            indices.len()
        )));
    }
    let plain = key.unmask_all(partials)?;
    indices
        .iter()
        .zip(partials.iter().zip(&plain))
        .map(|(&index, (partial, point))| {
            let card = codec
                .decode(point)
                .map_err(|_| ProtocolError::Decode { index })?;
            Ok(HandCard {
                index,
                partial: *partial,
                card,
            })
        })
        .collect()
}
