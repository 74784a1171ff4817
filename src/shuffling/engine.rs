use rand::{CryptoRng, Rng};

use super::cipher::{mask, MaskingKey};
use super::data_structures::{Deck, Permutation};
use super::group::{GroupElement, Scalar};
use crate::error::ProtocolError;

const LOG_TARGET: &str = "mental_poker::shuffling::engine";

/// Permutes `deck` with a fresh Fisher-Yates permutation and masks every
/// position under `key`.
#[tracing::instrument(target = LOG_TARGET, skip_all)]
pub fn shuffle<R: Rng + CryptoRng>(
    deck: &Deck,
    key: &MaskingKey,
    rng: &mut R,
) -> Result<(Deck, Permutation), ProtocolError> {
    let permutation = Permutation::random(deck.len(), rng);
    let permuted = permutation.apply(deck.as_slice())?;
    let shuffled = Deck::from_validated(key.mask_all(&permuted));
    tracing::debug!(target: LOG_TARGET, digest = %shuffled.digest(), "deck shuffled");
    Ok((shuffled, permutation))
}

/// Deterministic replay: `out[j] = deck[perm[j]]·scalar`.
pub fn apply_shuffle(
    deck: &[GroupElement],
    permutation: &Permutation,
    scalar: &Scalar,
) -> Result<Vec<GroupElement>, ProtocolError> {
    Ok(permutation
        .apply(deck)?
        .iter()
        .map(|card| mask(scalar, card))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shuffling::cipher::unmask;
    use crate::shuffling::deck_codec::DeckCodec;
    use crate::test_utils::seeded_rng;
    use std::collections::HashSet;

    #[test]
    fn shuffle_is_a_masked_permutation() {
        let mut rng = seeded_rng(31);
        let codec = DeckCodec::global();
        let deck = codec.encoded_deck();
        let key = MaskingKey::generate(&mut rng);

        let (shuffled, permutation) = shuffle(&deck, &key, &mut rng).unwrap();
        assert_eq!(
            apply_shuffle(deck.as_slice(), &permutation, &key.disclose()).unwrap(),
            shuffled.as_slice()
        );

        let recovered: HashSet<_> = shuffled
            .iter()
            .map(|c| codec.decode(&unmask(&key.disclose(), c).unwrap()).unwrap())
            .collect();
        assert_eq!(recovered.len(), deck.len());
    }

    #[test]
    fn shuffled_deck_is_still_well_formed() {
        let mut rng = seeded_rng(32);
        let deck = DeckCodec::global().encoded_deck();
        let key = MaskingKey::generate(&mut rng);
        let (shuffled, _) = shuffle(&deck, &key, &mut rng).unwrap();
        assert!(Deck::new(shuffled.into_inner()).is_ok());
    }

    #[test]
    fn replay_rejects_mismatched_lengths() {
        let deck = DeckCodec::global().encoded_deck();
        let short = Permutation::identity(3);
        assert!(apply_shuffle(deck.as_slice(), &short, &Scalar::from(2u64)).is_err());
    }
}
