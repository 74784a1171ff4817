use std::collections::HashSet;
use std::fmt;

use ark_ec::CurveGroup;
use ark_ff::Zero;
use rand::{CryptoRng, Rng};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::group::GroupElement;
use super::transcript::{hash_points, Digest, DOMAIN_DECK};
use crate::error::ProtocolError;

pub const DECK_SIZE: usize = 52;

/// Exactly 52 ciphertexts, none the identity and no two equal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Deck {
    cards: Vec<GroupElement>,
}

impl Deck {
    pub fn new(cards: Vec<GroupElement>) -> Result<Self, ProtocolError> {
        if cards.len() != DECK_SIZE {
            return Err(ProtocolError::Format(format!(
                "deck must hold {DECK_SIZE} cards, got {}",
                cards.len()
            )));
        }
        if cards.iter().any(|card| card.is_zero()) {
            return Err(ProtocolError::Format(
                "deck contains the identity element".to_string(),
            ));
        }
        let affine = GroupElement::normalize_batch(&cards);
        let distinct: HashSet<_> = affine.iter().collect();
        if distinct.len() != DECK_SIZE {
            return Err(ProtocolError::Format(
                "deck contains duplicate ciphertexts".to_string(),
            ));
        }
        Ok(Self { cards })
    }

    /// Wraps points derived from an already validated deck by a bijection and
    /// a non-zero scalar, which preserves every deck invariant.
    pub(crate) fn from_validated(cards: Vec<GroupElement>) -> Self {
        debug_assert_eq!(cards.len(), DECK_SIZE);
        Self { cards }
    }

    pub fn as_slice(&self) -> &[GroupElement] {
        &self.cards
    }

    pub fn get(&self, index: usize) -> Option<&GroupElement> {
        self.cards.get(index)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GroupElement> {
        self.cards.iter()
    }

    /// Hash binding every position of the deck.
    pub fn digest(&self) -> Digest {
        hash_points(DOMAIN_DECK, &self.cards)
    }

    pub fn into_inner(self) -> Vec<GroupElement> {
        self.cards
    }
}

impl Serialize for Deck {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        crate::crypto_serde::curve_vec::serialize(&self.cards, serializer)
    }
}

impl<'de> Deserialize<'de> for Deck {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let cards = crate::crypto_serde::curve_vec::deserialize(deserializer)?;
        Deck::new(cards).map_err(serde::de::Error::custom)
    }
}

/// Bijection on `0..n`, applied as `apply(items)[j] = items[perm[j]]`.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Permutation(Vec<usize>);

impl Permutation {
    pub fn identity(size: usize) -> Self {
        Self((0..size).collect())
    }

    /// Unbiased Fisher-Yates: position `i` swaps with a uniform `j` in `[i, n)`.
    pub fn random<R: Rng + CryptoRng>(size: usize, rng: &mut R) -> Self {
        let mut slots: Vec<usize> = (0..size).collect();
        for i in 0..size {
            let j = rng.gen_range(i..size);
            slots.swap(i, j);
        }
        Self(slots)
    }

    pub fn from_vec(mapping: Vec<usize>) -> Result<Self, ProtocolError> {
        let mut seen = vec![false; mapping.len()];
        for &target in &mapping {
            match seen.get_mut(target) {
                Some(slot) if !*slot => *slot = true,
                _ => return Err(ProtocolError::Domain("permutation is not a bijection")),
            }
        }
        Ok(Self(mapping))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn apply<T: Clone>(&self, items: &[T]) -> Result<Vec<T>, ProtocolError> {
        if items.len() != self.0.len() {
            return Err(ProtocolError::Domain(
                "permutation and input have different lengths",
            ));
        }
        Ok(self.0.iter().map(|&source| items[source].clone()).collect())
    }

    pub fn inverse(&self) -> Self {
        let mut inverse = vec![0usize; self.0.len()];
        for (position, &source) in self.0.iter().enumerate() {
            inverse[source] = position;
        }
        Self(inverse)
    }

    /// `self.compose(other)[j] = self[other[j]]`, i.e. applying `self` then `other`.
    pub fn compose(&self, other: &Permutation) -> Result<Self, ProtocolError> {
        if self.0.len() != other.0.len() {
            return Err(ProtocolError::Domain(
                "cannot compose permutations of different sizes",
            ));
        }
        Ok(Self(other.0.iter().map(|&j| self.0[j]).collect()))
    }
}

impl fmt::Debug for Permutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Permutation(<{} positions>)", self.0.len())
    }
}

impl Serialize for Permutation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Permutation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mapping = Vec::<usize>::deserialize(deserializer)?;
        Permutation::from_vec(mapping).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shuffling::group::{generator, multiply, Scalar};
    use crate::test_utils::seeded_rng;

    fn distinct_points(count: usize) -> Vec<GroupElement> {
        (1..=count as u64)
            .map(|i| multiply(&Scalar::from(i), &generator()))
            .collect()
    }

    #[test]
    fn deck_rejects_wrong_length_identity_and_duplicates() {
        assert!(matches!(
            Deck::new(distinct_points(51)),
            Err(ProtocolError::Format(_))
        ));

        let mut with_identity = distinct_points(DECK_SIZE);
        with_identity[7] = GroupElement::zero();
        assert!(matches!(Deck::new(with_identity), Err(ProtocolError::Format(_))));

        let mut with_duplicate = distinct_points(DECK_SIZE);
        with_duplicate[3] = with_duplicate[40];
        assert!(matches!(Deck::new(with_duplicate), Err(ProtocolError::Format(_))));

        assert!(Deck::new(distinct_points(DECK_SIZE)).is_ok());
    }

    #[test]
    fn random_permutations_are_bijections() {
        let mut rng = seeded_rng(11);
        for _ in 0..32 {
            let perm = Permutation::random(DECK_SIZE, &mut rng);
            assert!(Permutation::from_vec(perm.as_slice().to_vec()).is_ok());
        }
    }

    #[test]
    fn fisher_yates_spreads_positions() {
        // Each of the 4 positions should receive each value roughly 1/4 of the time.
        let mut rng = seeded_rng(12);
        let mut counts = [[0usize; 4]; 4];
        let trials = 8000;
        for _ in 0..trials {
            let perm = Permutation::random(4, &mut rng);
            for (position, &value) in perm.as_slice().iter().enumerate() {
                counts[position][value] += 1;
            }
        }
        for row in counts {
            for count in row {
                assert!((1700..2300).contains(&count), "skewed count {count}");
            }
        }
    }

    #[test]
    fn from_vec_rejects_non_bijections() {
        assert!(Permutation::from_vec(vec![0, 0, 1]).is_err());
        assert!(Permutation::from_vec(vec![0, 3, 1]).is_err());
        assert!(Permutation::from_vec(vec![2, 0, 1]).is_ok());
    }

    #[test]
    fn apply_follows_source_index_convention() {
        let perm = Permutation::from_vec(vec![2, 0, 1]).unwrap();
        assert_eq!(perm.apply(&['a', 'b', 'c']).unwrap(), vec!['c', 'a', 'b']);
        assert!(perm.apply(&['a']).is_err());
    }

    #[test]
    fn inverse_undoes_apply() {
        let mut rng = seeded_rng(13);
        let perm = Permutation::random(DECK_SIZE, &mut rng);
        let items: Vec<usize> = (100..100 + DECK_SIZE).collect();
        let shuffled = perm.apply(&items).unwrap();
        assert_eq!(perm.inverse().apply(&shuffled).unwrap(), items);
    }

    #[test]
    fn compose_applies_left_then_right() {
        let mut rng = seeded_rng(14);
        let a = Permutation::random(10, &mut rng);
        let b = Permutation::random(10, &mut rng);
        let items: Vec<u32> = (0..10).collect();
        let stepwise = b.apply(&a.apply(&items).unwrap()).unwrap();
        assert_eq!(a.compose(&b).unwrap().apply(&items).unwrap(), stepwise);
        assert_eq!(a.compose(&a.inverse()).unwrap(), Permutation::identity(10));
    }

    #[test]
    fn permutation_serde_validates_bijection() {
        let perm = Permutation::from_vec(vec![1, 2, 0]).unwrap();
        crate::test_utils::serde::assert_round_trip_eq(&perm);
        assert!(serde_json::from_str::<Permutation>("[0,0,1]").is_err());
    }

    #[test]
    fn deck_serde_revalidates() {
        let deck = Deck::new(distinct_points(DECK_SIZE)).unwrap();
        crate::test_utils::serde::assert_round_trip_eq(&deck);
        let mut json = serde_json::to_value(&deck).unwrap();
        json.as_array_mut().unwrap().truncate(3);
        assert!(serde_json::from_value::<Deck>(json.clone()).is_err());
        let entries = json.as_array_mut().unwrap();
        let first = entries[0].clone();
        entries[1] = first;
        assert!(serde_json::from_value::<Deck>(json).is_err());
    }
}
