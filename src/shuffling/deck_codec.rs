//! Public bijection between the 52 cards and group elements.
//!
//! Each card index is hashed onto the curve by try-and-increment, so no player
//! knows a discrete-log relation between two encoded cards. The table is
//! derived once per process and shared by every round.

use std::collections::HashMap;
use std::fmt;

use ark_ec::AffineRepr;
use ark_ff::PrimeField;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use super::data_structures::{Deck, DECK_SIZE};
use super::group::{BaseField, GroupAffine, GroupElement};
use super::transcript::{hash_points, Digest, DOMAIN_CODEC, DOMAIN_CODEC_POINT};
use crate::error::ProtocolError;

const LOG_TARGET: &str = "mental_poker::shuffling::deck_codec";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Suit {
    Clubs,
    Hearts,
    Diamonds,
    Spades,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Clubs, Suit::Hearts, Suit::Diamonds, Suit::Spades];

    fn name(self) -> &'static str {
        match self {
            Suit::Clubs => "clubs",
            Suit::Hearts => "hearts",
            Suit::Diamonds => "diamonds",
            Suit::Spades => "spades",
        }
    }

    fn symbol(self) -> char {
        match self {
            Suit::Clubs => '♣',
            Suit::Hearts => '♥',
            Suit::Diamonds => '♦',
            Suit::Spades => '♠',
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rank {
    Two = 2,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
    Ace,
}

impl Rank {
    pub const ALL: [Rank; 13] = [
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
        Rank::Ace,
    ];

    /// Numeric value with aces high (2..=14).
    pub fn value(self) -> u8 {
        self as u8
    }

    fn name(self) -> &'static str {
        match self {
            Rank::Two => "Two",
            Rank::Three => "Three",
            Rank::Four => "Four",
            Rank::Five => "Five",
            Rank::Six => "Six",
            Rank::Seven => "Seven",
            Rank::Eight => "Eight",
            Rank::Nine => "Nine",
            Rank::Ten => "Ten",
            Rank::Jack => "Jack",
            Rank::Queen => "Queen",
            Rank::King => "King",
            Rank::Ace => "Ace",
        }
    }

    fn short(self) -> &'static str {
        match self {
            Rank::Ten => "10",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
            Rank::Ace => "A",
            other => &"23456789"[(other.value() - 2) as usize..(other.value() - 1) as usize],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub const fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }

    /// Canonical position `suit * 13 + (rank - 2)`.
    pub fn index(&self) -> usize {
        self.suit as usize * 13 + (self.rank.value() as usize - 2)
    }

    pub fn from_index(index: usize) -> Option<Self> {
        if index >= DECK_SIZE {
            return None;
        }
        Some(Self {
            rank: Rank::ALL[index % 13],
            suit: Suit::ALL[index / 13],
        })
    }

    /// Compact label such as `A♠` or `10♦`.
    pub fn short(&self) -> String {
        format!("{}{}", self.rank.short(), self.suit.symbol())
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {}", self.rank.name(), self.suit.name())
    }
}

pub struct DeckCodec {
    points: Vec<GroupElement>,
    cards_by_point: HashMap<GroupElement, Card>,
    commitment: Digest,
}

static GLOBAL_CODEC: Lazy<DeckCodec> = Lazy::new(DeckCodec::derive);

impl DeckCodec {
    /// Process-wide table shared by every round.
    pub fn global() -> &'static DeckCodec {
        &GLOBAL_CODEC
    }

    fn derive() -> Self {
        let points: Vec<GroupElement> = (0..DECK_SIZE).map(hash_to_curve).collect();
        let cards_by_point = points
            .iter()
            .enumerate()
            .filter_map(|(index, point)| Card::from_index(index).map(|card| (*point, card)))
            .collect::<HashMap<_, _>>();
        debug_assert_eq!(cards_by_point.len(), DECK_SIZE);
        let commitment = hash_points(DOMAIN_CODEC, &points);
        tracing::debug!(target: LOG_TARGET, %commitment, "derived card encoding table");
        Self {
            points,
            cards_by_point,
            commitment,
        }
    }

    pub fn encode(&self, card: Card) -> GroupElement {
        self.points[card.index()]
    }

    pub fn decode(&self, point: &GroupElement) -> Result<Card, ProtocolError> {
        self.cards_by_point
            .get(point)
            .copied()
            .ok_or(ProtocolError::UnknownCard)
    }

    /// All 52 encoded cards in canonical order.
    pub fn encoded_deck(&self) -> Deck {
        Deck::from_validated(self.points.clone())
    }

    /// Digest of the whole table, exchanged at deck preparation.
    pub fn commitment(&self) -> Digest {
        self.commitment
    }
}

/// x = SHA-256(domain, index, counter) until x lands on the curve.
fn hash_to_curve(index: usize) -> GroupElement {
    let mut counter = 0u64;
    loop {
        let mut hasher = Sha256::new();
        hasher.update(DOMAIN_CODEC_POINT);
        hasher.update((index as u64).to_be_bytes());
        hasher.update(counter.to_be_bytes());
        let digest = hasher.finalize();
        let x = BaseField::from_le_bytes_mod_order(&digest);
        let greatest = digest[31] & 1 == 1;
        if let Some(point) = GroupAffine::get_point_from_x_unchecked(x, greatest) {
            // BN254 G1 has cofactor 1, so any curve point other than the
            // identity is a group element.
            if !point.is_zero() {
                return point.into_group();
            }
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shuffling::group::{generator, multiply, Scalar};
    use ark_ec::CurveGroup;
    use std::collections::HashSet;

    #[test]
    fn card_index_round_trips() {
        for index in 0..DECK_SIZE {
            let card = Card::from_index(index).unwrap();
            assert_eq!(card.index(), index);
        }
        assert!(Card::from_index(DECK_SIZE).is_none());
        assert_eq!(Card::new(Rank::Two, Suit::Clubs).index(), 0);
        assert_eq!(Card::new(Rank::Ace, Suit::Spades).index(), 51);
    }

    #[test]
    fn codec_is_a_bijection_over_distinct_points() {
        let codec = DeckCodec::global();
        let points: HashSet<_> = (0..DECK_SIZE)
            .map(|i| codec.encode(Card::from_index(i).unwrap()))
            .collect();
        assert_eq!(points.len(), DECK_SIZE);
        for index in 0..DECK_SIZE {
            let card = Card::from_index(index).unwrap();
            assert_eq!(codec.decode(&codec.encode(card)).unwrap(), card);
        }
    }

    #[test]
    fn encoded_points_are_valid_group_elements() {
        for point in DeckCodec::global().encoded_deck().iter() {
            let affine = point.into_affine();
            assert!(affine.is_on_curve());
            assert!(affine.is_in_correct_subgroup_assuming_on_curve());
        }
    }

    #[test]
    fn unknown_points_are_rejected() {
        let stray = multiply(&Scalar::from(5u64), &generator());
        assert_eq!(
            DeckCodec::global().decode(&stray),
            Err(ProtocolError::UnknownCard)
        );
    }

    #[test]
    fn derivation_is_deterministic() {
        let fresh = DeckCodec::derive();
        assert_eq!(fresh.commitment(), DeckCodec::global().commitment());
        assert_eq!(fresh.encoded_deck(), DeckCodec::global().encoded_deck());
    }

    #[test]
    fn card_names() {
        let card = Card::new(Rank::Ace, Suit::Spades);
        assert_eq!(card.to_string(), "Ace of spades");
        assert_eq!(card.short(), "A♠");
        assert_eq!(Card::new(Rank::Ten, Suit::Diamonds).short(), "10♦");
        assert_eq!(Card::new(Rank::Seven, Suit::Clubs).short(), "7♣");
    }
}
