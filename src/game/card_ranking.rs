//! Showdown comparison. Hand ranking is pluggable: [`PokerHandJudge`] applies
//! standard poker hand categories, [`HighCardJudge`] compares high cards only.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PlayerId;
use crate::shuffling::{Card, Rank, Suit};

/// Decides the winners of a showdown from every player's revealed cards.
pub trait ShowdownJudge {
    /// All players tied for best hand; empty when nobody holds cards.
    fn winners(&self, hands: &BTreeMap<PlayerId, Vec<Card>>) -> Vec<PlayerId>;
}

/// Players whose non-empty hand scores highest.
fn best_scoring<S: Ord>(
    hands: &BTreeMap<PlayerId, Vec<Card>>,
    score: impl Fn(&[Card]) -> S,
) -> Vec<PlayerId> {
    let scored: Vec<(PlayerId, S)> = hands
        .iter()
        .filter(|(_, cards)| !cards.is_empty())
        .map(|(player, cards)| (*player, score(cards)))
        .collect();
    let Some(best) = scored.iter().map(|(_, score)| score).max() else {
        return Vec::new();
    };
    scored
        .iter()
        .filter(|(_, score)| score == best)
        .map(|(player, _)| *player)
        .collect()
}

/// Compares hands by their ranks sorted high to low, ignoring suits.
#[derive(Clone, Copy, Debug, Default)]
pub struct HighCardJudge;

/// Rank values in descending order; lexicographic comparison is high-card order.
pub fn high_cards(cards: &[Card]) -> Vec<u8> {
    let mut values: Vec<u8> = cards.iter().map(|c| c.rank.value()).collect();
    values.sort_by_key(|v| Reverse(*v));
    values
}

impl ShowdownJudge for HighCardJudge {
    fn winners(&self, hands: &BTreeMap<PlayerId, Vec<Card>>) -> Vec<PlayerId> {
        best_scoring(hands, high_cards)
    }
}

/// Poker hand categories, weakest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandRank {
    HighCard = 1,
    Pair,
    TwoPair,
    ThreeOfAKind,
    Straight,
    Flush,
    FullHouse,
    FourOfAKind,
    StraightFlush,
    RoyalFlush,
}

impl fmt::Display for HandRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HandRank::HighCard => "high card",
            HandRank::Pair => "pair",
            HandRank::TwoPair => "two pair",
            HandRank::ThreeOfAKind => "three of a kind",
            HandRank::Straight => "straight",
            HandRank::Flush => "flush",
            HandRank::FullHouse => "full house",
            HandRank::FourOfAKind => "four of a kind",
            HandRank::StraightFlush => "straight flush",
            HandRank::RoyalFlush => "royal flush",
        })
    }
}

/// Category plus the rank values that break ties within it. Ordering is
/// showdown strength.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct HandValue {
    pub rank: HandRank,
    pub tiebreak: Vec<u8>,
}

impl HandValue {
    fn new(rank: HandRank, tiebreak: Vec<u8>) -> Self {
        Self { rank, tiebreak }
    }
}

/// Highest straight within `values`, by its top card. The wheel `A-2-3-4-5`
/// counts as five-high.
fn highest_straight(values: &[u8]) -> Option<u8> {
    let present = |value: u8| values.contains(&value) || (value == 1 && values.contains(&14));
    (5..=14u8)
        .rev()
        .find(|&high| (high - 4..=high).all(present))
}

/// Best poker hand among any number of cards; only five count toward it.
pub fn evaluate_hand(cards: &[Card]) -> HandValue {
    let sorted = high_cards(cards);

    // (count, value), most frequent then highest first.
    let mut counts: Vec<(usize, u8)> = Rank::ALL
        .iter()
        .map(|rank| rank.value())
        .map(|value| (sorted.iter().filter(|v| **v == value).count(), value))
        .filter(|(count, _)| *count > 0)
        .collect();
    counts.sort_by_key(|entry| Reverse(*entry));
    let group = |i: usize| counts.get(i).copied().unwrap_or((0, 0));
    let kickers = |skip: &[u8], take: usize| -> Vec<u8> {
        sorted
            .iter()
            .copied()
            .filter(|v| !skip.contains(v))
            .take(take)
            .collect()
    };

    let flush = Suit::ALL.iter().find_map(|suit| {
        let suited: Vec<u8> = cards
            .iter()
            .filter(|c| c.suit == *suit)
            .map(|c| c.rank.value())
            .collect();
        (suited.len() >= 5).then(|| high_cards_of(suited))
    });

    if let Some(high) = flush.as_deref().and_then(highest_straight) {
        return if high == Rank::Ace.value() {
            HandValue::new(HandRank::RoyalFlush, Vec::new())
        } else {
            HandValue::new(HandRank::StraightFlush, vec![high])
        };
    }

    let (top_count, top) = group(0);
    let (next_count, next) = group(1);
    if top_count == 4 {
        let mut tiebreak = vec![top];
        tiebreak.extend(kickers(&[top], 1));
        return HandValue::new(HandRank::FourOfAKind, tiebreak);
    }
    if top_count == 3 && next_count >= 2 {
        return HandValue::new(HandRank::FullHouse, vec![top, next]);
    }
    if let Some(suited) = flush {
        return HandValue::new(HandRank::Flush, suited.into_iter().take(5).collect());
    }
    if let Some(high) = highest_straight(&sorted) {
        return HandValue::new(HandRank::Straight, vec![high]);
    }
    if top_count == 3 {
        let mut tiebreak = vec![top];
        tiebreak.extend(kickers(&[top], 2));
        return HandValue::new(HandRank::ThreeOfAKind, tiebreak);
    }
    if top_count == 2 && next_count == 2 {
        let mut tiebreak = vec![top, next];
        tiebreak.extend(kickers(&[top, next], 1));
        return HandValue::new(HandRank::TwoPair, tiebreak);
    }
    if top_count == 2 {
        let mut tiebreak = vec![top];
        tiebreak.extend(kickers(&[top], 3));
        return HandValue::new(HandRank::Pair, tiebreak);
    }
    HandValue::new(HandRank::HighCard, kickers(&[], 5))
}

fn high_cards_of(mut values: Vec<u8>) -> Vec<u8> {
    values.sort_by_key(|v| Reverse(*v));
    values
}

/// Ranks hands by standard poker categories with kicker tie-breaks.
#[derive(Clone, Copy, Debug, Default)]
pub struct PokerHandJudge;

impl ShowdownJudge for PokerHandJudge {
    fn winners(&self, hands: &BTreeMap<PlayerId, Vec<Card>>) -> Vec<PlayerId> {
        best_scoring(hands, evaluate_hand)
    }
}
