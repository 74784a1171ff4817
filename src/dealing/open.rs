use std::collections::{BTreeMap, BTreeSet};

use super::draw::HandCard;
use crate::error::ProtocolError;
use crate::shuffling::group::{generator, GroupElement};
use crate::shuffling::{Card, ChaumPedersenProof, DeckCodec, MaskingKey};

const LOG_TARGET: &str = "mental_poker::dealing::open";

/// Public proof that deck position `index` holds `encoded_card`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CardOpening {
    pub index: usize,
    pub encoded_card: GroupElement,
    /// Shows the revealer's single-layer ciphertext is `encoded_card` under
    /// the key behind its announced public key. The scalar itself stays private.
    pub proof: ChaumPedersenProof,
}

/// One opening per held card.
pub fn open_hand(hand: &[HandCard], key: &MaskingKey, codec: &DeckCodec) -> Vec<CardOpening> {
    hand.iter()
        .map(|held| {
            let encoded_card = codec.encode(held.card);
            CardOpening {
                index: held.index,
                proof: key.prove_layer(&encoded_card),
                encoded_card,
            }
        })
        .collect()
}

/// Checks a peer's openings against the ciphertexts handed out to it during
/// the draw and returns the revealed cards by position.
///
/// `handed_out[i]` is the ciphertext at position `i` after the verifier
/// stripped its own layer; `revealer_key` is the public key the peer announced
/// before shuffling.
#[tracing::instrument(target = LOG_TARGET, skip_all, fields(openings = openings.len()))]
pub fn verify_hand(
    openings: &[CardOpening],
    claimed: &BTreeSet<usize>,
    handed_out: &BTreeMap<usize, GroupElement>,
    revealer_key: &GroupElement,
    codec: &DeckCodec,
) -> Result<BTreeMap<usize, Card>, ProtocolError> {
    let mut revealed = BTreeMap::new();
    let g = generator();

    for opening in openings {
        let index = opening.index;
        if !claimed.contains(&index) {
            return Err(ProtocolError::InvalidOpening {
                index,
                reason: "position was not drawn by the revealer",
            });
        }
        if revealed.contains_key(&index) {
            return Err(ProtocolError::InvalidOpening {
                index,
                reason: "position opened twice",
            });
        }

        let card = codec.decode(&opening.encoded_card)?;
        let partial = handed_out.get(&index).ok_or(ProtocolError::InvalidOpening {
            index,
            reason: "no ciphertext was handed out for this position",
        })?;
        if !opening
            .proof
            .verify(&g, &opening.encoded_card, revealer_key, partial)
        {
            tracing::warn!(target: LOG_TARGET, index, "opening does not match the dealt ciphertext");
            return Err(ProtocolError::InvalidOpening {
                index,
                reason: "card does not match the ciphertext handed out",
            });
        }
        revealed.insert(index, card);
    }

    if let Some(&missing) = claimed.iter().find(|index| !revealed.contains_key(index)) {
        return Err(ProtocolError::InvalidOpening {
            index: missing,
            reason: "drawn position was not opened",
        });
    }
    Ok(revealed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dealing::draw::{finish_draw, strip_own_layer};
    use crate::shuffling::cipher::unmask;
    use crate::shuffling::engine::shuffle;
    use crate::shuffling::Deck;
    use crate::test_utils::seeded_rng;

    const HELD: [usize; 2] = [10, 11];

    struct Table {
        alice: MaskingKey,
        bob: MaskingKey,
        deck: Deck,
        handed_out: BTreeMap<usize, GroupElement>,
        hand: Vec<HandCard>,
    }

    /// Alice holds positions 10 and 11 of a deck shuffled by both players.
    fn table(seed: u64) -> Table {
        let mut rng = seeded_rng(seed);
        let codec = DeckCodec::global();
        let alice = MaskingKey::generate(&mut rng);
        let bob = MaskingKey::generate(&mut rng);
        let (once, _) = shuffle(&codec.encoded_deck(), &alice, &mut rng).unwrap();
        let (deck, _) = shuffle(&once, &bob, &mut rng).unwrap();
        let partials = strip_own_layer(&deck, &HELD, &bob).unwrap();
        let handed_out = HELD.iter().copied().zip(partials.iter().copied()).collect();
        let hand = finish_draw(&partials, &HELD, &alice, codec).unwrap();
        Table {
            alice,
            bob,
            deck,
            handed_out,
            hand,
        }
    }

    fn claimed() -> BTreeSet<usize> {
        BTreeSet::from(HELD)
    }

    fn check(t: &Table, openings: &[CardOpening]) -> Result<BTreeMap<usize, Card>, ProtocolError> {
        verify_hand(
            openings,
            &claimed(),
            &t.handed_out,
            &t.alice.public_key(),
            DeckCodec::global(),
        )
    }

    #[test]
    fn honest_openings_verify() {
        let t = table(61);
        let openings = open_hand(&t.hand, &t.alice, DeckCodec::global());
        let revealed = check(&t, &openings).unwrap();
        assert_eq!(revealed[&10], t.hand[0].card);
        assert_eq!(revealed[&11], t.hand[1].card);
    }

    #[test]
    fn claiming_a_different_card_is_rejected() {
        let t = table(62);
        let codec = DeckCodec::global();
        let mut openings = open_hand(&t.hand, &t.alice, codec);
        let forged = (0..52)
            .filter_map(Card::from_index)
            .find(|c| *c != t.hand[0].card && *c != t.hand[1].card)
            .unwrap();
        // A fresh proof for the forged card still cannot match the dealt ciphertext.
        openings[0].encoded_card = codec.encode(forged);
        openings[0].proof = t.alice.prove_layer(&openings[0].encoded_card);
        assert_eq!(
            check(&t, &openings),
            Err(ProtocolError::InvalidOpening {
                index: 10,
                reason: "card does not match the ciphertext handed out"
            })
        );
    }

    #[test]
    fn proof_under_another_key_is_rejected() {
        let t = table(63);
        let codec = DeckCodec::global();
        let impostor = MaskingKey::generate(&mut seeded_rng(630));
        let openings = open_hand(&t.hand, &impostor, codec);
        assert!(matches!(
            check(&t, &openings),
            Err(ProtocolError::InvalidOpening { index: 10, .. })
        ));

        let honest = open_hand(&t.hand, &t.alice, codec);
        assert!(matches!(
            verify_hand(&honest, &claimed(), &t.handed_out, &t.bob.public_key(), codec),
            Err(ProtocolError::InvalidOpening { index: 10, .. })
        ));
    }

    #[test]
    fn openings_reveal_nothing_about_unclaimed_positions() {
        let t = table(64);
        let codec = DeckCodec::global();
        let openings = open_hand(&t.hand, &t.alice, codec);
        check(&t, &openings).unwrap();

        // Alice's masking scalar never appears in what she publishes.
        assert!(openings.iter().all(|o| o.proof.z != t.alice.disclose()));

        // With his own key and everything in the openings, Bob still cannot
        // decode a single position Alice did not open.
        let published: Vec<_> = openings.iter().map(|o| o.proof.z).collect();
        let mut decoded = 0;
        for (index, entry) in t.deck.iter().enumerate() {
            if HELD.contains(&index) {
                continue;
            }
            let partial = t.bob.unmask(entry).unwrap();
            if codec.decode(&partial).is_ok() {
                decoded += 1;
            }
            for scalar in &published {
                if codec.decode(&unmask(scalar, &partial).unwrap()).is_ok() {
                    decoded += 1;
                }
            }
        }
        assert_eq!(decoded, 0);
    }

    #[test]
    fn missing_duplicate_and_foreign_positions_are_rejected() {
        let t = table(65);
        let openings = open_hand(&t.hand, &t.alice, DeckCodec::global());

        assert!(matches!(
            check(&t, &openings[..1]),
            Err(ProtocolError::InvalidOpening { index: 11, .. })
        ));

        let doubled = vec![openings[0].clone(), openings[0].clone()];
        assert!(matches!(
            check(&t, &doubled),
            Err(ProtocolError::InvalidOpening { index: 10, .. })
        ));

        let mut foreign = openings.clone();
        foreign[0].index = 30;
        assert!(matches!(
            check(&t, &foreign),
            Err(ProtocolError::InvalidOpening { index: 30, .. })
        ));
    }

    #[test]
    fn non_card_point_is_unknown() {
        let t = table(66);
        let mut openings = open_hand(&t.hand, &t.alice, DeckCodec::global());
        openings[0].encoded_card = generator();
        assert_eq!(check(&t, &openings), Err(ProtocolError::UnknownCard));
    }
}
