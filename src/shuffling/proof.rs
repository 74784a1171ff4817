//! Cut-and-choose proof that one deck is a masked permutation of another.
//!
//! The prover re-shuffles the input deck `k` times with fresh randomness and
//! commits to each intermediate deck. Fiat-Shamir challenge bits then decide,
//! per round, whether to open the link from the input deck to the
//! intermediate deck or from the intermediate deck to the output deck. Either
//! opening alone reveals nothing about the permutation between input and
//! output; a cheating prover survives each round with probability 1/2.

use ark_ec::PrimeGroup;
use ark_ff::Zero;
use rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::cipher::MaskingKey;
use super::data_structures::{Deck, Permutation, DECK_SIZE};
use super::engine::apply_shuffle;
use super::group::{multiply, random_scalar, scalar_inverse, GroupElement, Scalar};
use super::transcript::{
    expand_bits, Digest, TranscriptHasher, DOMAIN_SHUFFLE_CHALLENGE, DOMAIN_SHUFFLE_COMMIT,
};
use crate::error::ProtocolError;

const LOG_TARGET: &str = "mental_poker::shuffling::proof";

/// Rounds below this leave a cheating shuffler better than 2^-16 odds.
pub const RECOMMENDED_ROUNDS: usize = 16;

/// Secret relation between the pre- and post-shuffle decks.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ShuffleWitness {
    pub permutation: Permutation,
    pub key: MaskingKey,
}

/// Opening of one cut-and-choose round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoundOpening {
    /// Challenge bit set: `D_i = apply_shuffle(old, permutation, scalar)`.
    FromInput {
        permutation: Permutation,
        #[serde(with = "crate::crypto_serde::scalar")]
        scalar: Scalar,
    },
    /// Challenge bit clear: `new = apply_shuffle(D_i, permutation, scalar)`.
    ToOutput {
        permutation: Permutation,
        #[serde(with = "crate::crypto_serde::scalar")]
        scalar: Scalar,
    },
}

impl RoundOpening {
    fn kind(&self) -> &'static str {
        match self {
            RoundOpening::FromInput { .. } => "from_input",
            RoundOpening::ToOutput { .. } => "to_output",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShuffleProof {
    pub commitments: Vec<Digest>,
    pub openings: Vec<RoundOpening>,
}

#[derive(Zeroize, ZeroizeOnDrop)]
struct RoundSecret {
    permutation: Permutation,
    scalar: Scalar,
}

fn commit_round(round: usize, deck: &[GroupElement]) -> Digest {
    let mut transcript = TranscriptHasher::new(DOMAIN_SHUFFLE_COMMIT);
    transcript.append_u64(round as u64).append_points(deck);
    transcript.finish()
}

/// Challenge bits binding the statement and every round commitment.
pub fn challenge_bits(
    old: &[GroupElement],
    new: &[GroupElement],
    commitments: &[Digest],
    rounds: usize,
) -> Vec<bool> {
    let mut transcript = TranscriptHasher::new(DOMAIN_SHUFFLE_CHALLENGE);
    transcript.append_points(old).append_points(new);
    transcript.append_u64(commitments.len() as u64);
    for commitment in commitments {
        transcript.append_digest(commitment);
    }
    expand_bits(&transcript.finish(), rounds)
}

#[tracing::instrument(target = LOG_TARGET, skip_all, fields(rounds = rounds))]
pub fn prove<R: Rng + CryptoRng>(
    old: &Deck,
    new: &Deck,
    witness: &ShuffleWitness,
    rounds: usize,
    rng: &mut R,
) -> Result<ShuffleProof, ProtocolError> {
    if rounds == 0 {
        return Err(ProtocolError::Config(
            "shuffle proof needs at least one round".to_string(),
        ));
    }

    let mut secrets = Vec::with_capacity(rounds);
    let mut commitments = Vec::with_capacity(rounds);
    for round in 0..rounds {
        let scalar = random_scalar(rng);
        let permutation = Permutation::random(old.len(), rng);
        let intermediate = apply_shuffle(old.as_slice(), &permutation, &scalar)?;
        commitments.push(commit_round(round, &intermediate));
        secrets.push(RoundSecret {
            permutation,
            scalar,
        });
    }

    let bits = challenge_bits(old.as_slice(), new.as_slice(), &commitments, rounds);
    let witness_scalar = witness.key.disclose();
    let mut openings = Vec::with_capacity(rounds);
    for (secret, bit) in secrets.iter().zip(&bits) {
        let opening = if *bit {
            RoundOpening::FromInput {
                permutation: secret.permutation.clone(),
                scalar: secret.scalar,
            }
        } else {
            RoundOpening::ToOutput {
                permutation: secret.permutation.inverse().compose(&witness.permutation)?,
                scalar: witness_scalar * scalar_inverse(&secret.scalar)?,
            }
        };
        openings.push(opening);
    }

    tracing::debug!(
        target: LOG_TARGET,
        from_input = bits.iter().filter(|b| **b).count(),
        "shuffle proof generated"
    );
    Ok(ShuffleProof {
        commitments,
        openings,
    })
}

/// Checks `proof` and returns the validated output deck.
#[tracing::instrument(target = LOG_TARGET, skip_all, fields(rounds = rounds))]
pub fn verify(
    old: &Deck,
    new: &[GroupElement],
    proof: &ShuffleProof,
    rounds: usize,
) -> Result<Deck, ProtocolError> {
    let new = Deck::new(new.to_vec())
        .map_err(|err| ProtocolError::shuffle_proof(format!("output deck malformed: {err}")))?;

    if proof.commitments.len() != rounds || proof.openings.len() != rounds {
        return Err(ProtocolError::shuffle_proof(format!(
            "expected {rounds} rounds, got {} commitments and {} openings",
            proof.commitments.len(),
            proof.openings.len()
        )));
    }

    let bits = challenge_bits(old.as_slice(), new.as_slice(), &proof.commitments, rounds);
    for (round, ((opening, commitment), bit)) in proof
        .openings
        .iter()
        .zip(&proof.commitments)
        .zip(&bits)
        .enumerate()
    {
        let intermediate = match (bit, opening) {
            (true, RoundOpening::FromInput { permutation, scalar }) => {
                check_opening_shape(round, permutation, scalar)?;
                apply_shuffle(old.as_slice(), permutation, scalar)?
            }
            (false, RoundOpening::ToOutput { permutation, scalar }) => {
                check_opening_shape(round, permutation, scalar)?;
                rebuild_intermediate(new.as_slice(), permutation, scalar)?
            }
            (expected_from_input, opening) => {
                return Err(ProtocolError::shuffle_proof(format!(
                    "round {round}: challenge asks for {}, got {}",
                    if *expected_from_input {
                        "from_input"
                    } else {
                        "to_output"
                    },
                    opening.kind()
                )));
            }
        };
        if commit_round(round, &intermediate) != *commitment {
            tracing::warn!(target: LOG_TARGET, round, "shuffle round commitment mismatch");
            return Err(ProtocolError::shuffle_proof(format!(
                "round {round}: opened deck does not match commitment"
            )));
        }
    }

    tracing::debug!(target: LOG_TARGET, digest = %new.digest(), "shuffle proof verified");
    Ok(new)
}

fn check_opening_shape(
    round: usize,
    permutation: &Permutation,
    scalar: &Scalar,
) -> Result<(), ProtocolError> {
    if permutation.len() != DECK_SIZE {
        return Err(ProtocolError::shuffle_proof(format!(
            "round {round}: permutation covers {} positions",
            permutation.len()
        )));
    }
    if Permutation::from_vec(permutation.as_slice().to_vec()).is_err() {
        return Err(ProtocolError::shuffle_proof(format!(
            "round {round}: permutation is not a bijection"
        )));
    }
    if scalar.is_zero() {
        return Err(ProtocolError::shuffle_proof(format!(
            "round {round}: zero scalar"
        )));
    }
    Ok(())
}

/// Inverts `new = apply_shuffle(D, sigma, t)` into `D[sigma[j]] = new[j]·t⁻¹`.
fn rebuild_intermediate(
    new: &[GroupElement],
    sigma: &Permutation,
    scalar: &Scalar,
) -> Result<Vec<GroupElement>, ProtocolError> {
    let inverse = scalar_inverse(scalar)?;
    let mut intermediate = vec![GroupElement::generator(); new.len()];
    for (card, &target) in new.iter().zip(sigma.as_slice()) {
        intermediate[target] = multiply(&inverse, card);
    }
    Ok(intermediate)
}
