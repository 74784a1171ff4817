//! Chaum-Pedersen proof of discrete-log equality.
//!
//! Shows that `alpha = g·x` and `beta = h·x` share the secret `x` without
//! revealing it. Card openings use it with `g` the group generator, `alpha`
//! the revealer's public key, `h` the claimed card and `beta` the ciphertext
//! that carried only the revealer's layer.

use ark_ff::{PrimeField, Zero};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use super::group::{encode_scalar, multiply, GroupElement, Scalar};
use super::transcript::{TranscriptHasher, DOMAIN_DLEQ_CHALLENGE, DOMAIN_DLEQ_NONCE};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaumPedersenProof {
    /// `g·w`
    #[serde(with = "crate::crypto_serde::curve")]
    pub t_g: GroupElement,
    /// `h·w`
    #[serde(with = "crate::crypto_serde::curve")]
    pub t_h: GroupElement,
    /// `w + c·x`
    #[serde(with = "crate::crypto_serde::scalar")]
    pub z: Scalar,
}

impl ChaumPedersenProof {
    /// Deterministic in its inputs; the nonce is derived from the secret and
    /// the statement.
    pub fn generate(
        secret: &Scalar,
        g: &GroupElement,
        h: &GroupElement,
        alpha: &GroupElement,
        beta: &GroupElement,
    ) -> Self {
        let w = derive_nonce(secret, &[*g, *h, *alpha, *beta]);
        let t_g = multiply(&w, g);
        let t_h = multiply(&w, h);
        let challenge = compute_challenge(g, h, alpha, beta, &t_g, &t_h);
        Self {
            t_g,
            t_h,
            z: w + challenge * secret,
        }
    }

    pub fn verify(
        &self,
        g: &GroupElement,
        h: &GroupElement,
        alpha: &GroupElement,
        beta: &GroupElement,
    ) -> bool {
        if self.t_g.is_zero() || self.t_h.is_zero() {
            return false;
        }
        let challenge = compute_challenge(g, h, alpha, beta, &self.t_g, &self.t_h);
        multiply(&self.z, g) == self.t_g + multiply(&challenge, alpha)
            && multiply(&self.z, h) == self.t_h + multiply(&challenge, beta)
    }
}

fn derive_nonce(secret: &Scalar, statement: &[GroupElement]) -> Scalar {
    let mut secret_bytes = encode_scalar(secret);
    let mut counter = 0u64;
    let nonce = loop {
        let mut transcript = TranscriptHasher::new(DOMAIN_DLEQ_NONCE);
        transcript
            .append_bytes(&secret_bytes)
            .append_points(statement)
            .append_u64(counter);
        let candidate = Scalar::from_le_bytes_mod_order(transcript.finish().as_bytes());
        if !candidate.is_zero() {
            break candidate;
        }
        counter += 1;
    };
    secret_bytes.zeroize();
    nonce
}

fn compute_challenge(
    g: &GroupElement,
    h: &GroupElement,
    alpha: &GroupElement,
    beta: &GroupElement,
    t_g: &GroupElement,
    t_h: &GroupElement,
) -> Scalar {
    let mut transcript = TranscriptHasher::new(DOMAIN_DLEQ_CHALLENGE);
    transcript.append_points(&[*g, *h, *alpha, *beta, *t_g, *t_h]);
    Scalar::from_le_bytes_mod_order(transcript.finish().as_bytes())
}
