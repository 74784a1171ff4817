//! Commutative masking: `mask(s, c) = c·s`, `unmask(s, c) = c·s⁻¹`.
//!
//! Layers applied by different players commute, so they can be added and
//! stripped in any order.

use std::fmt;

use rand::{CryptoRng, Rng};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::chaum_pedersen::ChaumPedersenProof;
use super::group::{generator, multiply, random_scalar, scalar_inverse, GroupElement, Scalar};
use crate::error::ProtocolError;

pub fn mask(scalar: &Scalar, ciphertext: &GroupElement) -> GroupElement {
    multiply(scalar, ciphertext)
}

pub fn unmask(scalar: &Scalar, ciphertext: &GroupElement) -> Result<GroupElement, ProtocolError> {
    Ok(multiply(&scalar_inverse(scalar)?, ciphertext))
}

/// A player's secret masking scalar.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MaskingKey {
    scalar: Scalar,
}

impl MaskingKey {
    pub fn generate<R: Rng + CryptoRng>(rng: &mut R) -> Self {
        Self {
            scalar: random_scalar(rng),
        }
    }

    pub fn from_scalar(scalar: Scalar) -> Result<Self, ProtocolError> {
        // Rejects zero.
        scalar_inverse(&scalar)?;
        Ok(Self { scalar })
    }

    pub fn mask(&self, ciphertext: &GroupElement) -> GroupElement {
        mask(&self.scalar, ciphertext)
    }

    pub fn unmask(&self, ciphertext: &GroupElement) -> Result<GroupElement, ProtocolError> {
        unmask(&self.scalar, ciphertext)
    }

    pub fn mask_all(&self, ciphertexts: &[GroupElement]) -> Vec<GroupElement> {
        ciphertexts.iter().map(|c| self.mask(c)).collect()
    }

    /// Strips this layer from every ciphertext with a single inversion.
    pub fn unmask_all(&self, ciphertexts: &[GroupElement]) -> Result<Vec<GroupElement>, ProtocolError> {
        let inverse = scalar_inverse(&self.scalar)?;
        Ok(ciphertexts.iter().map(|c| multiply(&inverse, c)).collect())
    }

    /// `G·scalar`, announced before the first shuffle.
    pub fn public_key(&self) -> GroupElement {
        multiply(&self.scalar, &generator())
    }

    /// Proves that `self.mask(base)` carries this key's layer without
    /// revealing the scalar.
    pub fn prove_layer(&self, base: &GroupElement) -> ChaumPedersenProof {
        ChaumPedersenProof::generate(
            &self.scalar,
            &generator(),
            base,
            &self.public_key(),
            &self.mask(base),
        )
    }

    /// The raw scalar, for building shuffle proof witnesses.
    pub(crate) fn disclose(&self) -> Scalar {
        self.scalar
    }
}

impl fmt::Debug for MaskingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MaskingKey(<redacted>)")
    }
}
