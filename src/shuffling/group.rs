//! Prime-order group wrapper used by every layer of the card protocol.
//!
//! The group is BN254 G1 (cofactor 1), so every non-identity point on the
//! curve generates the whole group and canonical compressed encodings are
//! 32 bytes long.

use ark_ec::{AffineRepr, CurveGroup, PrimeGroup};
use ark_ff::{Field, UniformRand, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use rand::{CryptoRng, Rng};

use crate::error::ProtocolError;

pub type GroupElement = ark_bn254::G1Projective;
pub type GroupAffine = ark_bn254::G1Affine;
pub type Scalar = ark_bn254::Fr;
pub type BaseField = ark_bn254::Fq;

/// Compressed size of a group element.
pub const POINT_BYTES: usize = 32;
/// Canonical little-endian size of a scalar.
pub const SCALAR_BYTES: usize = 32;

/// Sample a scalar uniformly from `[1, n-1]`.
pub fn random_scalar<R: Rng + CryptoRng>(rng: &mut R) -> Scalar {
    loop {
        let candidate = Scalar::rand(rng);
        if !candidate.is_zero() {
            return candidate;
        }
    }
}

pub fn scalar_inverse(scalar: &Scalar) -> Result<Scalar, ProtocolError> {
    scalar
        .inverse()
        .ok_or(ProtocolError::Domain("scalar has no inverse modulo the group order"))
}

#[inline]
pub fn multiply(scalar: &Scalar, point: &GroupElement) -> GroupElement {
    *point * scalar
}

#[inline]
pub fn add(lhs: &GroupElement, rhs: &GroupElement) -> GroupElement {
    *lhs + rhs
}

pub fn generator() -> GroupElement {
    GroupElement::generator()
}

/// Canonical compressed encoding of a single point.
pub fn encode_point(point: &GroupElement) -> Vec<u8> {
    encode_affine(&point.into_affine())
}

pub(crate) fn encode_affine(point: &GroupAffine) -> Vec<u8> {
    let mut buf = Vec::with_capacity(POINT_BYTES);
    point
        .serialize_compressed(&mut buf)
        .expect("writing to a Vec cannot fail");
    buf
}

/// Canonical encodings for a batch of points, sharing one field inversion.
pub fn encode_points(points: &[GroupElement]) -> Vec<Vec<u8>> {
    GroupElement::normalize_batch(points)
        .iter()
        .map(encode_affine)
        .collect()
}

pub fn decode_point(bytes: &[u8]) -> Result<GroupElement, ProtocolError> {
    if bytes.len() != POINT_BYTES {
        return Err(ProtocolError::Format(format!(
            "expected {POINT_BYTES} byte point encoding, got {}",
            bytes.len()
        )));
    }
    let affine = GroupAffine::deserialize_compressed(bytes)
        .map_err(|err| ProtocolError::Format(format!("invalid point encoding: {err}")))?;
    let point = affine.into_group();
    if point.is_zero() {
        return Err(ProtocolError::Format(
            "identity element is not a valid ciphertext".to_string(),
        ));
    }
    Ok(point)
}

pub fn encode_scalar(scalar: &Scalar) -> Vec<u8> {
    let mut buf = Vec::with_capacity(SCALAR_BYTES);
    scalar
        .serialize_compressed(&mut buf)
        .expect("writing to a Vec cannot fail");
    buf
}

pub fn decode_scalar(bytes: &[u8]) -> Result<Scalar, ProtocolError> {
    if bytes.len() != SCALAR_BYTES {
        return Err(ProtocolError::Format(format!(
            "expected {SCALAR_BYTES} byte scalar encoding, got {}",
            bytes.len()
        )));
    }
    let scalar = Scalar::deserialize_compressed(bytes)
        .map_err(|err| ProtocolError::Format(format!("non-canonical scalar: {err}")))?;
    if scalar.is_zero() {
        return Err(ProtocolError::Domain("zero scalar"));
    }
    Ok(scalar)
}
