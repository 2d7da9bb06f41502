// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Implementations of [`crypto::ecdsa`] based on `p256`.
//!
//! Signing and verification both operate on precomputed digests (the
//! `hazmat` prehash traits); the pipeline hashes its inputs by streaming
//! and only ever hands 32-byte digests to the curve.
//!
//! [`crypto::ecdsa`]: crate::crypto::ecdsa

use p256::ecdsa::signature::hazmat::PrehashSigner;
use p256::ecdsa::signature::hazmat::PrehashVerifier;
use p256::ecdsa::Signature;
use p256::ecdsa::SigningKey;
use p256::ecdsa::VerifyingKey;
use p256::elliptic_curve::sec1::ToEncodedPoint;

use crate::crypto::ecdsa;
use crate::crypto::sha256;

/// A `p256`-based [`ecdsa::Verify`].
pub struct VerifyP256 {
    _priv: (),
}

impl VerifyP256 {
    /// Creates a new `VerifyP256`.
    pub fn new() -> Self {
        Self { _priv: () }
    }
}

impl Default for VerifyP256 {
    fn default() -> Self {
        Self::new()
    }
}

impl ecdsa::Verify for VerifyP256 {
    fn verify(
        &mut self,
        key: &ecdsa::PublicKey,
        digest: &sha256::Digest,
        signature: &ecdsa::Signature,
    ) -> Result<(), ecdsa::Error> {
        let key = VerifyingKey::from_sec1_bytes(&key[..])
            .map_err(|_| ecdsa::Error::Unspecified)?;
        let signature = Signature::from_slice(&signature[..])
            .map_err(|_| ecdsa::Error::Unspecified)?;
        key.verify_prehash(&digest[..], &signature)
            .map_err(|_| ecdsa::Error::BadSignature)
    }
}

/// A `p256`-based [`ecdsa::Sign`], for producer tooling and tests.
pub struct SignP256 {
    key: SigningKey,
}

impl SignP256 {
    /// Creates a new `SignP256` from a raw 32-byte secret scalar.
    ///
    /// Returns `None` if the scalar is not a valid P-256 secret key.
    pub fn from_bytes(bytes: &[u8; 32]) -> Option<Self> {
        let key = SigningKey::from_bytes(bytes.into()).ok()?;
        Some(Self { key })
    }

    /// Returns the uncompressed SEC1 encoding of the corresponding public
    /// key, as it appears in root metadata `keyval` fields.
    pub fn public_key(&self) -> ecdsa::PublicKey {
        let point = self.key.verifying_key().to_encoded_point(false);
        let mut out = [0u8; ecdsa::PUBLIC_KEY_SIZE];
        out.copy_from_slice(point.as_bytes());
        out
    }
}

impl ecdsa::Sign for SignP256 {
    fn sign(
        &mut self,
        digest: &sha256::Digest,
        signature: &mut ecdsa::Signature,
    ) -> Result<(), ecdsa::Error> {
        let sig: Signature = self
            .key
            .sign_prehash(&digest[..])
            .map_err(|_| ecdsa::Error::Unspecified)?;
        signature.copy_from_slice(&sig.to_bytes());
        Ok(())
    }
}
