// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Algorithm-generic ECDSA-P256 traits.
//!
//! Keys and signatures are fixed-width: a public key is the 65-byte
//! uncompressed SEC1 encoding, and a signature is the 64-byte `r ‖ s`
//! encoding. Inputs of the wrong size never reach an engine; callers copy
//! wire bytes into fixed-size buffers first.

use crate::crypto::sha256;

/// The number of bytes in an uncompressed P-256 public key.
pub const PUBLIC_KEY_SIZE: usize = 65;

/// The number of bytes in a fixed-width P-256 signature.
pub const SIGNATURE_SIZE: usize = 64;

/// An uncompressed P-256 public key.
pub type PublicKey = [u8; PUBLIC_KEY_SIZE];

/// A fixed-width P-256 signature.
pub type Signature = [u8; SIGNATURE_SIZE];

/// An error returned by a signature operation.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Error {
    /// Indicates that a signature did not check out against the given key
    /// and digest.
    BadSignature,

    /// Indicates an unspecified, internal error, such as a public key that
    /// is not a valid curve point.
    Unspecified,
}

/// A signature-verification engine.
///
/// Unlike a hashing session, verification is a single fixed-size
/// operation; the digest of the signed message is computed separately by
/// streaming (see [`sha256::hash_reader()`]).
pub trait Verify {
    /// Verifies `signature` over `digest` with `key`.
    ///
    /// Returns `Ok(())` only if the signature checks out; a mismatch is
    /// [`Error::BadSignature`].
    fn verify(
        &mut self,
        key: &PublicKey,
        digest: &sha256::Digest,
        signature: &Signature,
    ) -> Result<(), Error>;
}

/// A signing engine, already primed with a keypair.
///
/// The verification pipeline never signs; this trait exists for producer
/// tooling and tests. There is no way to extract the private key back out
/// of a `Sign` value.
pub trait Sign {
    /// Signs `digest`, writing the signature to `signature`.
    fn sign(
        &mut self,
        digest: &sha256::Digest,
        signature: &mut Signature,
    ) -> Result<(), Error>;
}
