// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Algorithm-generic SHA-256 traits.

use crate::io;

/// The number of bytes in a SHA-256 digest.
pub const DIGEST_SIZE: usize = 32;

/// A SHA-256 digest.
pub type Digest = [u8; DIGEST_SIZE];

/// An error returned by a SHA-256 operation.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Error {
    /// Indicates an error in a low-level [`io`] type, while streaming data
    /// into a hasher.
    Io(io::Error),

    /// Indicates an unspecified, internal error.
    Unspecified,
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// A builder for session-based SHA-256 hashers.
pub trait Builder {
    /// The hasher type this builder produces.
    type Hasher: Hasher;

    /// Begins a new hashing session.
    fn new_hasher(&self) -> Result<Self::Hasher, Error>;
}

/// A hashing session, maintaining the state for one digest.
pub trait Hasher: Sized {
    /// Adds `bytes` to the hashing state.
    fn write(&mut self, bytes: &[u8]) -> Result<(), Error>;

    /// Completes the session, writing the digest to `out`.
    fn finish(self, out: &mut Digest) -> Result<(), Error>;
}

/// Computes the digest of everything remaining in `r`, in one forward
/// pass of small fixed-size reads.
///
/// This is the only way the verification pipeline hashes anything: the
/// inputs (serialized metadata, target payloads) live in blob storage and
/// are never resident in memory all at once.
pub fn hash_reader(
    sha: &impl Builder,
    mut r: impl io::Read,
    out: &mut Digest,
) -> Result<(), Error> {
    let mut hasher = sha.new_hasher()?;
    let mut chunk = [0u8; 64];
    loop {
        let n = r.remaining_data().min(chunk.len());
        if n == 0 {
            break;
        }
        r.read_bytes(&mut chunk[..n])?;
        hasher.write(&chunk[..n])?;
    }
    hasher.finish(out)
}
