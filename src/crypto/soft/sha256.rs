// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Implementations of [`crypto::sha256`] based on `sha2`.
//!
//! [`crypto::sha256`]: crate::crypto::sha256

use sha2::Digest as _;
use sha2::Sha256;

use crate::crypto::sha256;

/// A `sha2`-based [`sha256::Builder`].
pub struct Builder {
    _priv: (),
}

impl Builder {
    /// Creates a new `Builder`.
    pub fn new() -> Self {
        Self { _priv: () }
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl sha256::Builder for Builder {
    type Hasher = Hasher;

    fn new_hasher(&self) -> Result<Hasher, sha256::Error> {
        Ok(Hasher {
            ctx: Sha256::new(),
        })
    }
}

/// A `sha2`-based [`sha256::Hasher`].
pub struct Hasher {
    ctx: Sha256,
}

impl sha256::Hasher for Hasher {
    fn write(&mut self, bytes: &[u8]) -> Result<(), sha256::Error> {
        self.ctx.update(bytes);
        Ok(())
    }

    fn finish(self, out: &mut sha256::Digest) -> Result<(), sha256::Error> {
        out.copy_from_slice(&self.ctx.finalize());
        Ok(())
    }
}
