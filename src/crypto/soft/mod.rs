// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Software implementations of the crypto traits, based on the
//! RustCrypto `sha2` and `p256` crates.
//!
//! These are intended for host-side tooling and tests; devices are
//! expected to plug their own (usually hardware-backed) implementations
//! into [`crate::crypto::sha256`] and [`crate::crypto::ecdsa`].

pub mod ecdsa;
pub mod sha256;
