// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! `wyvern` is a streaming verifier for TUF-style signed software-update
//! bundles, intended for resource-constrained devices.
//!
//! A bundle is an opaque serialized blob delivered to the device by some
//! transport `wyvern` knows nothing about. The [`bundle::UpdateBundleAccessor`]
//! facade attaches to the blob, establishes that it is authentic and fresh
//! with respect to the device's trust anchor, and then hands out an
//! authenticated view of the bundle's manifest together with streaming
//! access to the target payloads.
//!
//! The verified artifact is potentially larger than RAM, so nothing in
//! this crate ever materializes a bundle. All metadata access goes through
//! the lazy [`proto`] view, and every hash and signature input is computed
//! by streaming over a byte interval of the underlying [`blob::Blob`].
//!
//! Device-side storage (the trusted root metadata and the accepted
//! manifest) is owned by a [`bundle::Backend`] implementation provided by
//! the integrator; `wyvern` defines only the ordering contract.
//!
//! # Feature flags
//!
//! - `std` (default) pulls in the full Rust standard library. This is not
//!   necessary for any on-device use-cases, but enables the
//!   [`bundle::owned`] builder types for host-side tooling and tests.
//! - `soft` (default) enables the [`crypto::soft`] module, which provides
//!   software implementations for the cryptography traits used by
//!   `wyvern`. This feature is not intended for on-device use-cases
//!   either.
//! - `log` (default) enables logging; without it, log statements (format
//!   strings included) are compiled out of the final binary.
//! - `serde` enables implementations of `serde`'s (de)serialization
//!   traits for the owned bundle types.
//! - `disable-bundle-verification` turns the entire verification step
//!   into a log-and-pass no-op. For bring-up only; never ship it.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

#[macro_use]
mod debug;

pub mod blob;
pub mod bundle;
pub mod crypto;
pub mod io;
pub mod proto;
