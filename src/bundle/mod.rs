// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Update-bundle verification.
//!
//! An update bundle is a single serialized [`UpdateBundle`] message
//! carrying (optionally) a signed root metadata, a map of signed targets
//! metadata, and a map of target payloads. Verification is a strictly
//! ordered pipeline over a [`Blob`] holding the bundle:
//!
//! 1. *Root upgrade*: if the bundle carries a new root, verify it under
//!    the current trust anchor *and* under itself, enforce root-version
//!    monotonicity, and persist it through the [`Backend`].
//! 2. *Targets metadata*: verify the top-level targets metadata under the
//!    trust anchor, then enforce targets-version monotonicity against the
//!    on-device manifest.
//! 3. *Target payloads*: check the size and SHA-256 digest of every
//!    target, against the bundled payload or (with personalization)
//!    against the previously accepted on-device manifest.
//!
//! Only after all three stages pass does [`UpdateBundleAccessor`] hand out
//! the authenticated [`ManifestAccessor`] and payload readers. Any stage
//! failure closes the accessor; the device keeps running what it has.
//!
//! [`UpdateBundle`]: format/index.html
//! [`Blob`]: crate::blob::Blob

use crate::blob;
use crate::crypto::ecdsa;
use crate::crypto::sha256;
use crate::io;
use crate::proto;

mod accessor;
mod backend;
mod manifest;
mod signature;

pub mod format;

#[cfg(feature = "std")]
pub mod owned;

pub use accessor::UpdateBundleAccessor;
pub use backend::Backend;
pub use manifest::ManifestAccessor;

/// The hard upper bound on the byte length of a target file name.
///
/// Names are read into fixed stack buffers of this capacity; a bundle
/// declaring a longer name is rejected with [`Error::OutOfRange`].
pub const MAX_TARGET_NAME_LENGTH: usize = 64;

/// The default value of [`Config::max_target_payload_size`].
pub const DEFAULT_MAX_TARGET_PAYLOAD_SIZE: u64 = 256 * 1024;

/// An error returned by a bundle operation.
///
/// Variants are semantic, not source-typed: every failure inside the
/// pipeline is folded into the category a caller can act on.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Error {
    /// A signature check failed, a rollback was detected, or payload
    /// integrity did not check out. The bundle is rejected.
    Unauthenticated,

    /// Something that was looked up is not there: a metadata field, a map
    /// entry, a target, or the on-device manifest. Also the internal
    /// sentinel for "no signatures at all", which self-verification mode
    /// uses to tolerate unsigned bundles.
    NotFound,

    /// A declared size exceeds a configured maximum.
    OutOfRange,

    /// A caller-provided buffer is too small to hold a string being read.
    ResourceExhausted,

    /// Structurally malformed input, such as a key id of the wrong size
    /// or invalid wire data.
    Internal,

    /// A public operation was invoked in an accessor state that does not
    /// permit it, such as reading the manifest before verification.
    FailedPrecondition,
}

impl From<proto::Error> for Error {
    fn from(e: proto::Error) -> Self {
        match e {
            proto::Error::FieldNotFound => Self::NotFound,
            proto::Error::BufferTooSmall => Self::ResourceExhausted,
            proto::Error::WrongWireType
            | proto::Error::Malformed
            | proto::Error::Blob(_)
            | proto::Error::Io(_) => Self::Internal,
        }
    }
}

impl From<blob::Error> for Error {
    fn from(_: blob::Error) -> Self {
        Self::Internal
    }
}

impl From<io::Error> for Error {
    fn from(_: io::Error) -> Self {
        Self::Internal
    }
}

impl From<sha256::Error> for Error {
    fn from(_: sha256::Error) -> Self {
        Self::Internal
    }
}

impl From<ecdsa::Error> for Error {
    fn from(_: ecdsa::Error) -> Self {
        Self::Internal
    }
}

/// Verification configuration, fixed at accessor construction.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Config {
    /// Selects self-verification mode: the bundle acts as its own trust
    /// anchor, unsigned bundles are tolerated, and neither persistence
    /// nor rollback checks are performed. A diagnostic mode; never ship
    /// it enabled.
    pub disable_verification: bool,

    /// Permits targets whose payloads have been personalized out of the
    /// bundle, verifying them against the on-device manifest instead.
    pub personalization: bool,

    /// The hard upper bound on any single target's declared length.
    pub max_target_payload_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            disable_verification: false,
            personalization: false,
            max_target_payload_size: DEFAULT_MAX_TARGET_PAYLOAD_SIZE,
        }
    }
}
