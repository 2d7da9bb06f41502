// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! The update-bundle wire schema.
//!
//! Bundles are protobuf messages; this module pins down the field numbers
//! the lazy view is pointed at. The schema, in proto terms:
//!
//! ```text
//! message UpdateBundle {
//!   SignedRootMetadata root_metadata = 1;                    // optional
//!   map<string, SignedTargetsMetadata> targets_metadata = 2; // key "targets"
//!   map<string, bytes> target_payloads = 3;
//! }
//!
//! message SignedRootMetadata {
//!   bytes serialized_root_metadata = 1;  // signature subject
//!   repeated Signature signatures = 2;
//! }
//!
//! message SignedTargetsMetadata {
//!   bytes serialized_targets_metadata = 1;  // signature subject
//!   repeated Signature signatures = 2;
//! }
//!
//! message Signature {
//!   bytes key_id = 1;  // 32 bytes
//!   bytes sig = 2;     // 64 bytes
//! }
//!
//! message RootMetadata {
//!   CommonMetadata common_metadata = 1;
//!   map<string, Key> keys = 2;  // key: the raw 32-byte key id
//!   SignatureRequirement root_signature_requirement = 3;
//!   SignatureRequirement targets_signature_requirement = 4;
//! }
//!
//! message SignatureRequirement {
//!   uint32 threshold = 1;
//!   repeated bytes key_ids = 2;  // 32 bytes each
//! }
//!
//! message Key {
//!   string key_type = 1;
//!   string scheme = 2;
//!   bytes keyval = 3;  // 65-byte uncompressed P-256 point
//! }
//!
//! message TargetsMetadata {
//!   CommonMetadata common_metadata = 1;
//!   repeated TargetFile target_files = 2;
//! }
//!
//! message CommonMetadata {
//!   string role = 1;
//!   uint32 version = 2;
//! }
//!
//! message TargetFile {
//!   string file_name = 1;
//!   uint64 length = 2;
//!   repeated Hash hashes = 3;
//! }
//!
//! message Hash {
//!   HashFunction function = 1;
//!   bytes hash = 2;
//! }
//! ```
//!
//! The `keys` map is string-keyed on the wire but its keys are the raw
//! 32-byte key ids; lookups reinterpret the id bytes as the map key
//! without any encoding.

/// The well-known name of the top-level targets metadata in
/// `UpdateBundle.targets_metadata`.
pub const TOP_LEVEL_TARGETS_NAME: &str = "targets";

/// The number of bytes in a key id (a SHA-256 of the key's type, scheme,
/// and value, derived by the producer).
pub const KEY_ID_SIZE: usize = 32;

/// Field numbers of `UpdateBundle`.
pub mod update_bundle {
    /// `SignedRootMetadata root_metadata`.
    pub const ROOT_METADATA: u32 = 1;
    /// `map<string, SignedTargetsMetadata> targets_metadata`.
    pub const TARGETS_METADATA: u32 = 2;
    /// `map<string, bytes> target_payloads`.
    pub const TARGET_PAYLOADS: u32 = 3;
}

/// Field numbers of `SignedRootMetadata`.
pub mod signed_root_metadata {
    /// `bytes serialized_root_metadata`.
    pub const SERIALIZED_ROOT_METADATA: u32 = 1;
    /// `repeated Signature signatures`.
    pub const SIGNATURES: u32 = 2;
}

/// Field numbers of `SignedTargetsMetadata`.
pub mod signed_targets_metadata {
    /// `bytes serialized_targets_metadata`.
    pub const SERIALIZED_TARGETS_METADATA: u32 = 1;
    /// `repeated Signature signatures`.
    pub const SIGNATURES: u32 = 2;
}

/// Field numbers of `Signature`.
pub mod signature {
    /// `bytes key_id`.
    pub const KEY_ID: u32 = 1;
    /// `bytes sig`.
    pub const SIG: u32 = 2;
}

/// Field numbers of `RootMetadata`.
pub mod root_metadata {
    /// `CommonMetadata common_metadata`.
    pub const COMMON_METADATA: u32 = 1;
    /// `map<string, Key> keys`.
    pub const KEYS: u32 = 2;
    /// `SignatureRequirement root_signature_requirement`.
    pub const ROOT_SIGNATURE_REQUIREMENT: u32 = 3;
    /// `SignatureRequirement targets_signature_requirement`.
    pub const TARGETS_SIGNATURE_REQUIREMENT: u32 = 4;
}

/// Field numbers of `SignatureRequirement`.
pub mod signature_requirement {
    /// `uint32 threshold`.
    pub const THRESHOLD: u32 = 1;
    /// `repeated bytes key_ids`.
    pub const KEY_IDS: u32 = 2;
}

/// Field numbers of `Key`.
pub mod key {
    /// `string key_type`.
    pub const KEY_TYPE: u32 = 1;
    /// `string scheme`.
    pub const SCHEME: u32 = 2;
    /// `bytes keyval`.
    pub const KEYVAL: u32 = 3;
}

/// Field numbers of `TargetsMetadata`.
pub mod targets_metadata {
    /// `CommonMetadata common_metadata`.
    pub const COMMON_METADATA: u32 = 1;
    /// `repeated TargetFile target_files`.
    pub const TARGET_FILES: u32 = 2;
}

/// Field numbers of `CommonMetadata`.
pub mod common_metadata {
    /// `string role`.
    pub const ROLE: u32 = 1;
    /// `uint32 version`.
    pub const VERSION: u32 = 2;
}

/// Field numbers of `TargetFile`.
pub mod target_file {
    /// `string file_name`.
    pub const FILE_NAME: u32 = 1;
    /// `uint64 length`.
    pub const LENGTH: u32 = 2;
    /// `repeated Hash hashes`.
    pub const HASHES: u32 = 3;
}

/// Field numbers of `Hash`.
pub mod hash {
    /// `HashFunction function`.
    pub const FUNCTION: u32 = 1;
    /// `bytes hash`.
    pub const HASH: u32 = 2;
}

/// The `HashFunction` wire enum.
///
/// Only SHA-256 is honored by verification; entries with any other
/// function are skipped.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HashFunction {
    /// An unknown or unset hash function.
    Unknown,
    /// SHA-256.
    Sha256,
}

impl HashFunction {
    /// The wire value of this function.
    pub fn to_wire_value(self) -> u32 {
        match self {
            Self::Unknown => 0,
            Self::Sha256 => 1,
        }
    }

    /// Parses a wire value; unrecognized values are `None`.
    pub fn from_wire_value(wire: u32) -> Option<Self> {
        match wire {
            0 => Some(Self::Unknown),
            1 => Some(Self::Sha256),
            _ => None,
        }
    }
}
