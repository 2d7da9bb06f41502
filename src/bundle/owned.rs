// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Owned update-bundle messages.
//!
//! This module provides heap-allocated bundle types plus a wire encoder,
//! intended for tooling (and tests) to make building arbitrary bundles
//! easy and straight-forward. The verifier itself never allocates; it
//! consumes the encoded bytes through the lazy [`proto`] view.
//!
//! When the `serde` feature is enabled, owned bundles can be
//! de/serialized.
//!
//! [`proto`]: crate::proto

use crate::bundle::format;
use crate::bundle::format::HashFunction;
use crate::bundle::Error;
use crate::crypto::ecdsa;
use crate::crypto::sha256;
use crate::crypto::sha256::Hasher;
use crate::proto::wire::MAP_KEY;
use crate::proto::wire::MAP_VALUE;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A 32-byte key id, as used in signature allow-lists and key mappings.
pub type KeyId = [u8; format::KEY_ID_SIZE];

/// Appends a base-128 varint to `out`.
pub fn encode_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Appends a varint-typed field to `out`.
pub fn encode_varint_field(out: &mut Vec<u8>, field: u32, value: u64) {
    encode_varint(out, (field as u64) << 3);
    encode_varint(out, value);
}

/// Appends a length-delimited field (bytes, string, or nested message) to
/// `out`.
pub fn encode_delimited(out: &mut Vec<u8>, field: u32, payload: &[u8]) {
    encode_varint(out, ((field as u64) << 3) | 2);
    encode_varint(out, payload.len() as u64);
    out.extend_from_slice(payload);
}

fn encode_map_entry(
    out: &mut Vec<u8>,
    field: u32,
    key: &[u8],
    value: &[u8],
) {
    let mut entry = Vec::new();
    encode_delimited(&mut entry, MAP_KEY, key);
    encode_delimited(&mut entry, MAP_VALUE, value);
    encode_delimited(out, field, &entry);
}

/// Derives the id of `key`: the SHA-256 of its type, scheme, and value,
/// in that order.
///
/// Producers must use this derivation; the verifier takes it as a
/// precondition and never re-checks it.
pub fn key_id(
    sha: &impl sha256::Builder,
    key: &Key,
) -> Result<KeyId, Error> {
    let mut hasher = sha.new_hasher()?;
    hasher.write(key.key_type.as_bytes())?;
    hasher.write(key.scheme.as_bytes())?;
    hasher.write(&key.keyval)?;
    let mut id = sha256::Digest::default();
    hasher.finish(&mut id)?;
    Ok(id)
}

/// Signs `message` with `signer`, producing a [`Signature`] attributed to
/// `key_id`.
pub fn sign_metadata(
    sha: &impl sha256::Builder,
    signer: &mut impl ecdsa::Sign,
    key_id: KeyId,
    message: &[u8],
) -> Result<Signature, Error> {
    let mut digest = sha256::Digest::default();
    let mut hasher = sha.new_hasher()?;
    hasher.write(message)?;
    hasher.finish(&mut digest)?;

    let mut sig = [0u8; ecdsa::SIGNATURE_SIZE];
    signer.sign(&digest, &mut sig)?;
    Ok(Signature {
        key_id,
        sig: sig.to_vec(),
    })
}

/// An owned `UpdateBundle`.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bundle {
    /// The signed root metadata this bundle upgrades the device to, if
    /// any.
    pub root_metadata: Option<SignedRootMetadata>,
    /// Signed targets metadata by name; the verifier consults the entry
    /// named [`format::TOP_LEVEL_TARGETS_NAME`].
    pub targets_metadata: Vec<(String, SignedTargetsMetadata)>,
    /// Target payloads by name.
    pub target_payloads: Vec<(String, Vec<u8>)>,
}

impl Bundle {
    /// Encodes this bundle to its wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        if let Some(root) = &self.root_metadata {
            encode_delimited(
                &mut out,
                format::update_bundle::ROOT_METADATA,
                &root.encode(),
            );
        }
        for (name, metadata) in &self.targets_metadata {
            encode_map_entry(
                &mut out,
                format::update_bundle::TARGETS_METADATA,
                name.as_bytes(),
                &metadata.encode(),
            );
        }
        for (name, payload) in &self.target_payloads {
            encode_map_entry(
                &mut out,
                format::update_bundle::TARGET_PAYLOADS,
                name.as_bytes(),
                payload,
            );
        }
        out
    }
}

/// An owned `SignedRootMetadata`.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SignedRootMetadata {
    /// The serialized [`RootMetadata`]; the exact signature subject.
    pub serialized_root_metadata: Vec<u8>,
    /// Signatures over the serialized metadata.
    pub signatures: Vec<Signature>,
}

impl SignedRootMetadata {
    /// Wraps an encoded [`RootMetadata`], unsigned.
    pub fn new(root: &RootMetadata) -> Self {
        Self {
            serialized_root_metadata: root.encode(),
            signatures: Vec::new(),
        }
    }

    /// Appends a signature over the serialized metadata.
    pub fn sign(
        &mut self,
        sha: &impl sha256::Builder,
        signer: &mut impl ecdsa::Sign,
        key_id: KeyId,
    ) -> Result<(), Error> {
        let signature = sign_metadata(
            sha,
            signer,
            key_id,
            &self.serialized_root_metadata,
        )?;
        self.signatures.push(signature);
        Ok(())
    }

    /// Encodes this message to its wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        encode_delimited(
            &mut out,
            format::signed_root_metadata::SERIALIZED_ROOT_METADATA,
            &self.serialized_root_metadata,
        );
        for signature in &self.signatures {
            encode_delimited(
                &mut out,
                format::signed_root_metadata::SIGNATURES,
                &signature.encode(),
            );
        }
        out
    }
}

/// An owned `SignedTargetsMetadata`.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SignedTargetsMetadata {
    /// The serialized [`TargetsMetadata`]; the exact signature subject.
    pub serialized_targets_metadata: Vec<u8>,
    /// Signatures over the serialized metadata.
    pub signatures: Vec<Signature>,
}

impl SignedTargetsMetadata {
    /// Wraps an encoded [`TargetsMetadata`], unsigned.
    pub fn new(targets: &TargetsMetadata) -> Self {
        Self {
            serialized_targets_metadata: targets.encode(),
            signatures: Vec::new(),
        }
    }

    /// Appends a signature over the serialized metadata.
    pub fn sign(
        &mut self,
        sha: &impl sha256::Builder,
        signer: &mut impl ecdsa::Sign,
        key_id: KeyId,
    ) -> Result<(), Error> {
        let signature = sign_metadata(
            sha,
            signer,
            key_id,
            &self.serialized_targets_metadata,
        )?;
        self.signatures.push(signature);
        Ok(())
    }

    /// Encodes this message to its wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        encode_delimited(
            &mut out,
            format::signed_targets_metadata::SERIALIZED_TARGETS_METADATA,
            &self.serialized_targets_metadata,
        );
        for signature in &self.signatures {
            encode_delimited(
                &mut out,
                format::signed_targets_metadata::SIGNATURES,
                &signature.encode(),
            );
        }
        out
    }
}

/// An owned `Signature`.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Signature {
    /// The id of the signing key.
    pub key_id: KeyId,
    /// The 64-byte fixed-width signature.
    pub sig: Vec<u8>,
}

impl Signature {
    /// Encodes this message to its wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        encode_delimited(&mut out, format::signature::KEY_ID, &self.key_id);
        encode_delimited(&mut out, format::signature::SIG, &self.sig);
        out
    }
}

/// An owned `RootMetadata`.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RootMetadata {
    /// Role and version information.
    pub common_metadata: CommonMetadata,
    /// The key mapping: every key the root names, by id.
    pub keys: Vec<(KeyId, Key)>,
    /// The requirement for signatures over the root metadata itself.
    pub root_signature_requirement: SignatureRequirement,
    /// The requirement for signatures over the targets metadata.
    pub targets_signature_requirement: SignatureRequirement,
}

impl RootMetadata {
    /// Encodes this message to its wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        encode_delimited(
            &mut out,
            format::root_metadata::COMMON_METADATA,
            &self.common_metadata.encode(),
        );
        for (id, key) in &self.keys {
            // Key ids go on the wire as the string key of the map, raw.
            encode_map_entry(
                &mut out,
                format::root_metadata::KEYS,
                id,
                &key.encode(),
            );
        }
        encode_delimited(
            &mut out,
            format::root_metadata::ROOT_SIGNATURE_REQUIREMENT,
            &self.root_signature_requirement.encode(),
        );
        encode_delimited(
            &mut out,
            format::root_metadata::TARGETS_SIGNATURE_REQUIREMENT,
            &self.targets_signature_requirement.encode(),
        );
        out
    }
}

/// An owned `CommonMetadata`.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CommonMetadata {
    /// The role this metadata plays ("root" or "targets").
    pub role: String,
    /// The metadata version, a monotonically increasing integer.
    ///
    /// When minting new metadata, a signing authority should make sure to
    /// bump this value; devices refuse to move to a smaller one.
    pub version: u32,
}

impl CommonMetadata {
    /// Convenience method for creating a `CommonMetadata` without having
    /// to use a struct literal.
    pub fn new(role: &str, version: u32) -> Self {
        Self {
            role: role.to_string(),
            version,
        }
    }

    /// Encodes this message to its wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        encode_delimited(
            &mut out,
            format::common_metadata::ROLE,
            self.role.as_bytes(),
        );
        encode_varint_field(
            &mut out,
            format::common_metadata::VERSION,
            self.version as u64,
        );
        out
    }
}

/// An owned `SignatureRequirement`.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SignatureRequirement {
    /// How many allowed-key signatures must verify.
    pub threshold: u32,
    /// The ids of the keys allowed to satisfy the requirement.
    pub key_ids: Vec<KeyId>,
}

impl SignatureRequirement {
    /// Encodes this message to its wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        encode_varint_field(
            &mut out,
            format::signature_requirement::THRESHOLD,
            self.threshold as u64,
        );
        for id in &self.key_ids {
            encode_delimited(
                &mut out,
                format::signature_requirement::KEY_IDS,
                id,
            );
        }
        out
    }
}

/// An owned `Key`.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Key {
    /// The key type.
    pub key_type: String,
    /// The signing scheme.
    pub scheme: String,
    /// The key material; for ECDSA-P256, the 65-byte uncompressed point.
    pub keyval: Vec<u8>,
}

impl Key {
    /// Creates an ECDSA-P256 key from an uncompressed public point, the
    /// only key kind the verifier understands.
    pub fn ecdsa_p256(keyval: &ecdsa::PublicKey) -> Self {
        Self {
            key_type: "ecdsa".to_string(),
            scheme: "ecdsa-sha2-nistp256".to_string(),
            keyval: keyval.to_vec(),
        }
    }

    /// Encodes this message to its wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        encode_delimited(
            &mut out,
            format::key::KEY_TYPE,
            self.key_type.as_bytes(),
        );
        encode_delimited(
            &mut out,
            format::key::SCHEME,
            self.scheme.as_bytes(),
        );
        encode_delimited(&mut out, format::key::KEYVAL, &self.keyval);
        out
    }
}

/// An owned `TargetsMetadata`.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TargetsMetadata {
    /// Role and version information.
    pub common_metadata: CommonMetadata,
    /// The target files shipped by this update.
    pub target_files: Vec<TargetFile>,
}

impl TargetsMetadata {
    /// Encodes this message to its wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        encode_delimited(
            &mut out,
            format::targets_metadata::COMMON_METADATA,
            &self.common_metadata.encode(),
        );
        for target in &self.target_files {
            encode_delimited(
                &mut out,
                format::targets_metadata::TARGET_FILES,
                &target.encode(),
            );
        }
        out
    }
}

/// An owned `TargetFile`.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TargetFile {
    /// The target's name.
    pub file_name: String,
    /// The target's length in bytes.
    pub length: u64,
    /// Digests of the target's contents.
    pub hashes: Vec<Hash>,
}

impl TargetFile {
    /// Creates a target descriptor for `payload`, hashed with SHA-256.
    pub fn from_payload(
        sha: &impl sha256::Builder,
        file_name: &str,
        payload: &[u8],
    ) -> Result<Self, Error> {
        let mut digest = sha256::Digest::default();
        let mut hasher = sha.new_hasher()?;
        hasher.write(payload)?;
        hasher.finish(&mut digest)?;
        Ok(Self {
            file_name: file_name.to_string(),
            length: payload.len() as u64,
            hashes: vec![Hash {
                function: HashFunction::Sha256,
                hash: digest.to_vec(),
            }],
        })
    }

    /// Encodes this message to its wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        encode_delimited(
            &mut out,
            format::target_file::FILE_NAME,
            self.file_name.as_bytes(),
        );
        encode_varint_field(
            &mut out,
            format::target_file::LENGTH,
            self.length,
        );
        for hash in &self.hashes {
            encode_delimited(
                &mut out,
                format::target_file::HASHES,
                &hash.encode(),
            );
        }
        out
    }
}

/// An owned `Hash`.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Hash {
    /// The hash function.
    pub function: HashFunction,
    /// The digest.
    pub hash: Vec<u8>,
}

impl Hash {
    /// Encodes this message to its wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        encode_varint_field(
            &mut out,
            format::hash::FUNCTION,
            self.function.to_wire_value() as u64,
        );
        encode_delimited(&mut out, format::hash::HASH, &self.hash);
        out
    }
}
