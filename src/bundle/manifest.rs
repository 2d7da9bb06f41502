// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! The authenticated manifest view.

use crate::bundle::format;
use crate::bundle::Error;
use crate::io;
use crate::io::Read as _;
use crate::proto::Bytes;
use crate::proto::Message;
use crate::proto::RepeatedMessages;

/// An authenticated view of a targets metadata: the list of target files
/// shipped in an update, with their lengths and digests.
///
/// A `ManifestAccessor` is obtained either from a verified bundle (via
/// [`UpdateBundleAccessor::manifest()`]) or from the manifest persisted on
/// the device; it never hands out anything that has not passed, or did not
/// previously pass, verification.
///
/// [`UpdateBundleAccessor::manifest()`]:
///     crate::bundle::UpdateBundleAccessor::manifest
pub struct ManifestAccessor<'b> {
    raw: Bytes<'b>,
    metadata: Message<'b>,
}

impl core::fmt::Debug for ManifestAccessor<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ManifestAccessor")
            .field("metadata", &self.metadata)
            .finish()
    }
}

impl<'b> ManifestAccessor<'b> {
    /// Creates a manifest view of the top-level targets metadata inside
    /// `bundle`.
    ///
    /// This does no verification; callers gate access on the bundle's
    /// verified state.
    pub(crate) fn from_bundle(bundle: &Message<'b>) -> Result<Self, Error> {
        let signed = bundle
            .message_map(format::update_bundle::TARGETS_METADATA)
            .get(format::TOP_LEVEL_TARGETS_NAME.as_bytes())?;
        let raw = signed.bytes(
            format::signed_targets_metadata::SERIALIZED_TARGETS_METADATA,
        )?;
        Ok(Self {
            raw,
            metadata: raw.as_message(),
        })
    }

    /// Creates a manifest view of a bare serialized `TargetsMetadata`,
    /// which is the format the device persists.
    pub(crate) fn from_metadata(metadata: Message<'b>) -> Self {
        Self {
            raw: metadata.as_bytes(),
            metadata,
        }
    }

    /// Returns the manifest's targets version, used for anti-rollback.
    pub fn version(&self) -> Result<u32, Error> {
        let common = self
            .metadata
            .message(format::targets_metadata::COMMON_METADATA)?;
        Ok(common.uint32(format::common_metadata::VERSION)?)
    }

    /// Returns an iterator over the target files in this manifest.
    pub fn target_files(&self) -> RepeatedMessages<'b> {
        self.metadata
            .repeated_messages(format::targets_metadata::TARGET_FILES)
    }

    /// Looks up the target file named `name`.
    ///
    /// If a name appears more than once, the first occurrence wins.
    pub fn target_file(&self, name: &str) -> Result<Message<'b>, Error> {
        for target in self.target_files() {
            let target = target?;
            let target_name =
                target.string(format::target_file::FILE_NAME)?;
            if target_name.as_bytes().equals(name.as_bytes())? {
                return Ok(target);
            }
        }
        Err(Error::NotFound)
    }

    /// Streams the serialized manifest bytes to `out`.
    ///
    /// The bytes written are exactly the verified `TargetsMetadata`
    /// interval, not a re-encoding.
    pub fn export(&self, out: &mut dyn io::Write) -> Result<(), Error> {
        let mut reader = self.raw.reader();
        let mut chunk = [0u8; 64];
        loop {
            let n = reader.remaining_data().min(chunk.len());
            if n == 0 {
                return Ok(());
            }
            reader.read_bytes(&mut chunk[..n])?;
            out.write_bytes(&chunk[..n])?;
        }
    }
}
