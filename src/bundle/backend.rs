// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! The device-side storage collaborator.

use crate::blob::Blob;
use crate::blob::IntervalReader;
use crate::bundle::Error;
use crate::io;

/// Device-side storage operations the verifier depends on.
///
/// A `Backend` owns the durable trust state: the trusted root metadata and
/// the manifest of the currently installed software. The verifier only
/// requires the ordering contract below; durability and write-atomicity
/// are the implementation's business.
///
/// Blob handles are returned by value and are only held for the duration
/// of the operation that requested them; implementations are free to back
/// them with cheap descriptors (a flash region, a slice). Each handle
/// must present the *whole* stored object starting at offset zero.
///
/// The verifier serializes its own calls; a backend shared between
/// accessor instances must arrange its own locking.
pub trait Backend {
    /// The blob type holding the trusted root metadata.
    type RootBlob: Blob;
    /// The blob type holding the on-device manifest.
    type ManifestBlob: Blob;
    /// The writer used to commit a new manifest.
    type ManifestWriter: io::Write;

    /// Returns the on-device trusted root metadata (a serialized
    /// `SignedRootMetadata`).
    ///
    /// On an unprovisioned device this fails, typically with
    /// [`Error::NotFound`]; verification then only succeeds for bundles
    /// in self-verification mode or without a root to upgrade to.
    fn trusted_root(&mut self) -> Result<Self::RootBlob, Error>;

    /// Durably persists `root` as the new trusted root metadata.
    ///
    /// The write must be torn-write-safe: after a power cut mid-write,
    /// [`Backend::trusted_root()`] must return either the old or the new
    /// root, never a mix.
    fn safely_persist_root(
        &mut self,
        root: &mut IntervalReader<'_>,
    ) -> Result<(), Error>;

    /// Called before the on-device manifest is read, giving the backend a
    /// chance to validate it.
    ///
    /// Returning [`Error::NotFound`] here (or from
    /// [`Backend::manifest()`]) means "no valid on-device manifest"; the
    /// verifier skips anti-rollback in that case.
    fn before_manifest_read(&mut self) -> Result<(), Error> {
        Ok(())
    }

    /// Returns the on-device manifest (a serialized `TargetsMetadata`).
    fn manifest(&mut self) -> Result<Self::ManifestBlob, Error>;

    /// Called before a new manifest is written, giving the backend a
    /// chance to prepare (e.g. erase) its manifest storage.
    fn before_manifest_write(&mut self) -> Result<(), Error> {
        Ok(())
    }

    /// Returns the writer a new manifest is streamed into.
    fn manifest_writer(&mut self) -> Result<Self::ManifestWriter, Error>;

    /// Called after the manifest has been fully streamed, so the backend
    /// can finalize (seal) its manifest storage.
    fn after_manifest_write(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

impl<B: Backend + ?Sized> Backend for &mut B {
    type RootBlob = B::RootBlob;
    type ManifestBlob = B::ManifestBlob;
    type ManifestWriter = B::ManifestWriter;

    fn trusted_root(&mut self) -> Result<Self::RootBlob, Error> {
        B::trusted_root(self)
    }

    fn safely_persist_root(
        &mut self,
        root: &mut IntervalReader<'_>,
    ) -> Result<(), Error> {
        B::safely_persist_root(self, root)
    }

    fn before_manifest_read(&mut self) -> Result<(), Error> {
        B::before_manifest_read(self)
    }

    fn manifest(&mut self) -> Result<Self::ManifestBlob, Error> {
        B::manifest(self)
    }

    fn before_manifest_write(&mut self) -> Result<(), Error> {
        B::before_manifest_write(self)
    }

    fn manifest_writer(&mut self) -> Result<Self::ManifestWriter, Error> {
        B::manifest_writer(self)
    }

    fn after_manifest_write(&mut self) -> Result<(), Error> {
        B::after_manifest_write(self)
    }
}
