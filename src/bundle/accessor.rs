// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! The update-bundle accessor and its verification pipeline.

use arrayvec::ArrayVec;

use crate::blob::Blob;
use crate::blob::IntervalReader;
use crate::bundle::format;
use crate::bundle::signature;
use crate::bundle::Backend;
use crate::bundle::Config;
use crate::bundle::Error;
use crate::bundle::ManifestAccessor;
use crate::bundle::MAX_TARGET_NAME_LENGTH;
use crate::crypto::ecdsa;
use crate::crypto::sha256;
use crate::proto;
use crate::proto::Bytes;
use crate::proto::Message;

/// The trust anchor captured at the start of a verification run.
///
/// In normal mode this is the on-device root; in self-verification mode it
/// is the bundle's own incoming root. Either may be unavailable, which is
/// only an error once a stage actually needs it.
enum TrustAnchor<'m> {
    Available(Message<'m>),
    Missing(Error),
}

/// A target file name, read out of a bundle into a bounded stack buffer.
struct TargetName {
    name: ArrayVec<u8, MAX_TARGET_NAME_LENGTH>,
}

impl TargetName {
    fn read(target: Message<'_>) -> Result<Self, Error> {
        let raw = target.string(format::target_file::FILE_NAME)?;
        if raw.len() > MAX_TARGET_NAME_LENGTH as u64 {
            error!(
                "Target file name is longer than {} bytes.",
                MAX_TARGET_NAME_LENGTH
            );
            return Err(trace!(Error::OutOfRange));
        }

        let mut buf = [0u8; MAX_TARGET_NAME_LENGTH];
        let read = raw.read(&mut buf)?;
        let mut name = ArrayVec::new();
        name.try_extend_from_slice(read.as_bytes())
            .map_err(|_| Error::Internal)?;
        Ok(Self { name })
    }

    fn as_bytes(&self) -> &[u8] {
        &self.name
    }

    fn as_str(&self) -> &str {
        // Names are UTF-8-checked when read.
        core::str::from_utf8(&self.name).unwrap_or("<invalid>")
    }
}

/// The facade over one update bundle.
///
/// An accessor moves through `Closed → Open(unverified) → Open(verified)`
/// and back: [`UpdateBundleAccessor::open_and_verify()`] performs the
/// first two transitions atomically, any verification failure (or
/// [`UpdateBundleAccessor::close()`]) returns to `Closed`. The manifest
/// and the target payloads only become observable in the verified state.
///
/// An accessor exclusively owns its bundle blob between open and close,
/// and expects to be driven by a single logical owner; it provides no
/// thread-safety across instances sharing a backend.
pub struct UpdateBundleAccessor<'b, B: Backend> {
    blob: &'b dyn Blob,
    backend: B,
    config: Config,
    bundle: Option<Message<'b>>,
    bundle_verified: bool,
}

impl<'b, B: Backend> UpdateBundleAccessor<'b, B> {
    /// Creates a new accessor over `blob`, in the `Closed` state.
    pub fn new(blob: &'b dyn Blob, backend: B, config: Config) -> Self {
        Self {
            blob,
            backend,
            config,
            bundle: None,
            bundle_verified: false,
        }
    }

    /// Opens the bundle and runs the verification pipeline.
    ///
    /// On success the accessor is `Open(verified)`; the new root, if the
    /// bundle carried one, has already been persisted through the
    /// backend. On any failure the accessor is fully closed and nothing
    /// except a chain-verified root has been persisted.
    pub fn open_and_verify(
        &mut self,
        sha: &impl sha256::Builder,
        verifier: &mut impl ecdsa::Verify,
    ) -> Result<(), Error> {
        self.do_open()?;

        if let Err(e) = self.do_verify(sha, verifier) {
            self.close();
            return Err(e);
        }

        Ok(())
    }

    /// Returns the authenticated manifest.
    ///
    /// Fails with [`Error::FailedPrecondition`] until a verification run
    /// has succeeded.
    pub fn manifest(&self) -> Result<ManifestAccessor<'b>, Error> {
        let bundle = self.bundle()?;
        if !self.bundle_verified {
            debug!("Bundle has not passed verification yet.");
            return Err(trace!(Error::FailedPrecondition));
        }
        ManifestAccessor::from_bundle(&bundle)
    }

    /// Returns a streaming reader over the payload of the manifested
    /// target named `name`.
    ///
    /// Absence propagates: an unknown name fails with
    /// [`Error::NotFound`], as does a manifested target whose payload was
    /// personalized out of the bundle.
    pub fn target_payload(
        &self,
        name: &str,
    ) -> Result<IntervalReader<'b>, Error> {
        let manifest = self.manifest()?;
        manifest.target_file(name)?;

        let payloads = self
            .bundle()?
            .bytes_map(format::update_bundle::TARGET_PAYLOADS);
        Ok(payloads.get(name.as_bytes())?.reader())
    }

    /// Returns the sum of the lengths of all manifest entries whose
    /// payloads are present in the bundle.
    pub fn total_payload_size(&self) -> Result<u64, Error> {
        let manifest = self.manifest()?;
        let payloads = self
            .bundle()?
            .bytes_map(format::update_bundle::TARGET_PAYLOADS);

        let mut total_bytes = 0u64;
        for target in manifest.target_files() {
            let target = target?;
            let name = TargetName::read(target)?;
            match payloads.get(name.as_bytes()) {
                // Personalized-out payloads do not contribute.
                Err(proto::Error::FieldNotFound) => continue,
                Err(e) => return Err(e.into()),
                Ok(_) => {}
            }
            total_bytes += target.uint64(format::target_file::LENGTH)?;
        }
        Ok(total_bytes)
    }

    /// Commits the verified manifest to the device through the backend.
    ///
    /// The write is bracketed by the backend's manifest-write hooks; any
    /// backend error aborts the operation and is returned verbatim.
    pub fn persist_manifest(&mut self) -> Result<(), Error> {
        // Fails if the bundle is yet to be verified.
        let manifest = self.manifest()?;

        self.backend.before_manifest_write()?;
        let mut writer = self.backend.manifest_writer()?;
        manifest.export(&mut writer)?;
        self.backend.after_manifest_write()?;
        Ok(())
    }

    /// Closes the accessor, releasing the bundle and clearing the
    /// verified state. Idempotent; safe to call after any failure.
    pub fn close(&mut self) {
        self.bundle_verified = false;
        self.bundle = None;
    }

    fn bundle(&self) -> Result<Message<'b>, Error> {
        self.bundle.ok_or(Error::FailedPrecondition)
    }

    fn do_open(&mut self) -> Result<(), Error> {
        self.bundle_verified = false;
        self.bundle = Some(Message::from_blob(self.blob)?);
        Ok(())
    }

    fn do_verify(
        &mut self,
        sha: &impl sha256::Builder,
        verifier: &mut impl ecdsa::Verify,
    ) -> Result<(), Error> {
        if cfg!(feature = "disable-bundle-verification") {
            warn!("Update bundle verification is disabled.");
            self.bundle_verified = true;
            return Ok(());
        }

        self.bundle_verified = false;
        let bundle = self.bundle()?;
        let self_verifying = self.config.disable_verification;

        // Choose and capture the trust anchor for this run. It is not
        // replaced for the remainder of the run, even once a root upgrade
        // has been persisted.
        let device_root;
        let anchor = if self_verifying {
            match bundle.message(format::update_bundle::ROOT_METADATA) {
                Ok(root) => TrustAnchor::Available(root),
                Err(e) => TrustAnchor::Missing(e.into()),
            }
        } else {
            match self.backend.trusted_root() {
                Ok(blob) => {
                    device_root = blob;
                    match Message::from_blob(&device_root) {
                        Ok(root) => TrustAnchor::Available(root),
                        Err(e) => TrustAnchor::Missing(e.into()),
                    }
                }
                Err(e) => TrustAnchor::Missing(e),
            }
        };

        self.upgrade_root(bundle, &anchor, sha, verifier)?;
        self.verify_targets_metadata(bundle, &anchor, sha, verifier)?;
        self.verify_targets_payloads(bundle, sha)?;

        self.bundle_verified = true;
        Ok(())
    }

    /// Verifies and upgrades the on-device trust to the incoming root
    /// metadata, if one is included.
    fn upgrade_root(
        &mut self,
        bundle: Message<'_>,
        anchor: &TrustAnchor<'_>,
        sha: &impl sha256::Builder,
        verifier: &mut impl ecdsa::Verify,
    ) -> Result<(), Error> {
        let new_root =
            match bundle.message(format::update_bundle::ROOT_METADATA) {
                Ok(root) => root,
                Err(_) => {
                    // Bundles may ship without a root upgrade.
                    warn!("Incoming root metadata not found or invalid.");
                    return Ok(());
                }
            };

        // A valid trust anchor is required onwards from here.
        let trusted_root = match anchor {
            TrustAnchor::Available(root) => *root,
            TrustAnchor::Missing(e) => return Err(*e),
        };

        // The current anchor must trust the new root...
        if let Err(e) = signature::verify_root_metadata_signatures(
            sha,
            verifier,
            trusted_root,
            new_root,
        ) {
            info!("Failed to verify signatures against the current root.");
            return Err(signature_failure(e));
        }

        // ...and the new root must carry its own authority forward.
        if let Err(e) = signature::verify_root_metadata_signatures(
            sha,
            verifier,
            new_root,
            new_root,
        ) {
            info!("Failed to verify signatures against the new root.");
            return Err(signature_failure(e));
        }

        let trusted_version = root_version(trusted_root)?;
        let new_version = root_version(new_root)?;
        if trusted_version > new_version {
            debug!(
                "Root attempts to rollback from {} to {}.",
                trusted_version, new_version
            );
            return Err(trace!(Error::Unauthenticated));
        }

        if !self.config.disable_verification {
            // Persist the root immediately after it is verified, without
            // gating on the remaining stages, so that a compromised
            // targets key can be revoked by a bundle that only rotates
            // root.
            let mut new_root_reader = new_root.as_bytes().reader();
            self.backend.safely_persist_root(&mut new_root_reader)?;
        }

        Ok(())
    }

    /// Verifies the top-level targets metadata under the trust anchor,
    /// then checks it for rollback against the on-device manifest.
    fn verify_targets_metadata(
        &mut self,
        bundle: Message<'_>,
        anchor: &TrustAnchor<'_>,
        sha: &impl sha256::Builder,
        verifier: &mut impl ecdsa::Verify,
    ) -> Result<(), Error> {
        let self_verifying = self.config.disable_verification;

        let trusted_root = match anchor {
            TrustAnchor::Available(root) => *root,
            TrustAnchor::Missing(e) => {
                if self_verifying {
                    warn!(
                        "Targets metadata self-verification is noop due \
                         to unavailable root."
                    );
                    return Ok(());
                }
                return Err(*e);
            }
        };

        // The top-level targets metadata is identified by a well-known
        // name in the bundle's metadata map.
        let signed_targets = bundle
            .message_map(format::update_bundle::TARGETS_METADATA)
            .get(format::TOP_LEVEL_TARGETS_NAME.as_bytes())?;
        let targets_metadata = signed_targets.bytes(
            format::signed_targets_metadata::SERIALIZED_TARGETS_METADATA,
        )?;
        let signatures = signed_targets.repeated_messages(
            format::signed_targets_metadata::SIGNATURES,
        );

        // The key mapping and the targets requirement come from the
        // trust anchor.
        let trusted_content = trusted_root.message(
            format::signed_root_metadata::SERIALIZED_ROOT_METADATA,
        )?;
        let key_mapping =
            trusted_content.message_map(format::root_metadata::KEYS);
        let requirement = trusted_content.message(
            format::root_metadata::TARGETS_SIGNATURE_REQUIREMENT,
        )?;

        match signature::verify_metadata_signatures(
            sha,
            verifier,
            targets_metadata,
            signatures,
            requirement,
            key_mapping,
        ) {
            Ok(()) => {}
            Err(Error::NotFound) if self_verifying => {
                warn!("Unsigned bundle tolerated by self-verification.");
                return Ok(());
            }
            Err(e) => return Err(signature_failure(e)),
        }

        if self_verifying {
            warn!(
                "Self-verification does not check targets metadata for \
                 rollback."
            );
            return Ok(());
        }

        // Anti-rollback: never accept a targets version older than the
        // one recorded by the installed manifest.
        let device_manifest = match self.device_manifest() {
            Err(Error::NotFound) => {
                warn!("Skipping anti-rollback due to absent device manifest.");
                return Ok(());
            }
            result => result?,
        };
        let device_view = Message::from_blob(&device_manifest)?;
        let current_version =
            ManifestAccessor::from_metadata(device_view).version()?;
        let new_version = metadata_version(
            targets_metadata.as_message(),
            format::targets_metadata::COMMON_METADATA,
        )?;
        if current_version > new_version {
            debug!(
                "Targets attempt to rollback from {} to {}.",
                current_version, new_version
            );
            return Err(trace!(Error::Unauthenticated));
        }

        Ok(())
    }

    /// Validates the size and digest of every target file listed in the
    /// bundle manifest.
    fn verify_targets_payloads(
        &mut self,
        bundle: Message<'_>,
        sha: &impl sha256::Builder,
    ) -> Result<(), Error> {
        let manifest = ManifestAccessor::from_bundle(&bundle)?;

        for target in manifest.target_files() {
            let target = target?;
            let name = TargetName::read(target)?;

            let length = target.uint64(format::target_file::LENGTH)?;
            if length > self.config.max_target_payload_size {
                error!(
                    "Target payload too large. Maximum supported is {} \
                     bytes.",
                    self.config.max_target_payload_size
                );
                return Err(trace!(Error::OutOfRange));
            }

            let expected_sha256 = target_sha256(target)?;
            self.verify_target_payload(
                bundle,
                &name,
                length,
                expected_sha256,
                sha,
            )?;
        }

        Ok(())
    }

    fn verify_target_payload(
        &mut self,
        bundle: Message<'_>,
        name: &TargetName,
        expected_length: u64,
        expected_sha256: Bytes<'_>,
        sha: &impl sha256::Builder,
    ) -> Result<(), Error> {
        let payloads =
            bundle.bytes_map(format::update_bundle::TARGET_PAYLOADS);
        match payloads.get(name.as_bytes()) {
            Ok(payload) => verify_in_bundle_target_payload(
                sha,
                expected_length,
                expected_sha256,
                payload,
            ),
            Err(proto::Error::FieldNotFound) => self
                .verify_out_of_bundle_target_payload(
                    name,
                    expected_length,
                    expected_sha256,
                ),
            Err(e) => Err(e.into()),
        }
    }

    /// Verifies a target whose payload was personalized out of the
    /// bundle.
    ///
    /// No measurement can be taken here; the target is checked against
    /// the measurement cached by the last accepted update instead.
    fn verify_out_of_bundle_target_payload(
        &mut self,
        name: &TargetName,
        expected_length: u64,
        expected_sha256: Bytes<'_>,
    ) -> Result<(), Error> {
        if !self.config.personalization {
            error!("Target file {} not found in bundle.", name.as_str());
            return Err(trace!(Error::Unauthenticated));
        }

        let device_manifest = match self.device_manifest() {
            Ok(blob) => blob,
            Err(_) => {
                error!(
                    "Cannot verify personalized-out target without an \
                     on-device manifest."
                );
                return Err(trace!(Error::Unauthenticated));
            }
        };
        let device_view = Message::from_blob(&device_manifest)?;
        let cached = match ManifestAccessor::from_metadata(device_view)
            .target_file(name.as_str())
        {
            Ok(cached) => cached,
            Err(_) => {
                error!(
                    "Personalized-out target {} is not in the on-device \
                     manifest.",
                    name.as_str()
                );
                return Err(trace!(Error::Unauthenticated));
            }
        };

        let cached_length = cached.uint64(format::target_file::LENGTH)?;
        if cached_length != expected_length {
            error!(
                "Personalized-out target has bad length: {}, expected: {}",
                cached_length, expected_length
            );
            return Err(trace!(Error::Unauthenticated));
        }

        let cached_sha256: sha256::Digest = target_sha256(cached)?
            .read_fixed()
            .map_err(|_| trace!(Error::Internal))?;
        if !expected_sha256.equals(&cached_sha256)? {
            error!("Personalized-out target has a bad hash.");
            return Err(trace!(Error::Unauthenticated));
        }

        Ok(())
    }

    /// Returns the on-device manifest, asking the backend to validate it
    /// first.
    fn device_manifest(&mut self) -> Result<B::ManifestBlob, Error> {
        self.backend.before_manifest_read()?;
        self.backend.manifest()
    }
}

/// Verifies a target whose payload is included in the bundle, by simply
/// taking a measurement.
fn verify_in_bundle_target_payload(
    sha: &impl sha256::Builder,
    expected_length: u64,
    expected_sha256: Bytes<'_>,
    payload: Bytes<'_>,
) -> Result<(), Error> {
    let actual_length = payload.len();
    if actual_length != expected_length {
        error!(
            "Wrong payload length. Expected: {}, actual: {}",
            expected_length, actual_length
        );
        return Err(trace!(Error::Unauthenticated));
    }

    let mut digest = sha256::Digest::default();
    sha256::hash_reader(sha, payload.reader(), &mut digest)?;
    if !expected_sha256.equals(&digest)? {
        error!("Wrong payload SHA-256 hash.");
        return Err(trace!(Error::Unauthenticated));
    }

    Ok(())
}

/// Locates the SHA-256 entry among a target's hashes.
///
/// Entries with any other (or unknown) hash function are skipped; a
/// target with no SHA-256 hash cannot be verified at all.
fn target_sha256(target: Message<'_>) -> Result<Bytes<'_>, Error> {
    for hash in target.repeated_messages(format::target_file::HASHES) {
        let hash = hash?;
        let function = hash.uint32(format::hash::FUNCTION)?;
        if format::HashFunction::from_wire_value(function)
            == Some(format::HashFunction::Sha256)
        {
            return Ok(hash.bytes(format::hash::HASH)?);
        }
    }
    Err(trace!(Error::NotFound))
}

/// Extracts `common_metadata.version` from a root or targets metadata
/// message.
fn metadata_version(
    metadata: Message<'_>,
    common_metadata_field: u32,
) -> Result<u32, Error> {
    let common = metadata.message(common_metadata_field)?;
    Ok(common.uint32(format::common_metadata::VERSION)?)
}

/// Extracts the version of a `SignedRootMetadata`'s content.
fn root_version(signed_root: Message<'_>) -> Result<u32, Error> {
    let root = signed_root
        .message(format::signed_root_metadata::SERIALIZED_ROOT_METADATA)?;
    metadata_version(root, format::root_metadata::COMMON_METADATA)
}

/// Folds a failed signature-chain outcome into `Unauthenticated`.
///
/// Structural errors (malformed metadata, oversized values) pass through
/// untouched; only the authentication outcomes are folded, so that an
/// unsigned root is rejected the same way as a badly signed one.
fn signature_failure(e: Error) -> Error {
    match e {
        Error::NotFound | Error::Unauthenticated => Error::Unauthenticated,
        e => e,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::blob::Ram;
    use crate::bundle::owned;
    use crate::crypto::soft;
    use crate::io::StdWrite;

    /// A backend for tests that never have a provisioned device.
    struct NullBackend;

    impl Backend for NullBackend {
        type RootBlob = Ram<Vec<u8>>;
        type ManifestBlob = Ram<Vec<u8>>;
        type ManifestWriter = StdWrite<Vec<u8>>;

        fn trusted_root(&mut self) -> Result<Self::RootBlob, Error> {
            Err(Error::NotFound)
        }

        fn safely_persist_root(
            &mut self,
            _: &mut IntervalReader<'_>,
        ) -> Result<(), Error> {
            Err(Error::Internal)
        }

        fn manifest(&mut self) -> Result<Self::ManifestBlob, Error> {
            Err(Error::NotFound)
        }

        fn manifest_writer(
            &mut self,
        ) -> Result<Self::ManifestWriter, Error> {
            Ok(StdWrite(Vec::new()))
        }
    }

    fn self_verifying_config() -> Config {
        Config {
            disable_verification: true,
            ..Default::default()
        }
    }

    fn unsigned_bundle() -> Vec<u8> {
        let sha = soft::sha256::Builder::new();
        let targets = owned::TargetsMetadata {
            common_metadata: owned::CommonMetadata::new("targets", 1),
            target_files: vec![owned::TargetFile::from_payload(
                &sha,
                "fw.bin",
                &[0x01, 0x02, 0x03, 0x04],
            )
            .unwrap()],
        };
        owned::Bundle {
            root_metadata: None,
            targets_metadata: vec![(
                format::TOP_LEVEL_TARGETS_NAME.to_string(),
                owned::SignedTargetsMetadata::new(&targets),
            )],
            target_payloads: vec![(
                "fw.bin".to_string(),
                vec![0x01, 0x02, 0x03, 0x04],
            )],
        }
        .encode()
    }

    #[test]
    fn manifest_requires_verification() {
        let blob = Ram(unsigned_bundle());
        let accessor = UpdateBundleAccessor::new(
            &blob,
            NullBackend,
            self_verifying_config(),
        );
        assert_eq!(
            accessor.manifest().unwrap_err(),
            Error::FailedPrecondition
        );
        assert_eq!(
            accessor.target_payload("fw.bin").unwrap_err(),
            Error::FailedPrecondition
        );
        assert_eq!(
            accessor.total_payload_size().unwrap_err(),
            Error::FailedPrecondition
        );
    }

    #[test]
    fn close_is_idempotent() {
        let blob = Ram(unsigned_bundle());
        let mut accessor = UpdateBundleAccessor::new(
            &blob,
            NullBackend,
            self_verifying_config(),
        );
        accessor.close();
        accessor.close();
        assert_eq!(
            accessor.manifest().unwrap_err(),
            Error::FailedPrecondition
        );
    }

    #[test]
    fn self_verification_accepts_unsigned_bundle() {
        let blob = Ram(unsigned_bundle());
        let mut accessor = UpdateBundleAccessor::new(
            &blob,
            NullBackend,
            self_verifying_config(),
        );
        accessor
            .open_and_verify(
                &soft::sha256::Builder::new(),
                &mut soft::ecdsa::VerifyP256::new(),
            )
            .unwrap();

        let manifest = accessor.manifest().unwrap();
        assert_eq!(manifest.version().unwrap(), 1);
        assert_eq!(accessor.total_payload_size().unwrap(), 4);

        accessor.close();
        assert_eq!(
            accessor.manifest().unwrap_err(),
            Error::FailedPrecondition
        );
    }

    #[test]
    fn self_verification_still_checks_payloads() {
        let sha = soft::sha256::Builder::new();
        let targets = owned::TargetsMetadata {
            common_metadata: owned::CommonMetadata::new("targets", 1),
            target_files: vec![owned::TargetFile::from_payload(
                &sha,
                "fw.bin",
                &[0x01, 0x02, 0x03, 0x04],
            )
            .unwrap()],
        };
        let bundle = owned::Bundle {
            root_metadata: None,
            targets_metadata: vec![(
                format::TOP_LEVEL_TARGETS_NAME.to_string(),
                owned::SignedTargetsMetadata::new(&targets),
            )],
            // Same length, different contents.
            target_payloads: vec![(
                "fw.bin".to_string(),
                vec![0x01, 0x02, 0x03, 0x05],
            )],
        }
        .encode();

        let blob = Ram(bundle);
        let mut accessor = UpdateBundleAccessor::new(
            &blob,
            NullBackend,
            self_verifying_config(),
        );
        assert_eq!(
            accessor
                .open_and_verify(
                    &soft::sha256::Builder::new(),
                    &mut soft::ecdsa::VerifyP256::new(),
                )
                .unwrap_err(),
            Error::Unauthenticated
        );
        // The failure closed the accessor.
        assert_eq!(
            accessor.manifest().unwrap_err(),
            Error::FailedPrecondition
        );
    }
}
