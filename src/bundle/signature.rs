// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Threshold verification of signed metadata.

use crate::bundle::format;
use crate::bundle::Error;
use crate::crypto::ecdsa;
use crate::crypto::sha256;
use crate::proto::Bytes;
use crate::proto::Message;
use crate::proto::MessageMap;
use crate::proto::RepeatedMessages;

/// Renders a key id as lowercase hex for debug logs.
#[cfg_attr(not(feature = "log"), allow(unused))]
fn log_key_id(key_id: &[u8; format::KEY_ID_SIZE]) {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut hex = [0u8; format::KEY_ID_SIZE * 2];
    for (i, byte) in key_id.iter().enumerate() {
        hex[i * 2] = HEX[(byte >> 4) as usize];
        hex[i * 2 + 1] = HEX[(byte & 0xf) as usize];
    }
    debug!(
        "key_id: {}",
        core::str::from_utf8(&hex).unwrap_or("<unrepresentable>")
    );
}

/// Decides whether `message` meets a signature requirement.
///
/// At least `threshold` (from `requirement`) of `signatures` must verify
/// under keys that are both listed in the requirement's allowed key ids
/// and present in `key_mapping`. Signatures by unlisted keys are skipped;
/// duplicate signatures are counted independently; iteration stops as soon
/// as the threshold is met.
///
/// Returns [`Error::NotFound`] when there are no signatures at all, which
/// lets self-verification tell an *unsigned* bundle apart from a *badly
/// signed* one, and [`Error::Unauthenticated`] when signatures exist but
/// too few verify.
pub(crate) fn verify_metadata_signatures(
    sha: &impl sha256::Builder,
    verifier: &mut impl ecdsa::Verify,
    message: Bytes<'_>,
    signatures: RepeatedMessages<'_>,
    requirement: Message<'_>,
    key_mapping: MessageMap<'_>,
) -> Result<(), Error> {
    // At least `threshold` signatures must pass verification in order to
    // trust this metadata.
    let threshold =
        requirement.uint32(format::signature_requirement::THRESHOLD)?;

    let mut allowed_count = 0u32;
    for key_id in
        requirement.repeated_bytes(format::signature_requirement::KEY_IDS)
    {
        key_id?;
        allowed_count += 1;
    }
    if threshold == 0 || threshold > allowed_count {
        return Err(trace!(Error::Internal));
    }

    let mut verified_count = 0u32;
    let mut total_signatures = 0u32;
    for signature in signatures {
        let signature = signature?;
        total_signatures += 1;

        // Read the key id into a buffer, so that we can check whether it
        // is listed as allowed and look up the key value later.
        let key_id: [u8; format::KEY_ID_SIZE] = signature
            .bytes(format::signature::KEY_ID)?
            .read_fixed()
            .map_err(|_| trace!(Error::Internal))?;

        // The requirement assumes key ids are properly derived from the
        // keys (via SHA-256); id equality stands in for key equality.
        let mut key_id_is_allowed = false;
        for trusted in requirement
            .repeated_bytes(format::signature_requirement::KEY_IDS)
        {
            if trusted?.equals(&key_id)? {
                key_id_is_allowed = true;
                break;
            }
        }
        if !key_id_is_allowed {
            debug!("Skipping a key id not listed in allowed key ids.");
            log_key_id(&key_id);
            continue;
        }

        let sig = signature.bytes(format::signature::SIG)?;

        // An allowed key id with no key in the mapping is malformed root
        // metadata, which is a hard failure rather than a skip.
        let key_info = key_mapping.get(&key_id)?;
        let key: ecdsa::PublicKey = key_info
            .bytes(format::key::KEYVAL)?
            .read_fixed()
            .map_err(|_| trace!(Error::Internal))?;

        let mut digest = sha256::Digest::default();
        sha256::hash_reader(sha, message.reader(), &mut digest)?;

        let sig: ecdsa::Signature =
            sig.read_fixed().map_err(|_| trace!(Error::Internal))?;
        match verifier.verify(&key, &digest, &sig) {
            Ok(()) => {
                verified_count += 1;
                if verified_count == threshold {
                    return Ok(());
                }
            }
            Err(_) => {
                debug!("A signature failed verification.");
                log_key_id(&key_id);
            }
        }
    }

    if total_signatures == 0 {
        // For self-verification to tell apart unsigned bundles.
        return Err(Error::NotFound);
    }

    debug!(
        "Not enough signatures verified. Requires at least {}, verified {}",
        threshold, verified_count
    );
    Err(Error::Unauthenticated)
}

/// Verifies the signatures of a signed `new_root` against `trusted_root`.
///
/// Both arguments are `SignedRootMetadata` views. The key mapping and the
/// *root* signature requirement are taken from `trusted_root`'s content;
/// the signature subject is `new_root`'s exact serialized bytes. Passing
/// the same message for both performs the self-signature check of a root
/// upgrade.
pub(crate) fn verify_root_metadata_signatures(
    sha: &impl sha256::Builder,
    verifier: &mut impl ecdsa::Verify,
    trusted_root: Message<'_>,
    new_root: Message<'_>,
) -> Result<(), Error> {
    let trusted = trusted_root
        .message(format::signed_root_metadata::SERIALIZED_ROOT_METADATA)?;
    let serialized = new_root
        .bytes(format::signed_root_metadata::SERIALIZED_ROOT_METADATA)?;

    let key_mapping = trusted.message_map(format::root_metadata::KEYS);
    let signatures = new_root
        .repeated_messages(format::signed_root_metadata::SIGNATURES);
    let requirement = trusted
        .message(format::root_metadata::ROOT_SIGNATURE_REQUIREMENT)?;

    verify_metadata_signatures(
        sha,
        verifier,
        serialized,
        signatures,
        requirement,
        key_mapping,
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::blob::Ram;
    use crate::bundle::format::HashFunction;
    use crate::bundle::owned;
    use crate::crypto::soft;

    /// Test fixture: a message to sign, two keypairs, and a requirement
    /// naming both with the given threshold.
    struct Fixture {
        message: Vec<u8>,
        signers: Vec<(owned::KeyId, soft::ecdsa::SignP256)>,
        requirement: Vec<u8>,
        key_mapping: Vec<u8>,
    }

    impl Fixture {
        fn new(threshold: u32) -> Self {
            let sha = soft::sha256::Builder::new();
            let mut signers = Vec::new();
            let mut keys = Vec::new();
            for seed in [0x11u8, 0x22] {
                let signer =
                    soft::ecdsa::SignP256::from_bytes(&[seed; 32]).unwrap();
                let key = owned::Key::ecdsa_p256(&signer.public_key());
                let key_id = owned::key_id(&sha, &key).unwrap();
                signers.push((key_id, signer));
                keys.push((key_id, key));
            }

            let requirement = owned::SignatureRequirement {
                threshold,
                key_ids: signers.iter().map(|(id, _)| *id).collect(),
            };

            // The key mapping is borrowed from a RootMetadata encoding.
            let root = owned::RootMetadata {
                common_metadata: owned::CommonMetadata::new("root", 1),
                keys,
                root_signature_requirement: requirement.clone(),
                targets_signature_requirement: requirement.clone(),
            };

            Self {
                message: b"metadata under test".to_vec(),
                signers,
                requirement: requirement.encode(),
                key_mapping: root.encode(),
            }
        }

        fn sign(&mut self, signer: usize) -> owned::Signature {
            let sha = soft::sha256::Builder::new();
            let (key_id, signer) = &mut self.signers[signer];
            let message = self.message.clone();
            owned::sign_metadata(&sha, signer, *key_id, &message).unwrap()
        }

        fn verify(
            &self,
            signatures: &[owned::Signature],
        ) -> Result<(), Error> {
            let message = Ram(&self.message);
            let requirement = Ram(&self.requirement);
            let key_mapping = Ram(&self.key_mapping);

            let mut encoded = Vec::new();
            for signature in signatures {
                owned::encode_delimited(
                    &mut encoded,
                    format::signed_root_metadata::SIGNATURES,
                    &signature.encode(),
                );
            }
            let signed = Ram(&encoded);

            let message = Message::from_blob(&message).unwrap();
            let requirement = Message::from_blob(&requirement).unwrap();
            let key_mapping = Message::from_blob(&key_mapping).unwrap();
            let signed = Message::from_blob(&signed).unwrap();

            verify_metadata_signatures(
                &soft::sha256::Builder::new(),
                &mut soft::ecdsa::VerifyP256::new(),
                message.as_bytes(),
                signed.repeated_messages(
                    format::signed_root_metadata::SIGNATURES,
                ),
                requirement,
                key_mapping.message_map(format::root_metadata::KEYS),
            )
        }
    }

    #[test]
    fn threshold_met() {
        let mut f = Fixture::new(1);
        let sig = f.sign(0);
        f.verify(&[sig]).unwrap();
    }

    #[test]
    fn threshold_met_by_second_signer() {
        let mut f = Fixture::new(1);
        let sig = f.sign(1);
        f.verify(&[sig]).unwrap();
    }

    #[test]
    fn threshold_of_two() {
        let mut f = Fixture::new(2);
        let sig0 = f.sign(0);
        let sig1 = f.sign(1);
        f.verify(&[sig0.clone(), sig1]).unwrap();

        // One short of the threshold.
        assert_eq!(
            f.verify(&[sig0]).unwrap_err(),
            Error::Unauthenticated
        );
    }

    #[test]
    fn duplicate_signatures_count_independently() {
        let mut f = Fixture::new(2);
        let sig = f.sign(0);
        f.verify(&[sig.clone(), sig]).unwrap();
    }

    #[test]
    fn no_signatures_is_not_found() {
        let f = Fixture::new(1);
        assert_eq!(f.verify(&[]).unwrap_err(), Error::NotFound);
    }

    #[test]
    fn unlisted_key_id_is_skipped() {
        let mut f = Fixture::new(1);
        let mut sig = f.sign(0);
        sig.key_id = [0xee; 32];
        assert_eq!(f.verify(&[sig]).unwrap_err(), Error::Unauthenticated);
    }

    #[test]
    fn bad_signature_does_not_count() {
        let mut f = Fixture::new(1);
        let mut sig = f.sign(0);
        sig.sig[17] ^= 1;
        assert_eq!(f.verify(&[sig]).unwrap_err(), Error::Unauthenticated);
    }

    #[test]
    fn wrong_size_key_id_is_malformed() {
        let mut f = Fixture::new(1);
        let good = f.sign(0);

        // A signature whose key id is 8 bytes instead of 32.
        let mut sig_msg = Vec::new();
        owned::encode_delimited(
            &mut sig_msg,
            format::signature::KEY_ID,
            &good.key_id[..8],
        );
        owned::encode_delimited(
            &mut sig_msg,
            format::signature::SIG,
            &good.sig,
        );
        let mut encoded = Vec::new();
        owned::encode_delimited(
            &mut encoded,
            format::signed_root_metadata::SIGNATURES,
            &sig_msg,
        );
        let blob = Ram(&encoded);
        let signed = Message::from_blob(&blob).unwrap();

        let message = Ram(&f.message);
        let requirement = Ram(&f.requirement);
        let key_mapping = Ram(&f.key_mapping);
        let result = verify_metadata_signatures(
            &soft::sha256::Builder::new(),
            &mut soft::ecdsa::VerifyP256::new(),
            Message::from_blob(&message).unwrap().as_bytes(),
            signed.repeated_messages(
                format::signed_root_metadata::SIGNATURES,
            ),
            Message::from_blob(&requirement).unwrap(),
            Message::from_blob(&key_mapping)
                .unwrap()
                .message_map(format::root_metadata::KEYS),
        );
        assert_eq!(result.unwrap_err(), Error::Internal);
    }

    #[test]
    fn zero_threshold_is_malformed() {
        let mut f = Fixture::new(0);
        let sig = f.sign(0);
        assert_eq!(f.verify(&[sig]).unwrap_err(), Error::Internal);
    }

    #[test]
    fn threshold_above_key_count_is_malformed() {
        let mut f = Fixture::new(3);
        let sig = f.sign(0);
        assert_eq!(f.verify(&[sig]).unwrap_err(), Error::Internal);
    }

    // A HashFunction sanity check lives here for lack of a better home;
    // the enum is consumed by the payload verifier.
    #[test]
    fn hash_function_wire_values() {
        assert_eq!(
            HashFunction::from_wire_value(1),
            Some(HashFunction::Sha256)
        );
        assert_eq!(HashFunction::from_wire_value(99), None);
    }
}
