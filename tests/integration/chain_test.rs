// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Integration tests for chain construction: every certificate must verify
//! against the public key of the certificate named as its issuer.

use crate::integration::{LabStore, ISSUER_CA};
use der::{Decode, Encode};
use labcert::{CertificateProfile, CertificateRequest, StoreContainer};
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use sha2::Sha256;
use x509_cert::Certificate;

/// Verify the RSA/SHA-256 signature of `child` with the key of `parent`.
fn verify_signed_by(child: &[u8], parent: &[u8]) {
    let child = Certificate::from_der(child).expect("child DER");
    let parent = Certificate::from_der(parent).expect("parent DER");

    let spki = parent
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .expect("SPKI DER");
    let key = RsaPublicKey::from_public_key_der(&spki).expect("RSA public key");
    let tbs = child.tbs_certificate.to_der().expect("TBS DER");
    let signature = Signature::try_from(child.signature.raw_bytes()).expect("signature bytes");

    VerifyingKey::<Sha256>::new(key)
        .verify(&tbs, &signature)
        .expect("signature verifies");
}

#[test]
fn test_full_chain_verifies() {
    let lab = LabStore::new();
    let (root, intermediate) = lab.issue_chain();

    let mut leaves = Vec::new();
    for (profile, subject) in [
        (CertificateProfile::Web, "web01.lab.local"),
        (CertificateProfile::CodeSigning, "Lab Code Signing"),
        (CertificateProfile::DocumentEncryption, "Lab Document Encryption"),
    ] {
        let issued = lab
            .issuer()
            .issue(
                &CertificateRequest::new(subject).issued_by(ISSUER_CA),
                profile,
            )
            .unwrap();
        leaves.push(issued);
    }

    let root_der = lab.get(StoreContainer::Root, &root.thumbprint).der_bytes;
    let intermediate_der = lab.get(StoreContainer::Ca, &intermediate.thumbprint).der_bytes;

    verify_signed_by(&root_der, &root_der);
    verify_signed_by(&intermediate_der, &root_der);
    for leaf in leaves {
        let leaf_der = lab.get(StoreContainer::My, &leaf.thumbprint).der_bytes;
        verify_signed_by(&leaf_der, &intermediate_der);
    }
}

#[test]
fn test_signer_is_most_recent_match() {
    let lab = LabStore::new();
    lab.issue_chain();
    // A second issuing CA with the same subject replaces the first as signer.
    let (_, newer) = lab.issue_chain();

    let leaf = lab
        .issuer()
        .issue(
            &CertificateRequest::new("web02.lab.local").issued_by(ISSUER_CA),
            CertificateProfile::Web,
        )
        .unwrap();

    let leaf_der = lab.get(StoreContainer::My, &leaf.thumbprint).der_bytes;
    let newer_der = lab.get(StoreContainer::My, &newer.thumbprint).der_bytes;
    verify_signed_by(&leaf_der, &newer_der);
}

#[test]
fn test_serial_numbers_are_unique() {
    let lab = LabStore::new();
    let (root, intermediate) = lab.issue_chain();

    let a = lab.get(StoreContainer::My, &root.thumbprint).serial_number;
    let b = lab.get(StoreContainer::My, &intermediate.thumbprint).serial_number;
    assert_ne!(a, b);
}
