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

//! Integration tests for certificate issuance

use crate::integration::{LabStore, ISSUER_CA, ROOT_CA};
use labcert::profile::{ExtendedKeyUsage, KeyUsage};
use labcert::store::{CertStore, FileCertStore, SubjectMatch};
use labcert::{
    CertificateProfile, CertificateRequest, IssuanceError, StoreContainer, StoreScope,
};

#[test]
fn test_root_lands_in_my_and_root() {
    let lab = LabStore::new();

    let root = lab.issue_root();

    assert_eq!(root.subject, "CN=TestRootCA");
    assert_eq!(root.thumbprint.len(), 40);
    let in_my = lab.get(StoreContainer::My, &root.thumbprint);
    let in_root = lab.get(StoreContainer::Root, &root.thumbprint);
    assert!(in_my.has_private_key());
    assert!(!in_root.has_private_key());
    assert_eq!(in_my.der_bytes, in_root.der_bytes);

    let summary = in_my.summary().unwrap();
    assert!(summary.is_self_issued());
    assert!(summary.is_ca);
}

#[test]
fn test_intermediate_before_root_fails() {
    let lab = LabStore::new();

    let result = lab.issuer().issue(
        &CertificateRequest::new(ISSUER_CA).issued_by(ROOT_CA),
        CertificateProfile::Intermediate,
    );

    assert!(
        matches!(result, Err(IssuanceError::SignerNotFound { .. })),
        "expected SignerNotFound, got {result:?}"
    );
    assert_eq!(lab.total(), 0);
}

#[test]
fn test_intermediate_after_root_succeeds() {
    let lab = LabStore::new();
    let (root, intermediate) = lab.issue_chain();

    assert_eq!(intermediate.issuer, root.subject);
    assert_eq!(
        intermediate.containers,
        vec![StoreContainer::My, StoreContainer::Ca]
    );
    assert!(!lab.get(StoreContainer::Ca, &intermediate.thumbprint).has_private_key());
}

#[test]
fn test_signed_profiles_without_signer_write_nothing() {
    let lab = LabStore::new();

    for profile in CertificateProfile::ALL {
        if !profile.requires_signer() {
            continue;
        }
        let request = CertificateRequest::new("orphan")
            .issued_by("NoSuchCA")
            .user_principal_name("orphan@lab.local")
            .target_domain("lab.local");

        let err = lab.issuer().issue(&request, profile).unwrap_err();
        assert!(
            matches!(err, IssuanceError::SignerNotFound { .. }),
            "{profile}: {err}"
        );
    }
    assert_eq!(lab.total(), 0);
}

#[test]
fn test_validity_matches_requested_days() {
    let lab = LabStore::new();
    lab.issue_chain();

    for days in [1u32, 30, 365, 3650] {
        let issued = lab
            .issuer()
            .issue(
                &CertificateRequest::new(format!("web-{days}.lab.local"))
                    .issued_by(ISSUER_CA)
                    .validity_days(days),
                CertificateProfile::Web,
            )
            .unwrap();

        let summary = lab.get(StoreContainer::My, &issued.thumbprint).summary().unwrap();
        let lifetime = summary.not_after - summary.not_before;
        let expected = time::Duration::days(i64::from(days));
        assert!(
            (lifetime - expected).abs() <= time::Duration::seconds(1),
            "{days} days gave {lifetime}"
        );
    }
}

#[test]
fn test_zero_days_touches_nothing() {
    let lab = LabStore::new();

    let err = lab
        .issuer()
        .issue(
            &CertificateRequest::new(ROOT_CA).validity_days(0),
            CertificateProfile::Root,
        )
        .unwrap_err();

    assert!(err.is_configuration_error());
    assert_eq!(lab.total(), 0);
}

#[test]
fn test_web_certificate_names_and_usages() {
    let lab = LabStore::new();
    lab.issue_chain();

    let issued = lab
        .issuer()
        .issue(
            &CertificateRequest::new("web01.lab.local")
                .alt_names(["web01", "www.lab.local"])
                .issued_by(ISSUER_CA),
            CertificateProfile::Web,
        )
        .unwrap();

    let summary = lab.get(StoreContainer::My, &issued.thumbprint).summary().unwrap();
    assert_eq!(summary.issuer, "CN=TestIssuerCA");
    assert!(!summary.is_ca);
    assert_eq!(
        summary.subject_alt_names.dns_names,
        vec!["web01.lab.local", "web01", "www.lab.local"]
    );
    assert!(summary.has_key_usage(KeyUsage::DigitalSignature));
    assert!(summary.has_key_usage(KeyUsage::KeyEncipherment));
    assert!(summary
        .extended_key_usages
        .contains(&ExtendedKeyUsage::ServerAuth.oid()));
}

#[test]
fn test_client_auth_identity_names() {
    let lab = LabStore::new();
    lab.issue_chain();

    let issued = lab
        .issuer()
        .issue(
            &CertificateRequest::new("jdoe")
                .user_principal_name("jdoe@lab.local")
                .target_domain("lab.local")
                .guid("5f0c7a1e-4b7d-4f4e-9a55-0c1d2e3f4a5b")
                .issued_by(ISSUER_CA),
            CertificateProfile::ClientAuth,
        )
        .unwrap();

    assert!(!issued.key_exportable);
    let summary = lab.get(StoreContainer::My, &issued.thumbprint).summary().unwrap();
    let names = &summary.subject_alt_names;
    assert_eq!(names.user_principal_names, vec!["jdoe@lab.local"]);
    assert_eq!(names.guids.len(), 1);
    assert_eq!(
        names.guids[0].to_string(),
        "5f0c7a1e-4b7d-4f4e-9a55-0c1d2e3f4a5b"
    );
    assert!(names.uris.iter().any(|u| u.contains("lab.local")));
    assert!(summary
        .extended_key_usages
        .contains(&ExtendedKeyUsage::ClientAuth.oid()));
}

#[test]
fn test_current_user_scope_is_separate() {
    let lab = LabStore::new();

    let root = lab
        .issuer()
        .issue(
            &CertificateRequest::new(ROOT_CA).scope(StoreScope::CurrentUser),
            CertificateProfile::Root,
        )
        .unwrap();
    assert_eq!(root.scope, StoreScope::CurrentUser);

    // The LocalMachine store has no signer.
    let result = lab.issuer().issue(
        &CertificateRequest::new(ISSUER_CA).issued_by(ROOT_CA),
        CertificateProfile::Intermediate,
    );
    assert!(matches!(result, Err(IssuanceError::SignerNotFound { .. })));

    lab.issuer()
        .issue(
            &CertificateRequest::new(ISSUER_CA)
                .issued_by(ROOT_CA)
                .scope(StoreScope::CurrentUser),
            CertificateProfile::Intermediate,
        )
        .unwrap();
}

#[test]
fn test_store_survives_reopen() {
    let lab = LabStore::new();
    let root = lab.issue_root();

    let reopened = FileCertStore::open(lab.store.root()).unwrap();
    let found = reopened
        .find_by_subject(
            StoreScope::LocalMachine,
            StoreContainer::My,
            &SubjectMatch::exact("CN=TestRootCA"),
        )
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].thumbprint, root.thumbprint);
    assert!(found[0].has_private_key());
}
