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

//! Integration tests for CRT/PFX export

use std::fs;

use crate::integration::{file_names, password_log, LabStore, ISSUER_CA, ROOT_CA};
use labcert::pkcs12::open_pfx;
use labcert::{
    CertificateExporter, CertificateProfile, CertificateRequest, ExportError, ExportOptions,
    ExportRequest, Pkcs12Error, StoreContainer,
};
use secrecy::SecretString;

#[test]
fn test_issuer_ca_export_with_generated_password() {
    let lab = LabStore::new();
    let (_, intermediate) = lab.issue_chain();
    let folder = lab.export_folder();

    let artifact = CertificateExporter::new(&lab.store)
        .export(&ExportRequest::new(
            ISSUER_CA,
            ExportOptions::new(&folder).include_private_key(true),
        ))
        .unwrap();

    assert_eq!(
        file_names(&folder),
        vec!["CertInfo.txt", "TestIssuerCA.crt", "TestIssuerCA.pfx"]
    );
    assert!(artifact.password_generated);
    assert!(artifact.password_recorded);
    assert_eq!(artifact.thumbprint, intermediate.thumbprint);

    let stored = lab.get(StoreContainer::My, &intermediate.thumbprint);
    assert_eq!(fs::read(folder.join("TestIssuerCA.crt")).unwrap(), stored.der_bytes);

    let log = password_log(&folder);
    assert_eq!(log.len(), 1);
    let (subject, thumbprint, password) = &log[0];
    assert_eq!(subject, ISSUER_CA);
    assert_eq!(thumbprint, &intermediate.thumbprint);
    assert_eq!(password.len(), 20);

    let pfx = fs::read(folder.join("TestIssuerCA.pfx")).unwrap();
    let contents = open_pfx(&pfx, &SecretString::from(password.as_str())).unwrap();
    assert_eq!(contents.certificate_der, stored.der_bytes);
    assert!(contents.public_key_matches().unwrap());
}

#[test]
fn test_known_password_round_trip_includes_chain() {
    let lab = LabStore::new();
    let (root, intermediate) = lab.issue_chain();
    let web = lab
        .issuer()
        .issue(
            &CertificateRequest::new("web01.lab.local").issued_by(ISSUER_CA),
            CertificateProfile::Web,
        )
        .unwrap();
    let folder = lab.export_folder();

    let options = ExportOptions::new(&folder)
        .include_private_key(true)
        .password(SecretString::from("Lab-Passw0rd!"))
        .record_passwords(false);
    let artifact = CertificateExporter::new(&lab.store)
        .export(&ExportRequest::new("web01", options))
        .unwrap();

    assert!(!artifact.password_generated);
    assert!(!folder.join("CertInfo.txt").exists());

    let pfx = fs::read(artifact.pfx_path.unwrap()).unwrap();
    let contents = open_pfx(&pfx, &SecretString::from("Lab-Passw0rd!")).unwrap();
    assert!(contents.public_key_matches().unwrap());

    let expected: Vec<Vec<u8>> = [
        (StoreContainer::My, &web.thumbprint),
        (StoreContainer::Ca, &intermediate.thumbprint),
        (StoreContainer::Root, &root.thumbprint),
    ]
    .into_iter()
    .map(|(container, thumbprint)| lab.get(container, thumbprint).der_bytes)
    .collect();
    assert_eq!(contents.certificates.len(), expected.len());
    for der in &expected {
        assert!(contents.certificates.contains(der));
    }

    let err = open_pfx(&pfx, &SecretString::from("wrong")).err().unwrap();
    assert!(matches!(err, Pkcs12Error::BadPassword));
}

#[test]
fn test_non_exportable_key_produces_no_pfx() {
    let lab = LabStore::new();
    lab.issue_chain();
    lab.issuer()
        .issue(
            &CertificateRequest::new("Lab Code Signing").issued_by(ISSUER_CA),
            CertificateProfile::CodeSigning,
        )
        .unwrap();
    let folder = lab.export_folder();

    let err = CertificateExporter::new(&lab.store)
        .export(&ExportRequest::new(
            "Lab Code Signing",
            ExportOptions::new(&folder).include_private_key(true),
        ))
        .unwrap_err();

    assert!(matches!(err, ExportError::KeyNotExportable { .. }), "{err}");
    assert!(!folder.join("Lab Code Signing.pfx").exists());
    assert!(!folder.join("CertInfo.txt").exists());
}

#[test]
fn test_batch_with_missing_subjects_continues() {
    let lab = LabStore::new();
    lab.issue_chain();
    let folder = lab.export_folder();

    let subjects: Vec<String> = [ROOT_CA, "MissingOne", ISSUER_CA, "MissingTwo"]
        .into_iter()
        .map(String::from)
        .collect();
    let report = CertificateExporter::new(&lab.store)
        .export_batch(&subjects, &ExportOptions::new(&folder))
        .unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.artifacts.len(), 2);
    assert_eq!(report.failures.len(), 2);
    assert_eq!(report.failures[0].subject, "MissingOne");
    assert_eq!(report.failures[1].subject, "MissingTwo");
    for failure in &report.failures {
        assert!(matches!(
            failure.error,
            ExportError::CertificateNotFound { .. }
        ));
    }
    assert_eq!(
        file_names(&folder),
        vec!["TestIssuerCA.crt", "TestRootCA.crt"]
    );
}

#[test]
fn test_batch_with_keys_logs_one_line_per_pfx() {
    let lab = LabStore::new();
    lab.issue_chain();
    let folder = lab.export_folder();

    let subjects = vec![ROOT_CA.to_string(), ISSUER_CA.to_string()];
    let report = CertificateExporter::new(&lab.store)
        .export_batch(&subjects, &ExportOptions::new(&folder).include_private_key(true))
        .unwrap();

    assert!(report.is_complete());
    let log = password_log(&folder);
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].0, ROOT_CA);
    assert_eq!(log[1].0, ISSUER_CA);
    assert_ne!(log[0].2, log[1].2);
}

#[test]
fn test_export_picks_latest_match() {
    let lab = LabStore::new();
    lab.issue_root();
    let newer = lab.issue_root();
    let folder = lab.export_folder();

    let artifact = CertificateExporter::new(&lab.store)
        .export(&ExportRequest::new("testrootca", ExportOptions::new(&folder)))
        .unwrap();

    assert_eq!(artifact.thumbprint, newer.thumbprint);
    assert!(folder.join("testrootca.crt").exists());
}
