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

//! Certificate export.
//!
//! For each requested subject the exporter finds the most recently issued
//! certificate in **My** whose subject contains the requested text and
//! writes:
//!
//! - `<folder>/<subject>.crt`: the DER certificate, always.
//! - `<folder>/<subject>.pfx`: certificate, issuing chain and private key,
//!   when the key is requested and exportable.
//! - one `subject, thumbprint, password` line in `<folder>/CertInfo.txt`
//!   per PFX, when password recording is on.
//!
//! A batch only aborts if the folder cannot be created. Every other failure
//! is reported for its subject and the batch moves on.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use secrecy::SecretString;
use tracing::{debug, info, warn};

use crate::error::ExportError;
use crate::password::{PasswordGenerator, PasswordLog, SecurePasswordGenerator};
use crate::pkcs12;
use crate::store::{self, create_private_file, CertStore, StoredCertificate, SubjectMatch};
use crate::types::{
    ExportFailure, ExportOptions, ExportReport, ExportRequest, ExportedArtifact, StoreContainer,
    StoreScope,
};

/// Longest issuing chain bundled into a PFX.
const MAX_CHAIN_DEPTH: usize = 4;

/// Exports stored certificates to disk.
pub struct CertificateExporter<'a> {
    store: &'a dyn CertStore,
    passwords: &'a dyn PasswordGenerator,
}

impl<'a> CertificateExporter<'a> {
    /// Create an exporter over `store` using the OS RNG for passwords.
    pub fn new(store: &'a dyn CertStore) -> Self {
        Self {
            store,
            passwords: &SecurePasswordGenerator,
        }
    }

    /// Use a different password source.
    pub fn with_password_generator(mut self, passwords: &'a dyn PasswordGenerator) -> Self {
        self.passwords = passwords;
        self
    }

    /// Export a single subject.
    pub fn export(&self, request: &ExportRequest) -> Result<ExportedArtifact, ExportError> {
        ensure_folder(&request.options.target_folder)?;
        self.export_one(&request.subject_match, &request.options)
    }

    /// Export each subject in turn, collecting per-subject failures.
    ///
    /// Returns `Err` only if the target folder cannot be created.
    pub fn export_batch(
        &self,
        subjects: &[String],
        options: &ExportOptions,
    ) -> Result<ExportReport, ExportError> {
        ensure_folder(&options.target_folder)?;

        let mut report = ExportReport {
            folder: options.target_folder.clone(),
            ..Default::default()
        };
        for subject in subjects {
            match self.export_one(subject, options) {
                Ok(artifact) => report.artifacts.push(artifact),
                Err(error) => {
                    warn!("Export of '{}' failed: {}", subject, error);
                    report.failures.push(ExportFailure {
                        subject: subject.clone(),
                        error,
                    });
                }
            }
        }

        info!(
            "Exported {} of {} certificate(s) to {}",
            report.artifacts.len(),
            subjects.len(),
            options.target_folder.display()
        );
        Ok(report)
    }

    fn export_one(
        &self,
        subject: &str,
        options: &ExportOptions,
    ) -> Result<ExportedArtifact, ExportError> {
        let cert = self.find(subject, options.scope)?;
        let folder = &options.target_folder;
        let stem = file_stem(subject);

        let certificate_path = folder.join(format!("{stem}.crt"));
        fs::write(&certificate_path, &cert.der_bytes).map_err(|source| ExportError::Write {
            subject: subject.to_string(),
            path: certificate_path.clone(),
            source,
        })?;
        debug!("Wrote {}", certificate_path.display());

        let mut artifact = ExportedArtifact {
            subject: subject.to_string(),
            matched_subject: cert.subject.clone(),
            thumbprint: cert.thumbprint.clone(),
            certificate_path,
            pfx_path: None,
            password_generated: false,
            password_recorded: false,
        };

        if !options.include_private_key {
            info!("Exported {} ({}) without private key", cert.subject, cert.thumbprint);
            return Ok(artifact);
        }

        let key = cert.private_key.as_ref().ok_or_else(|| ExportError::NoPrivateKey {
            subject: subject.to_string(),
            thumbprint: cert.thumbprint.clone(),
        })?;
        if !key.exportable {
            return Err(ExportError::KeyNotExportable {
                subject: subject.to_string(),
                thumbprint: cert.thumbprint.clone(),
            });
        }

        let generated;
        let password: &SecretString = match &options.password {
            Some(password) => password,
            None => {
                generated = self.passwords.generate(options.password_length);
                artifact.password_generated = true;
                &generated
            }
        };

        let chain = self.issuing_chain(subject, options.scope, &cert)?;
        let chain_der: Vec<&[u8]> = chain.iter().map(|c| c.der_bytes.as_slice()).collect();
        let pfx = pkcs12::build_pfx(&cert.der_bytes, &key.pkcs8_der, &chain_der, password, &cert.subject)
            .map_err(|source| ExportError::Pkcs12 {
                subject: subject.to_string(),
                source,
            })?;

        let pfx_path = folder.join(format!("{stem}.pfx"));
        write_private(&pfx_path, &pfx).map_err(|source| ExportError::Write {
            subject: subject.to_string(),
            path: pfx_path.clone(),
            source,
        })?;

        if options.record_passwords {
            let log = PasswordLog::in_folder(folder);
            if let Err(source) = log.append(subject, &cert.thumbprint, password) {
                if let Err(e) = fs::remove_file(&pfx_path) {
                    warn!("Failed to remove {}: {}", pfx_path.display(), e);
                }
                return Err(ExportError::PasswordLog {
                    subject: subject.to_string(),
                    path: log.path().to_path_buf(),
                    source,
                });
            }
            artifact.password_recorded = true;
        }

        info!(
            "Exported {} ({}) with private key to {}",
            cert.subject,
            cert.thumbprint,
            pfx_path.display()
        );
        artifact.pfx_path = Some(pfx_path);
        Ok(artifact)
    }

    /// Most recently issued **My** certificate whose subject contains `subject`.
    fn find(&self, subject: &str, scope: StoreScope) -> Result<StoredCertificate, ExportError> {
        let not_found = || ExportError::CertificateNotFound {
            subject: subject.to_string(),
            scope,
        };
        if subject.trim().is_empty() {
            return Err(not_found());
        }

        let matches = self
            .store
            .find_by_subject(scope, StoreContainer::My, &SubjectMatch::contains(subject))
            .map_err(|source| ExportError::Store {
                subject: subject.to_string(),
                source,
            })?;
        if matches.len() > 1 {
            debug!(
                "{} certificates match '{}'; using the most recent",
                matches.len(),
                subject
            );
        }
        store::latest(matches).ok_or_else(not_found)
    }

    /// CA certificates above `cert`, nearest first, looked up in every container.
    ///
    /// When a certificate carries an authority key identifier, only CA
    /// certificates with that subject key identifier can be its issuer.
    fn issuing_chain(
        &self,
        subject: &str,
        scope: StoreScope,
        cert: &StoredCertificate,
    ) -> Result<Vec<StoredCertificate>, ExportError> {
        let store_err = |source| ExportError::Store {
            subject: subject.to_string(),
            source,
        };
        let mut chain: Vec<StoredCertificate> = Vec::new();
        let mut current = cert.clone();

        while !current.subject.eq_ignore_ascii_case(&current.issuer)
            && chain.len() < MAX_CHAIN_DEPTH
        {
            let authority_key_id = current.summary().map_err(store_err)?.authority_key_id;
            let issuer = SubjectMatch::exact(&current.issuer);
            let mut candidates = Vec::new();
            for container in StoreContainer::ALL {
                let found = self
                    .store
                    .find_by_subject(scope, container, &issuer)
                    .map_err(store_err)?;
                for candidate in found.into_iter().filter(|c| c.is_ca) {
                    if let Some(key_id) = &authority_key_id {
                        let summary = candidate.summary().map_err(store_err)?;
                        if summary.subject_key_id.as_ref() != Some(key_id) {
                            continue;
                        }
                    }
                    candidates.push(candidate);
                }
            }
            let Some(next) = store::latest(candidates) else {
                debug!("Issuer {} of {} not in store", current.issuer, current.subject);
                break;
            };
            chain.push(next.without_private_key());
            current = next;
        }

        Ok(chain)
    }
}

fn ensure_folder(folder: &Path) -> Result<(), ExportError> {
    fs::create_dir_all(folder).map_err(|source| ExportError::TargetFolder {
        path: folder.to_path_buf(),
        source,
    })
}

fn write_private(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = create_private_file(path, false)?;
    file.write_all(data)?;
    file.sync_all()
}

/// File name for a subject: path-hostile characters become `_`.
pub fn file_stem(subject: &str) -> String {
    subject
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issuer::CertificateIssuer;
    use crate::profile::CertificateProfile;
    use crate::store::MemoryCertStore;
    use crate::types::CertificateRequest;
    use tempfile::TempDir;

    struct FixedPassword;

    impl PasswordGenerator for FixedPassword {
        fn generate(&self, _length: usize) -> SecretString {
            SecretString::from("Fixed-Passw0rd")
        }
    }

    fn lab_chain() -> MemoryCertStore {
        let store = MemoryCertStore::new();
        let issuer = CertificateIssuer::new(&store);
        issuer
            .issue(&CertificateRequest::new("TestRootCA"), CertificateProfile::Root)
            .unwrap();
        issuer
            .issue(
                &CertificateRequest::new("TestIssuerCA").issued_by("TestRootCA"),
                CertificateProfile::Intermediate,
            )
            .unwrap();
        store
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("CN=web01, O=Lab"), "CN=web01, O=Lab");
        assert_eq!(file_stem("a/b\\c:d*e?f\"g<h>i|j"), "a_b_c_d_e_f_g_h_i_j");
    }

    #[test]
    fn test_public_only_export() {
        let store = lab_chain();
        let dir = TempDir::new().unwrap();
        let exporter = CertificateExporter::new(&store);

        let artifact = exporter
            .export(&ExportRequest::new(
                "TestRootCA",
                ExportOptions::new(dir.path()),
            ))
            .unwrap();

        assert_eq!(artifact.matched_subject, "CN=TestRootCA");
        assert!(artifact.certificate_path.exists());
        assert!(artifact.pfx_path.is_none());
        assert!(!dir.path().join("CertInfo.txt").exists());
    }

    #[test]
    fn test_generated_password_is_logged_once() {
        let store = lab_chain();
        let dir = TempDir::new().unwrap();
        let exporter = CertificateExporter::new(&store).with_password_generator(&FixedPassword);

        let artifact = exporter
            .export(&ExportRequest::new(
                "TestIssuerCA",
                ExportOptions::new(dir.path()).include_private_key(true),
            ))
            .unwrap();
        assert!(artifact.password_generated);
        assert!(artifact.password_recorded);

        let pfx = fs::read(artifact.pfx_path.unwrap()).unwrap();
        let contents = pkcs12::open_pfx(&pfx, &SecretString::from("Fixed-Passw0rd")).unwrap();
        assert!(contents.public_key_matches().unwrap());
        // Intermediate plus its root.
        assert_eq!(contents.certificates.len(), 2);

        let log = fs::read_to_string(dir.path().join("CertInfo.txt")).unwrap();
        assert_eq!(
            log,
            format!("TestIssuerCA, {}, Fixed-Passw0rd\n", artifact.thumbprint)
        );
    }

    #[test]
    fn test_chain_follows_key_identifiers_after_ca_rotation() {
        let store = MemoryCertStore::new();
        let issuer = CertificateIssuer::new(&store);
        let root = || {
            issuer
                .issue(&CertificateRequest::new("TestRootCA"), CertificateProfile::Root)
                .unwrap()
        };
        let intermediate = || {
            issuer
                .issue(
                    &CertificateRequest::new("TestIssuerCA").issued_by("TestRootCA"),
                    CertificateProfile::Intermediate,
                )
                .unwrap()
        };

        let old_root = root();
        let old_intermediate = intermediate();
        issuer
            .issue(
                &CertificateRequest::new("web01.lab.local").issued_by("TestIssuerCA"),
                CertificateProfile::Web,
            )
            .unwrap();
        // Same names, new keys.
        let new_root = root();
        let new_intermediate = intermediate();

        let dir = TempDir::new().unwrap();
        let artifact = CertificateExporter::new(&store)
            .with_password_generator(&FixedPassword)
            .export(&ExportRequest::new(
                "web01",
                ExportOptions::new(dir.path())
                    .include_private_key(true)
                    .record_passwords(false),
            ))
            .unwrap();

        let pfx = fs::read(artifact.pfx_path.unwrap()).unwrap();
        let contents = pkcs12::open_pfx(&pfx, &SecretString::from("Fixed-Passw0rd")).unwrap();
        let der = |thumbprint: &str| {
            store
                .find_by_thumbprint(StoreScope::LocalMachine, StoreContainer::My, thumbprint)
                .unwrap()
                .unwrap()
                .der_bytes
        };
        assert_eq!(contents.certificates.len(), 3);
        assert!(contents.certificates.contains(&der(&old_intermediate.thumbprint)));
        assert!(contents.certificates.contains(&der(&old_root.thumbprint)));
        assert!(!contents.certificates.contains(&der(&new_intermediate.thumbprint)));
        assert!(!contents.certificates.contains(&der(&new_root.thumbprint)));
    }

    #[test]
    fn test_supplied_password_without_log() {
        let store = lab_chain();
        let dir = TempDir::new().unwrap();
        let exporter = CertificateExporter::new(&store);
        let artifact = exporter
            .export(&ExportRequest::new(
                "TestRootCA",
                ExportOptions::new(dir.path())
                    .include_private_key(true)
                    .password(SecretString::from("Supplied-1"))
                    .record_passwords(false),
            ))
            .unwrap();
        assert!(!artifact.password_generated);
        assert!(!artifact.password_recorded);
        assert!(!dir.path().join("CertInfo.txt").exists());

        let pfx = fs::read(artifact.pfx_path.unwrap()).unwrap();
        assert!(pkcs12::open_pfx(&pfx, &SecretString::from("Supplied-1")).is_ok());
    }

    #[test]
    fn test_non_exportable_key_fails_without_pfx() {
        let store = lab_chain();
        CertificateIssuer::new(&store)
            .issue(
                &CertificateRequest::new("signer")
                    .issued_by("TestIssuerCA"),
                CertificateProfile::CodeSigning,
            )
            .unwrap();
        let dir = TempDir::new().unwrap();

        let err = CertificateExporter::new(&store)
            .export(&ExportRequest::new(
                "signer",
                ExportOptions::new(dir.path()).include_private_key(true),
            ))
            .unwrap_err();
        assert!(matches!(err, ExportError::KeyNotExportable { .. }));
        assert!(dir.path().join("signer.crt").exists());
        assert!(!dir.path().join("signer.pfx").exists());
        assert!(!dir.path().join("CertInfo.txt").exists());
    }

    #[test]
    fn test_batch_collects_missing_subjects() {
        let store = lab_chain();
        let dir = TempDir::new().unwrap();
        let subjects = vec![
            "TestRootCA".to_string(),
            "nobody".to_string(),
            "TestIssuerCA".to_string(),
        ];

        let report = CertificateExporter::new(&store)
            .export_batch(&subjects, &ExportOptions::new(dir.path().join("out")))
            .unwrap();

        assert_eq!(report.artifacts.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].subject, "nobody");
        assert!(matches!(
            report.failures[0].error,
            ExportError::CertificateNotFound { .. }
        ));
        assert!(!report.is_complete());
    }

    #[test]
    fn test_blank_subject_matches_nothing() {
        let store = lab_chain();
        let dir = TempDir::new().unwrap();
        let err = CertificateExporter::new(&store)
            .export(&ExportRequest::new(" ", ExportOptions::new(dir.path())))
            .unwrap_err();
        assert!(matches!(err, ExportError::CertificateNotFound { .. }));
    }

    #[test]
    fn test_unusable_folder_aborts_batch() {
        let store = lab_chain();
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("occupied");
        fs::write(&file, b"x").unwrap();

        let err = CertificateExporter::new(&store)
            .export_batch(&["TestRootCA".to_string()], &ExportOptions::new(&file))
            .unwrap_err();
        assert!(err.is_batch_fatal());
    }
}
