//! Integration test utilities and helpers
//!
//! Every test gets its own temporary directory holding a file store and an
//! export folder.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use labcert::store::{CertStore, FileCertStore, StoredCertificate};
use labcert::{
    CertificateIssuer, CertificateProfile, CertificateRequest, IssuedCertificate, StoreContainer,
    StoreScope,
};
use tempfile::TempDir;

mod chain_test;
mod config_test;
mod export_test;
mod issue_test;

/// Root subject used by the lab chain.
pub const ROOT_CA: &str = "TestRootCA";

/// Issuing CA subject used by the lab chain.
pub const ISSUER_CA: &str = "TestIssuerCA";

/// A file store in a temporary directory.
pub struct LabStore {
    dir: TempDir,
    pub store: FileCertStore,
}

impl LabStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let store = FileCertStore::open(dir.path().join("store")).expect("open store");
        Self { dir, store }
    }

    /// Issuer over this store.
    pub fn issuer(&self) -> CertificateIssuer<'_> {
        CertificateIssuer::new(&self.store)
    }

    /// Folder for export output, inside the temporary directory.
    pub fn export_folder(&self) -> PathBuf {
        self.dir.path().join("certs")
    }

    /// Issue `TestRootCA`.
    pub fn issue_root(&self) -> IssuedCertificate {
        self.issuer()
            .issue(&CertificateRequest::new(ROOT_CA), CertificateProfile::Root)
            .expect("root issuance")
    }

    /// Issue `TestRootCA` and `TestIssuerCA`.
    pub fn issue_chain(&self) -> (IssuedCertificate, IssuedCertificate) {
        let root = self.issue_root();
        let intermediate = self
            .issuer()
            .issue(
                &CertificateRequest::new(ISSUER_CA).issued_by(ROOT_CA),
                CertificateProfile::Intermediate,
            )
            .expect("intermediate issuance");
        (root, intermediate)
    }

    /// Certificate by thumbprint from a LocalMachine container.
    pub fn get(&self, container: StoreContainer, thumbprint: &str) -> StoredCertificate {
        self.store
            .find_by_thumbprint(StoreScope::LocalMachine, container, thumbprint)
            .expect("store read")
            .unwrap_or_else(|| panic!("{thumbprint} not in {container}"))
    }

    /// Number of certificates across every container of both scopes.
    pub fn total(&self) -> usize {
        StoreScope::ALL
            .into_iter()
            .flat_map(|scope| StoreContainer::ALL.into_iter().map(move |c| (scope, c)))
            .map(|(scope, c)| self.store.list_certificates(scope, c).expect("list").len())
            .sum()
    }
}

/// Names of the files in `folder`, sorted.
pub fn file_names(folder: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(folder)
        .expect("read export folder")
        .map(|e| e.expect("dir entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// `(subject, thumbprint, password)` lines of a password log.
pub fn password_log(folder: &Path) -> Vec<(String, String, String)> {
    fs::read_to_string(folder.join("CertInfo.txt"))
        .expect("read CertInfo.txt")
        .lines()
        .map(|line| {
            let parts: Vec<&str> = line.splitn(3, ", ").collect();
            assert_eq!(parts.len(), 3, "malformed log line: {line}");
            (parts[0].to_string(), parts[1].to_string(), parts[2].to_string())
        })
        .collect()
}
