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

//! Certificate store abstraction.
//!
//! The store is modelled on the Windows certificate store: a scope
//! (LocalMachine or CurrentUser) holds the containers **My**, **CA** and
//! **Root**. Entries in **My** carry their private key, entries in the other
//! containers are public-only copies.
//!
//! Two implementations are provided:
//!
//! - [`FileCertStore`]: one JSON record per certificate on disk.
//! - [`MemoryCertStore`]: an in-process map, for tests and dry runs.
//!
//! # Example
//!
//! ```no_run
//! use labcert::store::{CertStore, FileCertStore, SubjectMatch};
//! use labcert::{StoreContainer, StoreScope};
//!
//! let store = FileCertStore::open("/var/lib/labcert/store")?;
//! let matches = store.find_by_subject(
//!     StoreScope::LocalMachine,
//!     StoreContainer::My,
//!     &SubjectMatch::contains("TestRootCA"),
//! )?;
//! for cert in matches {
//!     println!("{} {}", cert.thumbprint, cert.subject);
//! }
//! # Ok::<(), labcert::error::StoreError>(())
//! ```

mod file;
mod memory;

pub(crate) use file::create_private_file;
pub use file::FileCertStore;
pub use memory::MemoryCertStore;

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use zeroize::Zeroize;

use crate::error::StoreError;
use crate::profile::CertificateProfile;
use crate::types::{StoreContainer, StoreScope};
use crate::x509::CertificateSummary;

/// A certificate held in a store container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCertificate {
    /// Subject, `CN=a, O=b` order.
    pub subject: String,
    /// Issuer, same format.
    pub issuer: String,
    /// SHA-1 thumbprint, upper-case hex.
    pub thumbprint: String,
    /// Serial number, upper-case hex.
    pub serial_number: String,
    /// Start of validity.
    #[serde(with = "time::serde::rfc3339")]
    pub not_before: OffsetDateTime,
    /// End of validity.
    #[serde(with = "time::serde::rfc3339")]
    pub not_after: OffsetDateTime,
    /// When the entry was created, nanosecond precision.
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,
    /// Basic constraints cA flag.
    pub is_ca: bool,
    /// Profile the certificate was issued under, if known.
    #[serde(default)]
    pub profile: Option<CertificateProfile>,
    /// DER certificate.
    #[serde(with = "base64_bytes")]
    pub der_bytes: Vec<u8>,
    /// Private key, present for **My** entries.
    #[serde(default)]
    pub private_key: Option<StoredPrivateKey>,
}

impl StoredCertificate {
    /// Build an entry from DER, deriving the indexed fields.
    pub fn from_der(
        der_bytes: Vec<u8>,
        profile: Option<CertificateProfile>,
        private_key: Option<StoredPrivateKey>,
    ) -> Result<Self, StoreError> {
        let summary = CertificateSummary::from_der(&der_bytes)?;
        Ok(Self {
            subject: summary.subject,
            issuer: summary.issuer,
            thumbprint: summary.thumbprint,
            serial_number: summary.serial_number,
            not_before: summary.not_before,
            not_after: summary.not_after,
            issued_at: OffsetDateTime::now_utc(),
            is_ca: summary.is_ca,
            profile,
            der_bytes,
            private_key,
        })
    }

    /// Returns true if the store holds the private key.
    pub fn has_private_key(&self) -> bool {
        self.private_key.is_some()
    }

    /// Returns true if the private key may be exported.
    pub fn is_key_exportable(&self) -> bool {
        self.private_key.as_ref().is_some_and(|k| k.exportable)
    }

    /// Public-only copy, as placed in the **CA** and **Root** containers.
    pub fn without_private_key(&self) -> Self {
        Self {
            private_key: None,
            ..self.clone()
        }
    }

    /// Parse the certificate for its extensions.
    pub fn summary(&self) -> Result<CertificateSummary, StoreError> {
        CertificateSummary::from_der(&self.der_bytes)
    }

    /// Returns true if the certificate is valid at `now`.
    pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        self.not_before <= now && now <= self.not_after
    }
}

/// PKCS#8 private key with its export policy.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoredPrivateKey {
    /// PKCS#8 DER.
    #[serde(with = "base64_bytes")]
    pub pkcs8_der: Vec<u8>,
    /// Whether PKCS#12 export is allowed.
    pub exportable: bool,
}

impl StoredPrivateKey {
    /// Wrap a PKCS#8 key.
    pub fn new(pkcs8_der: Vec<u8>, exportable: bool) -> Self {
        Self {
            pkcs8_der,
            exportable,
        }
    }
}

impl fmt::Debug for StoredPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredPrivateKey")
            .field("pkcs8_der", &"[REDACTED]")
            .field("exportable", &self.exportable)
            .finish()
    }
}

impl Drop for StoredPrivateKey {
    fn drop(&mut self) {
        self.pkcs8_der.zeroize();
    }
}

/// How to match a subject when searching a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectMatch {
    /// Whole subject, ignoring case.
    Exact(String),
    /// Substring of the subject, ignoring case.
    Contains(String),
}

impl SubjectMatch {
    /// Match the whole subject.
    pub fn exact(subject: impl Into<String>) -> Self {
        Self::Exact(subject.into())
    }

    /// Match a substring of the subject.
    pub fn contains(pattern: impl Into<String>) -> Self {
        Self::Contains(pattern.into())
    }

    /// Test a subject.
    pub fn matches(&self, subject: &str) -> bool {
        match self {
            Self::Exact(expected) => expected.trim().eq_ignore_ascii_case(subject.trim()),
            Self::Contains(pattern) => subject
                .to_lowercase()
                .contains(&pattern.trim().to_lowercase()),
        }
    }
}

impl fmt::Display for SubjectMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(s) => write!(f, "'{s}'"),
            Self::Contains(s) => write!(f, "*{s}*"),
        }
    }
}

/// Pick the most recently issued certificate, breaking ties on not-before.
pub fn latest(certs: impl IntoIterator<Item = StoredCertificate>) -> Option<StoredCertificate> {
    certs
        .into_iter()
        .max_by_key(|c| (c.issued_at, c.not_before))
}

/// Capability for reading and writing a certificate store.
///
/// Implementations replace an existing entry with the same thumbprint on
/// import.
pub trait CertStore: Send + Sync {
    /// List every certificate in a container.
    fn list_certificates(
        &self,
        scope: StoreScope,
        container: StoreContainer,
    ) -> Result<Vec<StoredCertificate>, StoreError>;

    /// Add a certificate to a container.
    fn import_certificate(
        &self,
        scope: StoreScope,
        container: StoreContainer,
        cert: &StoredCertificate,
    ) -> Result<(), StoreError>;

    /// Remove a certificate. Returns false if it was not present.
    fn delete_certificate(
        &self,
        scope: StoreScope,
        container: StoreContainer,
        thumbprint: &str,
    ) -> Result<bool, StoreError>;

    /// Find certificates whose subject matches.
    fn find_by_subject(
        &self,
        scope: StoreScope,
        container: StoreContainer,
        pattern: &SubjectMatch,
    ) -> Result<Vec<StoredCertificate>, StoreError> {
        Ok(self
            .list_certificates(scope, container)?
            .into_iter()
            .filter(|c| pattern.matches(&c.subject))
            .collect())
    }

    /// Find a certificate by SHA-1 thumbprint (separators and case ignored).
    fn find_by_thumbprint(
        &self,
        scope: StoreScope,
        container: StoreContainer,
        thumbprint: &str,
    ) -> Result<Option<StoredCertificate>, StoreError> {
        let wanted = normalize_thumbprint(thumbprint);
        Ok(self
            .list_certificates(scope, container)?
            .into_iter()
            .find(|c| c.thumbprint == wanted))
    }
}

/// Strip `:`, spaces and `-` and upper-case.
pub fn normalize_thumbprint(thumbprint: &str) -> String {
    thumbprint
        .chars()
        .filter(|c| !matches!(c, ':' | ' ' | '-'))
        .collect::<String>()
        .to_uppercase()
}

mod base64_bytes {
    use base64::prelude::*;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64_STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64_STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}
