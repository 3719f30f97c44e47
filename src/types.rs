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

//! Request and result types for issuance and export.
//!
//! Store scopes and containers mirror the Windows certificate store layout:
//!
//! - **LocalMachine** / **CurrentUser** select the store scope.
//! - **My** holds personal certificates with private keys.
//! - **CA** holds intermediate certification authorities.
//! - **Root** holds trusted roots.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{Error, ExportError};
use crate::profile::CertificateProfile;

/// Default certificate lifetime in days.
pub const DEFAULT_VALIDITY_DAYS: u32 = 365;

/// Default length of generated PFX passwords.
pub const DEFAULT_PASSWORD_LENGTH: usize = 20;

/// Scope of a certificate store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StoreScope {
    /// System-wide store.
    #[default]
    LocalMachine,
    /// Per-user store.
    CurrentUser,
}

impl StoreScope {
    /// All scopes.
    pub const ALL: [StoreScope; 2] = [StoreScope::LocalMachine, StoreScope::CurrentUser];

    /// Get the canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalMachine => "LocalMachine",
            Self::CurrentUser => "CurrentUser",
        }
    }
}

impl fmt::Display for StoreScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "localmachine" | "local_machine" | "machine" => Ok(Self::LocalMachine),
            "currentuser" | "current_user" | "user" => Ok(Self::CurrentUser),
            _ => Err(Error::invalid_argument(format!(
                "unknown store scope '{s}': expected LocalMachine or CurrentUser"
            ))),
        }
    }
}

/// Container inside a store scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreContainer {
    /// Personal certificates, with private keys.
    My,
    /// Intermediate certification authorities.
    #[serde(rename = "CA")]
    Ca,
    /// Trusted root certification authorities.
    Root,
}

impl StoreContainer {
    /// All containers.
    pub const ALL: [StoreContainer; 3] =
        [StoreContainer::My, StoreContainer::Ca, StoreContainer::Root];

    /// Get the canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::My => "My",
            Self::Ca => "CA",
            Self::Root => "Root",
        }
    }
}

impl fmt::Display for StoreContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreContainer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "my" | "personal" => Ok(Self::My),
            "ca" | "intermediate" => Ok(Self::Ca),
            "root" | "trustedroot" => Ok(Self::Root),
            _ => Err(Error::invalid_argument(format!(
                "unknown store container '{s}': expected My, CA or Root"
            ))),
        }
    }
}

/// Input to [`CertificateIssuer::issue`](crate::issuer::CertificateIssuer::issue).
///
/// Only `subject` is always required. Which of the remaining fields matter
/// depends on the profile being issued.
///
/// # Example
///
/// ```
/// use labcert::{CertificateRequest, StoreScope};
///
/// let request = CertificateRequest::new("web01.lab.local")
///     .alt_name("web01")
///     .issued_by("TestIssuerCA")
///     .validity_days(90)
///     .scope(StoreScope::CurrentUser);
/// assert_eq!(request.subject_alt_names, vec!["web01".to_string()]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    /// Common name, or a full distinguished name such as `CN=a, O=b`.
    pub subject: String,
    /// Extra DNS names (Web profile).
    pub subject_alt_names: Vec<String>,
    /// User principal name (ClientAuth profile).
    pub user_principal_name: Option<String>,
    /// Domain used for the URL SAN entry (ClientAuth profile).
    pub target_domain: Option<String>,
    /// GUID SAN entry (ClientAuth profile); generated when absent.
    pub guid: Option<String>,
    /// Subject of the signing certificate; required for all but Root.
    pub issuer_subject: Option<String>,
    /// Lifetime in days, must be positive.
    pub validity_days: u32,
    /// Explicit key export policy; `None` uses the profile default.
    pub key_exportable: Option<bool>,
    /// Store scope to write into and look the signer up in.
    pub scope: StoreScope,
}

impl CertificateRequest {
    /// Create a request for the given subject with default settings.
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            subject_alt_names: Vec::new(),
            user_principal_name: None,
            target_domain: None,
            guid: None,
            issuer_subject: None,
            validity_days: DEFAULT_VALIDITY_DAYS,
            key_exportable: None,
            scope: StoreScope::default(),
        }
    }

    /// Add a DNS subject alternative name.
    pub fn alt_name(mut self, name: impl Into<String>) -> Self {
        self.subject_alt_names.push(name.into());
        self
    }

    /// Add several DNS subject alternative names.
    pub fn alt_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subject_alt_names
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Set the user principal name.
    pub fn user_principal_name(mut self, upn: impl Into<String>) -> Self {
        self.user_principal_name = Some(upn.into());
        self
    }

    /// Set the target domain.
    pub fn target_domain(mut self, domain: impl Into<String>) -> Self {
        self.target_domain = Some(domain.into());
        self
    }

    /// Set the GUID.
    pub fn guid(mut self, guid: impl Into<String>) -> Self {
        self.guid = Some(guid.into());
        self
    }

    /// Set the subject of the signing certificate.
    pub fn issued_by(mut self, issuer: impl Into<String>) -> Self {
        self.issuer_subject = Some(issuer.into());
        self
    }

    /// Set the lifetime in days.
    pub fn validity_days(mut self, days: u32) -> Self {
        self.validity_days = days;
        self
    }

    /// Override the profile's key export policy.
    pub fn exportable(mut self, exportable: bool) -> Self {
        self.key_exportable = Some(exportable);
        self
    }

    /// Set the store scope.
    pub fn scope(mut self, scope: StoreScope) -> Self {
        self.scope = scope;
        self
    }
}

/// A certificate registered in the store by the issuer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCertificate {
    /// SHA-1 thumbprint, upper-case hex.
    pub thumbprint: String,
    /// Subject distinguished name.
    pub subject: String,
    /// Issuer distinguished name.
    pub issuer: String,
    /// Profile the certificate was issued under.
    pub profile: CertificateProfile,
    /// Start of validity.
    pub not_before: OffsetDateTime,
    /// End of validity.
    pub not_after: OffsetDateTime,
    /// Store scope holding the certificate.
    pub scope: StoreScope,
    /// Containers the certificate was written to.
    pub containers: Vec<StoreContainer>,
    /// Whether the private key may be exported.
    pub key_exportable: bool,
}

/// Settings shared by every subject of an export batch.
#[derive(Debug)]
pub struct ExportOptions {
    /// Folder receiving `.crt`, `.pfx` and the password log.
    pub target_folder: PathBuf,
    /// Also export the private key as PKCS#12.
    pub include_private_key: bool,
    /// PFX password; generated per subject when absent.
    pub password: Option<SecretString>,
    /// Store scope to search.
    pub scope: StoreScope,
    /// Append `subject, thumbprint, password` to the password log for every PFX.
    ///
    /// This writes passwords in plaintext and is only meant for lab use.
    pub record_passwords: bool,
    /// Length of generated passwords.
    pub password_length: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            target_folder: PathBuf::from("certs"),
            include_private_key: false,
            password: None,
            scope: StoreScope::default(),
            record_passwords: true,
            password_length: DEFAULT_PASSWORD_LENGTH,
        }
    }
}

impl ExportOptions {
    /// Create options exporting into the given folder.
    pub fn new(target_folder: impl Into<PathBuf>) -> Self {
        Self {
            target_folder: target_folder.into(),
            ..Default::default()
        }
    }

    /// Also export private keys.
    pub fn include_private_key(mut self, include: bool) -> Self {
        self.include_private_key = include;
        self
    }

    /// Use a fixed password instead of generating one.
    pub fn password(mut self, password: SecretString) -> Self {
        self.password = Some(password);
        self
    }

    /// Set the store scope.
    pub fn scope(mut self, scope: StoreScope) -> Self {
        self.scope = scope;
        self
    }

    /// Enable or disable the plaintext password log.
    pub fn record_passwords(mut self, record: bool) -> Self {
        self.record_passwords = record;
        self
    }

    /// Set the generated password length.
    pub fn password_length(mut self, length: usize) -> Self {
        self.password_length = length;
        self
    }
}

/// Input to a single-subject export.
#[derive(Debug)]
pub struct ExportRequest {
    /// Case-insensitive substring matched against stored subjects.
    pub subject_match: String,
    /// Folder, key and password settings.
    pub options: ExportOptions,
}

impl ExportRequest {
    /// Create an export request.
    pub fn new(subject_match: impl Into<String>, options: ExportOptions) -> Self {
        Self {
            subject_match: subject_match.into(),
            options,
        }
    }
}

/// Files produced for one exported subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedArtifact {
    /// Subject pattern as requested.
    pub subject: String,
    /// Subject of the certificate that matched.
    pub matched_subject: String,
    /// Thumbprint of the certificate that matched.
    pub thumbprint: String,
    /// Path of the `.crt` file.
    pub certificate_path: PathBuf,
    /// Path of the `.pfx` file, when the key was exported.
    pub pfx_path: Option<PathBuf>,
    /// Whether the PFX password was generated.
    pub password_generated: bool,
    /// Whether a password log line was written.
    pub password_recorded: bool,
}

/// One subject of a batch that could not be exported.
#[derive(Debug)]
pub struct ExportFailure {
    /// Subject pattern as requested.
    pub subject: String,
    /// Why it failed.
    pub error: ExportError,
}

/// Outcome of an export batch.
#[derive(Debug, Default)]
pub struct ExportReport {
    /// Folder the batch wrote into.
    pub folder: PathBuf,
    /// Successfully exported subjects, in request order.
    pub artifacts: Vec<ExportedArtifact>,
    /// Subjects that failed, in request order.
    pub failures: Vec<ExportFailure>,
}

impl ExportReport {
    /// Returns true if every subject was exported.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}
