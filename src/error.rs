//! Error types for certificate issuance, export and the backing store.
//!
//! Issuance and export each get their own enum so callers can tell a lookup
//! miss from a store or crypto failure without string matching. Every variant
//! carries the subject being processed so an operator can act on the message
//! alone.

use std::path::PathBuf;

use thiserror::Error;

use crate::profile::CertificateProfile;
use crate::types::{StoreContainer, StoreScope};

/// Result type alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by a [`CertStore`](crate::store::CertStore) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing a store file failed.
    #[error("store I/O error at {}: {source}", path.display())]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying cause.
        #[source]
        source: std::io::Error,
    },

    /// A store record could not be (de)serialized.
    #[error("corrupt store record {}: {source}", path.display())]
    Record {
        /// Record file.
        path: PathBuf,
        /// Underlying cause.
        #[source]
        source: serde_json::Error,
    },

    /// Certificate bytes could not be parsed.
    #[error("certificate parsing error: {0}")]
    CertificateParsing(String),
}

impl StoreError {
    /// Create an I/O error for the given path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a certificate parsing error with the given message.
    pub fn certificate_parsing(msg: impl Into<String>) -> Self {
        Self::CertificateParsing(msg.into())
    }
}

/// Errors that can occur while issuing a certificate.
#[derive(Debug, Error)]
pub enum IssuanceError {
    /// No usable signing certificate matches the requested issuer.
    #[error(
        "no signer for {profile} certificate '{subject}': \
         no CA certificate with a private key matching '{issuer}' in {scope}\\My"
    )]
    SignerNotFound {
        /// Profile being issued.
        profile: CertificateProfile,
        /// Subject being issued.
        subject: String,
        /// Issuer subject that was searched for.
        issuer: String,
        /// Store scope searched.
        scope: StoreScope,
    },

    /// The request is missing or misuses a parameter required by the profile.
    #[error("invalid parameters for {profile} certificate '{subject}': {reason}")]
    InvalidProfileParameters {
        /// Profile being issued.
        profile: CertificateProfile,
        /// Subject being issued.
        subject: String,
        /// What is wrong.
        reason: String,
    },

    /// Reading the store while resolving the signer failed.
    #[error("store lookup failed for {profile} certificate '{subject}': {source}")]
    StoreReadFailure {
        /// Profile being issued.
        profile: CertificateProfile,
        /// Subject being issued.
        subject: String,
        /// Underlying cause.
        #[source]
        source: StoreError,
    },

    /// Registering the new certificate in the store failed.
    #[error(
        "failed to write {profile} certificate '{subject}' to {scope}\\{container}: {source}"
    )]
    StoreWriteFailure {
        /// Profile being issued.
        profile: CertificateProfile,
        /// Subject being issued.
        subject: String,
        /// Store scope written to.
        scope: StoreScope,
        /// Container written to.
        container: StoreContainer,
        /// Underlying cause.
        #[source]
        source: StoreError,
    },

    /// Key generation, key loading or signing failed.
    #[error("cryptographic failure issuing {profile} certificate '{subject}': {reason}")]
    Crypto {
        /// Profile being issued.
        profile: CertificateProfile,
        /// Subject being issued.
        subject: String,
        /// Underlying cause, rendered.
        reason: String,
    },
}

impl IssuanceError {
    /// Create an invalid-parameters error.
    pub fn invalid_parameters(
        profile: CertificateProfile,
        subject: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidProfileParameters {
            profile,
            subject: subject.into(),
            reason: reason.into(),
        }
    }

    /// Create a crypto error.
    pub fn crypto(
        profile: CertificateProfile,
        subject: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::Crypto {
            profile,
            subject: subject.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns true if the failure happened before the store was touched.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::InvalidProfileParameters { .. })
    }
}

/// Errors that can occur while exporting a certificate.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The export folder does not exist and could not be created.
    #[error("cannot create export folder {}: {source}", path.display())]
    TargetFolder {
        /// Folder requested.
        path: PathBuf,
        /// Underlying cause.
        #[source]
        source: std::io::Error,
    },

    /// No stored certificate matches the subject.
    #[error("no certificate matching '{subject}' in {scope}\\My")]
    CertificateNotFound {
        /// Subject pattern.
        subject: String,
        /// Store scope searched.
        scope: StoreScope,
    },

    /// The private key was requested but the store holds none.
    #[error("certificate '{subject}' ({thumbprint}) has no private key")]
    NoPrivateKey {
        /// Subject pattern.
        subject: String,
        /// Matched certificate.
        thumbprint: String,
    },

    /// The private key was created non-exportable.
    #[error("private key of '{subject}' ({thumbprint}) is marked non-exportable")]
    KeyNotExportable {
        /// Subject pattern.
        subject: String,
        /// Matched certificate.
        thumbprint: String,
    },

    /// Building the PKCS#12 container failed.
    #[error("PKCS#12 export of '{subject}' failed: {source}")]
    Pkcs12 {
        /// Subject pattern.
        subject: String,
        /// Underlying cause.
        #[source]
        source: Pkcs12Error,
    },

    /// Writing an artifact failed.
    #[error("failed to write {} for '{subject}': {source}", path.display())]
    Write {
        /// Subject pattern.
        subject: String,
        /// Artifact path.
        path: PathBuf,
        /// Underlying cause.
        #[source]
        source: std::io::Error,
    },

    /// Appending to the password log failed; the PFX was removed again.
    #[error("failed to record password for '{subject}' in {}: {source}", path.display())]
    PasswordLog {
        /// Subject pattern.
        subject: String,
        /// Log path.
        path: PathBuf,
        /// Underlying cause.
        #[source]
        source: std::io::Error,
    },

    /// Reading the store failed.
    #[error("store lookup failed for '{subject}': {source}")]
    Store {
        /// Subject pattern.
        subject: String,
        /// Underlying cause.
        #[source]
        source: StoreError,
    },
}

impl ExportError {
    /// Returns true if the error aborts the whole batch rather than one subject.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(self, Self::TargetFolder { .. })
    }
}

/// Errors from building or opening a PKCS#12 container.
#[derive(Debug, Error)]
pub enum Pkcs12Error {
    /// The container could not be assembled from the certificate and key.
    #[error("could not assemble PFX from certificate and key")]
    Build,

    /// The bytes are not a PKCS#12 structure.
    #[error("invalid PFX data: {0}")]
    Parse(String),

    /// The MAC did not verify with the supplied password.
    #[error("PFX password is incorrect")]
    BadPassword,

    /// A required bag is missing.
    #[error("PFX contains no {0}")]
    Missing(&'static str),
}

/// Crate-level error used by configuration loading and the CLI.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration is invalid or unreadable.
    #[error("configuration error: {0}")]
    Config(String),

    /// A command-line or configuration value could not be parsed.
    #[error("invalid value: {0}")]
    InvalidArgument(String),

    /// Issuance failed.
    #[error(transparent)]
    Issuance(#[from] IssuanceError),

    /// Export failed.
    #[error(transparent)]
    Export(#[from] ExportError),

    /// Store access failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid-argument error with the given message.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signer_not_found_display() {
        let err = IssuanceError::SignerNotFound {
            profile: CertificateProfile::Intermediate,
            subject: "TestIssuerCA".into(),
            issuer: "CN=TestRootCA".into(),
            scope: StoreScope::LocalMachine,
        };
        assert_eq!(
            err.to_string(),
            "no signer for Intermediate certificate 'TestIssuerCA': \
             no CA certificate with a private key matching 'CN=TestRootCA' in LocalMachine\\My"
        );
        assert!(!err.is_configuration_error());
    }

    #[test]
    fn test_invalid_parameters_is_configuration_error() {
        let err = IssuanceError::invalid_parameters(
            CertificateProfile::ClientAuth,
            "alice",
            "a user principal name is required",
        );
        assert!(err.is_configuration_error());
        assert!(err.to_string().contains("ClientAuth"));
    }

    #[test]
    fn test_batch_fatal_classification() {
        let fatal = ExportError::TargetFolder {
            path: "/nope".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(fatal.is_batch_fatal());

        let per_item = ExportError::CertificateNotFound {
            subject: "missing".into(),
            scope: StoreScope::CurrentUser,
        };
        assert!(!per_item.is_batch_fatal());
        assert_eq!(
            per_item.to_string(),
            "no certificate matching 'missing' in CurrentUser\\My"
        );
    }
}
