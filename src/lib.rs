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

//! # labcert
//!
//! Certificate lifecycle helpers for test labs: build a small PKI (root CA,
//! issuing CA, server and client certificates), keep it in a local
//! certificate store and export certificates as `.crt` / `.pfx` files.
//!
//! **Not for production.** Export can record PFX passwords in plaintext.
//!
//! ## Features
//!
//! - **Six issuance profiles**: Root, Intermediate, Web, CodeSigning,
//!   DocumentEncryption and ClientAuth
//! - **RSA-2048 / SHA-256** for every certificate
//! - **Windows-style store layout**: LocalMachine/CurrentUser scopes with
//!   My, CA and Root containers, persisted on disk
//! - **CRT and PFX export** with generated passwords and a password log
//!
//! ## Quick Start
//!
//! ```no_run
//! use labcert::store::FileCertStore;
//! use labcert::{
//!     CertificateExporter, CertificateIssuer, CertificateProfile, CertificateRequest,
//!     ExportOptions, ExportRequest,
//! };
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = FileCertStore::open("/var/lib/labcert/store")?;
//! let issuer = CertificateIssuer::new(&store);
//!
//! issuer.issue(&CertificateRequest::new("TestRootCA"), CertificateProfile::Root)?;
//! issuer.issue(
//!     &CertificateRequest::new("TestIssuerCA").issued_by("TestRootCA"),
//!     CertificateProfile::Intermediate,
//! )?;
//! issuer.issue(
//!     &CertificateRequest::new("web01.lab.local")
//!         .alt_name("web01")
//!         .issued_by("TestIssuerCA"),
//!     CertificateProfile::Web,
//! )?;
//!
//! let exporter = CertificateExporter::new(&store);
//! let options = ExportOptions::new("certs").include_private_key(true);
//! let artifact = exporter.export(&ExportRequest::new("web01", options))?;
//! println!("wrote {}", artifact.certificate_path.display());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod exporter;
pub mod issuer;
pub mod keys;
pub mod logging;
pub mod password;
pub mod pkcs12;
pub mod profile;
pub mod san;
pub mod store;
pub mod subject;
pub mod types;
pub mod x509;

// Re-export main types at crate root for convenience
pub use config::{ConfigLoader, LabCertConfig};
pub use error::{Error, ExportError, IssuanceError, Pkcs12Error, Result, StoreError};
pub use exporter::CertificateExporter;
pub use issuer::CertificateIssuer;
pub use profile::CertificateProfile;
pub use types::{
    CertificateRequest, ExportFailure, ExportOptions, ExportReport, ExportRequest,
    ExportedArtifact, IssuedCertificate, StoreContainer, StoreScope,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
