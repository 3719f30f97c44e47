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

//! Certificate profiles and their extension table.
//!
//! Each [`CertificateProfile`] maps to a static [`ProfileSpec`] describing the
//! key usage, extended key usage, basic constraints and SAN policy of the
//! certificates issued under it. Adding a profile means adding a table row.
//!
//! | Profile | Signer | Key usage | Extended key usage | Extra |
//! |---|---|---|---|---|
//! | Root | self-signed | CRLSign, CertSign | CA bundle | CA, pathLen 1 |
//! | Intermediate | Root | CRLSign, CertSign | CA bundle | CA, pathLen 0 |
//! | Web | Intermediate | DigitalSignature, KeyEncipherment | serverAuth, clientAuth | CA=false, DNS SANs |
//! | ClientAuth | Intermediate | DigitalSignature | clientAuth | UPN/DirectoryName/GUID/URL SAN |
//! | DocumentEncryption | Intermediate | KeyEncipherment, KeyAgreement, DataEncipherment, DigitalSignature | document encryption | |
//! | CodeSigning | Intermediate | DigitalSignature | codeSigning | |

use std::fmt;
use std::str::FromStr;

use const_oid::ObjectIdentifier;
use rcgen::{ExtendedKeyUsagePurpose, IsCa, KeyUsagePurpose};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Smartcard logon (Microsoft).
pub const OID_SMARTCARD_LOGON: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.20.2.2");

/// Document encryption (Microsoft).
pub const OID_DOCUMENT_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.80.1");

/// The fixed set of certificate templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CertificateProfile {
    /// Self-signed trust anchor.
    Root,
    /// CA signed by the Root.
    Intermediate,
    /// TLS server certificate.
    Web,
    /// Authenticode-style code signing certificate.
    CodeSigning,
    /// Document (CMS) encryption certificate.
    DocumentEncryption,
    /// User client authentication certificate.
    ClientAuth,
}

impl CertificateProfile {
    /// All profiles, in chain order.
    pub const ALL: [CertificateProfile; 6] = [
        CertificateProfile::Root,
        CertificateProfile::Intermediate,
        CertificateProfile::Web,
        CertificateProfile::CodeSigning,
        CertificateProfile::DocumentEncryption,
        CertificateProfile::ClientAuth,
    ];

    /// Get the canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Root => "Root",
            Self::Intermediate => "Intermediate",
            Self::Web => "Web",
            Self::CodeSigning => "CodeSigning",
            Self::DocumentEncryption => "DocumentEncryption",
            Self::ClientAuth => "ClientAuth",
        }
    }

    /// Get the table row for this profile.
    pub fn spec(&self) -> &'static ProfileSpec {
        match self {
            Self::Root => &ROOT,
            Self::Intermediate => &INTERMEDIATE,
            Self::Web => &WEB,
            Self::CodeSigning => &CODE_SIGNING,
            Self::DocumentEncryption => &DOCUMENT_ENCRYPTION,
            Self::ClientAuth => &CLIENT_AUTH,
        }
    }

    /// Returns true if issuance needs a signing certificate.
    pub fn requires_signer(&self) -> bool {
        self.spec().signer.is_some()
    }
}

impl fmt::Display for CertificateProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CertificateProfile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                Error::invalid_argument(format!(
                    "unknown certificate type '{s}': expected one of \
                     Root, Intermediate, Web, CodeSigning, DocumentEncryption, ClientAuth"
                ))
            })
    }
}

/// Key usage bits used by the profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyUsage {
    /// digitalSignature
    DigitalSignature,
    /// keyEncipherment
    KeyEncipherment,
    /// dataEncipherment
    DataEncipherment,
    /// keyAgreement
    KeyAgreement,
    /// keyCertSign
    CertSign,
    /// cRLSign
    CrlSign,
}

impl KeyUsage {
    pub(crate) fn to_rcgen(self) -> KeyUsagePurpose {
        match self {
            Self::DigitalSignature => KeyUsagePurpose::DigitalSignature,
            Self::KeyEncipherment => KeyUsagePurpose::KeyEncipherment,
            Self::DataEncipherment => KeyUsagePurpose::DataEncipherment,
            Self::KeyAgreement => KeyUsagePurpose::KeyAgreement,
            Self::CertSign => KeyUsagePurpose::KeyCertSign,
            Self::CrlSign => KeyUsagePurpose::CrlSign,
        }
    }
}

/// Extended key usage purposes used by the profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtendedKeyUsage {
    /// id-kp-serverAuth
    ServerAuth,
    /// id-kp-clientAuth
    ClientAuth,
    /// id-kp-codeSigning
    CodeSigning,
    /// id-kp-emailProtection
    EmailProtection,
    /// Microsoft smartcard logon
    SmartcardLogon,
    /// Microsoft document encryption
    DocumentEncryption,
}

impl ExtendedKeyUsage {
    /// Get the purpose OID.
    pub fn oid(&self) -> ObjectIdentifier {
        use const_oid::db::rfc5280::{
            ID_KP_CLIENT_AUTH, ID_KP_CODE_SIGNING, ID_KP_EMAIL_PROTECTION, ID_KP_SERVER_AUTH,
        };

        match self {
            Self::ServerAuth => ID_KP_SERVER_AUTH,
            Self::ClientAuth => ID_KP_CLIENT_AUTH,
            Self::CodeSigning => ID_KP_CODE_SIGNING,
            Self::EmailProtection => ID_KP_EMAIL_PROTECTION,
            Self::SmartcardLogon => OID_SMARTCARD_LOGON,
            Self::DocumentEncryption => OID_DOCUMENT_ENCRYPTION,
        }
    }

    pub(crate) fn to_rcgen(self) -> ExtendedKeyUsagePurpose {
        match self {
            Self::ServerAuth => ExtendedKeyUsagePurpose::ServerAuth,
            Self::ClientAuth => ExtendedKeyUsagePurpose::ClientAuth,
            Self::CodeSigning => ExtendedKeyUsagePurpose::CodeSigning,
            Self::EmailProtection => ExtendedKeyUsagePurpose::EmailProtection,
            Self::SmartcardLogon | Self::DocumentEncryption => {
                ExtendedKeyUsagePurpose::Other(oid_arcs(&self.oid()))
            }
        }
    }
}

/// Split an OID into the arc list rcgen expects.
pub(crate) fn oid_arcs(oid: &ObjectIdentifier) -> Vec<u64> {
    oid.arcs().map(u64::from).collect()
}

/// Basic constraints emitted for a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasicConstraints {
    /// CA certificate with a path length limit.
    Ca {
        /// Maximum number of intermediate CAs below this one.
        path_len: u8,
    },
    /// Explicit `CA=false`.
    EndEntity,
    /// No basic constraints extension.
    Omitted,
}

impl BasicConstraints {
    pub(crate) fn to_rcgen(self) -> IsCa {
        match self {
            Self::Ca { path_len } => IsCa::Ca(rcgen::BasicConstraints::Constrained(path_len)),
            Self::EndEntity => IsCa::ExplicitNoCa,
            Self::Omitted => IsCa::NoCa,
        }
    }
}

/// Where a profile's Subject Alternative Names come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanPolicy {
    /// No SAN extension.
    None,
    /// DNS names: subject CN plus the requested alternative names.
    DnsFromSubject,
    /// UPN, DirectoryName, GUID and URL of a user identity.
    ClientIdentity,
}

/// One row of the profile table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSpec {
    /// Profile this row describes.
    pub profile: CertificateProfile,
    /// Profile expected of the signer; `None` for self-signed.
    pub signer: Option<CertificateProfile>,
    /// Key usage bits.
    pub key_usages: &'static [KeyUsage],
    /// Extended key usage purposes.
    pub extended_key_usages: &'static [ExtendedKeyUsage],
    /// Basic constraints.
    pub basic_constraints: BasicConstraints,
    /// SAN source.
    pub san: SanPolicy,
    /// Whether the private key is exportable unless the request says otherwise.
    pub exportable_by_default: bool,
}

const CA_KEY_USAGES: &[KeyUsage] = &[KeyUsage::CrlSign, KeyUsage::CertSign];

const CA_EKU_BUNDLE: &[ExtendedKeyUsage] = &[
    ExtendedKeyUsage::ServerAuth,
    ExtendedKeyUsage::ClientAuth,
    ExtendedKeyUsage::CodeSigning,
    ExtendedKeyUsage::EmailProtection,
    ExtendedKeyUsage::SmartcardLogon,
];

static ROOT: ProfileSpec = ProfileSpec {
    profile: CertificateProfile::Root,
    signer: None,
    key_usages: CA_KEY_USAGES,
    extended_key_usages: CA_EKU_BUNDLE,
    basic_constraints: BasicConstraints::Ca { path_len: 1 },
    san: SanPolicy::None,
    exportable_by_default: true,
};

static INTERMEDIATE: ProfileSpec = ProfileSpec {
    profile: CertificateProfile::Intermediate,
    signer: Some(CertificateProfile::Root),
    key_usages: CA_KEY_USAGES,
    extended_key_usages: CA_EKU_BUNDLE,
    basic_constraints: BasicConstraints::Ca { path_len: 0 },
    san: SanPolicy::None,
    exportable_by_default: true,
};

static WEB: ProfileSpec = ProfileSpec {
    profile: CertificateProfile::Web,
    signer: Some(CertificateProfile::Intermediate),
    key_usages: &[KeyUsage::DigitalSignature, KeyUsage::KeyEncipherment],
    extended_key_usages: &[ExtendedKeyUsage::ServerAuth, ExtendedKeyUsage::ClientAuth],
    basic_constraints: BasicConstraints::EndEntity,
    san: SanPolicy::DnsFromSubject,
    exportable_by_default: true,
};

static CLIENT_AUTH: ProfileSpec = ProfileSpec {
    profile: CertificateProfile::ClientAuth,
    signer: Some(CertificateProfile::Intermediate),
    key_usages: &[KeyUsage::DigitalSignature],
    extended_key_usages: &[ExtendedKeyUsage::ClientAuth],
    basic_constraints: BasicConstraints::Omitted,
    san: SanPolicy::ClientIdentity,
    exportable_by_default: false,
};

static DOCUMENT_ENCRYPTION: ProfileSpec = ProfileSpec {
    profile: CertificateProfile::DocumentEncryption,
    signer: Some(CertificateProfile::Intermediate),
    key_usages: &[
        KeyUsage::KeyEncipherment,
        KeyUsage::KeyAgreement,
        KeyUsage::DataEncipherment,
        KeyUsage::DigitalSignature,
    ],
    extended_key_usages: &[ExtendedKeyUsage::DocumentEncryption],
    basic_constraints: BasicConstraints::Omitted,
    san: SanPolicy::None,
    exportable_by_default: false,
};

static CODE_SIGNING: ProfileSpec = ProfileSpec {
    profile: CertificateProfile::CodeSigning,
    signer: Some(CertificateProfile::Intermediate),
    key_usages: &[KeyUsage::DigitalSignature],
    extended_key_usages: &[ExtendedKeyUsage::CodeSigning],
    basic_constraints: BasicConstraints::Omitted,
    san: SanPolicy::None,
    exportable_by_default: false,
};
