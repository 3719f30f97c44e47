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

//! Certificate inspection.
//!
//! Parses DER certificates with `x509-cert` and extracts the fields the store
//! indexes on (subject, thumbprint, validity, CA flag) plus the extensions the
//! profiles emit, so issued certificates can be checked against their profile.

use const_oid::db::rfc5280::{
    ID_CE_AUTHORITY_KEY_IDENTIFIER, ID_CE_BASIC_CONSTRAINTS, ID_CE_EXT_KEY_USAGE, ID_CE_KEY_USAGE,
    ID_CE_SUBJECT_ALT_NAME, ID_CE_SUBJECT_KEY_IDENTIFIER,
};
use const_oid::ObjectIdentifier;
use der::asn1::{OctetStringRef, Utf8StringRef};
use der::{Decode, Encode};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage as KeyUsageExt, KeyUsages,
    SubjectAltName, SubjectKeyIdentifier,
};
use x509_cert::name::Name;
use x509_cert::time::Time;
use x509_cert::Certificate;

use crate::error::StoreError;
use crate::profile::KeyUsage;
use crate::san::{OID_NT_GUID, OID_NT_PRINCIPAL_NAME};

/// Decoded Subject Alternative Name entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectAltNames {
    /// dNSName entries.
    pub dns_names: Vec<String>,
    /// User principal names (otherName).
    pub user_principal_names: Vec<String>,
    /// directoryName entries, formatted.
    pub directory_names: Vec<String>,
    /// GUID otherName entries.
    pub guids: Vec<Uuid>,
    /// uniformResourceIdentifier entries.
    pub uris: Vec<String>,
}

/// The parts of a certificate this crate cares about.
#[derive(Debug, Clone)]
pub struct CertificateSummary {
    /// Subject DN, `CN=a, O=b` order.
    pub subject: String,
    /// Issuer DN.
    pub issuer: String,
    /// Serial number, upper-case hex.
    pub serial_number: String,
    /// Start of validity.
    pub not_before: OffsetDateTime,
    /// End of validity.
    pub not_after: OffsetDateTime,
    /// SHA-1 thumbprint, upper-case hex without separators.
    pub thumbprint: String,
    /// SHA-256 fingerprint, colon separated.
    pub fingerprint_sha256: String,
    /// Basic constraints cA flag.
    pub is_ca: bool,
    /// Basic constraints path length.
    pub path_len: Option<u8>,
    /// Key usage bits present.
    pub key_usages: Vec<KeyUsage>,
    /// Extended key usage OIDs present.
    pub extended_key_usages: Vec<ObjectIdentifier>,
    /// Subject Alternative Names present.
    pub subject_alt_names: SubjectAltNames,
    /// Subject key identifier.
    pub subject_key_id: Option<Vec<u8>>,
    /// Key identifier from the authority key identifier extension.
    pub authority_key_id: Option<Vec<u8>>,
    /// DER encoding of the SubjectPublicKeyInfo.
    pub public_key_der: Vec<u8>,
}

impl CertificateSummary {
    /// Parse a DER certificate.
    pub fn from_der(der_bytes: &[u8]) -> Result<Self, StoreError> {
        let cert = Certificate::from_der(der_bytes)
            .map_err(|e| StoreError::certificate_parsing(format!("invalid certificate: {e}")))?;
        let tbs = &cert.tbs_certificate;

        let mut summary = Self {
            subject: format_dn(&tbs.subject),
            issuer: format_dn(&tbs.issuer),
            serial_number: hex::encode_upper(tbs.serial_number.as_bytes()),
            not_before: to_offset_date_time(tbs.validity.not_before)?,
            not_after: to_offset_date_time(tbs.validity.not_after)?,
            thumbprint: thumbprint(der_bytes),
            fingerprint_sha256: fingerprint_sha256(der_bytes),
            is_ca: false,
            path_len: None,
            key_usages: Vec::new(),
            extended_key_usages: Vec::new(),
            subject_alt_names: SubjectAltNames::default(),
            subject_key_id: None,
            authority_key_id: None,
            public_key_der: tbs
                .subject_public_key_info
                .to_der()
                .map_err(|e| StoreError::certificate_parsing(format!("public key: {e}")))?,
        };

        for ext in tbs.extensions.iter().flatten() {
            let value = ext.extn_value.as_bytes();
            if ext.extn_id == ID_CE_BASIC_CONSTRAINTS {
                let bc = BasicConstraints::from_der(value).map_err(ext_error("basic constraints"))?;
                summary.is_ca = bc.ca;
                summary.path_len = bc.path_len_constraint;
            } else if ext.extn_id == ID_CE_KEY_USAGE {
                let ku = KeyUsageExt::from_der(value).map_err(ext_error("key usage"))?;
                summary.key_usages = decode_key_usages(&ku);
            } else if ext.extn_id == ID_CE_EXT_KEY_USAGE {
                let eku = ExtendedKeyUsage::from_der(value).map_err(ext_error("extended key usage"))?;
                summary.extended_key_usages = eku.0;
            } else if ext.extn_id == ID_CE_SUBJECT_ALT_NAME {
                let san = SubjectAltName::from_der(value).map_err(ext_error("subject alt name"))?;
                summary.subject_alt_names = decode_alt_names(&san);
            } else if ext.extn_id == ID_CE_SUBJECT_KEY_IDENTIFIER {
                let ski = SubjectKeyIdentifier::from_der(value)
                    .map_err(ext_error("subject key identifier"))?;
                summary.subject_key_id = Some(ski.0.as_bytes().to_vec());
            } else if ext.extn_id == ID_CE_AUTHORITY_KEY_IDENTIFIER {
                let aki = AuthorityKeyIdentifier::from_der(value)
                    .map_err(ext_error("authority key identifier"))?;
                summary.authority_key_id = aki.key_identifier.map(|id| id.as_bytes().to_vec());
            }
        }

        Ok(summary)
    }

    /// Returns true if the key usage bit is set.
    pub fn has_key_usage(&self, usage: KeyUsage) -> bool {
        self.key_usages.contains(&usage)
    }

    /// Returns true if the certificate is self-issued.
    pub fn is_self_issued(&self) -> bool {
        self.subject == self.issuer
    }
}

fn ext_error(what: &'static str) -> impl Fn(der::Error) -> StoreError {
    move |e| StoreError::certificate_parsing(format!("invalid {what} extension: {e}"))
}

fn decode_key_usages(ku: &KeyUsageExt) -> Vec<KeyUsage> {
    [
        (KeyUsages::DigitalSignature, KeyUsage::DigitalSignature),
        (KeyUsages::KeyEncipherment, KeyUsage::KeyEncipherment),
        (KeyUsages::DataEncipherment, KeyUsage::DataEncipherment),
        (KeyUsages::KeyAgreement, KeyUsage::KeyAgreement),
        (KeyUsages::KeyCertSign, KeyUsage::CertSign),
        (KeyUsages::CRLSign, KeyUsage::CrlSign),
    ]
    .into_iter()
    .filter(|(bit, _)| ku.0.contains(*bit))
    .map(|(_, usage)| usage)
    .collect()
}

fn decode_alt_names(san: &SubjectAltName) -> SubjectAltNames {
    let mut names = SubjectAltNames::default();
    for name in &san.0 {
        match name {
            GeneralName::DnsName(dns) => names.dns_names.push(dns.to_string()),
            GeneralName::UniformResourceIdentifier(uri) => names.uris.push(uri.to_string()),
            GeneralName::DirectoryName(dn) => names.directory_names.push(format_dn(dn)),
            GeneralName::OtherName(other) if other.type_id == OID_NT_PRINCIPAL_NAME => {
                if let Ok(upn) = other.value.decode_as::<Utf8StringRef<'_>>() {
                    names.user_principal_names.push(upn.as_str().to_string());
                }
            }
            GeneralName::OtherName(other) if other.type_id == OID_NT_GUID => {
                if let Ok(raw) = other.value.decode_as::<OctetStringRef<'_>>() {
                    if let Ok(bytes) = <[u8; 16]>::try_from(raw.as_bytes()) {
                        names.guids.push(Uuid::from_bytes_le(bytes));
                    }
                }
            }
            _ => {}
        }
    }
    names
}

/// Format a distinguished name the way Windows displays it: `CN=a, O=b`.
///
/// RDNs are stored most-significant first, so they are printed in reverse.
pub fn format_dn(name: &Name) -> String {
    name.0
        .iter()
        .rev()
        .flat_map(|rdn| rdn.0.iter())
        .map(|atv| {
            let value = std::str::from_utf8(atv.value.value())
                .map(str::to_string)
                .unwrap_or_else(|_| hex::encode_upper(atv.value.value()));
            format!("{}={}", attribute_name(&atv.oid), value)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

const ATTR_CN: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");
const ATTR_C: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
const ATTR_L: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.7");
const ATTR_ST: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.8");
const ATTR_O: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
const ATTR_OU: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.11");
const ATTR_EMAIL: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.1");

fn attribute_name(oid: &ObjectIdentifier) -> String {
    const NAMES: [(ObjectIdentifier, &str); 7] = [
        (ATTR_CN, "CN"),
        (ATTR_O, "O"),
        (ATTR_OU, "OU"),
        (ATTR_C, "C"),
        (ATTR_ST, "ST"),
        (ATTR_L, "L"),
        (ATTR_EMAIL, "E"),
    ];

    NAMES
        .iter()
        .find(|(known, _)| known == oid)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| oid.to_string())
}

fn to_offset_date_time(time: Time) -> Result<OffsetDateTime, StoreError> {
    let secs = time.to_unix_duration().as_secs();
    i64::try_from(secs)
        .ok()
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
        .ok_or_else(|| StoreError::certificate_parsing(format!("validity out of range: {secs}")))
}

/// SHA-1 thumbprint as Windows shows it.
pub fn thumbprint(der_bytes: &[u8]) -> String {
    hex::encode_upper(Sha1::digest(der_bytes))
}

/// SHA-256 fingerprint with colon separators.
pub fn fingerprint_sha256(der_bytes: &[u8]) -> String {
    Sha256::digest(der_bytes)
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}
