//! Subject Alternative Name construction.
//!
//! Web certificates get a plain DNS list. ClientAuth certificates carry a user
//! identity expressed first as the text form used by certificate request
//! tooling,
//!
//! ```text
//! upn=alice@lab.local&DirectoryName=CN=alice&guid=4b1c...&url=https://lab.local
//! ```
//!
//! which is then parsed and encoded as an X.509 SAN extension.

use std::collections::HashSet;

use const_oid::ObjectIdentifier;
use der::asn1::{Ia5String, OctetString, Utf8StringRef};
use der::{Any, Encode};
use uuid::Uuid;
use x509_cert::ext::pkix::name::{GeneralName, OtherName};
use x509_cert::ext::pkix::SubjectAltName;

use crate::error::Error;
use crate::subject::SubjectName;

/// subjectAltName extension, as rcgen arcs.
pub const SUBJECT_ALT_NAME_ARCS: [u64; 4] = [2, 5, 29, 17];

/// Microsoft user principal name otherName.
pub const OID_NT_PRINCIPAL_NAME: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.20.2.3");

/// Microsoft object GUID otherName.
pub const OID_NT_GUID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.25.1");

/// DNS names for a Web certificate: the subject CN, then the extra names,
/// without case-insensitive duplicates.
pub fn web_dns_names(common_name: Option<&str>, alt_names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    common_name
        .into_iter()
        .chain(alt_names.iter().map(String::as_str))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(name.to_ascii_lowercase()))
        .map(str::to_string)
        .collect()
}

/// User identity bound into a ClientAuth certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    /// User principal name.
    pub user_principal_name: String,
    /// Directory name, normally the certificate subject.
    pub directory_name: String,
    /// Object GUID.
    pub guid: Uuid,
    /// URL entry.
    pub url: String,
}

impl ClientIdentity {
    /// Build an identity. A `target_domain` without a scheme becomes `https://<domain>`.
    pub fn new(
        user_principal_name: impl Into<String>,
        directory_name: impl Into<String>,
        guid: Uuid,
        target_domain: &str,
    ) -> Self {
        let target_domain = target_domain.trim();
        let url = if target_domain.contains("://") {
            target_domain.to_string()
        } else {
            format!("https://{target_domain}")
        };

        Self {
            user_principal_name: user_principal_name.into(),
            directory_name: directory_name.into(),
            guid,
            url,
        }
    }

    /// Render the `key=value&...` text form. `%` and `&` inside values are
    /// percent-escaped.
    pub fn to_extension_text(&self) -> String {
        format!(
            "upn={}&DirectoryName={}&guid={}&url={}",
            escape_value(&self.user_principal_name),
            escape_value(&self.directory_name),
            self.guid.hyphenated(),
            escape_value(&self.url)
        )
    }

    /// Parse the `key=value&...` text form. Keys are case-insensitive and all four are required.
    pub fn parse_extension_text(text: &str) -> Result<Self, Error> {
        let mut upn = None;
        let mut directory_name = None;
        let mut guid = None;
        let mut url = None;

        for part in text.split('&').filter(|p| !p.trim().is_empty()) {
            let (key, value) = part.split_once('=').ok_or_else(|| {
                Error::invalid_argument(format!("SAN entry '{part}' has no value"))
            })?;
            let value = unescape_value(value.trim())?;
            match key.trim().to_lowercase().as_str() {
                "upn" => upn = Some(value),
                "directoryname" => directory_name = Some(value),
                "guid" => {
                    guid = Some(Uuid::parse_str(&value).map_err(|e| {
                        Error::invalid_argument(format!("invalid GUID '{value}': {e}"))
                    })?)
                }
                "url" => url = Some(value),
                other => {
                    return Err(Error::invalid_argument(format!(
                        "unsupported SAN entry type '{other}'"
                    )))
                }
            }
        }

        let missing = |what: &str| Error::invalid_argument(format!("SAN text is missing {what}"));
        Ok(Self {
            user_principal_name: upn.ok_or_else(|| missing("upn"))?,
            directory_name: directory_name.ok_or_else(|| missing("DirectoryName"))?,
            guid: guid.ok_or_else(|| missing("guid"))?,
            url: url.ok_or_else(|| missing("url"))?,
        })
    }

    /// Encode as the DER value of a subjectAltName extension.
    pub fn to_extension_der(&self) -> Result<Vec<u8>, Error> {
        let encode_err = |e: der::Error| Error::invalid_argument(format!("SAN encoding: {e}"));

        let directory_name = SubjectName::parse(&self.directory_name)?
            .to_x509_name()
            .map_err(encode_err)?;

        let upn = Utf8StringRef::new(&self.user_principal_name).map_err(encode_err)?;
        let guid = OctetString::new(self.guid.to_bytes_le().to_vec()).map_err(encode_err)?;

        let names = vec![
            GeneralName::OtherName(OtherName {
                type_id: OID_NT_PRINCIPAL_NAME,
                value: Any::encode_from(&upn).map_err(encode_err)?,
            }),
            GeneralName::DirectoryName(directory_name),
            GeneralName::OtherName(OtherName {
                type_id: OID_NT_GUID,
                value: Any::encode_from(&guid).map_err(encode_err)?,
            }),
            GeneralName::UniformResourceIdentifier(
                Ia5String::new(&self.url).map_err(encode_err)?,
            ),
        ];

        SubjectAltName(names).to_der().map_err(encode_err)
    }
}

fn escape_value(value: &str) -> String {
    value.replace('%', "%25").replace('&', "%26")
}

fn unescape_value(value: &str) -> Result<String, Error> {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let decoded = bytes
                .get(i + 1..i + 3)
                .filter(|hex| hex.iter().all(u8::is_ascii_hexdigit))
                .and_then(|hex| std::str::from_utf8(hex).ok())
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(byte) = decoded {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out)
        .map_err(|_| Error::invalid_argument(format!("SAN value '{value}' is not valid UTF-8")))
}
