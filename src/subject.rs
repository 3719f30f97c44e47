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

//! Subject distinguished names.
//!
//! A bare subject such as `TestRootCA` means `CN=TestRootCA`. Anything with
//! an `=` is read as a comma separated DN (`CN=web01, O=Lab, C=US`). Names are
//! displayed in that same order, which is also how [`format_dn`] renders
//! parsed certificates, so a parsed subject compares equal to the subject of
//! the certificate issued from it.
//!
//! [`format_dn`]: crate::x509::format_dn

use std::fmt;

use const_oid::ObjectIdentifier;
use der::asn1::{PrintableStringRef, SetOfVec, Utf8StringRef};
use der::Any;
use rcgen::{DistinguishedName, DnType};
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};

use crate::error::Error;

/// Attributes accepted in a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DnAttribute {
    /// commonName
    CommonName,
    /// organizationName
    Organization,
    /// organizationalUnitName
    OrganizationalUnit,
    /// countryName
    Country,
    /// stateOrProvinceName
    State,
    /// localityName
    Locality,
    /// emailAddress
    Email,
}

impl DnAttribute {
    fn parse(key: &str) -> Option<Self> {
        match key.trim().to_uppercase().as_str() {
            "CN" => Some(Self::CommonName),
            "O" => Some(Self::Organization),
            "OU" => Some(Self::OrganizationalUnit),
            "C" => Some(Self::Country),
            "ST" | "S" => Some(Self::State),
            "L" => Some(Self::Locality),
            "E" | "EMAIL" | "EMAILADDRESS" => Some(Self::Email),
            _ => None,
        }
    }

    /// Short name used when displaying.
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::CommonName => "CN",
            Self::Organization => "O",
            Self::OrganizationalUnit => "OU",
            Self::Country => "C",
            Self::State => "ST",
            Self::Locality => "L",
            Self::Email => "E",
        }
    }

    fn oid(&self) -> ObjectIdentifier {
        ObjectIdentifier::new_unwrap(match self {
            Self::CommonName => "2.5.4.3",
            Self::Organization => "2.5.4.10",
            Self::OrganizationalUnit => "2.5.4.11",
            Self::Country => "2.5.4.6",
            Self::State => "2.5.4.8",
            Self::Locality => "2.5.4.7",
            Self::Email => "1.2.840.113549.1.9.1",
        })
    }

    fn dn_type(&self) -> DnType {
        match self {
            Self::CommonName => DnType::CommonName,
            Self::Organization => DnType::OrganizationName,
            Self::OrganizationalUnit => DnType::OrganizationalUnitName,
            Self::Country => DnType::CountryName,
            Self::State => DnType::StateOrProvinceName,
            Self::Locality => DnType::LocalityName,
            Self::Email => DnType::CustomDnType(vec![1, 2, 840, 113549, 1, 9, 1]),
        }
    }
}

/// A parsed subject, attributes in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectName {
    attributes: Vec<(DnAttribute, String)>,
}

impl SubjectName {
    /// Parse a bare common name or a comma separated DN.
    pub fn parse(subject: &str) -> Result<Self, Error> {
        let subject = subject.trim();
        if subject.is_empty() {
            return Err(Error::invalid_argument("subject is empty"));
        }

        if !subject.contains('=') {
            return Ok(Self {
                attributes: vec![(DnAttribute::CommonName, subject.to_string())],
            });
        }

        let mut attributes: Vec<(DnAttribute, String)> = Vec::new();
        for part in subject.split(',') {
            let (key, value) = part.split_once('=').ok_or_else(|| {
                Error::invalid_argument(format!("malformed subject component '{}'", part.trim()))
            })?;
            let attr = DnAttribute::parse(key).ok_or_else(|| {
                Error::invalid_argument(format!("unsupported subject attribute '{}'", key.trim()))
            })?;
            let value = value.trim();
            if value.is_empty() {
                return Err(Error::invalid_argument(format!(
                    "subject attribute {} has no value",
                    attr.short_name()
                )));
            }
            if attributes.iter().any(|(a, _)| *a == attr) {
                return Err(Error::invalid_argument(format!(
                    "subject attribute {} appears more than once",
                    attr.short_name()
                )));
            }
            attributes.push((attr, value.to_string()));
        }

        Ok(Self { attributes })
    }

    /// The common name, if any.
    pub fn common_name(&self) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(attr, _)| *attr == DnAttribute::CommonName)
            .map(|(_, value)| value.as_str())
    }

    /// Returns true if `other` names the same subject, ignoring case.
    pub fn matches(&self, other: &str) -> bool {
        self.to_string().eq_ignore_ascii_case(other.trim())
    }

    /// Convert to an rcgen name.
    ///
    /// rcgen encodes attributes in push order and display order is the
    /// reverse of encoding order, so attributes are pushed last to first.
    pub fn to_rcgen(&self) -> DistinguishedName {
        let mut dn = DistinguishedName::new();
        for (attr, value) in self.attributes.iter().rev() {
            dn.push(attr.dn_type(), value.clone());
        }
        dn
    }

    /// Convert to an `x509-cert` name, e.g. for a directoryName SAN.
    pub fn to_x509_name(&self) -> der::Result<Name> {
        let mut rdns = Vec::with_capacity(self.attributes.len());
        for (attr, value) in self.attributes.iter().rev() {
            let value = if *attr == DnAttribute::Country {
                Any::encode_from(&PrintableStringRef::new(value)?)?
            } else {
                Any::encode_from(&Utf8StringRef::new(value)?)?
            };
            let atv = AttributeTypeAndValue {
                oid: attr.oid(),
                value,
            };
            rdns.push(RelativeDistinguishedName(SetOfVec::try_from(vec![atv])?));
        }
        Ok(RdnSequence(rdns))
    }
}

impl fmt::Display for SubjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (attr, value)) in self.attributes.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", attr.short_name(), value)?;
        }
        Ok(())
    }
}
