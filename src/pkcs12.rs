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

//! PKCS#12 (PFX) containers.
//!
//! Containers use the legacy 3DES/RC2 PBE algorithms, which every Windows
//! release can import.

use p12::PFX;
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey};
use rsa::RsaPrivateKey;
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;

use crate::error::Pkcs12Error;
use crate::x509::CertificateSummary;

/// Build a PFX holding `cert_der`, its PKCS#8 key and any CA certificates.
pub fn build_pfx(
    cert_der: &[u8],
    key_der: &[u8],
    ca_certs: &[&[u8]],
    password: &SecretString,
    friendly_name: &str,
) -> Result<Vec<u8>, Pkcs12Error> {
    let pfx = if ca_certs.is_empty() {
        PFX::new(cert_der, key_der, None, password.expose_secret(), friendly_name)
    } else {
        PFX::new_with_cas(
            cert_der,
            key_der,
            ca_certs,
            password.expose_secret(),
            friendly_name,
        )
    };
    pfx.map(|pfx| pfx.to_der()).ok_or(Pkcs12Error::Build)
}

/// Certificate and key recovered from a PFX.
pub struct PfxContents {
    /// First certificate in the container.
    pub certificate_der: Vec<u8>,
    /// All certificates in the container, end entity first.
    pub certificates: Vec<Vec<u8>>,
    /// PKCS#8 private key.
    pub private_key_der: Zeroizing<Vec<u8>>,
}

impl PfxContents {
    /// Returns true if the private key belongs to the certificate.
    pub fn public_key_matches(&self) -> Result<bool, Pkcs12Error> {
        let key = RsaPrivateKey::from_pkcs8_der(&self.private_key_der)
            .map_err(|e| Pkcs12Error::Parse(format!("private key: {e}")))?;
        let public_der = key
            .to_public_key()
            .to_public_key_der()
            .map_err(|e| Pkcs12Error::Parse(format!("public key: {e}")))?;
        let summary = CertificateSummary::from_der(&self.certificate_der)
            .map_err(|e| Pkcs12Error::Parse(e.to_string()))?;
        Ok(public_der.as_bytes() == summary.public_key_der.as_slice())
    }
}

/// Open a PFX, verifying its MAC with `password`.
pub fn open_pfx(data: &[u8], password: &SecretString) -> Result<PfxContents, Pkcs12Error> {
    let pfx = PFX::parse(data).map_err(|e| Pkcs12Error::Parse(format!("{e:?}")))?;
    let password = password.expose_secret();
    if !pfx.verify_mac(password) {
        return Err(Pkcs12Error::BadPassword);
    }

    let certificates = pfx
        .cert_x509_bags(password)
        .map_err(|e| Pkcs12Error::Parse(format!("{e:?}")))?;
    let certificate_der = certificates
        .first()
        .cloned()
        .ok_or(Pkcs12Error::Missing("certificate"))?;
    let private_key_der = pfx
        .key_bags(password)
        .map_err(|e| Pkcs12Error::Parse(format!("{e:?}")))?
        .into_iter()
        .next()
        .map(Zeroizing::new)
        .ok_or(Pkcs12Error::Missing("private key"))?;

    Ok(PfxContents {
        certificate_der,
        certificates,
        private_key_der,
    })
}
