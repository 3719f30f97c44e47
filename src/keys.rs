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

//! Key policy.
//!
//! Every profile uses an RSA-2048 key and SHA-256 with RSA signatures. These
//! are constants rather than request parameters: the tool only builds lab
//! chains. rcgen cannot generate RSA keys with the ring backend, so keys are
//! generated with the `rsa` crate and handed to rcgen as PKCS#8.

use rand::rngs::OsRng;
use rcgen::{KeyPair, SignatureAlgorithm, PKCS_RSA_SHA256};
use rsa::pkcs8::EncodePrivateKey;
use rsa::RsaPrivateKey;
use rustls_pki_types::PrivatePkcs8KeyDer;

/// RSA modulus size for every issued certificate.
pub const RSA_KEY_BITS: usize = 2048;

/// Signature algorithm for every issued certificate.
pub static SIGNATURE_ALGORITHM: &SignatureAlgorithm = &PKCS_RSA_SHA256;

/// Generate a fresh RSA key pair usable with rcgen.
pub fn generate_key_pair() -> Result<KeyPair, String> {
    let private_key = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
        .map_err(|e| format!("failed to generate RSA-{RSA_KEY_BITS} key: {e}"))?;
    let pkcs8 = private_key
        .to_pkcs8_der()
        .map_err(|e| format!("failed to encode private key: {e}"))?;
    load_key_pair(pkcs8.as_bytes())
}

/// Load a PKCS#8 RSA key, e.g. a signer key read back from the store.
pub fn load_key_pair(pkcs8_der: &[u8]) -> Result<KeyPair, String> {
    let key_der = PrivatePkcs8KeyDer::from(pkcs8_der);
    KeyPair::from_pkcs8_der_and_sign_algo(&key_der, SIGNATURE_ALGORITHM)
        .map_err(|e| format!("failed to load private key: {e}"))
}
