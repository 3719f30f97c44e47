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

//! PFX passwords and the plaintext password log.
//!
//! **Lab use only.** [`PasswordLog`] appends every export password to
//! `CertInfo.txt` in clear text so the PFX files can be imported later
//! without a secrets manager.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;

use crate::store::create_private_file;

/// Name of the password log inside the export folder.
pub const PASSWORD_LOG_FILE: &str = "CertInfo.txt";

const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";
// No comma: log lines are comma separated.
const SYMBOLS: &[u8] = b"!@#$%^&*-_=+?";

const CLASSES: [&[u8]; 4] = [UPPER, LOWER, DIGITS, SYMBOLS];

/// Source of PFX passwords.
pub trait PasswordGenerator {
    /// Generate a password of `length` characters.
    fn generate(&self, length: usize) -> SecretString;
}

/// Password generator backed by the operating system RNG.
///
/// Every password contains at least one upper-case letter, lower-case
/// letter, digit and symbol, so lengths below four are raised to four.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurePasswordGenerator;

impl PasswordGenerator for SecurePasswordGenerator {
    fn generate(&self, length: usize) -> SecretString {
        let mut rng = OsRng;
        let length = length.max(CLASSES.len());
        let alphabet: Vec<u8> = CLASSES.concat();

        let mut chars = Zeroizing::new(Vec::with_capacity(length));
        for class in CLASSES {
            chars.push(class[rng.gen_range(0..class.len())]);
        }
        while chars.len() < length {
            chars.push(alphabet[rng.gen_range(0..alphabet.len())]);
        }
        chars.shuffle(&mut rng);

        SecretString::from(chars.iter().map(|&b| b as char).collect::<String>())
    }
}

/// Append-only `subject, thumbprint, password` record.
#[derive(Debug, Clone)]
pub struct PasswordLog {
    path: PathBuf,
}

impl PasswordLog {
    /// Log kept in `folder`.
    pub fn in_folder(folder: &Path) -> Self {
        Self {
            path: folder.join(PASSWORD_LOG_FILE),
        }
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line. The file is created owner-only if missing.
    pub fn append(&self, subject: &str, thumbprint: &str, password: &SecretString) -> io::Result<()> {
        let line = Zeroizing::new(format!(
            "{}, {}, {}\n",
            subject,
            thumbprint,
            password.expose_secret()
        ));
        let mut file = create_private_file(&self.path, true)?;
        file.write_all(line.as_bytes())?;
        file.sync_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_generated_password_shape() {
        let generator = SecurePasswordGenerator;
        for length in [4, 8, 20, 64] {
            let password = generator.generate(length);
            let password = password.expose_secret();
            assert_eq!(password.len(), length);
            for class in CLASSES {
                assert!(password.bytes().any(|b| class.contains(&b)));
            }
            assert!(!password.contains(','));
        }
    }

    #[test]
    fn test_short_length_is_raised() {
        let password = SecurePasswordGenerator.generate(1);
        assert_eq!(password.expose_secret().len(), 4);
    }

    #[test]
    fn test_passwords_differ() {
        let a = SecurePasswordGenerator.generate(20);
        let b = SecurePasswordGenerator.generate(20);
        assert_ne!(a.expose_secret(), b.expose_secret());
    }

    #[test]
    fn test_log_appends_lines() {
        let dir = TempDir::new().unwrap();
        let log = PasswordLog::in_folder(dir.path());

        log.append("TestRootCA", "AAAA", &SecretString::from("one")).unwrap();
        log.append("TestIssuerCA", "BBBB", &SecretString::from("two")).unwrap();

        let contents = fs::read_to_string(log.path()).unwrap();
        assert_eq!(contents, "TestRootCA, AAAA, one\nTestIssuerCA, BBBB, two\n");
    }
}
