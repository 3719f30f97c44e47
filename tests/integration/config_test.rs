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

//! Integration tests for configuration-driven issuance and export

use std::fs;

use labcert::config::{write_default_config, ConfigLoader};
use labcert::store::FileCertStore;
use labcert::{
    CertificateExporter, CertificateIssuer, CertificateProfile, CertificateRequest,
    ExportRequest, StoreScope,
};
use tempfile::TempDir;

#[test]
fn test_config_drives_store_and_export() {
    let dir = TempDir::new().unwrap();
    let store_path = dir.path().join("store");
    let folder = dir.path().join("out");
    let config_path = dir.path().join("labcert.toml");
    fs::write(
        &config_path,
        format!(
            r#"
[store]
path = "{}"
scope = "CurrentUser"

[issue]
validity_days = 30

[export]
folder = "{}"
password_length = 12
"#,
            store_path.display(),
            folder.display()
        ),
    )
    .unwrap();

    let (config, source) = ConfigLoader::new().with_path(&config_path).load().unwrap();
    assert_eq!(source, Some(config_path));

    let store = FileCertStore::open(&config.store.path).unwrap();
    let issued = CertificateIssuer::new(&store)
        .issue(
            &CertificateRequest::new("TestRootCA")
                .validity_days(config.issue.validity_days)
                .scope(config.store.scope),
            CertificateProfile::Root,
        )
        .unwrap();
    assert_eq!(issued.scope, StoreScope::CurrentUser);
    assert!(store_path.join("CurrentUser").join("Root").is_dir());

    let options = config.export_options().include_private_key(true);
    CertificateExporter::new(&store)
        .export(&ExportRequest::new("TestRootCA", options))
        .unwrap();

    let log = fs::read_to_string(folder.join("CertInfo.txt")).unwrap();
    let password = log.trim_end().rsplit(", ").next().unwrap();
    assert_eq!(password.len(), 12);
}

#[test]
fn test_default_config_file_loads() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    write_default_config(&path, false).unwrap();

    let (config, _) = ConfigLoader::new().with_path(&path).load().unwrap();
    assert_eq!(config.issue.validity_days, 365);
    assert!(config.export.record_passwords);
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[issue]\nvalidity_days = 0\n[export]\npassword_length = 2\n").unwrap();

    let err = ConfigLoader::new().with_path(&path).load().unwrap_err();
    let message = err.to_string();
    assert!(message.contains("validity_days"), "{message}");
    assert!(message.contains("password_length"), "{message}");
}
