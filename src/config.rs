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

//! Configuration file model and discovery.
//!
//! Every section is optional; a missing file means defaults.
//!
//! ```toml
//! [store]
//! path = "${HOME}/.local/share/labcert/store"
//! scope = "LocalMachine"
//!
//! [issue]
//! validity_days = 365
//!
//! [export]
//! folder = "certs"
//! password_length = 20
//! record_passwords = true
//!
//! [logging]
//! level = "info"
//! json = false
//! ```
//!
//! Path values may reference environment variables as `${NAME}` and may
//! start with `~/`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{ExportOptions, StoreScope, DEFAULT_PASSWORD_LENGTH, DEFAULT_VALIDITY_DAYS};

/// Environment variable naming a configuration file.
pub const CONFIG_ENV_VAR: &str = "LABCERT_CONFIG";

/// Shortest password length accepted from configuration.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LabCertConfig {
    /// Certificate store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Issuance defaults.
    #[serde(default)]
    pub issue: IssueConfig,

    /// Export defaults.
    #[serde(default)]
    pub export: ExportConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[store]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Root directory of the file store.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Scope used when a command does not name one.
    #[serde(default)]
    pub scope: StoreScope,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            scope: StoreScope::default(),
        }
    }
}

/// `[issue]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IssueConfig {
    /// Certificate lifetime when `--days` is not given.
    #[serde(default = "default_validity_days")]
    pub validity_days: u32,
}

impl Default for IssueConfig {
    fn default() -> Self {
        Self {
            validity_days: DEFAULT_VALIDITY_DAYS,
        }
    }
}

/// `[export]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportConfig {
    /// Target folder when `--folder` is not given.
    #[serde(default = "default_export_folder")]
    pub folder: PathBuf,

    /// Length of generated PFX passwords.
    #[serde(default = "default_password_length")]
    pub password_length: usize,

    /// Append PFX passwords to `CertInfo.txt`.
    #[serde(default = "default_true")]
    pub record_passwords: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            folder: default_export_folder(),
            password_length: DEFAULT_PASSWORD_LENGTH,
            record_passwords: true,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of text.
    #[serde(default)]
    pub json: bool,

    /// Append to this file instead of stderr.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            path: None,
        }
    }
}

fn default_store_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("labcert").join("store"))
        .unwrap_or_else(|| PathBuf::from(".labcert").join("store"))
}

fn default_validity_days() -> u32 {
    DEFAULT_VALIDITY_DAYS
}

fn default_export_folder() -> PathBuf {
    PathBuf::from("certs")
}

fn default_password_length() -> usize {
    DEFAULT_PASSWORD_LENGTH
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LabCertConfig {
    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::config(format!("Invalid TOML: {e}")))
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(format!("TOML serialize: {e}")))
    }

    /// Expand `${NAME}` and leading `~/` in path values.
    pub fn expand_variables(&mut self) {
        self.store.path = expand_path(&self.store.path);
        self.export.folder = expand_path(&self.export.folder);
        if let Some(ref mut path) = self.logging.path {
            *path = expand_path(path.as_path());
        }
    }

    /// Check every value, reporting all problems at once.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.store.path.as_os_str().is_empty() {
            errors.push("store.path must not be empty".to_string());
        }
        if self.issue.validity_days == 0 {
            errors.push("issue.validity_days must be > 0".to_string());
        }
        if self.export.folder.as_os_str().is_empty() {
            errors.push("export.folder must not be empty".to_string());
        }
        if self.export.password_length < MIN_PASSWORD_LENGTH {
            errors.push(format!(
                "export.password_length must be at least {MIN_PASSWORD_LENGTH}"
            ));
        }
        if self.logging.level.parse::<crate::logging::LogLevel>().is_err() {
            errors.push(format!(
                "logging.level '{}' is not one of trace, debug, info, warn, error",
                self.logging.level
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::config(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }

    /// Export options seeded from the `[export]` and `[store]` sections.
    pub fn export_options(&self) -> ExportOptions {
        ExportOptions::new(self.export.folder.clone())
            .scope(self.store.scope)
            .record_passwords(self.export.record_passwords)
            .password_length(self.export.password_length)
    }
}

/// Expand `${NAME}` from the environment and a leading `~/`.
///
/// Unknown variables are left unchanged.
pub fn expand_variables(input: &str) -> String {
    let mut result = input.to_string();
    let mut start = 0;

    while let Some(offset) = result[start..].find("${") {
        let var_start = start + offset;
        let Some(len) = result[var_start..].find('}') else {
            break;
        };
        let var_end = var_start + len;
        let name = &result[var_start + 2..var_end];

        match std::env::var(name) {
            Ok(value) => {
                result.replace_range(var_start..=var_end, &value);
                start = var_start + value.len();
            }
            Err(_) => start = var_end + 1,
        }
    }

    if let Some(rest) = result.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest).to_string_lossy().into_owned();
        }
    }
    result
}

fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(expand_variables(&path.to_string_lossy()))
}

/// Configuration file discovery.
///
/// # Search Order
///
/// First found wins:
///
/// 1. Explicit path (if set via `with_path()`)
/// 2. Environment variable `LABCERT_CONFIG`
/// 3. `./labcert.toml`
/// 4. User config directory: `$XDG_CONFIG_HOME/labcert/config.toml`,
///    `~/.config/labcert/config.toml` or `%APPDATA%\labcert\config.toml`
/// 5. Unix: `/etc/labcert/config.toml`
///
/// An explicit path or environment variable that names a missing file is an
/// error. Finding nothing in the standard locations is not.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    explicit_path: Option<PathBuf>,
    env_var_name: String,
    expand_variables: bool,
    validate: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a loader with default settings.
    pub fn new() -> Self {
        Self {
            explicit_path: None,
            env_var_name: CONFIG_ENV_VAR.to_string(),
            expand_variables: true,
            validate: true,
        }
    }

    /// Use exactly this file.
    pub fn with_path(mut self, path: impl AsRef<Path>) -> Self {
        self.explicit_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the environment variable consulted for a path.
    ///
    /// Default: `LABCERT_CONFIG`
    pub fn with_env_var(mut self, name: impl Into<String>) -> Self {
        self.env_var_name = name.into();
        self
    }

    /// Enable or disable variable expansion. Default: `true`
    pub fn with_expand_variables(mut self, expand: bool) -> Self {
        self.expand_variables = expand;
        self
    }

    /// Enable or disable validation after loading. Default: `true`
    pub fn with_validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Load the first configuration file found, or defaults.
    ///
    /// Returns the configuration and the file it came from.
    pub fn load(&self) -> Result<(LabCertConfig, Option<PathBuf>)> {
        match self.find_config_file()? {
            Some(path) => {
                let config = self.load_from_path(&path)?;
                Ok((config, Some(path)))
            }
            None => {
                let mut config = LabCertConfig::default();
                self.finish(&mut config)?;
                Ok((config, None))
            }
        }
    }

    /// Load a specific file.
    pub fn load_from_path(&self, path: &Path) -> Result<LabCertConfig> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read {}: {e}", path.display())))?;
        self.load_from_str(&content)
    }

    /// Load configuration from a TOML string.
    pub fn load_from_str(&self, toml_content: &str) -> Result<LabCertConfig> {
        let mut config = LabCertConfig::from_toml(toml_content)?;
        self.finish(&mut config)?;
        Ok(config)
    }

    fn finish(&self, config: &mut LabCertConfig) -> Result<()> {
        if self.expand_variables {
            config.expand_variables();
        }
        if self.validate {
            config.validate()?;
        }
        Ok(())
    }

    /// Find the configuration file to use, if any.
    pub fn find_config_file(&self) -> Result<Option<PathBuf>> {
        if let Some(ref path) = self.explicit_path {
            if path.exists() {
                return Ok(Some(path.clone()));
            }
            return Err(Error::config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        if let Ok(env_path) = std::env::var(&self.env_var_name) {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(Error::config(format!(
                "Configuration file from {} not found: {}",
                self.env_var_name, env_path
            )));
        }

        Ok(self.get_search_paths().into_iter().find(|p| p.exists()))
    }

    /// Standard locations, in search order.
    pub fn get_search_paths(&self) -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("labcert.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("labcert").join("config.toml"));
        }

        #[cfg(unix)]
        paths.push(PathBuf::from("/etc/labcert/config.toml"));

        paths
    }
}

/// Write a commented default configuration file.
///
/// Refuses to replace an existing file unless `force` is set.
pub fn write_default_config(path: impl AsRef<Path>, force: bool) -> Result<()> {
    let path = path.as_ref();
    if path.exists() && !force {
        return Err(Error::config(format!(
            "{} already exists; use --force to overwrite",
            path.display()
        )));
    }

    let defaults = LabCertConfig::default();
    let content = format!(
        r#"# labcert configuration

[store]
# Directory holding the certificate store
path = "{store_path}"
# LocalMachine or CurrentUser
scope = "{scope}"

[issue]
# Certificate lifetime in days
validity_days = {validity_days}

[export]
# Folder receiving .crt, .pfx and CertInfo.txt
folder = "{folder}"
# Length of generated PFX passwords
password_length = {password_length}
# LAB USE ONLY: append every PFX password to CertInfo.txt in clear text
record_passwords = {record_passwords}

[logging]
# trace, debug, info, warn or error
level = "{level}"
json = false
# path = "/var/log/labcert.log"
"#,
        store_path = toml_path(&defaults.store.path),
        scope = defaults.store.scope,
        validity_days = defaults.issue.validity_days,
        folder = toml_path(&defaults.export.folder),
        password_length = defaults.export.password_length,
        record_passwords = defaults.export.record_passwords,
        level = defaults.logging.level,
    );

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

/// Path as a TOML basic-string body.
fn toml_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "\\\\").replace('"', "\\\"")
}
