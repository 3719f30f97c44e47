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

//! On-disk certificate store.
//!
//! Layout:
//!
//! ```text
//! <root>/
//!   LocalMachine/
//!     My/<THUMBPRINT>.json
//!     CA/<THUMBPRINT>.json
//!     Root/<THUMBPRINT>.json
//!   CurrentUser/
//!     ...
//! ```
//!
//! Records are written to `<THUMBPRINT>.json.tmp` and renamed into place so a
//! crash never leaves a half-written record behind.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{normalize_thumbprint, CertStore, StoredCertificate};
use crate::error::StoreError;
use crate::types::{StoreContainer, StoreScope};

const RECORD_EXTENSION: &str = "json";

/// Certificate store backed by a directory tree.
#[derive(Debug, Clone)]
pub struct FileCertStore {
    root: PathBuf,
}

impl FileCertStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| StoreError::io(&root, e))?;
        debug!("Opened certificate store at {}", root.display());
        Ok(Self { root })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn container_dir(&self, scope: StoreScope, container: StoreContainer) -> PathBuf {
        self.root.join(scope.as_str()).join(container.as_str())
    }

    fn record_path(&self, scope: StoreScope, container: StoreContainer, thumbprint: &str) -> PathBuf {
        self.container_dir(scope, container)
            .join(format!("{}.{RECORD_EXTENSION}", normalize_thumbprint(thumbprint)))
    }

    fn read_record(path: &Path) -> Result<StoredCertificate, StoreError> {
        let data = fs::read(path).map_err(|e| StoreError::io(path, e))?;
        serde_json::from_slice(&data).map_err(|source| StoreError::Record {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl CertStore for FileCertStore {
    fn list_certificates(
        &self,
        scope: StoreScope,
        container: StoreContainer,
    ) -> Result<Vec<StoredCertificate>, StoreError> {
        let dir = self.container_dir(scope, container);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&dir, e)),
        };

        let mut certs = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| StoreError::io(&dir, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            certs.push(Self::read_record(&path)?);
        }

        certs.sort_by_key(|c| c.issued_at);
        debug!("{} certificate(s) in {}\\{}", certs.len(), scope, container);
        Ok(certs)
    }

    fn import_certificate(
        &self,
        scope: StoreScope,
        container: StoreContainer,
        cert: &StoredCertificate,
    ) -> Result<(), StoreError> {
        let dir = self.container_dir(scope, container);
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let path = self.record_path(scope, container, &cert.thumbprint);
        let tmp = path.with_extension(format!("{RECORD_EXTENSION}.tmp"));
        let json = serde_json::to_vec_pretty(cert).map_err(|source| StoreError::Record {
            path: path.clone(),
            source,
        })?;

        let write = || -> io::Result<()> {
            let mut file = create_private_file(&tmp, false)?;
            file.write_all(&json)?;
            file.sync_all()?;
            fs::rename(&tmp, &path)
        };
        if let Err(e) = write() {
            if let Err(cleanup) = fs::remove_file(&tmp) {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    warn!("Failed to remove {}: {}", tmp.display(), cleanup);
                }
            }
            return Err(StoreError::io(&path, e));
        }

        debug!(
            "Imported {} ({}) into {}\\{}",
            cert.subject, cert.thumbprint, scope, container
        );
        Ok(())
    }

    fn delete_certificate(
        &self,
        scope: StoreScope,
        container: StoreContainer,
        thumbprint: &str,
    ) -> Result<bool, StoreError> {
        let path = self.record_path(scope, container, thumbprint);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Deleted {} from {}\\{}", thumbprint, scope, container);
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    fn find_by_thumbprint(
        &self,
        scope: StoreScope,
        container: StoreContainer,
        thumbprint: &str,
    ) -> Result<Option<StoredCertificate>, StoreError> {
        let path = self.record_path(scope, container, thumbprint);
        if !path.exists() {
            return Ok(None);
        }
        Self::read_record(&path).map(Some)
    }
}

/// Create a file readable only by the owner on Unix.
///
/// With `append` the file is opened for appending and created if missing,
/// otherwise it is truncated.
pub(crate) fn create_private_file(path: &Path, append: bool) -> io::Result<File> {
    let mut opts = OpenOptions::new();
    opts.create(true);
    if append {
        opts.append(true);
    } else {
        opts.write(true).truncate(true);
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }

    opts.open(path)
}
