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

//! In-memory certificate store.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::{normalize_thumbprint, CertStore, StoredCertificate};
use crate::error::StoreError;
use crate::types::{StoreContainer, StoreScope};

type Containers = HashMap<(StoreScope, StoreContainer), Vec<StoredCertificate>>;

/// Certificate store held in process memory. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryCertStore {
    containers: Arc<RwLock<Containers>>,
}

impl MemoryCertStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of certificates across all containers.
    pub fn len(&self) -> usize {
        self.containers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum()
    }

    /// Returns true if no container holds a certificate.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CertStore for MemoryCertStore {
    fn list_certificates(
        &self,
        scope: StoreScope,
        container: StoreContainer,
    ) -> Result<Vec<StoredCertificate>, StoreError> {
        let containers = self
            .containers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(containers
            .get(&(scope, container))
            .cloned()
            .unwrap_or_default())
    }

    fn import_certificate(
        &self,
        scope: StoreScope,
        container: StoreContainer,
        cert: &StoredCertificate,
    ) -> Result<(), StoreError> {
        let mut containers = self
            .containers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let certs = containers.entry((scope, container)).or_default();
        certs.retain(|c| c.thumbprint != cert.thumbprint);
        certs.push(cert.clone());
        Ok(())
    }

    fn delete_certificate(
        &self,
        scope: StoreScope,
        container: StoreContainer,
        thumbprint: &str,
    ) -> Result<bool, StoreError> {
        let wanted = normalize_thumbprint(thumbprint);
        let mut containers = self
            .containers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(certs) = containers.get_mut(&(scope, container)) else {
            return Ok(false);
        };
        let before = certs.len();
        certs.retain(|c| c.thumbprint != wanted);
        Ok(certs.len() != before)
    }
}
