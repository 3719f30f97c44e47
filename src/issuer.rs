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

//! Certificate issuance.
//!
//! [`CertificateIssuer`] turns a [`CertificateRequest`] into a signed
//! certificate according to a [`CertificateProfile`] and registers it in a
//! [`CertStore`].
//!
//! # Issuance Steps
//!
//! 1. Validate the request against the profile (subject, validity, SAN
//!    inputs). Nothing in the store is touched if this fails.
//! 2. Resolve the signer in **My** of the requested scope.
//! 3. Generate an RSA-2048 key and build the certificate parameters from the
//!    profile table.
//! 4. Sign (self-signed for Root) and write the certificate with its key into
//!    **My**. Root certificates are also copied into **Root**, Intermediate
//!    certificates into **CA**.
//!
//! # Example
//!
//! ```no_run
//! use labcert::issuer::CertificateIssuer;
//! use labcert::store::FileCertStore;
//! use labcert::{CertificateProfile, CertificateRequest};
//!
//! let store = FileCertStore::open("/var/lib/labcert/store")?;
//! let issuer = CertificateIssuer::new(&store);
//!
//! let root = issuer.issue(&CertificateRequest::new("TestRootCA"), CertificateProfile::Root)?;
//! let intermediate = issuer.issue(
//!     &CertificateRequest::new("TestIssuerCA").issued_by("TestRootCA"),
//!     CertificateProfile::Intermediate,
//! )?;
//! println!("{} -> {}", root.thumbprint, intermediate.thumbprint);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use rand::rngs::OsRng;
use rand::RngCore;
use rcgen::{
    Certificate, CertificateParams, CustomExtension, Ia5String, KeyPair, SanType, SerialNumber,
};
use rustls_pki_types::CertificateDer;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::IssuanceError;
use crate::keys;
use crate::profile::{BasicConstraints, CertificateProfile, ProfileSpec, SanPolicy};
use crate::san::{self, ClientIdentity, SUBJECT_ALT_NAME_ARCS};
use crate::store::{self, CertStore, StoredCertificate, StoredPrivateKey, SubjectMatch};
use crate::subject::SubjectName;
use crate::types::{CertificateRequest, IssuedCertificate, StoreContainer, StoreScope};

const SERIAL_NUMBER_LEN: usize = 16;

/// Issues certificates into a store.
pub struct CertificateIssuer<'a> {
    store: &'a dyn CertStore,
}

/// SAN content resolved from the request before anything is generated.
enum AltNames {
    None,
    Dns(Vec<String>),
    Encoded(Vec<u8>),
}

/// Everything validated up front.
struct Plan {
    subject: SubjectName,
    not_before: OffsetDateTime,
    not_after: OffsetDateTime,
    alt_names: AltNames,
    issuer: Option<SubjectName>,
    exportable: bool,
}

impl<'a> CertificateIssuer<'a> {
    /// Create an issuer over `store`.
    pub fn new(store: &'a dyn CertStore) -> Self {
        Self { store }
    }

    /// Issue a certificate for `request` under `profile`.
    ///
    /// # Errors
    ///
    /// - [`IssuanceError::InvalidProfileParameters`] if the request does not
    ///   satisfy the profile; raised before the store is read.
    /// - [`IssuanceError::SignerNotFound`] if no CA certificate with a private
    ///   key matches the issuer subject.
    /// - [`IssuanceError::Crypto`] if key generation or signing fails.
    /// - [`IssuanceError::StoreReadFailure`] / [`IssuanceError::StoreWriteFailure`]
    ///   if the store cannot be read or written. A failed write leaves no
    ///   entry behind.
    pub fn issue(
        &self,
        request: &CertificateRequest,
        profile: CertificateProfile,
    ) -> Result<IssuedCertificate, IssuanceError> {
        let spec = profile.spec();
        let plan = plan(request, spec)?;
        let subject = plan.subject.to_string();
        debug!("Issuing {} certificate for {}", profile, subject);

        let signer = match &plan.issuer {
            Some(issuer) => Some(self.resolve_signer(request.scope, profile, &subject, issuer)?),
            None => None,
        };

        let key_pair =
            keys::generate_key_pair().map_err(|e| IssuanceError::crypto(profile, &subject, e))?;
        let params = build_params(&plan, spec, signer.is_some())
            .map_err(|reason| IssuanceError::invalid_parameters(profile, &subject, reason))?;

        let certificate = match &signer {
            None => params.self_signed(&key_pair),
            Some(signer) => {
                let (issuer_cert, issuer_key) = signer_certificate(signer)
                    .map_err(|e| IssuanceError::crypto(profile, &subject, e))?;
                params.signed_by(&key_pair, &issuer_cert, &issuer_key)
            }
        }
        .map_err(|e| IssuanceError::crypto(profile, &subject, e))?;

        let stored = StoredCertificate::from_der(
            certificate.der().to_vec(),
            Some(profile),
            Some(StoredPrivateKey::new(key_pair.serialize_der(), plan.exportable)),
        )
        .map_err(|e| IssuanceError::crypto(profile, &subject, e))?;

        let containers = self.register(request.scope, profile, &stored)?;

        info!(
            "Issued {} certificate {} ({}) valid until {}",
            profile, stored.subject, stored.thumbprint, stored.not_after
        );

        Ok(IssuedCertificate {
            thumbprint: stored.thumbprint.clone(),
            subject: stored.subject.clone(),
            issuer: stored.issuer.clone(),
            profile,
            not_before: stored.not_before,
            not_after: stored.not_after,
            scope: request.scope,
            containers,
            key_exportable: plan.exportable,
        })
    }

    /// Find the most recently issued CA certificate with a key whose subject
    /// is exactly `issuer`.
    fn resolve_signer(
        &self,
        scope: StoreScope,
        profile: CertificateProfile,
        subject: &str,
        issuer: &SubjectName,
    ) -> Result<StoredCertificate, IssuanceError> {
        let issuer = issuer.to_string();
        let candidates = self
            .store
            .find_by_subject(scope, StoreContainer::My, &SubjectMatch::exact(&issuer))
            .map_err(|source| IssuanceError::StoreReadFailure {
                profile,
                subject: subject.to_string(),
                source,
            })?;
        let total = candidates.len();

        let signer = store::latest(
            candidates
                .into_iter()
                .filter(|c| c.is_ca && c.has_private_key()),
        )
        .ok_or_else(|| IssuanceError::SignerNotFound {
            profile,
            subject: subject.to_string(),
            issuer: issuer.clone(),
            scope,
        })?;

        if total > 1 {
            debug!(
                "{} certificates match {}; using the most recent ({})",
                total, issuer, signer.thumbprint
            );
        }
        if !signer.is_valid_at(OffsetDateTime::now_utc()) {
            warn!(
                "Signer {} ({}) is outside its validity period",
                signer.subject, signer.thumbprint
            );
        }
        if let (Some(expected), Some(actual)) = (profile.spec().signer, signer.profile) {
            if expected != actual {
                warn!(
                    "{} certificates are normally signed by an {} certificate, {} is {}",
                    profile, expected, signer.subject, actual
                );
            }
        }
        if matches!(profile.spec().basic_constraints, BasicConstraints::Ca { .. }) {
            let summary = signer
                .summary()
                .map_err(|source| IssuanceError::StoreReadFailure {
                    profile,
                    subject: subject.to_string(),
                    source,
                })?;
            if summary.path_len == Some(0) {
                return Err(IssuanceError::invalid_parameters(
                    profile,
                    subject,
                    format!(
                        "signer {} ({}) has path length 0 and cannot sign CA certificates",
                        signer.subject, signer.thumbprint
                    ),
                ));
            }
        }

        Ok(signer)
    }

    /// Write the new certificate into **My** and, for CA profiles, its
    /// public copy. The **My** entry is removed again if the copy fails.
    fn register(
        &self,
        scope: StoreScope,
        profile: CertificateProfile,
        cert: &StoredCertificate,
    ) -> Result<Vec<StoreContainer>, IssuanceError> {
        let write_failure = |container, source| IssuanceError::StoreWriteFailure {
            profile,
            subject: cert.subject.clone(),
            scope,
            container,
            source,
        };

        self.store
            .import_certificate(scope, StoreContainer::My, cert)
            .map_err(|e| write_failure(StoreContainer::My, e))?;

        let copy_to = match profile {
            CertificateProfile::Root => Some(StoreContainer::Root),
            CertificateProfile::Intermediate => Some(StoreContainer::Ca),
            _ => None,
        };
        let Some(container) = copy_to else {
            return Ok(vec![StoreContainer::My]);
        };

        if let Err(e) = self
            .store
            .import_certificate(scope, container, &cert.without_private_key())
        {
            match self
                .store
                .delete_certificate(scope, StoreContainer::My, &cert.thumbprint)
            {
                Ok(_) => debug!("Rolled back {} from {}\\My", cert.thumbprint, scope),
                Err(rollback) => warn!(
                    "Failed to roll back {} from {}\\My: {}",
                    cert.thumbprint, scope, rollback
                ),
            }
            return Err(write_failure(container, e));
        }

        Ok(vec![StoreContainer::My, container])
    }
}

/// Validate the request and resolve every input the profile needs.
fn plan(request: &CertificateRequest, spec: &ProfileSpec) -> Result<Plan, IssuanceError> {
    let profile = spec.profile;
    let invalid = |reason: String| IssuanceError::invalid_parameters(profile, &request.subject, reason);

    let subject = SubjectName::parse(&request.subject).map_err(|e| invalid(e.to_string()))?;

    if request.validity_days == 0 {
        return Err(invalid("validity must be at least one day".into()));
    }
    let (not_before, not_after) = validity_window(OffsetDateTime::now_utc(), request.validity_days)
        .ok_or_else(|| invalid(format!("validity of {} days is out of range", request.validity_days)))?;

    let issuer = match (spec.signer, request.issuer_subject.as_deref().map(str::trim)) {
        (Some(_), Some(issuer)) if !issuer.is_empty() => {
            Some(SubjectName::parse(issuer).map_err(|e| invalid(format!("issuer: {e}")))?)
        }
        (Some(expected), _) => {
            return Err(invalid(format!(
                "an issuer subject is required (normally the {expected} CA)"
            )))
        }
        (None, Some(issuer)) => {
            warn!("Ignoring issuer '{}' for self-signed {} certificate", issuer, profile);
            None
        }
        (None, None) => None,
    };

    if spec.san != SanPolicy::DnsFromSubject && !request.subject_alt_names.is_empty() {
        warn!(
            "Ignoring subject alternative names for {} certificate {}",
            profile, subject
        );
    }
    if spec.san != SanPolicy::ClientIdentity
        && (request.user_principal_name.is_some()
            || request.target_domain.is_some()
            || request.guid.is_some())
    {
        warn!(
            "Ignoring UPN, target domain and GUID for {} certificate {}",
            profile, subject
        );
    }

    let alt_names = match spec.san {
        SanPolicy::None => AltNames::None,
        SanPolicy::DnsFromSubject => AltNames::Dns(san::web_dns_names(
            subject.common_name(),
            &request.subject_alt_names,
        )),
        SanPolicy::ClientIdentity => {
            let encoded = client_identity(request, &subject).map_err(invalid)?;
            AltNames::Encoded(encoded)
        }
    };

    Ok(Plan {
        subject,
        not_before,
        not_after,
        alt_names,
        issuer,
        exportable: request
            .key_exportable
            .unwrap_or(spec.exportable_by_default),
    })
}

/// Build the ClientAuth SAN through its text form.
fn client_identity(request: &CertificateRequest, subject: &SubjectName) -> Result<Vec<u8>, String> {
    let required = |value: &Option<String>, what: &str| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| format!("a {what} is required"))
    };
    let upn = required(&request.user_principal_name, "user principal name")?;
    let target_domain = required(&request.target_domain, "target domain")?;
    let guid = match request.guid.as_deref().map(str::trim) {
        Some(guid) if !guid.is_empty() => {
            Uuid::parse_str(guid).map_err(|e| format!("invalid GUID '{guid}': {e}"))?
        }
        _ => Uuid::new_v4(),
    };

    let text = ClientIdentity::new(upn, subject.to_string(), guid, &target_domain).to_extension_text();
    debug!("ClientAuth SAN: {}", text);

    ClientIdentity::parse_extension_text(&text)
        .and_then(|identity| identity.to_extension_der())
        .map_err(|e| e.to_string())
}

/// Start now, truncated to whole seconds, and run for `days` days.
fn validity_window(now: OffsetDateTime, days: u32) -> Option<(OffsetDateTime, OffsetDateTime)> {
    let not_before = now.replace_nanosecond(0).ok()?;
    let not_after = not_before.checked_add(Duration::days(i64::from(days)))?;
    if not_after.year() > 9999 {
        return None;
    }
    Some((not_before, not_after))
}

/// Positive 128-bit random serial.
fn random_serial() -> SerialNumber {
    let mut bytes = [0u8; SERIAL_NUMBER_LEN];
    OsRng.fill_bytes(&mut bytes);
    bytes[0] = (bytes[0] & 0x7F) | 0x40;
    SerialNumber::from(bytes.to_vec())
}

fn build_params(plan: &Plan, spec: &ProfileSpec, signed: bool) -> Result<CertificateParams, String> {
    let mut params = CertificateParams::default();
    params.distinguished_name = plan.subject.to_rcgen();
    params.not_before = plan.not_before;
    params.not_after = plan.not_after;
    params.serial_number = Some(random_serial());
    params.is_ca = spec.basic_constraints.to_rcgen();
    params.key_usages = spec.key_usages.iter().map(|ku| ku.to_rcgen()).collect();
    params.extended_key_usages = spec
        .extended_key_usages
        .iter()
        .map(|eku| eku.to_rcgen())
        .collect();
    params.use_authority_key_identifier_extension = signed;

    match &plan.alt_names {
        AltNames::None => {}
        AltNames::Dns(names) => {
            for name in names {
                let dns = Ia5String::try_from(name.as_str())
                    .map_err(|e| format!("invalid DNS name '{name}': {e}"))?;
                params.subject_alt_names.push(SanType::DnsName(dns));
            }
        }
        AltNames::Encoded(der) => {
            params
                .custom_extensions
                .push(CustomExtension::from_oid_content(&SUBJECT_ALT_NAME_ARCS, der.clone()));
        }
    }

    Ok(params)
}

/// Rebuild the rcgen issuer from a stored signer.
fn signer_certificate(signer: &StoredCertificate) -> Result<(Certificate, KeyPair), String> {
    let key = signer
        .private_key
        .as_ref()
        .ok_or_else(|| format!("signer {} has no private key", signer.thumbprint))?;
    let key_pair = keys::load_key_pair(&key.pkcs8_der)?;
    let params = CertificateParams::from_ca_cert_der(&CertificateDer::from(signer.der_bytes.as_slice()))
        .map_err(|e| format!("cannot read signer {}: {e}", signer.thumbprint))?;
    let certificate = params
        .self_signed(&key_pair)
        .map_err(|e| format!("cannot load signer {}: {e}", signer.thumbprint))?;
    Ok((certificate, key_pair))
}
