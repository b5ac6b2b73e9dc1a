// Copyright 2025 Adobe. All rights reserved.
// This file is licensed to you under the Apache License,
// Version 2.0 (http://www.apache.org/licenses/LICENSE-2.0)
// or the MIT license (http://opensource.org/licenses/MIT),
// at your option.

// Unless required by applicable law or agreed to in writing,
// this software is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR REPRESENTATIONS OF ANY KIND, either express or
// implied. See the LICENSE-MIT and LICENSE-APACHE files for the
// specific language governing permissions and limitations under
// each license.

//! Certificate chain evaluation for receipt signers.
//!
//! A [`ChainValidator`] proves that the receipt's signing certificate chains
//! to a configured trust anchor and then applies an ordered list of
//! [`ChainPolicy`] values, all of which must pass. Path building is delegated
//! to one of two interchangeable [`ChainBackend`] implementations, chosen by
//! [`ChainBackendKind`]. Both report failures with the same [`ChainError`]
//! classification.

use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ocsp::{self, OcspStatus, OcspTransport, UreqTransport};

mod path_validation;
pub use path_validation::PathValidationBackend;

mod trust_anchors;
pub use trust_anchors::TrustAnchors;

mod trust_store;
pub use trust_store::TrustStoreBackend;

/// Apple Worldwide Developer Relations intermediate marker extension
/// (1.2.840.113635.100.6.2.1), as encoded OID content octets.
pub const WWDR_INTERMEDIATE_OID: &[u8] = &[42, 134, 72, 134, 247, 99, 100, 6, 2, 1];

/// App Store receipt signing marker extension (1.2.840.113635.100.6.11.1),
/// as encoded OID content octets.
pub const RECEIPT_SIGNER_OID: &[u8] = &[42, 134, 72, 134, 247, 99, 100, 6, 11, 1];

/// Number of certificates in a receipt signing chain, root included.
pub const APP_STORE_CHAIN_LENGTH: usize = 3;

/// Selects how the certificate path is built and verified.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainBackendKind {
    /// Build the path by issuer lookup in a store made of the receipt's
    /// certificates and the trust anchors, using `x509-certificate`.
    #[default]
    TrustStore,

    /// Validate the receipt's certificates in the order given, using
    /// `x509-parser` and this crate's RSA validators.
    PathValidation,
}

impl ChainBackendKind {
    /// Create the backend for this kind.
    pub fn backend(self) -> Box<dyn ChainBackend> {
        match self {
            Self::TrustStore => Box::new(TrustStoreBackend),
            Self::PathValidation => Box::new(PathValidationBackend),
        }
    }
}

impl fmt::Display for ChainBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TrustStore => write!(f, "trust store"),
            Self::PathValidation => write!(f, "path validation"),
        }
    }
}

/// A rule a certificate chain must satisfy.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ChainPolicy {
    /// Certificates are within their validity period and every certificate
    /// above the leaf is a certificate authority. Validity is checked at the
    /// [`ChainPolicy::ValidationTime`] if one is present, otherwise at the
    /// current time.
    Basic,

    /// Validity of every certificate is checked at this time.
    ValidationTime(DateTime<Utc>),

    /// The chain has exactly three certificates, the intermediate carries the
    /// WWDR marker extension and the leaf carries the receipt signer marker.
    AppStoreReceipt,

    /// The leaf is checked online with OCSP.
    Revocation,
}

/// Reason a chain was rejected.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ChainFailure {
    /// The chain does not end at a configured trust anchor.
    UntrustedRoot,

    /// A certificate is outside its validity period at the validation time.
    NotValidAtTime,

    /// A certificate's signature does not verify under its issuer's key.
    SignatureMismatch,

    /// A certificate above the leaf is not a certificate authority.
    NotACertificateAuthority,

    /// The chain does not have the expected number of certificates.
    WrongChainLength {
        /// Number of certificates found, root included.
        found: usize,
    },

    /// The intermediate lacks the WWDR marker extension.
    MissingWwdrExtension,

    /// The leaf lacks the receipt signer marker extension.
    MissingReceiptSignerExtension,

    /// The leaf has been revoked.
    Revoked {
        /// When the revocation took effect.
        revoked_at: DateTime<Utc>,
    },
}

impl fmt::Display for ChainFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UntrustedRoot => write!(f, "chain does not end at a trusted root"),
            Self::NotValidAtTime => write!(f, "certificate not valid at validation time"),
            Self::SignatureMismatch => write!(f, "certificate signature does not verify"),
            Self::NotACertificateAuthority => write!(f, "issuer is not a certificate authority"),
            Self::WrongChainLength { found } => {
                write!(f, "expected {APP_STORE_CHAIN_LENGTH} certificates, found {found}")
            }
            Self::MissingWwdrExtension => write!(f, "intermediate lacks the WWDR extension"),
            Self::MissingReceiptSignerExtension => {
                write!(f, "leaf lacks the receipt signer extension")
            }
            Self::Revoked { revoked_at } => write!(f, "certificate revoked at {revoked_at}"),
        }
    }
}

/// Describes errors that can be identified when evaluating a certificate
/// chain.
#[derive(Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum ChainError {
    /// A certificate could not be parsed, or no certificate was supplied.
    #[error("invalid certificate data")]
    InvalidCertificateData,

    /// The chain was evaluated and rejected.
    #[error("certificate chain validation failed: {0}")]
    ChainValidationFailed(ChainFailure),

    /// The revocation status could not be established.
    #[error("revocation check failed: {0}")]
    RevocationCheckFailed(String),
}

impl From<ChainFailure> for ChainError {
    fn from(failure: ChainFailure) -> Self {
        Self::ChainValidationFailed(failure)
    }
}

/// The facts about one certificate that chain policies look at.
///
/// Each backend produces these with its own X.509 parser.
#[derive(Clone, Debug)]
pub struct ChainCertificate {
    /// DER encoding of the certificate.
    pub der: Vec<u8>,

    /// Start of the validity period.
    pub not_before: DateTime<Utc>,

    /// End of the validity period.
    pub not_after: DateTime<Utc>,

    /// Whether basic constraints mark this as a certificate authority.
    pub is_ca: bool,

    /// Encoded content octets of each extension OID.
    pub extension_oids: Vec<Vec<u8>>,
}

impl ChainCertificate {
    /// Whether the certificate carries an extension with this OID.
    pub fn has_extension(&self, oid: &[u8]) -> bool {
        self.extension_oids.iter().any(|ext| ext.as_slice() == oid)
    }

    /// Whether `time` is within the validity period, both ends inclusive.
    pub fn is_valid_at(&self, time: DateTime<Utc>) -> bool {
        self.not_before <= time && time <= self.not_after
    }
}

/// Builds a verified certificate path.
pub trait ChainBackend: Send + Sync {
    /// Which backend this is.
    fn kind(&self) -> ChainBackendKind;

    /// Build the path from the leaf (`certificates[0]`) to a trust anchor.
    ///
    /// On success the returned path starts with the leaf and ends with a
    /// certificate that is byte-for-byte one of `anchors`. Every link has
    /// been signature-checked.
    fn resolve_path(
        &self,
        certificates: &[Vec<u8>],
        anchors: &TrustAnchors,
    ) -> Result<Vec<ChainCertificate>, ChainError>;
}

/// Evaluates receipt certificate chains against trust anchors and policies.
#[derive(Clone)]
pub struct ChainValidator {
    backend: Arc<dyn ChainBackend>,
    anchors: TrustAnchors,
    policies: Vec<ChainPolicy>,
    transport: Arc<dyn OcspTransport>,
    ocsp_responder: Option<String>,
}

impl ChainValidator {
    /// Create a validator using the given backend and anchors, with the
    /// [`ChainPolicy::Basic`] policy only.
    pub fn new(kind: ChainBackendKind, anchors: TrustAnchors) -> Self {
        Self {
            backend: Arc::from(kind.backend()),
            anchors,
            policies: vec![ChainPolicy::Basic],
            transport: Arc::new(UreqTransport),
            ocsp_responder: None,
        }
    }

    /// Replace the policy list.
    pub fn with_policies(mut self, policies: Vec<ChainPolicy>) -> Self {
        self.policies = policies;
        self
    }

    /// Use this transport for OCSP requests.
    pub fn with_transport(mut self, transport: Arc<dyn OcspTransport>) -> Self {
        self.transport = transport;
        self
    }

    /// Send OCSP requests here instead of the leaf's AIA responder.
    pub fn with_ocsp_responder(mut self, url: impl Into<String>) -> Self {
        self.ocsp_responder = Some(url.into());
        self
    }

    /// Which backend builds the path.
    pub fn kind(&self) -> ChainBackendKind {
        self.backend.kind()
    }

    /// The configured policies, in evaluation order.
    pub fn policies(&self) -> &[ChainPolicy] {
        &self.policies
    }

    /// The configured trust anchors.
    pub fn anchors(&self) -> &TrustAnchors {
        &self.anchors
    }

    /// Whether evaluation may perform network I/O.
    pub fn checks_revocation(&self) -> bool {
        self.policies.contains(&ChainPolicy::Revocation)
    }

    /// Evaluate a chain. `certificates[0]` must be the leaf; any further
    /// certificates are candidate intermediates and roots.
    pub fn validate(&self, certificates: &[Vec<u8>]) -> Result<(), ChainError> {
        if certificates.is_empty() {
            return Err(ChainError::InvalidCertificateData);
        }

        let path = self.backend.resolve_path(certificates, &self.anchors)?;
        debug!(
            "resolved {} certificate path with {} backend",
            path.len(),
            self.backend.kind()
        );

        let validation_time = self.policies.iter().find_map(|policy| match policy {
            ChainPolicy::ValidationTime(time) => Some(*time),
            _ => None,
        });

        for policy in &self.policies {
            match policy {
                ChainPolicy::Basic => {
                    check_validity(&path, validation_time.unwrap_or_else(Utc::now))?;
                    check_authorities(&path)?;
                }
                ChainPolicy::ValidationTime(time) => check_validity(&path, *time)?,
                ChainPolicy::AppStoreReceipt => check_app_store_receipt(&path)?,
                ChainPolicy::Revocation => self.check_revocation(&path)?,
            }
        }

        Ok(())
    }

    fn check_revocation(&self, path: &[ChainCertificate]) -> Result<(), ChainError> {
        let (Some(leaf), Some(issuer)) = (path.first(), path.get(1)) else {
            return Err(ChainError::RevocationCheckFailed(
                "no issuer for the leaf certificate".to_string(),
            ));
        };

        let status = ocsp::fetch_ocsp_status(
            &leaf.der,
            &issuer.der,
            self.transport.as_ref(),
            self.ocsp_responder.as_deref(),
        );

        match status {
            Ok(OcspStatus::Good) => Ok(()),
            Ok(OcspStatus::Revoked { revoked_at }) => {
                Err(ChainFailure::Revoked { revoked_at }.into())
            }
            Ok(OcspStatus::Unknown) => {
                warn!("OCSP responder does not know the receipt signing certificate");
                Err(ChainError::RevocationCheckFailed(
                    "certificate status unknown".to_string(),
                ))
            }
            Err(err) => {
                warn!("OCSP check failed: {err}");
                Err(ChainError::RevocationCheckFailed(err.to_string()))
            }
        }
    }
}

impl fmt::Debug for ChainValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainValidator")
            .field("kind", &self.backend.kind())
            .field("anchors", &self.anchors.len())
            .field("policies", &self.policies)
            .field("ocsp_responder", &self.ocsp_responder)
            .finish()
    }
}

fn check_validity(path: &[ChainCertificate], time: DateTime<Utc>) -> Result<(), ChainError> {
    if path.iter().all(|cert| cert.is_valid_at(time)) {
        Ok(())
    } else {
        Err(ChainFailure::NotValidAtTime.into())
    }
}

fn check_authorities(path: &[ChainCertificate]) -> Result<(), ChainError> {
    if path.iter().skip(1).all(|cert| cert.is_ca) {
        Ok(())
    } else {
        Err(ChainFailure::NotACertificateAuthority.into())
    }
}

fn check_app_store_receipt(path: &[ChainCertificate]) -> Result<(), ChainError> {
    if path.len() != APP_STORE_CHAIN_LENGTH {
        return Err(ChainFailure::WrongChainLength { found: path.len() }.into());
    }

    if !path[1].has_extension(WWDR_INTERMEDIATE_OID) {
        return Err(ChainFailure::MissingWwdrExtension.into());
    }

    if !path[0].has_extension(RECEIPT_SIGNER_OID) {
        return Err(ChainFailure::MissingReceiptSignerExtension.into());
    }

    Ok(())
}
