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

use chrono::{DateTime, Utc};
use x509_parser::{certificate::X509Certificate, prelude::FromDer};

use crate::{
    chain::{ChainBackend, ChainBackendKind, ChainCertificate, ChainError, ChainFailure, TrustAnchors},
    raw_signature::certificate_signed_by,
};

/// Validates the receipt's certificates in the order they were supplied.
///
/// Each certificate must be signed by the one that follows it. The last one
/// must either be a trust anchor or be signed by one, in which case the
/// anchor is appended to the path.
#[derive(Clone, Copy, Debug, Default)]
pub struct PathValidationBackend;

impl ChainBackend for PathValidationBackend {
    fn kind(&self) -> ChainBackendKind {
        ChainBackendKind::PathValidation
    }

    fn resolve_path(
        &self,
        certificates: &[Vec<u8>],
        anchors: &TrustAnchors,
    ) -> Result<Vec<ChainCertificate>, ChainError> {
        let parsed = certificates
            .iter()
            .map(|der| parse(der))
            .collect::<Result<Vec<_>, _>>()?;

        // Make sure the chain is in order and every link verifies.
        for pair in parsed.windows(2) {
            if !certificate_signed_by(&pair[0], &pair[1]) {
                return Err(ChainFailure::SignatureMismatch.into());
            }
        }

        let mut path = certificates
            .iter()
            .zip(parsed.iter())
            .map(|(der, cert)| chain_certificate(der, cert))
            .collect::<Result<Vec<_>, _>>()?;

        let (Some(last_der), Some(last)) = (certificates.last(), parsed.last()) else {
            return Err(ChainError::InvalidCertificateData);
        };

        if anchors.contains(last_der) {
            return Ok(path);
        }

        // Work back from the last certificate against the trust anchors.
        for anchor_der in anchors.iter() {
            let Ok(anchor) = parse(anchor_der) else {
                continue;
            };

            if last.issuer() == anchor.subject() && certificate_signed_by(last, &anchor) {
                path.push(chain_certificate(anchor_der, &anchor)?);
                return Ok(path);
            }
        }

        Err(ChainFailure::UntrustedRoot.into())
    }
}

fn parse(der: &[u8]) -> Result<X509Certificate<'_>, ChainError> {
    let (_rem, cert) = X509Certificate::from_der(der).map_err(|_| ChainError::InvalidCertificateData)?;
    Ok(cert)
}

fn chain_certificate(der: &[u8], cert: &X509Certificate<'_>) -> Result<ChainCertificate, ChainError> {
    let validity = cert.validity();
    let not_before = DateTime::<Utc>::from_timestamp(validity.not_before.timestamp(), 0)
        .ok_or(ChainError::InvalidCertificateData)?;
    let not_after = DateTime::<Utc>::from_timestamp(validity.not_after.timestamp(), 0)
        .ok_or(ChainError::InvalidCertificateData)?;

    let is_ca = matches!(cert.basic_constraints(), Ok(Some(bc)) if bc.value.ca);

    Ok(ChainCertificate {
        der: der.to_vec(),
        not_before,
        not_after,
        is_ca,
        extension_oids: cert
            .extensions()
            .iter()
            .map(|ext| ext.oid.as_bytes().to_vec())
            .collect(),
    })
}
