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

use bcder::Mode;
use bytes::Bytes;
use x509_certificate::CapturedX509Certificate;

use crate::{
    asn1::skip_remaining,
    chain::{ChainBackend, ChainBackendKind, ChainCertificate, ChainError, ChainFailure, TrustAnchors},
};

/// `id-ce-basicConstraints` (2.5.29.19).
const BASIC_CONSTRAINTS_OID: &[u8] = &[85, 29, 19];

/// Builds the path by issuer lookup.
///
/// The store holds the receipt's certificates and the trust anchors. Starting
/// at the leaf, the first certificate whose key verifies the current one's
/// signature is taken as its issuer, until a trust anchor is reached.
#[derive(Clone, Copy, Debug, Default)]
pub struct TrustStoreBackend;

impl ChainBackend for TrustStoreBackend {
    fn kind(&self) -> ChainBackendKind {
        ChainBackendKind::TrustStore
    }

    fn resolve_path(
        &self,
        certificates: &[Vec<u8>],
        anchors: &TrustAnchors,
    ) -> Result<Vec<ChainCertificate>, ChainError> {
        let receipt_certs = certificates
            .iter()
            .map(|der| {
                CapturedX509Certificate::from_der(der.clone())
                    .map_err(|_| ChainError::InvalidCertificateData)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let anchor_certs: Vec<CapturedX509Certificate> = anchors
            .iter()
            .filter_map(|der| CapturedX509Certificate::from_der(der.to_vec()).ok())
            .collect();

        let Some((leaf, intermediates)) = receipt_certs.split_first() else {
            return Err(ChainError::InvalidCertificateData);
        };

        let store: Vec<&CapturedX509Certificate> =
            intermediates.iter().chain(anchor_certs.iter()).collect();

        let mut path = vec![leaf];
        let mut current = leaf;

        while !anchors.contains(current.constructed_data()) {
            let issuer = store.iter().copied().find(|candidate| {
                !path.iter().any(|seen| std::ptr::eq(*seen, *candidate))
                    && current.verify_signed_by_certificate(*candidate).is_ok()
            });

            let Some(issuer) = issuer else {
                return Err(ChainFailure::UntrustedRoot.into());
            };

            path.push(issuer);
            current = issuer;
        }

        Ok(path.into_iter().map(chain_certificate).collect())
    }
}

fn chain_certificate(cert: &CapturedX509Certificate) -> ChainCertificate {
    let is_ca = cert
        .iter_extensions()
        .find(|ext| ext.id.as_ref() == BASIC_CONSTRAINTS_OID)
        .map(|ext| basic_constraints_ca(ext.value.to_bytes()))
        .unwrap_or(false);

    ChainCertificate {
        der: cert.constructed_data().to_vec(),
        not_before: cert.validity_not_before(),
        not_after: cert.validity_not_after(),
        is_ca,
        extension_oids: cert
            .iter_extensions()
            .map(|ext| ext.id.as_ref().to_vec())
            .collect(),
    }
}

/// Read the `cA` flag of a `BasicConstraints` extension value.
///
/// ```ASN.1
/// BasicConstraints ::= SEQUENCE {
///   cA BOOLEAN DEFAULT FALSE,
///   pathLenConstraint INTEGER (0..MAX) OPTIONAL }
/// ```
fn basic_constraints_ca(value: Bytes) -> bool {
    Mode::Der
        .decode(value, |cons| {
            cons.take_sequence(|cons| {
                let ca = cons.take_opt_bool()?.unwrap_or(false);
                skip_remaining(cons)?;
                Ok(ca)
            })
        })
        .unwrap_or(false)
}
