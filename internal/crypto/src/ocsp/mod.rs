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

//! Tools for working with OCSP requests and responses.
//!
//! Only the leaf of a receipt chain is checked. The response must be signed
//! either by the leaf's issuer or by a delegated responder certificate that
//! the issuer signed for OCSP use.

use bcder::{Integer, Mode, Oid};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use log::debug;
use thiserror::Error;
use x509_parser::{certificate::X509Certificate, prelude::FromDer};

use crate::{
    asn1::{
        der_header,
        rfc6960::{
            BasicOcspResponse, CertId, CertStatus, OcspRequest, OcspResponse, OcspResponseStatus,
            ResponderId, OID_PKIX_OCSP_BASIC, OID_SHA1,
        },
    },
    hash::sha1,
    raw_signature::{certificate_signed_by, validator_for_signature_alg, RawSignatureValidator},
};

mod fetch;
pub use fetch::{fetch_ocsp_status, responder_urls, OcspTransport, UreqTransport};

/// Revocation status of a certificate, as reported by an OCSP responder.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OcspStatus {
    /// The certificate is not revoked.
    Good,

    /// The certificate was revoked.
    Revoked {
        /// When the revocation took effect.
        revoked_at: DateTime<Utc>,
    },

    /// The responder does not know the certificate.
    Unknown,
}

/// Build the `CertID` identifying `leaf_der` as issued by `issuer_der`.
///
/// Hashes are SHA-1 over the issuer's encoded subject name and over the bits
/// of the issuer's public key.
pub fn cert_id(leaf_der: &[u8], issuer_der: &[u8]) -> Result<CertId, OcspError> {
    let leaf = parse(leaf_der)?;
    let issuer = parse(issuer_der)?;

    let raw_serial = leaf.raw_serial();
    let mut serial_tlv = der_header(0x02, raw_serial.len());
    serial_tlv.extend_from_slice(raw_serial);

    debug!("OCSP CertID for serial {}", hex::encode(raw_serial));

    let serial_number = Mode::Der
        .decode(serial_tlv.as_slice(), Integer::take_from)
        .map_err(|_| OcspError::InvalidCertificate)?;

    Ok(CertId {
        hash_algorithm: Oid(Bytes::from_static(OID_SHA1.0)),
        issuer_name_hash: Bytes::from(sha1(issuer.subject().as_raw())),
        issuer_key_hash: Bytes::from(sha1(&issuer.public_key().subject_public_key.data)),
        serial_number,
    })
}

/// Create a DER-encoded OCSP request for `leaf_der`.
pub fn create_ocsp_request(leaf_der: &[u8], issuer_der: &[u8]) -> Result<Vec<u8>, OcspError> {
    let request = OcspRequest {
        cert_id: cert_id(leaf_der, issuer_der)?,
    };

    request
        .to_der()
        .map_err(|e| OcspError::Malformed(e.to_string()))
}

/// Check a DER-encoded OCSP response and return the status it reports for
/// `leaf_der`.
pub fn check_ocsp_response(
    response_der: &[u8],
    leaf_der: &[u8],
    issuer_der: &[u8],
) -> Result<OcspStatus, OcspError> {
    let response =
        OcspResponse::decode_der(response_der).map_err(|e| OcspError::Malformed(e.to_string()))?;

    if response.status != OcspResponseStatus::Successful {
        return Err(OcspError::ResponderStatus(response.status));
    }

    let Some((response_type, response_bytes)) = response.response_bytes else {
        return Err(OcspError::Malformed("missing response bytes".to_string()));
    };

    if response_type != OID_PKIX_OCSP_BASIC {
        return Err(OcspError::UnsupportedResponseType);
    }

    let basic = BasicOcspResponse::decode_der(&response_bytes)
        .map_err(|e| OcspError::Malformed(e.to_string()))?;

    verify_response_signature(&basic, issuer_der)?;

    let expected = cert_id(leaf_der, issuer_der)?;

    let Some(single) = basic
        .tbs_response_data
        .responses
        .iter()
        .find(|single| single.cert_id == expected)
    else {
        return Err(OcspError::CertIdMismatch);
    };

    debug!(
        "OCSP status {:?} (this update {}, produced at {})",
        single.cert_status, single.this_update, basic.tbs_response_data.produced_at
    );

    Ok(match &single.cert_status {
        CertStatus::Good => OcspStatus::Good,
        CertStatus::Revoked {
            revocation_time, ..
        } => OcspStatus::Revoked {
            revoked_at: *revocation_time,
        },
        CertStatus::Unknown => OcspStatus::Unknown,
    })
}

fn verify_response_signature(basic: &BasicOcspResponse, issuer_der: &[u8]) -> Result<(), OcspError> {
    let Some(validator) = validator_for_signature_alg(basic.signature_algorithm.algorithm.as_ref())
    else {
        return Err(OcspError::UnsupportedAlgorithm);
    };

    let tbs: &[u8] = &basic.tbs_raw;
    let responder_id = &basic.tbs_response_data.responder_id;
    let issuer = parse(issuer_der)?;

    if responder_matches(responder_id, &issuer)
        && validator
            .validate(&basic.signature, tbs, issuer.public_key().raw)
            .is_ok()
    {
        return Ok(());
    }

    // One of the embedded certificates may be a delegated responder.
    for cert_der in &basic.certs {
        let Ok(cert) = parse(cert_der) else {
            continue;
        };

        let ocsp_signing = matches!(cert.extended_key_usage(), Ok(Some(eku)) if eku.value.ocsp_signing);

        if !ocsp_signing
            || !responder_matches(responder_id, &cert)
            || !certificate_signed_by(&cert, &issuer)
        {
            continue;
        }

        if validator
            .validate(&basic.signature, tbs, cert.public_key().raw)
            .is_ok()
        {
            return Ok(());
        }
    }

    Err(OcspError::UntrustedResponder)
}

fn responder_matches(responder_id: &ResponderId, cert: &X509Certificate<'_>) -> bool {
    match responder_id {
        ResponderId::ByName(name) => {
            let name: &[u8] = name;
            name == cert.subject().as_raw()
        }
        ResponderId::ByKey(key_hash) => {
            key_hash.as_ref() == sha1(&cert.public_key().subject_public_key.data).as_slice()
        }
    }
}

fn parse(der: &[u8]) -> Result<X509Certificate<'_>, OcspError> {
    let (_rem, cert) = X509Certificate::from_der(der).map_err(|_| OcspError::InvalidCertificate)?;
    Ok(cert)
}

/// Describes errors that can be identified when requesting or checking an
/// OCSP response.
#[derive(Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum OcspError {
    /// A certificate could not be parsed.
    #[error("invalid certificate detected")]
    InvalidCertificate,

    /// The response could not be decoded.
    #[error("malformed OCSP response: {0}")]
    Malformed(String),

    /// The responder did not process the request.
    #[error("OCSP responder returned status {0:?}")]
    ResponderStatus(OcspResponseStatus),

    /// The response is not a basic OCSP response.
    #[error("unsupported OCSP response type")]
    UnsupportedResponseType,

    /// The response is signed with an unsupported algorithm.
    #[error("unsupported OCSP signature algorithm")]
    UnsupportedAlgorithm,

    /// The response is not signed by the issuer or a responder it delegated
    /// to.
    #[error("OCSP response is not signed by an authorized responder")]
    UntrustedResponder,

    /// The response carries no status for the requested certificate.
    #[error("OCSP response does not cover the certificate")]
    CertIdMismatch,

    /// The certificate names no OCSP responder and none was configured.
    #[error("no OCSP responder available for the certificate")]
    NoResponder,

    /// The request could not be delivered or the reply not read.
    #[error("OCSP transport error: {0}")]
    Transport(String),
}
