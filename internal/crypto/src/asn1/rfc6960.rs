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

//! ASN.1 types defined by [RFC 6960] (Online Certificate Status Protocol).
//!
//! Requests are built for a single certificate. Responses are decoded far
//! enough to identify the signer, check the signature and read the status
//! of each certificate.
//!
//! [RFC 6960]: https://datatracker.ietf.org/doc/html/rfc6960

use std::{convert::Infallible, io};

use bcder::{
    decode::{Constructed, DecodeError, Source},
    encode::{self, PrimitiveContent, Values},
    BitString, Captured, ConstOid, Integer, Mode, OctetString, Oid, Tag,
};
use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, Utc};

use super::{rfc5652::AlgorithmIdentifier, skip_remaining};

/// SHA-1, the hash algorithm used for `CertID` values.
pub const OID_SHA1: ConstOid = Oid(&[43, 14, 3, 2, 26]);

/// `id-pkix-ocsp-basic`, the only response type understood.
pub const OID_PKIX_OCSP_BASIC: ConstOid = Oid(&[43, 6, 1, 5, 5, 7, 48, 1, 1]);

/// Identifies a certificate by issuer and serial number.
///
/// ```ASN.1
/// CertID ::= SEQUENCE {
///   hashAlgorithm AlgorithmIdentifier,
///   issuerNameHash OCTET STRING,
///   issuerKeyHash OCTET STRING,
///   serialNumber CertificateSerialNumber }
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CertId {
    /// Hash algorithm of the two hashes below.
    pub hash_algorithm: Oid,

    /// Hash of the issuer's distinguished name.
    pub issuer_name_hash: Bytes,

    /// Hash of the issuer's public key (the `subjectPublicKey` bits).
    pub issuer_key_hash: Bytes,

    /// Serial number of the certificate being checked.
    pub serial_number: Integer,
}

impl CertId {
    /// Take a `CertID` sequence.
    pub fn take_from<S: Source>(cons: &mut Constructed<S>) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let hash_algorithm = AlgorithmIdentifier::take_from(cons)?.algorithm;
            let issuer_name_hash = OctetString::take_from(cons)?.into_bytes();
            let issuer_key_hash = OctetString::take_from(cons)?.into_bytes();
            let serial_number = Integer::take_from(cons)?;

            Ok(Self {
                hash_algorithm,
                issuer_name_hash,
                issuer_key_hash,
                serial_number,
            })
        })
    }

    /// Encode this `CertID`. The hash algorithm carries explicit NULL
    /// parameters, which many responders expect.
    pub fn encode_ref(&self) -> impl Values + '_ {
        encode::sequence((
            encode::sequence((self.hash_algorithm.encode_ref(), ().encode())),
            OctetString::encode_slice(self.issuer_name_hash.as_ref()),
            OctetString::encode_slice(self.issuer_key_hash.as_ref()),
            (&self.serial_number).encode(),
        ))
    }
}

/// An OCSP request for a single certificate, unsigned and without
/// extensions.
///
/// ```ASN.1
/// OCSPRequest ::= SEQUENCE {
///   tbsRequest TBSRequest,
///   optionalSignature [0] EXPLICIT Signature OPTIONAL }
///
/// TBSRequest ::= SEQUENCE {
///   version [0] EXPLICIT Version DEFAULT v1,
///   requestorName [1] EXPLICIT GeneralName OPTIONAL,
///   requestList SEQUENCE OF Request,
///   requestExtensions [2] EXPLICIT Extensions OPTIONAL }
///
/// Request ::= SEQUENCE {
///   reqCert CertID,
///   singleRequestExtensions [0] EXPLICIT Extensions OPTIONAL }
/// ```
#[derive(Clone, Debug)]
pub struct OcspRequest {
    /// The certificate being asked about.
    pub cert_id: CertId,
}

impl OcspRequest {
    /// Encode the request.
    pub fn encode_ref(&self) -> impl Values + '_ {
        encode::sequence(encode::sequence(encode::sequence(encode::sequence(
            self.cert_id.encode_ref(),
        ))))
    }

    /// Encode the request as DER.
    pub fn to_der(&self) -> Result<Vec<u8>, io::Error> {
        let mut out = Vec::new();
        self.encode_ref().write_encoded(Mode::Der, &mut out)?;
        Ok(out)
    }
}

/// Status of an OCSP response as a whole.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OcspResponseStatus {
    /// Response has valid confirmations.
    Successful,

    /// Illegal confirmation request.
    MalformedRequest,

    /// Internal error in issuer.
    InternalError,

    /// Try again later.
    TryLater,

    /// Must sign the request.
    SigRequired,

    /// Request unauthorized.
    Unauthorized,
}

impl OcspResponseStatus {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Successful),
            1 => Some(Self::MalformedRequest),
            2 => Some(Self::InternalError),
            3 => Some(Self::TryLater),
            5 => Some(Self::SigRequired),
            6 => Some(Self::Unauthorized),
            _ => None,
        }
    }
}

/// The outer OCSP response.
///
/// ```ASN.1
/// OCSPResponse ::= SEQUENCE {
///   responseStatus OCSPResponseStatus,
///   responseBytes [0] EXPLICIT ResponseBytes OPTIONAL }
///
/// ResponseBytes ::= SEQUENCE {
///   responseType OBJECT IDENTIFIER,
///   response OCTET STRING }
/// ```
#[derive(Clone, Debug)]
pub struct OcspResponse {
    /// Processing status reported by the responder.
    pub status: OcspResponseStatus,

    /// Type and encoding of the response body, if any.
    pub response_bytes: Option<(Oid, Bytes)>,
}

impl OcspResponse {
    /// Decode a DER-encoded `OCSPResponse`.
    pub fn decode_der(data: &[u8]) -> Result<Self, DecodeError<Infallible>> {
        Constructed::decode(data, Mode::Der, |cons| Self::take_from(cons))
    }

    /// Take an `OCSPResponse` sequence.
    pub fn take_from<S: Source>(cons: &mut Constructed<S>) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let status = cons.take_primitive_if(Tag::ENUMERATED, |prim| prim.to_u8())?;
            let status = OcspResponseStatus::from_u8(status)
                .ok_or_else(|| cons.content_err("invalid OCSP response status"))?;

            let response_bytes = cons.take_opt_constructed_if(Tag::CTX_0, |cons| {
                cons.take_sequence(|cons| {
                    let response_type = Oid::take_from(cons)?;
                    let response = OctetString::take_from(cons)?.into_bytes();
                    Ok((response_type, response))
                })
            })?;

            Ok(Self {
                status,
                response_bytes,
            })
        })
    }
}

/// A basic OCSP response.
///
/// ```ASN.1
/// BasicOCSPResponse ::= SEQUENCE {
///   tbsResponseData ResponseData,
///   signatureAlgorithm AlgorithmIdentifier,
///   signature BIT STRING,
///   certs [0] EXPLICIT SEQUENCE OF Certificate OPTIONAL }
/// ```
#[derive(Clone, Debug)]
pub struct BasicOcspResponse {
    /// The signed response data.
    pub tbs_response_data: ResponseData,

    /// Encoding of `tbsResponseData`, as covered by the signature.
    pub tbs_raw: Captured,

    /// Algorithm of `signature`.
    pub signature_algorithm: AlgorithmIdentifier,

    /// Signature over `tbs_raw`.
    pub signature: Bytes,

    /// Certificates supplied to help verify the signature.
    pub certs: Vec<Bytes>,
}

impl BasicOcspResponse {
    /// Decode a DER-encoded `BasicOCSPResponse`.
    pub fn decode_der(data: &[u8]) -> Result<Self, DecodeError<Infallible>> {
        Constructed::decode(data, Mode::Der, |cons| Self::take_from(cons))
    }

    /// Take a `BasicOCSPResponse` sequence.
    pub fn take_from<S: Source>(cons: &mut Constructed<S>) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let tbs_raw = cons.capture_one()?;
            let tbs_response_data = tbs_raw
                .clone()
                .decode(|cons| ResponseData::take_from(cons))
                .map_err(DecodeError::convert)?;

            let signature_algorithm = AlgorithmIdentifier::take_from(cons)?;
            let signature = BitString::take_from(cons)?.octet_bytes();

            let certs = cons
                .take_opt_constructed_if(Tag::CTX_0, |cons| {
                    cons.take_sequence(|cons| {
                        let mut certs = Vec::new();
                        loop {
                            let cert = cons.capture(|cons| {
                                cons.take_opt_sequence(|cons| skip_remaining(cons))
                                    .map(|_| ())
                            })?;
                            if cert.is_empty() {
                                break;
                            }
                            certs.push(cert.into_bytes());
                        }
                        Ok(certs)
                    })
                })?
                .unwrap_or_default();

            Ok(Self {
                tbs_response_data,
                tbs_raw,
                signature_algorithm,
                signature,
                certs,
            })
        })
    }
}

/// Response data.
///
/// ```ASN.1
/// ResponseData ::= SEQUENCE {
///   version [0] EXPLICIT Version DEFAULT v1,
///   responderID ResponderID,
///   producedAt GeneralizedTime,
///   responses SEQUENCE OF SingleResponse,
///   responseExtensions [1] EXPLICIT Extensions OPTIONAL }
/// ```
#[derive(Clone, Debug)]
pub struct ResponseData {
    /// Version, 0 for v1.
    pub version: u8,

    /// Identifies the key that signed the response.
    pub responder_id: ResponderId,

    /// When the response was signed.
    pub produced_at: DateTime<Utc>,

    /// One status per requested certificate.
    pub responses: Vec<SingleResponse>,
}

impl ResponseData {
    /// Take a `ResponseData` sequence.
    pub fn take_from<S: Source>(cons: &mut Constructed<S>) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let version = cons
                .take_opt_constructed_if(Tag::CTX_0, |cons| cons.take_u8())?
                .unwrap_or(0);
            let responder_id = ResponderId::take_from(cons)?;
            let produced_at = take_generalized_time(cons)?;

            let responses = cons.take_sequence(|cons| {
                let mut responses = Vec::new();
                while let Some(response) = SingleResponse::take_opt_from(cons)? {
                    responses.push(response);
                }
                Ok(responses)
            })?;

            cons.take_opt_constructed_if(Tag::CTX_1, |cons| skip_remaining(cons))?;

            Ok(Self {
                version,
                responder_id,
                produced_at,
                responses,
            })
        })
    }
}

/// Identifies an OCSP responder.
///
/// ```ASN.1
/// ResponderID ::= CHOICE {
///   byName [1] Name,
///   byKey  [2] KeyHash }
/// ```
#[derive(Clone, Debug)]
pub enum ResponderId {
    /// Subject name of the responder certificate, as encoded.
    ByName(Captured),

    /// SHA-1 hash of the responder's public key.
    ByKey(Bytes),
}

impl ResponderId {
    /// Take a responder identifier in either form.
    pub fn take_from<S: Source>(cons: &mut Constructed<S>) -> Result<Self, DecodeError<S::Error>> {
        if let Some(name) = cons.take_opt_constructed_if(Tag::CTX_1, |cons| cons.capture_one())? {
            return Ok(Self::ByName(name));
        }

        let key = cons.take_constructed_if(Tag::CTX_2, OctetString::take_from)?;
        Ok(Self::ByKey(key.into_bytes()))
    }
}

/// Status of one certificate.
///
/// ```ASN.1
/// SingleResponse ::= SEQUENCE {
///   certID CertID,
///   certStatus CertStatus,
///   thisUpdate GeneralizedTime,
///   nextUpdate [0] EXPLICIT GeneralizedTime OPTIONAL,
///   singleExtensions [1] EXPLICIT Extensions OPTIONAL }
/// ```
#[derive(Clone, Debug)]
pub struct SingleResponse {
    /// The certificate this status applies to.
    pub cert_id: CertId,

    /// The status.
    pub cert_status: CertStatus,

    /// Time at which the status was known to be correct.
    pub this_update: DateTime<Utc>,

    /// Time at or before which newer information will be available.
    pub next_update: Option<DateTime<Utc>>,
}

impl SingleResponse {
    /// Take an optional `SingleResponse`.
    pub fn take_opt_from<S: Source>(
        cons: &mut Constructed<S>,
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        cons.take_opt_sequence(|cons| {
            let cert_id = CertId::take_from(cons)?;
            let cert_status = CertStatus::take_from(cons)?;
            let this_update = take_generalized_time(cons)?;
            let next_update = cons.take_opt_constructed_if(Tag::CTX_0, take_generalized_time)?;
            cons.take_opt_constructed_if(Tag::CTX_1, |cons| skip_remaining(cons))?;

            Ok(Self {
                cert_id,
                cert_status,
                this_update,
                next_update,
            })
        })
    }
}

/// Revocation status.
///
/// ```ASN.1
/// CertStatus ::= CHOICE {
///   good    [0] IMPLICIT NULL,
///   revoked [1] IMPLICIT RevokedInfo,
///   unknown [2] IMPLICIT UnknownInfo }
///
/// RevokedInfo ::= SEQUENCE {
///   revocationTime GeneralizedTime,
///   revocationReason [0] EXPLICIT CRLReason OPTIONAL }
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CertStatus {
    /// Not revoked.
    Good,

    /// Revoked at the given time.
    Revoked {
        /// When the certificate was revoked.
        revocation_time: DateTime<Utc>,

        /// `CRLReason` code, if given.
        reason: Option<u8>,
    },

    /// The responder does not know the certificate.
    Unknown,
}

impl CertStatus {
    /// Take a `CertStatus` choice.
    pub fn take_from<S: Source>(cons: &mut Constructed<S>) -> Result<Self, DecodeError<S::Error>> {
        cons.take_value(|tag, content| {
            if tag == Tag::CTX_0 {
                content.to_null()?;
                Ok(Self::Good)
            } else if tag == Tag::CTX_1 {
                let cons = content.as_constructed()?;
                let revocation_time = take_generalized_time(cons)?;
                let reason = cons.take_opt_constructed_if(Tag::CTX_0, |cons| {
                    cons.take_primitive_if(Tag::ENUMERATED, |prim| prim.to_u8())
                })?;

                Ok(Self::Revoked {
                    revocation_time,
                    reason,
                })
            } else if tag == Tag::CTX_2 {
                content.to_null()?;
                Ok(Self::Unknown)
            } else {
                Err(content.content_err("invalid certificate status"))
            }
        })
    }
}

fn take_generalized_time<S: Source>(
    cons: &mut Constructed<S>,
) -> Result<DateTime<Utc>, DecodeError<S::Error>> {
    cons.take_primitive_if(Tag::GENERALIZED_TIME, |prim| {
        let raw = prim.take_all()?;

        let parsed = std::str::from_utf8(&raw).ok().and_then(|text| {
            let format = if text.contains('.') {
                "%Y%m%d%H%M%S%.fZ"
            } else {
                "%Y%m%d%H%M%SZ"
            };
            NaiveDateTime::parse_from_str(text, format).ok()
        });

        match parsed {
            Some(time) => Ok(time.and_utc()),
            None => Err(prim.content_err("invalid GeneralizedTime")),
        }
    })
}
