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

//! ASN.1 types defined by [RFC 5652] (Cryptographic Message Syntax).
//!
//! Receipts are a `ContentInfo` wrapping `SignedData` whose encapsulated
//! content is the receipt payload. Only the parts of the syntax that a
//! receipt can contain are modelled.
//!
//! [RFC 5652]: https://datatracker.ietf.org/doc/html/rfc5652

use std::convert::Infallible;

use bcder::{
    decode::{Constructed, DecodeError, Source},
    Captured, ConstOid, Integer, Mode, OctetString, Oid, Tag,
};
use bytes::Bytes;
use x509_parser::{certificate::X509Certificate, prelude::FromDer};

use super::{der_header, skip_remaining};

/// The signed-data content type.
///
/// ```ASN.1
/// id-signedData OBJECT IDENTIFIER ::= { iso(1) member-body(2)
///   us(840) rsadsi(113549) pkcs(1) pkcs7(7) 2 }
/// ```
pub const OID_ID_SIGNED_DATA: ConstOid = Oid(&[42, 134, 72, 134, 247, 13, 1, 7, 2]);

/// The arbitrary-data content type.
pub const OID_ID_DATA: ConstOid = Oid(&[42, 134, 72, 134, 247, 13, 1, 7, 1]);

/// The `contentType` signed attribute.
pub const OID_CONTENT_TYPE: ConstOid = Oid(&[42, 134, 72, 134, 247, 13, 1, 9, 3]);

/// The `messageDigest` signed attribute.
pub const OID_MESSAGE_DIGEST: ConstOid = Oid(&[42, 134, 72, 134, 247, 13, 1, 9, 4]);

/// Content info.
///
/// ```ASN.1
/// ContentInfo ::= SEQUENCE {
///   contentType ContentType,
///   content [0] EXPLICIT ANY DEFINED BY contentType }
/// ```
#[derive(Clone, Debug)]
pub struct ContentInfo<D> {
    /// Type of the wrapped content.
    pub content_type: Oid,

    /// The wrapped content.
    pub content: D,
}

impl ContentInfo<SignedData> {
    /// Decode a signed-data `ContentInfo` from BER. DER input is accepted as
    /// well since it is a subset of BER.
    pub fn decode_ber(data: &[u8]) -> Result<Self, DecodeError<Infallible>> {
        Constructed::decode(data, Mode::Ber, |cons| Self::take_from(cons))
    }

    /// Take a signed-data `ContentInfo` from a constructed value.
    ///
    /// Any content type other than `id-signedData` is rejected.
    pub fn take_from<S: Source>(cons: &mut Constructed<S>) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let content_type = Oid::take_from(cons)?;
            if content_type != OID_ID_SIGNED_DATA {
                return Err(cons.content_err("content type is not id-signedData"));
            }

            let content = cons.take_constructed_if(Tag::CTX_0, SignedData::take_from)?;

            Ok(Self {
                content_type,
                content,
            })
        })
    }
}

/// Signed data.
///
/// ```ASN.1
/// SignedData ::= SEQUENCE {
///   version CMSVersion,
///   digestAlgorithms DigestAlgorithmIdentifiers,
///   encapContentInfo EncapsulatedContentInfo,
///   certificates [0] IMPLICIT CertificateSet OPTIONAL,
///   crls [1] IMPLICIT RevocationInfoChoices OPTIONAL,
///   signerInfos SignerInfos }
/// ```
#[derive(Clone, Debug)]
pub struct SignedData {
    /// CMS version.
    pub version: u8,

    /// Digest algorithms announced by the signers.
    pub digest_algorithms: Vec<AlgorithmIdentifier>,

    /// The signed content.
    pub encap_content_info: EncapsulatedContentInfo,

    /// Raw encoding of each certificate, in the order they appear. Each one
    /// has been parsed as an X.509 certificate.
    pub certificates: Vec<Bytes>,

    /// Signer records.
    pub signer_infos: Vec<SignerInfo>,
}

impl SignedData {
    /// Take `SignedData` from the content of the `[0]` wrapper.
    pub fn take_from<S: Source>(cons: &mut Constructed<S>) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let version = cons.take_u8()?;

            let digest_algorithms = cons.take_set(|cons| {
                let mut algs = Vec::new();
                while let Some(alg) = AlgorithmIdentifier::take_opt_from(cons)? {
                    algs.push(alg);
                }
                Ok(algs)
            })?;

            let encap_content_info = EncapsulatedContentInfo::take_from(cons)?;

            let certificates = cons
                .take_opt_constructed_if(Tag::CTX_0, |cons| {
                    let mut certs = Vec::new();
                    loop {
                        let cert = cons.capture(|cons| {
                            cons.take_opt_sequence(|cons| skip_remaining(cons))
                                .map(|_| ())
                        })?;

                        if cert.is_empty() {
                            break;
                        }

                        match X509Certificate::from_der(cert.as_slice()) {
                            Ok((rem, _)) if rem.is_empty() => {}
                            _ => return Err(cons.content_err("invalid certificate")),
                        }

                        certs.push(cert.into_bytes());
                    }
                    Ok(certs)
                })?
                .unwrap_or_default();

            // CRLs are never consulted.
            cons.take_opt_constructed_if(Tag::CTX_1, |cons| skip_remaining(cons))?;

            let signer_infos = cons.take_set(|cons| {
                let mut infos = Vec::new();
                while let Some(info) = SignerInfo::take_opt_from(cons)? {
                    infos.push(info);
                }
                Ok(infos)
            })?;

            Ok(Self {
                version,
                digest_algorithms,
                encap_content_info,
                certificates,
                signer_infos,
            })
        })
    }
}

/// Encapsulated content.
///
/// ```ASN.1
/// EncapsulatedContentInfo ::= SEQUENCE {
///   eContentType ContentType,
///   eContent [0] EXPLICIT OCTET STRING OPTIONAL }
/// ```
#[derive(Clone, Debug)]
pub struct EncapsulatedContentInfo {
    /// Type of the encapsulated content.
    pub content_type: Oid,

    /// The content. A constructed (segmented) OCTET STRING is accepted.
    pub content: Option<OctetString>,
}

impl EncapsulatedContentInfo {
    /// Take an `EncapsulatedContentInfo` sequence.
    pub fn take_from<S: Source>(cons: &mut Constructed<S>) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let content_type = Oid::take_from(cons)?;
            let content = cons.take_opt_constructed_if(Tag::CTX_0, OctetString::take_from)?;

            Ok(Self {
                content_type,
                content,
            })
        })
    }

    /// The concatenated content octets, if any content is present.
    pub fn content_bytes(&self) -> Option<Bytes> {
        self.content.as_ref().map(OctetString::to_bytes)
    }
}

/// Per-signer information.
///
/// ```ASN.1
/// SignerInfo ::= SEQUENCE {
///   version CMSVersion,
///   sid SignerIdentifier,
///   digestAlgorithm DigestAlgorithmIdentifier,
///   signedAttrs [0] IMPLICIT SignedAttributes OPTIONAL,
///   signatureAlgorithm SignatureAlgorithmIdentifier,
///   signature SignatureValue,
///   unsignedAttrs [1] IMPLICIT UnsignedAttributes OPTIONAL }
/// ```
///
/// Version 1 requires an issuer and serial number identifier and version 3
/// requires a subject key identifier. Any other pairing fails to decode.
#[derive(Clone, Debug)]
pub struct SignerInfo {
    /// CMS version of this record.
    pub version: u8,

    /// Identifies the signing certificate.
    pub sid: SignerIdentifier,

    /// Digest algorithm used for the content and signed attributes.
    pub digest_algorithm: AlgorithmIdentifier,

    /// Signed attributes, re-decoded as DER.
    pub signed_attributes: Option<SignedAttributes>,

    /// Signature algorithm.
    pub signature_algorithm: AlgorithmIdentifier,

    /// Raw signature value.
    pub signature: Bytes,

    /// Unsigned attributes, kept undecoded.
    pub unsigned_attributes: Option<Captured>,
}

impl SignerInfo {
    /// Take an optional `SignerInfo` from a `SET OF SignerInfo`.
    pub fn take_opt_from<S: Source>(
        cons: &mut Constructed<S>,
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        cons.take_opt_sequence(|cons| Self::from_sequence(cons))
    }

    fn from_sequence<S: Source>(cons: &mut Constructed<S>) -> Result<Self, DecodeError<S::Error>> {
        let version = cons.take_u8()?;
        let sid = SignerIdentifier::take_from(cons)?;

        match (version, &sid) {
            (1, SignerIdentifier::IssuerAndSerialNumber(_))
            | (3, SignerIdentifier::SubjectKeyIdentifier(_)) => {}
            _ => {
                return Err(cons.content_err("signer version does not match signer identifier"));
            }
        }

        let digest_algorithm = AlgorithmIdentifier::take_from(cons)?;

        let signed_attributes = match cons
            .take_opt_constructed_if(Tag::CTX_0, |cons| cons.capture(|cons| skip_remaining(cons)))?
        {
            Some(raw) => {
                Some(SignedAttributes::decode_der(raw.into_bytes()).map_err(DecodeError::convert)?)
            }
            None => None,
        };

        let signature_algorithm = AlgorithmIdentifier::take_from(cons)?;
        let signature = OctetString::take_from(cons)?.into_bytes();

        let unsigned_attributes = cons
            .take_opt_constructed_if(Tag::CTX_1, |cons| cons.capture(|cons| skip_remaining(cons)))?;

        Ok(Self {
            version,
            sid,
            digest_algorithm,
            signed_attributes,
            signature_algorithm,
            signature,
            unsigned_attributes,
        })
    }
}

/// Identifies the certificate of a signer.
///
/// ```ASN.1
/// SignerIdentifier ::= CHOICE {
///   issuerAndSerialNumber IssuerAndSerialNumber,
///   subjectKeyIdentifier [0] SubjectKeyIdentifier }
/// ```
#[derive(Clone, Debug)]
pub enum SignerIdentifier {
    /// Issuer name and serial number of the signing certificate.
    IssuerAndSerialNumber(IssuerAndSerialNumber),

    /// Subject key identifier of the signing certificate.
    SubjectKeyIdentifier(Bytes),
}

impl SignerIdentifier {
    /// Take a signer identifier in either of its two forms.
    pub fn take_from<S: Source>(cons: &mut Constructed<S>) -> Result<Self, DecodeError<S::Error>> {
        if let Some(ias) = cons.take_opt_sequence(|cons| {
            let issuer = cons.capture_one()?;
            let serial_number = Integer::take_from(cons)?;

            Ok(IssuerAndSerialNumber {
                issuer,
                serial_number,
            })
        })? {
            return Ok(Self::IssuerAndSerialNumber(ias));
        }

        match cons.take_opt_value_if(Tag::CTX_0, OctetString::from_content)? {
            Some(ski) => Ok(Self::SubjectKeyIdentifier(ski.into_bytes())),
            None => Err(cons.content_err("missing signer identifier")),
        }
    }
}

/// Issuer and serial number.
#[derive(Clone, Debug)]
pub struct IssuerAndSerialNumber {
    /// Issuer `Name`, as encoded in the receipt.
    pub issuer: Captured,

    /// Certificate serial number.
    pub serial_number: Integer,
}

/// Algorithm identifier.
///
/// ```ASN.1
/// AlgorithmIdentifier ::= SEQUENCE {
///   algorithm OBJECT IDENTIFIER,
///   parameters ANY DEFINED BY algorithm OPTIONAL }
/// ```
#[derive(Clone, Debug)]
pub struct AlgorithmIdentifier {
    /// The algorithm OID.
    pub algorithm: Oid,

    /// Parameters, kept as encoded.
    pub parameters: Option<Captured>,
}

impl AlgorithmIdentifier {
    /// Take a mandatory algorithm identifier.
    pub fn take_from<S: Source>(cons: &mut Constructed<S>) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| Self::from_sequence(cons))
    }

    /// Take an optional algorithm identifier.
    pub fn take_opt_from<S: Source>(
        cons: &mut Constructed<S>,
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        cons.take_opt_sequence(|cons| Self::from_sequence(cons))
    }

    fn from_sequence<S: Source>(cons: &mut Constructed<S>) -> Result<Self, DecodeError<S::Error>> {
        let algorithm = Oid::take_from(cons)?;
        let parameters = cons.capture(|cons| skip_remaining(cons))?;

        Ok(Self {
            algorithm,
            parameters: (!parameters.is_empty()).then_some(parameters),
        })
    }
}

/// Signed attributes of a `SignerInfo`.
///
/// The content octets are retained exactly as received. The signature over
/// signed attributes is computed on their `SET OF` form, which is obtained by
/// prefixing those octets with a DER `SET` header; nothing is re-serialized.
#[derive(Clone, Debug)]
pub struct SignedAttributes {
    raw: Bytes,
    attributes: Vec<Attribute>,
}

impl SignedAttributes {
    /// Decode the content of the `[0] IMPLICIT` block as DER.
    pub fn decode_der(raw: Bytes) -> Result<Self, DecodeError<Infallible>> {
        let attributes = Constructed::decode(raw.clone(), Mode::Der, |cons| {
            let mut attributes = Vec::new();
            while let Some(attr) = Attribute::take_opt_from(cons)? {
                attributes.push(attr);
            }
            Ok(attributes)
        })?;

        Ok(Self { raw, attributes })
    }

    /// All decoded attributes, in encoded order.
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Find the first attribute of the given type.
    pub fn find(&self, typ: &ConstOid) -> Option<&Attribute> {
        self.attributes.iter().find(|attr| attr.typ == *typ)
    }

    /// The value of the `messageDigest` attribute.
    pub fn message_digest(&self) -> Option<Bytes> {
        let value = self.find(&OID_MESSAGE_DIGEST)?.values.first()?.clone();
        value
            .decode(|cons| OctetString::take_from(cons))
            .ok()
            .map(OctetString::into_bytes)
    }

    /// The value of the `contentType` attribute.
    pub fn content_type(&self) -> Option<Oid> {
        let value = self.find(&OID_CONTENT_TYPE)?.values.first()?.clone();
        value.decode(|cons| Oid::take_from(cons)).ok()
    }

    /// The DER `SET OF Attribute` encoding that the signature covers.
    pub fn to_der_set(&self) -> Vec<u8> {
        let mut out = der_header(0x31, self.raw.len());
        out.extend_from_slice(&self.raw);
        out
    }
}

/// A CMS attribute.
///
/// ```ASN.1
/// Attribute ::= SEQUENCE {
///   attrType OBJECT IDENTIFIER,
///   attrValues SET OF AttributeValue }
/// ```
#[derive(Clone, Debug)]
pub struct Attribute {
    /// Attribute type.
    pub typ: Oid,

    /// Each value, as encoded.
    pub values: Vec<Captured>,
}

impl Attribute {
    /// Take an optional attribute.
    pub fn take_opt_from<S: Source>(
        cons: &mut Constructed<S>,
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        cons.take_opt_sequence(|cons| {
            let typ = Oid::take_from(cons)?;

            let values = cons.take_set(|cons| {
                let mut values = Vec::new();
                loop {
                    let value =
                        cons.capture(|cons| cons.skip_opt(|_, _, _| Ok(())).map(|_| ()))?;
                    if value.is_empty() {
                        break;
                    }
                    values.push(value);
                }
                Ok(values)
            })?;

            Ok(Self { typ, values })
        })
    }
}
