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

//! Decoding of App Store receipts.
//!
//! A receipt is a CMS `ContentInfo` wrapping `SignedData`. The signed content
//! is a set of receipt attributes ([`ReceiptPayload`]), one of which repeats
//! once per in-app purchase ([`InAppPurchase`]).

use std::path::Path;

use app_receipt_crypto::{
    asn1::rfc5652::{ContentInfo, SignedData, SignerInfo},
    base64,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use log::debug;
use serde::{ser::SerializeStruct, Serialize, Serializer};
use x509_parser::prelude::*;

use crate::{Error, Result};

mod attribute;

mod payload;
pub use payload::{Environment, ReceiptPayload};

mod purchase;
pub use purchase::{InAppPurchase, ProductType};

mod queries;

/// A decoded App Store receipt.
///
/// Decoding only checks structure. Use a
/// [`ReceiptValidator`](crate::ReceiptValidator) to establish that the
/// receipt is authentic before trusting its contents.
#[derive(Clone, Debug)]
pub struct Receipt {
    content_info: ContentInfo<SignedData>,
    pub(crate) payload: ReceiptPayload,
    certificate_details: Vec<ReceiptCertificate>,
    raw: Bytes,
}

impl Receipt {
    /// Decode a receipt from its DER or BER encoding.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let content_info =
            ContentInfo::decode_ber(data).map_err(|e| Error::DecodingFailed(e.to_string()))?;

        let payload_bytes = content_info
            .content
            .encap_content_info
            .content_bytes()
            .ok_or(Error::PayloadMissingOrInvalid)?;

        let payload = ReceiptPayload::decode(payload_bytes)?;

        let certificate_details = content_info
            .content
            .certificates
            .iter()
            .map(|der| ReceiptCertificate::from_der(der))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "decoded receipt for {} with {} purchases and {} certificates",
            payload.bundle_identifier,
            payload.purchases.len(),
            content_info.content.certificates.len()
        );

        Ok(Self {
            content_info,
            payload,
            certificate_details,
            raw: Bytes::copy_from_slice(data),
        })
    }

    /// Decode a base64 encoded receipt. Line breaks are ignored.
    pub fn from_base64(data: &str) -> Result<Self> {
        let der = base64::decode(data).map_err(|e| Error::ContentInvalid(e.to_string()))?;
        Self::from_bytes(&der)
    }

    /// Read and decode a receipt file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path.as_ref()).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound,
            _ => Error::Io(e),
        })?;
        Self::from_bytes(&data)
    }

    /// The outer CMS structure.
    pub fn content_info(&self) -> &ContentInfo<SignedData> {
        &self.content_info
    }

    /// The CMS `SignedData`.
    pub fn signed_data(&self) -> &SignedData {
        &self.content_info.content
    }

    /// The first signer record, if any.
    pub fn signer_info(&self) -> Option<&SignerInfo> {
        self.signed_data().signer_infos.first()
    }

    /// The decoded receipt body.
    pub fn payload(&self) -> &ReceiptPayload {
        &self.payload
    }

    /// Raw DER of each embedded certificate, in the order they appear. The
    /// first is the receipt signing certificate.
    pub fn certificates(&self) -> &[Bytes] {
        &self.signed_data().certificates
    }

    /// Raw DER of the receipt signing certificate.
    pub fn leaf_certificate(&self) -> Option<&[u8]> {
        self.certificates().first().map(|cert| cert.as_ref())
    }

    /// Parsed summaries of the embedded certificates, in the same order as
    /// [`certificates`](Self::certificates).
    pub fn certificate_details(&self) -> &[ReceiptCertificate] {
        &self.certificate_details
    }

    /// The encoded receipt, exactly as given.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// The encoded receipt as base64.
    pub fn base64(&self) -> String {
        base64::encode(&self.raw)
    }

    /// Bundle identifier of the app.
    pub fn bundle_identifier(&self) -> &str {
        &self.payload.bundle_identifier
    }

    /// App version the receipt was issued for.
    pub fn app_version(&self) -> &str {
        &self.payload.app_version
    }

    /// Environment the receipt was issued in.
    pub fn environment(&self) -> &Environment {
        &self.payload.environment
    }

    /// When the receipt was created.
    pub fn creation_date(&self) -> DateTime<Utc> {
        self.payload.creation_date
    }
}

impl Serialize for Receipt {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let signer = self.signer_info().map(|signer| SignerSummary {
            version: signer.version,
            digest_algorithm: signer.digest_algorithm.algorithm.to_string(),
            signature_algorithm: signer.signature_algorithm.algorithm.to_string(),
            signed_attributes: signer.signed_attributes.is_some(),
        });

        let mut state = serializer.serialize_struct("Receipt", 3)?;
        state.serialize_field("payload", &self.payload)?;
        state.serialize_field("certificates", &self.certificate_details)?;
        state.serialize_field("signer", &signer)?;
        state.end()
    }
}

#[derive(Serialize)]
struct SignerSummary {
    version: u8,
    digest_algorithm: String,
    signature_algorithm: String,
    signed_attributes: bool,
}

/// Descriptive fields of an embedded certificate.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ReceiptCertificate {
    /// Subject distinguished name.
    pub subject: String,

    /// Issuer distinguished name.
    pub issuer: String,

    /// Serial number, hex encoded.
    pub serial_number: String,

    /// Start of the validity period.
    pub not_before: DateTime<Utc>,

    /// End of the validity period.
    pub not_after: DateTime<Utc>,
}

impl ReceiptCertificate {
    fn from_der(der: &[u8]) -> Result<Self> {
        let invalid = || Error::DecodingFailed("invalid certificate".to_string());

        let (_, cert) = X509Certificate::from_der(der).map_err(|_| invalid())?;
        let validity = cert.validity();

        Ok(Self {
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            serial_number: hex::encode(cert.raw_serial()),
            not_before: DateTime::from_timestamp(validity.not_before.timestamp(), 0)
                .ok_or_else(invalid)?,
            not_after: DateTime::from_timestamp(validity.not_after.timestamp(), 0)
                .ok_or_else(invalid)?,
        })
    }
}

#[cfg(test)]
pub mod tests {
    #![allow(clippy::panic)]
    #![allow(clippy::unwrap_used)]

    use super::*;

    const RECEIPT: &[u8] = include_bytes!("../../tests/fixtures/receipts/receipt.der");
    const RECEIPT_BER: &[u8] = include_bytes!("../../tests/fixtures/receipts/receipt_ber.der");
    const RECEIPT_B64: &str = include_str!("../../tests/fixtures/receipts/receipt.b64");
    const BAD_CERTIFICATE: &[u8] =
        include_bytes!("../../tests/fixtures/receipts/receipt_bad_certificate.der");
    const BAD_SIGNER_VERSION: &[u8] =
        include_bytes!("../../tests/fixtures/receipts/receipt_bad_signer_version.der");

    #[test]
    fn decode_receipt() {
        let receipt = Receipt::from_bytes(RECEIPT).unwrap();

        assert_eq!(receipt.bundle_identifier(), "com.example.app");
        assert_eq!(receipt.app_version(), "1.0");
        assert_eq!(receipt.environment(), &Environment::ProductionSandbox);
        assert_eq!(receipt.certificates().len(), 3);
        assert_eq!(receipt.raw(), RECEIPT);
        assert!(receipt.signer_info().is_some());
        assert!(receipt.leaf_certificate().is_some());

        let details = receipt.certificate_details();
        assert_eq!(details.len(), 3);
        assert_eq!(details[0].serial_number, "1234");
        assert_eq!(details[0].not_after.to_rfc3339(), "2030-01-01T00:00:00+00:00");
    }

    #[test]
    fn ber_and_der_decode_the_same_payload() {
        let der = Receipt::from_bytes(RECEIPT).unwrap();
        let ber = Receipt::from_bytes(RECEIPT_BER).unwrap();

        assert_eq!(der.payload().raw, ber.payload().raw);
        assert_eq!(der.payload().purchases, ber.payload().purchases);
        assert_eq!(der.certificates(), ber.certificates());
    }

    #[test]
    fn base64_and_file_match_bytes() {
        let from_bytes = Receipt::from_bytes(RECEIPT).unwrap();
        let from_base64 = Receipt::from_base64(RECEIPT_B64).unwrap();
        let from_file = Receipt::from_file("tests/fixtures/receipts/receipt.der").unwrap();

        assert_eq!(from_base64.raw(), from_bytes.raw());
        assert_eq!(from_file.raw(), from_bytes.raw());
        assert_eq!(from_bytes.base64(), RECEIPT_B64.split_whitespace().collect::<String>());
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            Receipt::from_file("tests/fixtures/receipts/no_such_receipt.der"),
            Err(Error::NotFound)
        ));
    }

    #[test]
    fn invalid_base64() {
        assert!(matches!(
            Receipt::from_base64("not base64!"),
            Err(Error::ContentInvalid(_))
        ));
    }

    #[test]
    fn truncated_receipts_never_decode() {
        for len in 0..RECEIPT.len() {
            assert!(
                Receipt::from_bytes(&RECEIPT[..len]).is_err(),
                "prefix of {len} bytes decoded"
            );
        }
    }

    #[test]
    fn garbage() {
        assert!(matches!(
            Receipt::from_bytes(b"\x30\x03\x02\x01\x01"),
            Err(Error::DecodingFailed(_))
        ));
        assert!(matches!(
            Receipt::from_bytes(&[0xff; 64]),
            Err(Error::DecodingFailed(_))
        ));
    }

    #[test]
    fn malformed_certificate() {
        assert!(matches!(
            Receipt::from_bytes(BAD_CERTIFICATE),
            Err(Error::DecodingFailed(_))
        ));
    }

    #[test]
    fn signer_version_mismatch() {
        assert!(matches!(
            Receipt::from_bytes(BAD_SIGNER_VERSION),
            Err(Error::DecodingFailed(_))
        ));
    }

    #[test]
    fn serializes_to_json() {
        let receipt = Receipt::from_bytes(RECEIPT).unwrap();
        let json = serde_json::to_value(&receipt).unwrap();

        assert_eq!(json["payload"]["bundle_identifier"], "com.example.app");
        assert_eq!(json["payload"]["environment"], "ProductionSandbox");
        assert_eq!(
            json["payload"]["opaque_value"],
            "a1b2c3d4e5f60718293a4b5c6d7e8f90"
        );
        assert_eq!(
            json["payload"]["purchases"][0]["product_type"],
            "auto_renewable_subscription"
        );
        assert_eq!(json["signer"]["version"], 1);
        assert_eq!(json["certificates"].as_array().unwrap().len(), 3);
    }
}
