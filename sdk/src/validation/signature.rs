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

use std::borrow::Cow;

use app_receipt_crypto::{
    asn1::rfc5652::SignerInfo,
    hash::DigestAlgorithm,
    raw_signature::{validator_for_sig_and_hash_algs, RawSignatureValidationError},
};
use async_trait::async_trait;
use log::debug;
use thiserror::Error;
use x509_parser::prelude::*;

use super::{ReceiptVerifier, VerificationResult};
use crate::Receipt;

/// Describes why a receipt signature was rejected.
#[derive(Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum SignatureError {
    /// The signing certificate is missing or its public key is unusable.
    #[error("invalid signing key")]
    InvalidKey,

    /// The signature does not match the signed content.
    #[error("invalid signature")]
    InvalidSignature,

    /// The signer uses a digest or signature algorithm that is not
    /// supported.
    #[error("unsupported signature algorithm")]
    UnsupportedAlgorithm,
}

/// Verify the CMS signature of `signer` over `content`.
///
/// `leaf` is the DER encoding of the signing certificate. `content` must be
/// the encapsulated content octets exactly as they appear in the receipt.
///
/// When the signer carries signed attributes, the `messageDigest` attribute
/// must match the digest of `content` and the signature is checked over the
/// DER `SET OF` encoding of the attributes.
pub fn verify_signature(
    leaf: Option<&[u8]>,
    signer: &SignerInfo,
    content: &[u8],
) -> Result<(), SignatureError> {
    let leaf = leaf.ok_or(SignatureError::InvalidKey)?;
    let (_, cert) = X509Certificate::from_der(leaf).map_err(|_| SignatureError::InvalidKey)?;

    let digest_algorithm = DigestAlgorithm::from_oid(&signer.digest_algorithm.algorithm)
        .ok_or(SignatureError::UnsupportedAlgorithm)?;

    let validator = validator_for_sig_and_hash_algs(
        &signer.signature_algorithm.algorithm,
        &signer.digest_algorithm.algorithm,
    )
    .ok_or(SignatureError::UnsupportedAlgorithm)?;

    let signed: Cow<[u8]> = match &signer.signed_attributes {
        Some(attributes) => {
            let digest = attributes
                .message_digest()
                .ok_or(SignatureError::InvalidSignature)?;

            if digest.as_ref() != digest_algorithm.digest(content).as_slice() {
                debug!("messageDigest does not match the {digest_algorithm} digest of the content");
                return Err(SignatureError::InvalidSignature);
            }

            Cow::Owned(attributes.to_der_set())
        }
        None => Cow::Borrowed(content),
    };

    validator
        .validate(&signer.signature, &signed, cert.public_key().raw)
        .map_err(|err| match err {
            RawSignatureValidationError::InvalidPublicKey => SignatureError::InvalidKey,
            RawSignatureValidationError::UnsupportedAlgorithm => {
                SignatureError::UnsupportedAlgorithm
            }
            _ => SignatureError::InvalidSignature,
        })
}

/// Checks the receipt signature with the signing certificate's key.
#[derive(Clone, Copy, Debug, Default)]
pub struct SignatureVerifier;

#[async_trait]
impl ReceiptVerifier for SignatureVerifier {
    fn name(&self) -> &'static str {
        "signature"
    }

    async fn verify(&self, receipt: &Receipt) -> VerificationResult {
        self.verify_blocking(receipt)
    }

    fn verify_blocking(&self, receipt: &Receipt) -> VerificationResult {
        let signer = receipt
            .signer_info()
            .ok_or(SignatureError::InvalidSignature)?;

        verify_signature(receipt.leaf_certificate(), signer, &receipt.payload().raw)?;
        Ok(())
    }
}

#[cfg(test)]
pub mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::ValidationError;

    const RECEIPT: &[u8] = include_bytes!("../../tests/fixtures/receipts/receipt.der");
    const RECEIPT_SHA1: &[u8] = include_bytes!("../../tests/fixtures/receipts/receipt_sha1.der");
    const RECEIPT_SIGNED_ATTRS: &[u8] =
        include_bytes!("../../tests/fixtures/receipts/receipt_signed_attrs.der");
    const RECEIPT_BER: &[u8] = include_bytes!("../../tests/fixtures/receipts/receipt_ber.der");
    const RECEIPT_WRONG_KEY: &[u8] =
        include_bytes!("../../tests/fixtures/receipts/receipt_wrong_key.der");

    #[tokio::test]
    async fn valid_signatures() {
        for data in [RECEIPT, RECEIPT_SHA1, RECEIPT_SIGNED_ATTRS, RECEIPT_BER] {
            let receipt = Receipt::from_bytes(data).unwrap();
            assert_eq!(SignatureVerifier.verify(&receipt).await, Ok(()));
        }
    }

    #[test]
    fn signed_by_another_key() {
        let receipt = Receipt::from_bytes(RECEIPT_WRONG_KEY).unwrap();

        assert_eq!(
            SignatureVerifier.verify_blocking(&receipt),
            Err(ValidationError::Signature(SignatureError::InvalidSignature))
        );
    }

    #[test]
    fn one_changed_payload_byte() {
        for data in [RECEIPT, RECEIPT_SIGNED_ATTRS] {
            let receipt = Receipt::from_bytes(data).unwrap();
            let signer = receipt.signer_info().unwrap();

            let mut content = receipt.payload().raw.to_vec();
            let last = content.len() - 1;
            content[last] ^= 0x01;

            assert_eq!(
                verify_signature(receipt.leaf_certificate(), signer, &content),
                Err(SignatureError::InvalidSignature)
            );
        }
    }

    #[test]
    fn missing_leaf() {
        let receipt = Receipt::from_bytes(RECEIPT).unwrap();
        let signer = receipt.signer_info().unwrap();

        assert_eq!(
            verify_signature(None, signer, &receipt.payload().raw),
            Err(SignatureError::InvalidKey)
        );
        assert_eq!(
            verify_signature(Some(b"not a certificate"), signer, &receipt.payload().raw),
            Err(SignatureError::InvalidKey)
        );
    }
}
