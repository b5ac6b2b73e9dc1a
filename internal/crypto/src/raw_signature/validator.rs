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

use bcder::Oid;
use thiserror::Error;
use x509_parser::certificate::X509Certificate;

use crate::raw_signature::{oids::*, RsaValidator};

/// A `RawSignatureValidator` implementation checks a signature encoded using a
/// specific signature algorithm and a private/public key pair.
///
/// IMPORTANT: This signature is typically embedded in a wrapper provided by
/// another signature mechanism. For App Store receipts, this wrapper is a
/// CMS `SignerInfo`, but `RawSignatureValidator` does not implement CMS.
pub trait RawSignatureValidator {
    /// Return `Ok(())` if the signature `sig` is valid for the raw content
    /// `data` and the public key `public_key`.
    ///
    /// `public_key` is a DER-encoded `SubjectPublicKeyInfo`.
    fn validate(
        &self,
        sig: &[u8],
        data: &[u8],
        public_key: &[u8],
    ) -> Result<(), RawSignatureValidationError>;
}

/// Return a built-in signature validator for the requested signature
/// algorithm and digest algorithm as identified by OID.
///
/// This is the shape found in a CMS `SignerInfo`, where the signature
/// algorithm is usually plain `rsaEncryption` and the digest algorithm is
/// carried separately. A combined algorithm such as
/// `sha256WithRSAEncryption` must name the same digest as `hash_alg`.
pub fn validator_for_sig_and_hash_algs(
    sig_alg: &Oid,
    hash_alg: &Oid,
) -> Option<Box<dyn RawSignatureValidator + Send + Sync>> {
    let hash_alg = hash_alg.as_ref();

    let validator = if hash_alg == SHA1_OID.as_bytes() {
        RsaValidator::Sha1
    } else if hash_alg == SHA256_OID.as_bytes() {
        RsaValidator::Sha256
    } else if hash_alg == SHA384_OID.as_bytes() {
        RsaValidator::Sha384
    } else if hash_alg == SHA512_OID.as_bytes() {
        RsaValidator::Sha512
    } else {
        return None;
    };

    let sig_alg = sig_alg.as_ref();
    if sig_alg != RSA_OID.as_bytes() && validator_for_signature_alg(sig_alg) != Some(validator) {
        return None;
    }

    Some(Box::new(validator))
}

/// Return a built-in signature validator for a combined signature algorithm
/// OID (for example `sha256WithRSAEncryption`), given as the OID's encoded
/// content bytes.
///
/// This is the shape found in X.509 certificates and OCSP responses.
pub fn validator_for_signature_alg(sig_alg: &[u8]) -> Option<RsaValidator> {
    if sig_alg == SHA1_WITH_RSAENCRYPTION_OID.as_bytes() {
        Some(RsaValidator::Sha1)
    } else if sig_alg == SHA256_WITH_RSAENCRYPTION_OID.as_bytes() {
        Some(RsaValidator::Sha256)
    } else if sig_alg == SHA384_WITH_RSAENCRYPTION_OID.as_bytes() {
        Some(RsaValidator::Sha384)
    } else if sig_alg == SHA512_WITH_RSAENCRYPTION_OID.as_bytes() {
        Some(RsaValidator::Sha512)
    } else {
        None
    }
}

/// Return `true` if `cert` carries a valid signature made with the public key
/// of `issuer`.
pub(crate) fn certificate_signed_by(cert: &X509Certificate<'_>, issuer: &X509Certificate<'_>) -> bool {
    let data = cert.tbs_certificate.as_ref();
    let sig = cert.signature_value.as_ref();

    let Some(validator) = validator_for_signature_alg(cert.signature_algorithm.algorithm.as_bytes())
    else {
        return false;
    };

    validator.validate(sig, data, issuer.public_key().raw).is_ok()
}

/// Describes errors that can be identified when validating a raw signature.
#[derive(Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum RawSignatureValidationError {
    /// The signature does not match the provided data or public key.
    #[error("the signature does not match the provided data or public key")]
    SignatureMismatch,

    /// An error was reported by the underlying cryptography implementation.
    #[error("an error was reported by the cryptography library: {0}")]
    CryptoLibraryError(String),

    /// An invalid public key was provided.
    #[error("invalid public key")]
    InvalidPublicKey,

    /// An invalid signature value was provided.
    #[error("invalid signature value")]
    InvalidSignature,

    /// The signature uses an unsupported signing or hash algorithm.
    #[error("signature uses an unsupported algorithm")]
    UnsupportedAlgorithm,
}
