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

use rsa::{
    pkcs1v15::{Signature, VerifyingKey},
    pkcs8::DecodePublicKey,
    sha2::{Sha256, Sha384, Sha512},
    signature::Verifier,
    RsaPublicKey,
};
use sha1::Sha1;

use crate::raw_signature::{RawSignatureValidationError, RawSignatureValidator};

/// An `RsaValidator` validates RSASSA-PKCS1-v1_5 signatures.
///
/// App Store receipts are signed with SHA-1 (older receipts) or SHA-256, and
/// the certificates in the chain use the `shaNWithRSAEncryption` family.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RsaValidator {
    /// PKCS#1 v1.5 with SHA-1.
    Sha1,

    /// PKCS#1 v1.5 with SHA-256.
    Sha256,

    /// PKCS#1 v1.5 with SHA-384.
    Sha384,

    /// PKCS#1 v1.5 with SHA-512.
    Sha512,
}

impl RawSignatureValidator for RsaValidator {
    fn validate(
        &self,
        sig: &[u8],
        data: &[u8],
        public_key: &[u8],
    ) -> Result<(), RawSignatureValidationError> {
        let signature: Signature = sig
            .try_into()
            .map_err(|_| RawSignatureValidationError::InvalidSignature)?;

        let public_key = RsaPublicKey::from_public_key_der(public_key)
            .map_err(|_| RawSignatureValidationError::InvalidPublicKey)?;

        let result = match self {
            Self::Sha1 => {
                let vk = VerifyingKey::<Sha1>::new(public_key);
                vk.verify(data, &signature)
            }

            Self::Sha256 => {
                let vk = VerifyingKey::<Sha256>::new(public_key);
                vk.verify(data, &signature)
            }

            Self::Sha384 => {
                let vk = VerifyingKey::<Sha384>::new(public_key);
                vk.verify(data, &signature)
            }

            Self::Sha512 => {
                let vk = VerifyingKey::<Sha512>::new(public_key);
                vk.verify(data, &signature)
            }
        };

        result.map_err(|_| RawSignatureValidationError::SignatureMismatch)
    }
}
