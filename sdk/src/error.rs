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

use app_receipt_crypto::chain::ChainError;
use thiserror::Error;

use crate::validation::{HashError, MetadataError, SignatureError};

/// `Error` enumerates errors returned when loading or decoding a receipt.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// No receipt was found at the given location.
    #[error("receipt not found")]
    NotFound,

    /// The receipt could not be decoded. Carries the underlying cause.
    #[error("receipt decoding failed: {0}")]
    DecodingFailed(String),

    /// The receipt carries no payload, or the payload is not a set of
    /// receipt attributes.
    #[error("receipt payload is missing or invalid")]
    PayloadMissingOrInvalid,

    /// The input is not in the expected transport encoding.
    #[error("invalid receipt content: {0}")]
    ContentInvalid(String),

    /// The receipt or settings file could not be read.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Settings could not be parsed or are invalid.
    #[error("invalid settings: {0}")]
    Settings(String),
}

/// A specialized `Result` type for receipt loading operations.
pub type Result<T> = std::result::Result<T, Error>;

/// `ValidationError` describes why a receipt failed validation.
///
/// Verifier errors are passed through the validation pipeline unchanged.
#[derive(Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum ValidationError {
    /// The certificate chain was rejected.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// The receipt signature does not verify.
    #[error(transparent)]
    Signature(#[from] SignatureError),

    /// The device binding hash does not match.
    #[error(transparent)]
    Hash(#[from] HashError),

    /// The receipt was issued for a different app or version.
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// No usable trust anchor was configured.
    #[error("root certificate is invalid or missing")]
    RootCertificateInvalid,

    /// Hash verification was requested without a device identifier.
    #[error("device identifier not found")]
    DeviceIdentifierNotFound,

    /// The receipt has no signer or no payload.
    #[error("invalid receipt structure")]
    InvalidReceiptStructure,

    /// The settings a validator was built from are invalid.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}
