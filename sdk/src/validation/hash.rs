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

use std::{fmt, sync::Arc};

use app_receipt_crypto::hash::sha1_concat;
use async_trait::async_trait;
use log::debug;
use thiserror::Error;
use uuid::Uuid;

use super::{ReceiptVerifier, VerificationResult};
use crate::Receipt;

/// Describes why the device binding of a receipt was rejected.
#[derive(Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum HashError {
    /// No device identifier was available.
    #[error("device identifier is not available")]
    MissingDeviceIdentifier,

    /// The receipt hash was computed for another device or app.
    #[error("receipt hash does not match this device")]
    HashMismatch,
}

/// Supplies the identifier of the device the receipt should be bound to.
///
/// On Apple platforms this is the 16 bytes of the vendor identifier UUID.
/// Closures returning `Option<Vec<u8>>` implement this trait.
pub trait DeviceIdentifierProvider: Send + Sync {
    /// The raw identifier bytes, or `None` if unavailable.
    fn device_identifier(&self) -> Option<Vec<u8>>;
}

impl<F> DeviceIdentifierProvider for F
where
    F: Fn() -> Option<Vec<u8>> + Send + Sync,
{
    fn device_identifier(&self) -> Option<Vec<u8>> {
        self()
    }
}

/// A device identifier known up front.
#[derive(Clone, Eq, PartialEq)]
pub struct StaticDeviceIdentifier(Vec<u8>);

impl StaticDeviceIdentifier {
    /// Use these bytes as the identifier.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Parse a UUID such as `6F9619FF-8B86-D011-B42D-00C04FC964FF`.
    pub fn from_uuid_str(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?.as_bytes().to_vec()))
    }

    /// Parse a hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        Ok(Self(hex::decode(s)?))
    }

    /// Parse either a UUID or a hex string.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::from_uuid_str(s)
            .ok()
            .or_else(|| Self::from_hex(s).ok())
            .filter(|id| !id.0.is_empty())
    }

    /// The identifier bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for StaticDeviceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StaticDeviceIdentifier({})", hex::encode(&self.0))
    }
}

impl DeviceIdentifierProvider for StaticDeviceIdentifier {
    fn device_identifier(&self) -> Option<Vec<u8>> {
        Some(self.0.clone())
    }
}

/// Checks that the receipt was issued to this device.
///
/// The receipt hash must equal `SHA1(device identifier ‖ opaque value ‖
/// bundle identifier)`, where the bundle identifier is taken as its encoded
/// attribute value.
#[derive(Clone)]
pub struct HashVerifier {
    provider: Arc<dyn DeviceIdentifierProvider>,
}

impl HashVerifier {
    /// Create a verifier that obtains the identifier from `provider`.
    pub fn new(provider: Arc<dyn DeviceIdentifierProvider>) -> Self {
        Self { provider }
    }
}

impl fmt::Debug for HashVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashVerifier").finish_non_exhaustive()
    }
}

#[async_trait]
impl ReceiptVerifier for HashVerifier {
    fn name(&self) -> &'static str {
        "hash"
    }

    async fn verify(&self, receipt: &Receipt) -> VerificationResult {
        self.verify_blocking(receipt)
    }

    fn verify_blocking(&self, receipt: &Receipt) -> VerificationResult {
        let device_identifier = self
            .provider
            .device_identifier()
            .ok_or(HashError::MissingDeviceIdentifier)?;

        let payload = receipt.payload();
        let computed = sha1_concat(&[
            device_identifier.as_slice(),
            &payload.opaque_value[..],
            &payload.bundle_identifier_data[..],
        ]);

        if computed.as_slice() == payload.receipt_hash.as_ref() {
            Ok(())
        } else {
            debug!("expected receipt hash {}", hex::encode(&computed));
            Err(HashError::HashMismatch.into())
        }
    }
}
