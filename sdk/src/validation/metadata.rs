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

use async_trait::async_trait;
use log::debug;
use thiserror::Error;

use super::{ReceiptVerifier, VerificationResult};
use crate::Receipt;

/// Describes why a receipt was rejected as issued for another app.
#[derive(Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum MetadataError {
    /// The receipt names a different bundle identifier.
    #[error("bundle identifier does not match")]
    BundleIdentifierMismatch,

    /// The receipt names a different app version.
    #[error("app version does not match")]
    VersionIdentifierMismatch,

    /// The expected bundle identifier or version could not be obtained.
    #[error("expected bundle information is unavailable")]
    BundleInfoUnavailable,
}

/// Supplies the identity of the running app.
pub trait AppIdentityProvider: Send + Sync {
    /// The app's bundle identifier.
    fn bundle_identifier(&self) -> Option<String>;

    /// The app's version (`CFBundleVersion` on Apple platforms).
    fn app_version(&self) -> Option<String>;
}

/// An app identity known up front.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StaticAppIdentity {
    /// Expected bundle identifier.
    pub bundle_identifier: Option<String>,

    /// Expected app version.
    pub app_version: Option<String>,
}

impl StaticAppIdentity {
    /// Expect this bundle identifier and version.
    pub fn new(bundle_identifier: impl Into<String>, app_version: impl Into<String>) -> Self {
        Self {
            bundle_identifier: Some(bundle_identifier.into()),
            app_version: Some(app_version.into()),
        }
    }
}

impl AppIdentityProvider for StaticAppIdentity {
    fn bundle_identifier(&self) -> Option<String> {
        self.bundle_identifier.clone()
    }

    fn app_version(&self) -> Option<String> {
        self.app_version.clone()
    }
}

/// Checks that the receipt was issued for this app and version.
///
/// Comparison is exact. The version is checked before the bundle
/// identifier.
#[derive(Clone)]
pub struct MetadataVerifier {
    provider: Arc<dyn AppIdentityProvider>,
}

impl MetadataVerifier {
    /// Compare against the identity supplied by `provider`.
    pub fn new(provider: Arc<dyn AppIdentityProvider>) -> Self {
        Self { provider }
    }
}

impl fmt::Debug for MetadataVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataVerifier").finish_non_exhaustive()
    }
}

#[async_trait]
impl ReceiptVerifier for MetadataVerifier {
    fn name(&self) -> &'static str {
        "metadata"
    }

    async fn verify(&self, receipt: &Receipt) -> VerificationResult {
        self.verify_blocking(receipt)
    }

    fn verify_blocking(&self, receipt: &Receipt) -> VerificationResult {
        let app_version = self
            .provider
            .app_version()
            .ok_or(MetadataError::BundleInfoUnavailable)?;

        if app_version != receipt.app_version() {
            debug!(
                "receipt is for version {:?}, expected {app_version:?}",
                receipt.app_version()
            );
            return Err(MetadataError::VersionIdentifierMismatch.into());
        }

        let bundle_identifier = self
            .provider
            .bundle_identifier()
            .ok_or(MetadataError::BundleInfoUnavailable)?;

        if bundle_identifier != receipt.bundle_identifier() {
            debug!(
                "receipt is for {:?}, expected {bundle_identifier:?}",
                receipt.bundle_identifier()
            );
            return Err(MetadataError::BundleIdentifierMismatch.into());
        }

        Ok(())
    }
}

#[cfg(test)]
pub mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::ValidationError;

    const RECEIPT: &[u8] = include_bytes!("../../tests/fixtures/receipts/receipt.der");

    fn check(identity: StaticAppIdentity) -> VerificationResult {
        let receipt = Receipt::from_bytes(RECEIPT).unwrap();
        MetadataVerifier::new(Arc::new(identity)).verify_blocking(&receipt)
    }

    #[tokio::test]
    async fn matching_identity() {
        let receipt = Receipt::from_bytes(RECEIPT).unwrap();
        let verifier =
            MetadataVerifier::new(Arc::new(StaticAppIdentity::new("com.example.app", "1.0")));

        assert_eq!(verifier.verify(&receipt).await, Ok(()));
    }

    #[test]
    fn other_bundle() {
        assert_eq!(
            check(StaticAppIdentity::new("com.example.other", "1.0")),
            Err(ValidationError::Metadata(
                MetadataError::BundleIdentifierMismatch
            ))
        );
    }

    #[test]
    fn comparison_is_case_sensitive() {
        assert_eq!(
            check(StaticAppIdentity::new("com.example.App", "1.0")),
            Err(ValidationError::Metadata(
                MetadataError::BundleIdentifierMismatch
            ))
        );
    }

    #[test]
    fn version_is_checked_first() {
        assert_eq!(
            check(StaticAppIdentity::new("com.example.other", "2.0")),
            Err(ValidationError::Metadata(
                MetadataError::VersionIdentifierMismatch
            ))
        );
    }

    #[test]
    fn unavailable_identity() {
        assert_eq!(
            check(StaticAppIdentity::default()),
            Err(ValidationError::Metadata(MetadataError::BundleInfoUnavailable))
        );
        assert_eq!(
            check(StaticAppIdentity {
                bundle_identifier: None,
                app_version: Some("1.0".into()),
            }),
            Err(ValidationError::Metadata(MetadataError::BundleInfoUnavailable))
        );
    }
}
