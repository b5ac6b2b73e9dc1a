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

//! Receipt validation.
//!
//! Each check is a [`ReceiptVerifier`]. A [`ReceiptValidator`] runs an
//! ordered list of them, either concurrently or one after the other, and
//! reports the first failure.

use async_trait::async_trait;

use crate::{Receipt, ValidationError};

mod chain;
pub use chain::ChainVerifier;

mod hash;
pub use hash::{DeviceIdentifierProvider, HashError, HashVerifier, StaticDeviceIdentifier};

mod metadata;
pub use metadata::{AppIdentityProvider, MetadataError, MetadataVerifier, StaticAppIdentity};

mod pipeline;
pub use pipeline::{ExecutionMode, ReceiptValidator, ReceiptValidatorBuilder};

mod refresh;
pub use refresh::RefreshCoordinator;

mod signature;
pub use signature::{verify_signature, SignatureError, SignatureVerifier};

/// Outcome of a single check or of a whole validation run.
pub type VerificationResult = Result<(), ValidationError>;

/// A single check applied to a decoded receipt.
#[async_trait]
pub trait ReceiptVerifier: Send + Sync {
    /// Short name used in log output.
    fn name(&self) -> &'static str;

    /// Check the receipt.
    async fn verify(&self, receipt: &Receipt) -> VerificationResult;

    /// Check the receipt without an async runtime.
    ///
    /// The default implementation drives [`verify`](Self::verify) to
    /// completion on the current thread.
    fn verify_blocking(&self, receipt: &Receipt) -> VerificationResult {
        futures::executor::block_on(self.verify(receipt))
    }
}
