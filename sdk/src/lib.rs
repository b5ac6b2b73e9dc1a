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

#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unwrap_used)]

//! This library decodes App Store receipts and proves they are authentic.
//!
//! A [`Receipt`] is decoded from the CMS container found in the app bundle
//! (or sent to a server) and exposes the receipt payload and its in-app
//! purchases. Decoding alone does not establish trust: a
//! [`ReceiptValidator`] checks the certificate chain, the signature, the
//! device binding and the app identity before the contents should be
//! relied on.
//!
//! # Example: Validating a receipt
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use app_receipt::{
//!     chain::TrustAnchors, Receipt, ReceiptValidator, StaticAppIdentity,
//!     StaticDeviceIdentifier,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let receipt = Receipt::from_file("receipt")?;
//! let anchors = TrustAnchors::from_pem(&std::fs::read("AppleRootCA.pem")?)?;
//! let device = StaticDeviceIdentifier::from_uuid_str("6F9619FF-8B86-D011-B42D-00C04FC964FF")?;
//!
//! let validator = ReceiptValidator::builder(anchors)
//!     .environment(receipt.environment().clone())
//!     .device_identifier(Arc::new(device))
//!     .app_identity(Arc::new(StaticAppIdentity::new("com.example.app", "1.0")))
//!     .build()?;
//!
//! validator.validate(&receipt).await?;
//!
//! for purchase in receipt.purchases() {
//!     println!("{} x{}", purchase.product_identifier, purchase.quantity);
//! }
//! # Ok(())
//! # }
//! ```

/// Certificate chain evaluation, re-exported from the cryptography crate.
pub mod chain {
    pub use app_receipt_crypto::chain::{
        ChainBackendKind, ChainError, ChainFailure, ChainPolicy, ChainValidator, TrustAnchors,
    };
}

/// OCSP transport, re-exported from the cryptography crate.
pub mod ocsp {
    pub use app_receipt_crypto::ocsp::{OcspError, OcspStatus, OcspTransport, UreqTransport};
}

mod error;
pub use error::{Error, Result, ValidationError};

pub mod receipt;
pub use receipt::{
    Environment, InAppPurchase, ProductType, Receipt, ReceiptCertificate, ReceiptPayload,
};

pub mod settings;
pub use settings::Settings;

pub mod validation;
pub use validation::{
    AppIdentityProvider, DeviceIdentifierProvider, ExecutionMode, ReceiptValidator,
    ReceiptValidatorBuilder, ReceiptVerifier, RefreshCoordinator, StaticAppIdentity,
    StaticDeviceIdentifier, VerificationResult,
};
