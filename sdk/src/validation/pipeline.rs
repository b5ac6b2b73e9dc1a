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

use app_receipt_crypto::{
    chain::{ChainBackendKind, ChainPolicy, ChainValidator, TrustAnchors},
    ocsp::OcspTransport,
};
use futures::stream::{FuturesUnordered, StreamExt};
use log::debug;

use super::{
    AppIdentityProvider, ChainVerifier, DeviceIdentifierProvider, HashVerifier, MetadataVerifier,
    ReceiptVerifier, SignatureVerifier, StaticAppIdentity, VerificationResult,
};
use crate::{settings::Settings, Environment, Receipt, ValidationError};

/// How a [`ReceiptValidator`] runs its verifiers.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ExecutionMode {
    /// Run all verifiers at once and stop at the first failure to complete.
    #[default]
    Concurrent,

    /// Run verifiers one after the other, in order, and stop at the first
    /// failure.
    Blocking,
}

/// Runs an ordered list of [`ReceiptVerifier`]s against a receipt.
///
/// A receipt is valid when every verifier accepts it. With no verifiers
/// every structurally complete receipt is valid.
#[derive(Clone, Default)]
pub struct ReceiptValidator {
    verifiers: Vec<Arc<dyn ReceiptVerifier>>,
    mode: ExecutionMode,
}

impl ReceiptValidator {
    /// Create a validator with no verifiers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start building the standard composition of verifiers.
    pub fn builder(anchors: TrustAnchors) -> ReceiptValidatorBuilder {
        ReceiptValidatorBuilder::new(anchors)
    }

    /// Build the standard composition from settings, for a receipt issued
    /// in `environment`.
    pub fn from_settings(
        settings: &Settings,
        environment: &Environment,
    ) -> Result<Self, ValidationError> {
        let anchors = settings
            .trust_anchors()
            .map_err(|_| ValidationError::RootCertificateInvalid)?;

        let validation = &settings.validation;
        let mut builder = Self::builder(anchors)
            .environment(environment.clone())
            .blocking(validation.blocking)
            .verify_hash(validation.verify_hash)
            .verify_revocation(validation.verify_revocation);

        if let Some(kind) = validation.chain_backend {
            builder = builder.chain_backend(kind);
        }

        if let Some(url) = &validation.ocsp_responder {
            builder = builder.ocsp_responder(url.clone());
        }

        let device = settings
            .device_identifier()
            .map_err(|e| ValidationError::InvalidSettings(e.to_string()))?;
        if let Some(device) = device {
            builder = builder.device_identifier(Arc::new(device));
        }

        if validation.verify_metadata {
            builder = builder.app_identity(Arc::new(StaticAppIdentity {
                bundle_identifier: settings.identity.bundle_id.clone(),
                app_version: settings.identity.app_version.clone(),
            }));
        }

        builder.build()
    }

    /// Append a verifier.
    pub fn with_verifier<V: ReceiptVerifier + 'static>(self, verifier: V) -> Self {
        self.with_shared_verifier(Arc::new(verifier))
    }

    /// Append a verifier that is shared with other validators.
    pub fn with_shared_verifier(mut self, verifier: Arc<dyn ReceiptVerifier>) -> Self {
        self.verifiers.push(verifier);
        self
    }

    /// Set how verifiers are run.
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// How verifiers are run.
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Names of the configured verifiers, in order.
    pub fn verifier_names(&self) -> Vec<&'static str> {
        self.verifiers.iter().map(|v| v.name()).collect()
    }

    /// Validate a receipt.
    ///
    /// In [`ExecutionMode::Concurrent`] the first failure to complete is
    /// returned and the remaining checks are dropped. In
    /// [`ExecutionMode::Blocking`] checks run in order.
    pub async fn validate(&self, receipt: &Receipt) -> VerificationResult {
        check_structure(receipt)?;

        match self.mode {
            ExecutionMode::Concurrent => {
                let mut pending: FuturesUnordered<_> = self
                    .verifiers
                    .iter()
                    .map(|verifier| async move {
                        let result = verifier.verify(receipt).await;
                        (verifier.name(), result)
                    })
                    .collect();

                while let Some((name, result)) = pending.next().await {
                    if let Err(err) = result {
                        debug!("{name} verifier rejected the receipt: {err}");
                        return Err(err);
                    }
                }
            }

            ExecutionMode::Blocking => {
                for verifier in &self.verifiers {
                    verifier.verify(receipt).await.inspect_err(|err| {
                        debug!("{} verifier rejected the receipt: {err}", verifier.name());
                    })?;
                }
            }
        }

        Ok(())
    }

    /// Validate a receipt on the current thread, running checks in order.
    pub fn validate_blocking(&self, receipt: &Receipt) -> VerificationResult {
        check_structure(receipt)?;

        for verifier in &self.verifiers {
            verifier.verify_blocking(receipt).inspect_err(|err| {
                debug!("{} verifier rejected the receipt: {err}", verifier.name());
            })?;
        }

        Ok(())
    }
}

impl fmt::Debug for ReceiptValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiptValidator")
            .field("verifiers", &self.verifier_names())
            .field("mode", &self.mode)
            .finish()
    }
}

fn check_structure(receipt: &Receipt) -> VerificationResult {
    if receipt.signer_info().is_none() || receipt.payload().raw.is_empty() {
        return Err(ValidationError::InvalidReceiptStructure);
    }
    Ok(())
}

/// Builds the standard composition of verifiers: certificate chain,
/// signature, device hash and app metadata, in that order.
///
/// Receipts from the sandbox environments, and any receipt validated in
/// blocking mode, have their chain built from the trust store without a
/// revocation check. Production receipts have the presented chain validated
/// and the signing certificate checked with OCSP.
pub struct ReceiptValidatorBuilder {
    anchors: TrustAnchors,
    environment: Environment,
    blocking: bool,
    device_identifier: Option<Arc<dyn DeviceIdentifierProvider>>,
    verify_hash: bool,
    app_identity: Option<Arc<dyn AppIdentityProvider>>,
    verify_revocation: bool,
    ocsp_responder: Option<String>,
    transport: Option<Arc<dyn OcspTransport>>,
    chain_backend: Option<ChainBackendKind>,
}

impl ReceiptValidatorBuilder {
    /// Start with these trust anchors, a production receipt, hash and
    /// revocation checks on and no metadata check.
    pub fn new(anchors: TrustAnchors) -> Self {
        Self {
            anchors,
            environment: Environment::Production,
            blocking: false,
            device_identifier: None,
            verify_hash: true,
            app_identity: None,
            verify_revocation: true,
            ocsp_responder: None,
            transport: None,
            chain_backend: None,
        }
    }

    /// Environment of the receipt to be validated.
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Run checks in order instead of concurrently.
    pub fn blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }

    /// Source of the device identifier for the hash check.
    pub fn device_identifier(mut self, provider: Arc<dyn DeviceIdentifierProvider>) -> Self {
        self.device_identifier = Some(provider);
        self
    }

    /// Whether to check the device hash. Simulators have no usable device
    /// identifier and should turn this off.
    pub fn verify_hash(mut self, verify: bool) -> Self {
        self.verify_hash = verify;
        self
    }

    /// Check the bundle identifier and version against this identity.
    pub fn app_identity(mut self, provider: Arc<dyn AppIdentityProvider>) -> Self {
        self.app_identity = Some(provider);
        self
    }

    /// Whether production receipts get an OCSP check.
    pub fn verify_revocation(mut self, verify: bool) -> Self {
        self.verify_revocation = verify;
        self
    }

    /// Send OCSP requests here instead of the responder named in the
    /// certificate.
    pub fn ocsp_responder(mut self, url: impl Into<String>) -> Self {
        self.ocsp_responder = Some(url.into());
        self
    }

    /// Use this transport for OCSP requests.
    pub fn ocsp_transport(mut self, transport: Arc<dyn OcspTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use this chain backend regardless of environment.
    pub fn chain_backend(mut self, kind: ChainBackendKind) -> Self {
        self.chain_backend = Some(kind);
        self
    }

    /// Assemble the validator.
    pub fn build(self) -> Result<ReceiptValidator, ValidationError> {
        if self.anchors.is_empty() {
            return Err(ValidationError::RootCertificateInvalid);
        }

        if self.verify_hash && self.device_identifier.is_none() {
            return Err(ValidationError::DeviceIdentifierNotFound);
        }

        let production = !self.environment.is_sandbox() && !self.blocking;
        let kind = self.chain_backend.unwrap_or(if production {
            ChainBackendKind::PathValidation
        } else {
            ChainBackendKind::TrustStore
        });

        let mut policies = vec![ChainPolicy::Basic, ChainPolicy::AppStoreReceipt];
        if production && self.verify_revocation {
            policies.push(ChainPolicy::Revocation);
        }

        debug!(
            "validating {} receipt with {kind} backend, policies {policies:?}",
            self.environment
        );

        let mut chain = ChainValidator::new(kind, self.anchors).with_policies(policies);
        if let Some(transport) = self.transport {
            chain = chain.with_transport(transport);
        }
        if let Some(url) = self.ocsp_responder {
            chain = chain.with_ocsp_responder(url);
        }

        let mode = if self.blocking {
            ExecutionMode::Blocking
        } else {
            ExecutionMode::Concurrent
        };

        let mut validator = ReceiptValidator::new()
            .with_mode(mode)
            .with_verifier(ChainVerifier::new(chain).pinned_to_creation_date())
            .with_verifier(SignatureVerifier);

        if self.verify_hash {
            if let Some(provider) = self.device_identifier {
                validator = validator.with_verifier(HashVerifier::new(provider));
            }
        }

        if let Some(provider) = self.app_identity {
            validator = validator.with_verifier(MetadataVerifier::new(provider));
        }

        Ok(validator)
    }
}

#[cfg(test)]
pub mod tests {
    #![allow(clippy::panic)]
    #![allow(clippy::unwrap_used)]

    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use app_receipt_crypto::{
        chain::{ChainError, ChainFailure},
        ocsp::OcspError,
    };
    use async_trait::async_trait;

    use super::*;
    use crate::validation::{HashError, MetadataError, StaticDeviceIdentifier};

    const RECEIPT: &[u8] = include_bytes!("../../tests/fixtures/receipts/receipt.der");
    const NO_SIGNER: &[u8] = include_bytes!("../../tests/fixtures/receipts/receipt_no_signer.der");
    const ROOT_PEM: &[u8] = include_bytes!("../../tests/fixtures/certs/root.pem");
    const GOOD: &[u8] = include_bytes!("../../tests/fixtures/ocsp/good.der");
    const REVOKED: &[u8] = include_bytes!("../../tests/fixtures/ocsp/revoked.der");
    const DEVICE: &str = "6F9619FF-8B86-D011-B42D-00C04FC964FF";

    struct Scripted {
        delay: Duration,
        result: fn() -> VerificationResult,
        finished: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn new(delay_ms: u64, result: fn() -> VerificationResult) -> (Self, Arc<AtomicUsize>) {
            let finished = Arc::new(AtomicUsize::new(0));
            let verifier = Self {
                delay: Duration::from_millis(delay_ms),
                result,
                finished: finished.clone(),
            };
            (verifier, finished)
        }
    }

    #[async_trait]
    impl ReceiptVerifier for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn verify(&self, _receipt: &Receipt) -> VerificationResult {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.finished.fetch_add(1, Ordering::SeqCst);
            (self.result)()
        }

        fn verify_blocking(&self, _receipt: &Receipt) -> VerificationResult {
            self.finished.fetch_add(1, Ordering::SeqCst);
            (self.result)()
        }
    }

    fn valid() -> VerificationResult {
        Ok(())
    }

    fn hash_mismatch() -> VerificationResult {
        Err(HashError::HashMismatch.into())
    }

    fn version_mismatch() -> VerificationResult {
        Err(MetadataError::VersionIdentifierMismatch.into())
    }

    struct FixedTransport(&'static [u8]);

    impl OcspTransport for FixedTransport {
        fn post(&self, _url: &str, _request: &[u8]) -> Result<Vec<u8>, OcspError> {
            Ok(self.0.to_vec())
        }
    }

    fn anchors() -> TrustAnchors {
        TrustAnchors::from_pem(ROOT_PEM).unwrap()
    }

    fn device() -> Arc<StaticDeviceIdentifier> {
        Arc::new(StaticDeviceIdentifier::from_uuid_str(DEVICE).unwrap())
    }

    #[tokio::test]
    async fn no_verifiers() {
        let receipt = Receipt::from_bytes(RECEIPT).unwrap();

        for mode in [ExecutionMode::Concurrent, ExecutionMode::Blocking] {
            let validator = ReceiptValidator::new().with_mode(mode);
            assert_eq!(validator.validate(&receipt).await, Ok(()));
            assert_eq!(validator.validate_blocking(&receipt), Ok(()));
        }
    }

    #[tokio::test]
    async fn all_valid() {
        let receipt = Receipt::from_bytes(RECEIPT).unwrap();
        let (a, a_done) = Scripted::new(5, valid);
        let (b, b_done) = Scripted::new(0, valid);

        let validator = ReceiptValidator::new().with_verifier(a).with_verifier(b);
        assert_eq!(validator.validate(&receipt).await, Ok(()));
        assert_eq!(a_done.load(Ordering::SeqCst), 1);
        assert_eq!(b_done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_returns_first_failure_to_complete() {
        let receipt = Receipt::from_bytes(RECEIPT).unwrap();
        let (slow, slow_done) = Scripted::new(500, version_mismatch);
        let (fast, fast_done) = Scripted::new(0, hash_mismatch);

        let validator = ReceiptValidator::new()
            .with_verifier(slow)
            .with_verifier(fast);

        assert_eq!(
            validator.validate(&receipt).await,
            Err(ValidationError::Hash(HashError::HashMismatch))
        );
        assert_eq!(fast_done.load(Ordering::SeqCst), 1);

        // The slower check was dropped before it finished.
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(slow_done.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn concurrent_failure_in_any_position() {
        let receipt = Receipt::from_bytes(RECEIPT).unwrap();

        for position in 0..3 {
            let mut others = vec![
                Scripted::new(300, valid),
                Scripted::new(300, version_mismatch),
            ]
            .into_iter();
            let mut counters = Vec::new();
            let mut validator = ReceiptValidator::new();

            for index in 0..3 {
                let (verifier, done) = if index == position {
                    Scripted::new(0, hash_mismatch)
                } else {
                    others.next().unwrap()
                };
                counters.push(done);
                validator = validator.with_verifier(verifier);
            }

            assert_eq!(
                validator.validate(&receipt).await,
                Err(ValidationError::Hash(HashError::HashMismatch)),
                "failing verifier at position {position}"
            );

            let finished: Vec<usize> = counters.iter().map(|c| c.load(Ordering::SeqCst)).collect();
            let mut expected = vec![0; 3];
            expected[position] = 1;
            assert_eq!(finished, expected, "failing verifier at position {position}");
        }
    }

    #[tokio::test]
    async fn blocking_stops_at_first_failure_in_order() {
        let receipt = Receipt::from_bytes(RECEIPT).unwrap();
        let (first, first_done) = Scripted::new(20, version_mismatch);
        let (second, second_done) = Scripted::new(0, hash_mismatch);

        let validator = ReceiptValidator::new()
            .with_mode(ExecutionMode::Blocking)
            .with_verifier(first)
            .with_verifier(second);

        let expected = Err(ValidationError::Metadata(
            MetadataError::VersionIdentifierMismatch,
        ));
        assert_eq!(validator.validate(&receipt).await, expected);
        assert_eq!(validator.validate_blocking(&receipt), expected);
        assert_eq!(first_done.load(Ordering::SeqCst), 2);
        assert_eq!(second_done.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn receipt_without_signer() {
        let receipt = Receipt::from_bytes(NO_SIGNER).unwrap();
        let validator = ReceiptValidator::new();

        assert_eq!(
            validator.validate(&receipt).await,
            Err(ValidationError::InvalidReceiptStructure)
        );
        assert_eq!(
            validator.validate_blocking(&receipt),
            Err(ValidationError::InvalidReceiptStructure)
        );
    }

    #[test]
    fn builder_requires_anchors() {
        assert!(matches!(
            ReceiptValidator::builder(TrustAnchors::new())
                .device_identifier(device())
                .build(),
            Err(ValidationError::RootCertificateInvalid)
        ));
    }

    #[test]
    fn builder_requires_device_for_hash() {
        assert!(matches!(
            ReceiptValidator::builder(anchors()).build(),
            Err(ValidationError::DeviceIdentifierNotFound)
        ));

        let validator = ReceiptValidator::builder(anchors())
            .verify_hash(false)
            .build()
            .unwrap();
        assert_eq!(validator.verifier_names(), ["chain", "signature"]);
    }

    #[test]
    fn standard_composition_order() {
        let validator = ReceiptValidator::builder(anchors())
            .device_identifier(device())
            .app_identity(Arc::new(StaticAppIdentity::new("com.example.app", "1.0")))
            .blocking(true)
            .build()
            .unwrap();

        assert_eq!(
            validator.verifier_names(),
            ["chain", "signature", "hash", "metadata"]
        );
        assert_eq!(validator.mode(), ExecutionMode::Blocking);
    }

    #[tokio::test]
    async fn sandbox_receipt() {
        let receipt = Receipt::from_bytes(RECEIPT).unwrap();

        // A revoked response would fail the receipt if it were consulted.
        let validator = ReceiptValidator::builder(anchors())
            .environment(receipt.environment().clone())
            .device_identifier(device())
            .app_identity(Arc::new(StaticAppIdentity::new("com.example.app", "1.0")))
            .ocsp_transport(Arc::new(FixedTransport(REVOKED)))
            .build()
            .unwrap();

        assert_eq!(validator.validate(&receipt).await, Ok(()));
        assert_eq!(validator.validate_blocking(&receipt), Ok(()));
    }

    #[test]
    fn settings_with_invalid_device() {
        let mut settings = Settings::new();
        settings.trust.trust_anchors = Some(String::from_utf8(ROOT_PEM.to_vec()).unwrap());
        settings.identity.device_id = Some("not a device".to_string());

        assert!(matches!(
            ReceiptValidator::from_settings(&settings, &Environment::Sandbox),
            Err(ValidationError::InvalidSettings(_))
        ));

        settings.identity.device_id = None;
        assert!(matches!(
            ReceiptValidator::from_settings(&settings, &Environment::Sandbox),
            Err(ValidationError::DeviceIdentifierNotFound)
        ));

        settings.identity.device_id = Some(DEVICE.to_string());
        assert!(ReceiptValidator::from_settings(&settings, &Environment::Sandbox).is_ok());
    }

    #[tokio::test]
    async fn production_receipt_checks_revocation() {
        let receipt = Receipt::from_bytes(RECEIPT).unwrap();

        let builder = |response: &'static [u8]| {
            ReceiptValidator::builder(anchors())
                .environment(Environment::Production)
                .device_identifier(device())
                .ocsp_transport(Arc::new(FixedTransport(response)))
                .build()
                .unwrap()
        };

        assert_eq!(builder(GOOD).validate(&receipt).await, Ok(()));

        let Err(ValidationError::Chain(ChainError::ChainValidationFailed(
            ChainFailure::Revoked { .. },
        ))) = builder(REVOKED).validate(&receipt).await
        else {
            panic!("revoked signing certificate was accepted");
        };

        let offline = ReceiptValidator::builder(anchors())
            .environment(Environment::Production)
            .device_identifier(device())
            .verify_revocation(false)
            .ocsp_transport(Arc::new(FixedTransport(REVOKED)))
            .build()
            .unwrap();
        assert_eq!(offline.validate(&receipt).await, Ok(()));
    }
}
