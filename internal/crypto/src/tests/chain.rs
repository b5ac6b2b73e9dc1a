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

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use crate::{
    chain::{
        ChainBackendKind, ChainError, ChainFailure, ChainPolicy, ChainValidator, TrustAnchors,
    },
    ocsp::{OcspError, OcspTransport},
};

const LEAF: &[u8] = include_bytes!("fixtures/certs/leaf.der");
const WWDR: &[u8] = include_bytes!("fixtures/certs/wwdr.der");
const ROOT: &[u8] = include_bytes!("fixtures/certs/root.der");
const ROOT_PEM: &[u8] = include_bytes!("fixtures/certs/root.pem");
const OTHER_ROOT_PEM: &[u8] = include_bytes!("fixtures/certs/other_root.pem");
const LEAF_NO_OID: &[u8] = include_bytes!("fixtures/certs/leaf_no_oid.der");
const LEAF_UNDER_PLAIN: &[u8] = include_bytes!("fixtures/certs/leaf_under_plain.der");
const PLAIN_INTERMEDIATE: &[u8] = include_bytes!("fixtures/certs/plain_intermediate.der");
const LEAF_DIRECT: &[u8] = include_bytes!("fixtures/certs/leaf_direct.der");

const BACKENDS: [ChainBackendKind; 2] =
    [ChainBackendKind::TrustStore, ChainBackendKind::PathValidation];

fn test_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
}

fn chain(certs: &[&[u8]]) -> Vec<Vec<u8>> {
    certs.iter().map(|c| c.to_vec()).collect()
}

fn receipt_validator(kind: ChainBackendKind, anchors_pem: &[u8]) -> ChainValidator {
    ChainValidator::new(kind, TrustAnchors::from_pem(anchors_pem).unwrap()).with_policies(vec![
        ChainPolicy::Basic,
        ChainPolicy::ValidationTime(test_time()),
        ChainPolicy::AppStoreReceipt,
    ])
}

struct FixedTransport(&'static [u8]);

impl OcspTransport for FixedTransport {
    fn post(&self, _url: &str, _request: &[u8]) -> Result<Vec<u8>, OcspError> {
        Ok(self.0.to_vec())
    }
}

struct FailingTransport;

impl OcspTransport for FailingTransport {
    fn post(&self, _url: &str, _request: &[u8]) -> Result<Vec<u8>, OcspError> {
        Err(OcspError::Transport("connection refused".to_string()))
    }
}

#[test]
fn trust_anchors() {
    let mut anchors = TrustAnchors::from_pem(ROOT_PEM).unwrap();
    assert_eq!(anchors.len(), 1);
    assert!(anchors.contains(ROOT));

    // Same certificate in DER form is not added twice.
    anchors.add_der(ROOT).unwrap();
    assert_eq!(anchors.len(), 1);

    anchors.add_pem(OTHER_ROOT_PEM).unwrap();
    assert_eq!(anchors.len(), 2);

    assert_eq!(
        TrustAnchors::from_der(b"not a certificate"),
        Err(ChainError::InvalidCertificateData)
    );

    assert!(TrustAnchors::from_pem(b"no pem blocks here").unwrap().is_empty());
}

#[test]
fn valid_receipt_chain() {
    for kind in BACKENDS {
        let validator = receipt_validator(kind, ROOT_PEM);
        assert_eq!(validator.kind(), kind);
        assert!(!validator.checks_revocation());

        validator.validate(&chain(&[LEAF, WWDR, ROOT])).unwrap();
    }
}

#[test]
fn root_supplied_by_anchor() {
    for kind in BACKENDS {
        receipt_validator(kind, ROOT_PEM)
            .validate(&chain(&[LEAF, WWDR]))
            .unwrap();
    }
}

#[test]
fn untrusted_root() {
    for kind in BACKENDS {
        assert_eq!(
            receipt_validator(kind, OTHER_ROOT_PEM).validate(&chain(&[LEAF, WWDR, ROOT])),
            Err(ChainFailure::UntrustedRoot.into()),
            "{kind}"
        );
    }
}

#[test]
fn no_anchors_trusts_nothing() {
    for kind in BACKENDS {
        let validator = ChainValidator::new(kind, TrustAnchors::new());
        assert_eq!(
            validator.validate(&chain(&[LEAF, WWDR, ROOT])),
            Err(ChainFailure::UntrustedRoot.into())
        );
    }
}

#[test]
fn expired_at_validation_time() {
    let later = Utc.with_ymd_and_hms(2031, 1, 1, 0, 0, 0).unwrap();

    for kind in BACKENDS {
        let validator = ChainValidator::new(kind, TrustAnchors::from_pem(ROOT_PEM).unwrap())
            .with_policies(vec![ChainPolicy::ValidationTime(later)]);

        assert_eq!(
            validator.validate(&chain(&[LEAF, WWDR, ROOT])),
            Err(ChainFailure::NotValidAtTime.into())
        );
    }
}

#[test]
fn validity_bounds_are_inclusive() {
    let not_after = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();

    let validator = ChainValidator::new(
        ChainBackendKind::TrustStore,
        TrustAnchors::from_pem(ROOT_PEM).unwrap(),
    )
    .with_policies(vec![ChainPolicy::ValidationTime(not_after)]);

    validator.validate(&chain(&[LEAF, WWDR, ROOT])).unwrap();
}

#[test]
fn missing_signer_extension() {
    for kind in BACKENDS {
        assert_eq!(
            receipt_validator(kind, ROOT_PEM).validate(&chain(&[LEAF_NO_OID, WWDR, ROOT])),
            Err(ChainFailure::MissingReceiptSignerExtension.into())
        );
    }
}

#[test]
fn missing_wwdr_extension() {
    for kind in BACKENDS {
        assert_eq!(
            receipt_validator(kind, ROOT_PEM).validate(&chain(&[
                LEAF_UNDER_PLAIN,
                PLAIN_INTERMEDIATE,
                ROOT
            ])),
            Err(ChainFailure::MissingWwdrExtension.into())
        );
    }
}

#[test]
fn wrong_chain_length() {
    for kind in BACKENDS {
        assert_eq!(
            receipt_validator(kind, ROOT_PEM).validate(&chain(&[LEAF_DIRECT, ROOT])),
            Err(ChainFailure::WrongChainLength { found: 2 }.into())
        );
    }
}

#[test]
fn basic_policy_accepts_short_chain() {
    for kind in BACKENDS {
        ChainValidator::new(kind, TrustAnchors::from_pem(ROOT_PEM).unwrap())
            .with_policies(vec![ChainPolicy::Basic, ChainPolicy::ValidationTime(test_time())])
            .validate(&chain(&[LEAF_DIRECT, ROOT]))
            .unwrap();
    }
}

#[test]
fn out_of_order_certificates() {
    // Only the trust store looks certificates up by issuer.
    receipt_validator(ChainBackendKind::TrustStore, ROOT_PEM)
        .validate(&chain(&[LEAF, ROOT, WWDR]))
        .unwrap();

    assert_eq!(
        receipt_validator(ChainBackendKind::PathValidation, ROOT_PEM)
            .validate(&chain(&[LEAF, ROOT, WWDR])),
        Err(ChainFailure::SignatureMismatch.into())
    );
}

#[test]
fn wrong_issuer() {
    assert_eq!(
        receipt_validator(ChainBackendKind::TrustStore, ROOT_PEM)
            .validate(&chain(&[LEAF, PLAIN_INTERMEDIATE, ROOT])),
        Err(ChainFailure::UntrustedRoot.into())
    );

    assert_eq!(
        receipt_validator(ChainBackendKind::PathValidation, ROOT_PEM)
            .validate(&chain(&[LEAF, PLAIN_INTERMEDIATE, ROOT])),
        Err(ChainFailure::SignatureMismatch.into())
    );
}

#[test]
fn invalid_certificate_data() {
    for kind in BACKENDS {
        let validator = receipt_validator(kind, ROOT_PEM);

        assert_eq!(
            validator.validate(&[]),
            Err(ChainError::InvalidCertificateData)
        );

        assert_eq!(
            validator.validate(&[LEAF.to_vec(), b"garbage".to_vec()]),
            Err(ChainError::InvalidCertificateData)
        );
    }
}

fn revocation_validator(kind: ChainBackendKind, transport: Arc<dyn OcspTransport>) -> ChainValidator {
    ChainValidator::new(kind, TrustAnchors::from_pem(ROOT_PEM).unwrap())
        .with_policies(vec![
            ChainPolicy::ValidationTime(test_time()),
            ChainPolicy::AppStoreReceipt,
            ChainPolicy::Revocation,
        ])
        .with_transport(transport)
}

#[test]
fn revocation_good() {
    for kind in BACKENDS {
        let validator = revocation_validator(
            kind,
            Arc::new(FixedTransport(include_bytes!("fixtures/ocsp/good.der"))),
        );
        assert!(validator.checks_revocation());

        validator.validate(&chain(&[LEAF, WWDR, ROOT])).unwrap();
    }
}

#[test]
fn revocation_revoked() {
    for kind in BACKENDS {
        let validator = revocation_validator(
            kind,
            Arc::new(FixedTransport(include_bytes!("fixtures/ocsp/revoked.der"))),
        );

        assert_eq!(
            validator.validate(&chain(&[LEAF, WWDR, ROOT])),
            Err(ChainFailure::Revoked {
                revoked_at: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
            }
            .into())
        );
    }
}

#[test]
fn revocation_unavailable() {
    let validator = revocation_validator(ChainBackendKind::TrustStore, Arc::new(FailingTransport))
        .with_ocsp_responder("http://localhost:1/ocsp");

    assert!(matches!(
        validator.validate(&chain(&[LEAF, WWDR, ROOT])),
        Err(ChainError::RevocationCheckFailed(_))
    ));
}

#[test]
fn revocation_with_forged_response() {
    let validator = revocation_validator(
        ChainBackendKind::PathValidation,
        Arc::new(FixedTransport(include_bytes!("fixtures/ocsp/forged.der"))),
    );

    assert!(matches!(
        validator.validate(&chain(&[LEAF, WWDR, ROOT])),
        Err(ChainError::RevocationCheckFailed(_))
    ));
}

#[test]
fn backend_kind_serde_names() {
    let kind: ChainBackendKind = serde_json::from_str("\"path_validation\"").unwrap();
    assert_eq!(kind, ChainBackendKind::PathValidation);
    assert_eq!(ChainBackendKind::default(), ChainBackendKind::TrustStore);
}
