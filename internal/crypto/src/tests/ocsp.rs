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

use chrono::{TimeZone, Utc};
use httpmock::prelude::*;

use crate::{
    asn1::rfc6960::OcspResponseStatus,
    ocsp::{
        check_ocsp_response, create_ocsp_request, fetch_ocsp_status, responder_urls, OcspError,
        OcspStatus, UreqTransport,
    },
};

const LEAF: &[u8] = include_bytes!("fixtures/certs/leaf.der");
const WWDR: &[u8] = include_bytes!("fixtures/certs/wwdr.der");
const ROOT: &[u8] = include_bytes!("fixtures/certs/root.der");
const LEAF_NO_OID: &[u8] = include_bytes!("fixtures/certs/leaf_no_oid.der");

const GOOD: &[u8] = include_bytes!("fixtures/ocsp/good.der");
const REVOKED: &[u8] = include_bytes!("fixtures/ocsp/revoked.der");
const UNAUTHORIZED: &[u8] = include_bytes!("fixtures/ocsp/unauthorized.der");
const FORGED: &[u8] = include_bytes!("fixtures/ocsp/forged.der");

#[test]
fn good() {
    assert_eq!(
        check_ocsp_response(GOOD, LEAF, WWDR),
        Ok(OcspStatus::Good)
    );
}

#[test]
fn revoked() {
    assert_eq!(
        check_ocsp_response(REVOKED, LEAF, WWDR),
        Ok(OcspStatus::Revoked {
            revoked_at: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
        })
    );
}

#[test]
fn unsuccessful_status() {
    assert_eq!(
        check_ocsp_response(UNAUTHORIZED, LEAF, WWDR),
        Err(OcspError::ResponderStatus(OcspResponseStatus::Unauthorized))
    );
}

#[test]
fn forged_responder() {
    assert_eq!(
        check_ocsp_response(FORGED, LEAF, WWDR),
        Err(OcspError::UntrustedResponder)
    );
}

#[test]
fn wrong_issuer_key() {
    // The response verifies only under the real issuer's key.
    assert_eq!(
        check_ocsp_response(GOOD, LEAF, ROOT),
        Err(OcspError::UntrustedResponder)
    );
}

#[test]
fn other_certificate() {
    assert_eq!(
        check_ocsp_response(GOOD, LEAF_NO_OID, WWDR),
        Err(OcspError::CertIdMismatch)
    );
}

#[test]
fn malformed() {
    assert!(matches!(
        check_ocsp_response(b"\x30\x03\x0a\x01", LEAF, WWDR),
        Err(OcspError::Malformed(_))
    ));
}

#[test]
fn request() {
    let request = create_ocsp_request(LEAF, WWDR).unwrap();
    assert_eq!(request[0], 0x30);

    assert_eq!(
        create_ocsp_request(b"garbage", WWDR),
        Err(OcspError::InvalidCertificate)
    );
}

#[test]
fn aia_responders() {
    assert_eq!(responder_urls(LEAF), vec!["http://ocsp.example.test/ocsp"]);
    assert!(responder_urls(LEAF_NO_OID).is_empty());
    assert!(responder_urls(b"garbage").is_empty());
}

#[test]
fn fetch_over_http() {
    let server = MockServer::start();

    let ocsp_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/ocsp")
            .header("content-type", "application/ocsp-request");
        then.status(200)
            .header("content-type", "application/ocsp-response")
            .body(GOOD);
    });

    let status =
        fetch_ocsp_status(LEAF, WWDR, &UreqTransport, Some(&server.url("/ocsp"))).unwrap();

    assert_eq!(status, OcspStatus::Good);
    ocsp_mock.assert();
}

#[test]
fn fetch_http_error() {
    let server = MockServer::start();

    let ocsp_mock = server.mock(|when, then| {
        when.method(POST).path("/ocsp");
        then.status(500);
    });

    assert!(matches!(
        fetch_ocsp_status(LEAF, WWDR, &UreqTransport, Some(&server.url("/ocsp"))),
        Err(OcspError::Transport(_))
    ));
    ocsp_mock.assert();
}

#[test]
fn fetch_without_responder() {
    assert_eq!(
        fetch_ocsp_status(LEAF_NO_OID, WWDR, &UreqTransport, None),
        Err(OcspError::NoResponder)
    );
}
