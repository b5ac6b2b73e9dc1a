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

use std::io::Read;

use log::{debug, warn};
use x509_parser::{
    der_parser::{oid, Oid},
    extensions::ParsedExtension,
    prelude::*,
};

use crate::ocsp::{check_ocsp_response, create_ocsp_request, OcspError, OcspStatus};

/// Largest OCSP response body that will be read.
const MAX_RESPONSE_LEN: u64 = 1_000_000;

/// Sends a DER-encoded OCSP request to a responder and returns the raw reply.
pub trait OcspTransport: Send + Sync {
    /// POST `request` to `url` and return the response body.
    fn post(&self, url: &str, request: &[u8]) -> Result<Vec<u8>, OcspError>;
}

/// An [`OcspTransport`] that uses a blocking `ureq` HTTP client.
#[derive(Clone, Copy, Debug, Default)]
pub struct UreqTransport;

impl OcspTransport for UreqTransport {
    fn post(&self, url: &str, request: &[u8]) -> Result<Vec<u8>, OcspError> {
        let url = url::Url::parse(url).map_err(|e| OcspError::Transport(e.to_string()))?;

        let response = ureq::post(url.as_str())
            .set("Content-Type", "application/ocsp-request")
            .send_bytes(request)
            .map_err(|e| OcspError::Transport(e.to_string()))?;

        if response.status() != 200 {
            return Err(OcspError::Transport(format!(
                "responder answered with HTTP status {}",
                response.status()
            )));
        }

        let len = response
            .header("Content-Length")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(10000);

        let mut body: Vec<u8> = Vec::with_capacity(len.min(MAX_RESPONSE_LEN as usize));

        response
            .into_reader()
            .take(MAX_RESPONSE_LEN)
            .read_to_end(&mut body)
            .map_err(|e| OcspError::Transport(e.to_string()))?;

        Ok(body)
    }
}

/// Return the OCSP responder URLs named in the certificate's Authority
/// Information Access extension.
pub fn responder_urls(cert_der: &[u8]) -> Vec<String> {
    let Ok((_rem, cert)) = X509Certificate::from_der(cert_der) else {
        return Vec::new();
    };

    extract_aia_responders(&cert).unwrap_or_default()
}

/// Ask a responder for the revocation status of `leaf_der`.
///
/// When `override_url` is given it is used instead of the responders named
/// in the leaf. Otherwise each named responder is tried in turn until one
/// returns a response that checks out.
pub fn fetch_ocsp_status(
    leaf_der: &[u8],
    issuer_der: &[u8],
    transport: &dyn OcspTransport,
    override_url: Option<&str>,
) -> Result<OcspStatus, OcspError> {
    let responders = match override_url {
        Some(url) => vec![url.to_string()],
        None => responder_urls(leaf_der),
    };

    if responders.is_empty() {
        return Err(OcspError::NoResponder);
    }

    let request = create_ocsp_request(leaf_der, issuer_der)?;

    let mut last_err = OcspError::NoResponder;

    for url in responders {
        debug!("requesting OCSP status from {url}");

        let result = transport
            .post(&url, &request)
            .and_then(|response| check_ocsp_response(&response, leaf_der, issuer_der));

        match result {
            Ok(status) => return Ok(status),
            Err(err) => {
                warn!("OCSP responder {url} failed: {err}");
                last_err = err;
            }
        }
    }

    Err(last_err)
}

fn extract_aia_responders(cert: &X509Certificate) -> Option<Vec<String>> {
    let em = cert.extensions_map().ok()?;

    let aia_extension = em.get(&AUTHORITY_INFO_ACCESS_OID)?;

    let ParsedExtension::AuthorityInfoAccess(aia) = aia_extension.parsed_extension() else {
        return None;
    };

    let mut output = Vec::new();

    for ad in &aia.accessdescs {
        if let x509_parser::extensions::GeneralName::URI(uri) = ad.access_location {
            if ad.access_method == AD_OCSP_OID {
                output.push(uri.to_string())
            }
        }
    }
    Some(output)
}

const AD_OCSP_OID: Oid<'static> = oid!(1.3.6 .1 .5 .5 .7 .48 .1);
const AUTHORITY_INFO_ACCESS_OID: Oid<'static> = oid!(1.3.6 .1 .5 .5 .7 .1 .1);
