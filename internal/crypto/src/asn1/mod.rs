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

//! Holds Rust struct definitions for the ASN.1 structures found in App Store
//! receipts and in the OCSP exchanges used to check their signing
//! certificates.
//!
//! Only the subset needed to read a receipt is implemented. Everything is
//! decoded with [`bcder`], which accepts both the DER and BER encodings that
//! receipts are delivered in.

pub mod rfc5652;
pub mod rfc6960;

/// Encode a DER header (tag + definite length) for `len` content octets.
pub(crate) fn der_header(tag: u8, len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(6);
    out.push(tag);

    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let skip = bytes.iter().take_while(|b| **b == 0).count();
        out.push(0x80 | (bytes.len() - skip) as u8);
        out.extend_from_slice(&bytes[skip..]);
    }

    out
}

/// Skip all remaining values of a constructed value.
///
/// Unlike `Constructed::skip_all` this stops cleanly at the end-of-contents
/// marker of an indefinite-length value.
pub(crate) fn skip_remaining<S: bcder::decode::Source>(
    cons: &mut bcder::decode::Constructed<S>,
) -> Result<(), bcder::decode::DecodeError<S::Error>> {
    while cons.skip_opt(|_, _, _| Ok(()))?.is_some() {}
    Ok(())
}
