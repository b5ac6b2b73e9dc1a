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

//! Hash convenience functions.

use std::fmt;

use bcder::Oid;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use sha2::Sha256;

use crate::raw_signature::oids::{SHA1_OID, SHA256_OID};

/// Given a byte slice, return the SHA-1 hash of that content.
pub fn sha1(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha1::default();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Return the SHA-1 hash of several byte slices fed to the hasher in order.
///
/// This is equivalent to hashing the concatenation of `parts` without
/// allocating the concatenated buffer.
pub fn sha1_concat(parts: &[&[u8]]) -> Vec<u8> {
    let mut hasher = Sha1::default();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().to_vec()
}

/// Given a byte slice, return the SHA-256 hash of that content.
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::default();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Digest algorithms that may be declared by a receipt signer.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    /// SHA-1 (1.3.14.3.2.26). Older receipts are signed with it.
    Sha1,

    /// SHA-256 (2.16.840.1.101.3.4.2.1).
    Sha256,
}

impl DigestAlgorithm {
    /// Map a digest algorithm OID to a supported algorithm.
    pub fn from_oid(oid: &Oid) -> Option<Self> {
        if oid.as_ref() == SHA1_OID.as_bytes() {
            Some(Self::Sha1)
        } else if oid.as_ref() == SHA256_OID.as_bytes() {
            Some(Self::Sha256)
        } else {
            None
        }
    }

    /// Hash `data` with this algorithm.
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha1 => sha1(data),
            Self::Sha256 => sha256(data),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha1 => write!(f, "sha1"),
            Self::Sha256 => write!(f, "sha256"),
        }
    }
}
