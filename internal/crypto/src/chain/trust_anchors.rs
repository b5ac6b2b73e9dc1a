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

use x509_parser::{certificate::X509Certificate, pem::Pem, prelude::FromDer};

use crate::chain::ChainError;

/// Root certificates that a receipt chain may end at.
///
/// An empty set trusts nothing: every chain is rejected.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TrustAnchors {
    /// Trust anchors (root X.509 certificates) in DER format.
    ders: Vec<Vec<u8>>,
}

impl TrustAnchors {
    /// Create an empty anchor set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read zero or more certificates in PEM format.
    pub fn from_pem(pems: &[u8]) -> Result<Self, ChainError> {
        let mut anchors = Self::new();
        anchors.add_pem(pems)?;
        Ok(anchors)
    }

    /// Create an anchor set holding one DER certificate.
    pub fn from_der(der: &[u8]) -> Result<Self, ChainError> {
        let mut anchors = Self::new();
        anchors.add_der(der)?;
        Ok(anchors)
    }

    /// Add every certificate found in a PEM bundle.
    pub fn add_pem(&mut self, pems: &[u8]) -> Result<(), ChainError> {
        for maybe_pem in Pem::iter_from_buffer(pems) {
            // `contents` holds the decoded PEM body, which is DER.
            let pem = maybe_pem.map_err(|_| ChainError::InvalidCertificateData)?;
            self.add_der(&pem.contents)?;
        }

        Ok(())
    }

    /// Add one DER certificate. Duplicates are ignored.
    pub fn add_der(&mut self, der: &[u8]) -> Result<(), ChainError> {
        X509Certificate::from_der(der).map_err(|_| ChainError::InvalidCertificateData)?;

        if !self.contains(der) {
            self.ders.push(der.to_vec());
        }

        Ok(())
    }

    /// Whether this exact certificate is an anchor.
    pub fn contains(&self, der: &[u8]) -> bool {
        self.ders.iter().any(|anchor| anchor.as_slice() == der)
    }

    /// Iterate over the anchors in DER format.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.ders.iter().map(Vec::as_slice)
    }

    /// Number of anchors.
    pub fn len(&self) -> usize {
        self.ders.len()
    }

    /// Whether there are no anchors.
    pub fn is_empty(&self) -> bool {
        self.ders.is_empty()
    }
}
