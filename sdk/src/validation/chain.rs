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

use app_receipt_crypto::chain::{ChainError, ChainPolicy, ChainValidator};
use async_trait::async_trait;
use log::debug;

use super::{ReceiptVerifier, VerificationResult};
use crate::Receipt;

/// Checks that the receipt's signing certificate chains to a trust anchor.
#[derive(Clone, Debug)]
pub struct ChainVerifier {
    validator: ChainValidator,
    pin_to_creation_date: bool,
}

impl ChainVerifier {
    /// Wrap a configured chain validator.
    pub fn new(validator: ChainValidator) -> Self {
        Self {
            validator,
            pin_to_creation_date: false,
        }
    }

    /// Check certificate validity at the receipt's creation date instead of
    /// at the time of validation.
    pub fn pinned_to_creation_date(mut self) -> Self {
        self.pin_to_creation_date = true;
        self
    }

    /// The wrapped chain validator.
    pub fn validator(&self) -> &ChainValidator {
        &self.validator
    }

    fn validator_for(&self, receipt: &Receipt) -> ChainValidator {
        if !self.pin_to_creation_date {
            return self.validator.clone();
        }

        let mut policies: Vec<ChainPolicy> = self
            .validator
            .policies()
            .iter()
            .filter(|policy| !matches!(policy, ChainPolicy::ValidationTime(_)))
            .cloned()
            .collect();
        policies.push(ChainPolicy::ValidationTime(receipt.creation_date()));

        self.validator.clone().with_policies(policies)
    }
}

fn certificates(receipt: &Receipt) -> Vec<Vec<u8>> {
    receipt
        .certificates()
        .iter()
        .map(|cert| cert.to_vec())
        .collect()
}

#[async_trait]
impl ReceiptVerifier for ChainVerifier {
    fn name(&self) -> &'static str {
        "chain"
    }

    async fn verify(&self, receipt: &Receipt) -> VerificationResult {
        let validator = self.validator_for(receipt);
        let certificates = certificates(receipt);

        if validator.checks_revocation() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                debug!("running revocation check on the blocking pool");
                return match handle
                    .spawn_blocking(move || validator.validate(&certificates))
                    .await
                {
                    Ok(result) => result.map_err(Into::into),
                    Err(err) => Err(ChainError::RevocationCheckFailed(err.to_string()).into()),
                };
            }
        }

        validator.validate(&certificates).map_err(Into::into)
    }

    fn verify_blocking(&self, receipt: &Receipt) -> VerificationResult {
        self.validator_for(receipt)
            .validate(&certificates(receipt))
            .map_err(Into::into)
    }
}
