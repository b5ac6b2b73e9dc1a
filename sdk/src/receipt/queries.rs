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

//! Entitlement queries over the purchases in a receipt.

use std::{cmp::Ordering, collections::HashSet};

use chrono::{DateTime, Utc};

use super::{InAppPurchase, ProductType, Receipt};

impl Receipt {
    /// All in-app purchases, in receipt order.
    pub fn purchases(&self) -> &[InAppPurchase] {
        &self.payload.purchases
    }

    /// Whether the receipt has any in-app purchase.
    pub fn has_purchases(&self) -> bool {
        !self.purchases().is_empty()
    }

    /// Whether any purchase is for `product_identifier`.
    pub fn contains_purchase(&self, product_identifier: &str) -> bool {
        self.purchases()
            .iter()
            .any(|p| p.product_identifier == product_identifier)
    }

    /// Purchases of `product_identifier`, ordered by `sort` or, when no
    /// ordering is given, by purchase date with the most recent first.
    pub fn purchases_of(
        &self,
        product_identifier: &str,
        sort: Option<&dyn Fn(&InAppPurchase, &InAppPurchase) -> Ordering>,
    ) -> Vec<&InAppPurchase> {
        let mut purchases: Vec<&InAppPurchase> = self
            .purchases()
            .iter()
            .filter(|p| p.product_identifier == product_identifier)
            .collect();

        match sort {
            Some(sort) => purchases.sort_by(|a, b| sort(*a, *b)),
            None => purchases.sort_by(|a, b| b.purchase_date.cmp(&a.purchase_date)),
        }

        purchases
    }

    /// Original transaction identifier of the most recent purchase of
    /// `product_identifier`.
    pub fn original_transaction_identifier(&self, product_identifier: &str) -> Option<&str> {
        self.purchases_of(product_identifier, None)
            .first()
            .map(|p| p.original_transaction_identifier.as_str())
    }

    /// Purchases that carry a subscription expiration date.
    pub fn auto_renewable_purchases(&self) -> Vec<&InAppPurchase> {
        self.purchases()
            .iter()
            .filter(|p| p.is_renewable_subscription())
            .collect()
    }

    /// Subscription purchases active at `date`.
    pub fn active_auto_renewable_subscription_purchases(
        &self,
        date: DateTime<Utc>,
    ) -> Vec<&InAppPurchase> {
        self.purchases()
            .iter()
            .filter(|p| p.is_renewable_subscription() && p.is_active_auto_renewable_subscription(date))
            .collect()
    }

    /// The most recent purchase of `product_identifier` that is an active
    /// subscription at `date`.
    pub fn active_auto_renewable_subscription(
        &self,
        product_identifier: &str,
        date: DateTime<Utc>,
    ) -> Option<&InAppPurchase> {
        self.purchases_of(product_identifier, None)
            .into_iter()
            .find(|p| p.is_active_auto_renewable_subscription(date))
    }

    /// Whether `product_identifier` has an active subscription at `date`.
    pub fn has_active_auto_renewable_subscription(
        &self,
        product_identifier: &str,
        date: DateTime<Utc>,
    ) -> bool {
        self.active_auto_renewable_subscription(product_identifier, date)
            .is_some()
    }

    /// The purchase of `product_identifier` with the latest subscription
    /// expiration date.
    pub fn last_auto_renewable_subscription_purchase(
        &self,
        product_identifier: &str,
    ) -> Option<&InAppPurchase> {
        self.purchases()
            .iter()
            .filter(|p| p.product_identifier == product_identifier)
            .filter(|p| p.subscription_expiration_date.is_some())
            .max_by_key(|p| p.subscription_expiration_date)
    }

    /// Whether the customer may still be offered an introductory price for
    /// `product_identifier`, i.e. has never been in a trial or introductory
    /// period for it.
    pub fn is_eligible_for_introductory_offer(&self, product_identifier: &str) -> bool {
        !self
            .purchases()
            .iter()
            .any(|p| p.product_identifier == product_identifier && used_introductory_offer(p))
    }

    /// Whether the customer may still be offered an introductory price for
    /// any product of a subscription group.
    pub fn is_eligible_for_introductory_offer_in_group(&self, group: &HashSet<String>) -> bool {
        !self
            .purchases()
            .iter()
            .any(|p| group.contains(&p.product_identifier) && used_introductory_offer(p))
    }

    /// Purchases of the given product type.
    pub fn purchases_of_type(&self, product_type: ProductType) -> Vec<&InAppPurchase> {
        self.purchases()
            .iter()
            .filter(|p| p.product_type == product_type)
            .collect()
    }
}

fn used_introductory_offer(purchase: &InAppPurchase) -> bool {
    purchase.subscription_trial_period || purchase.subscription_introductory_price_period
}
