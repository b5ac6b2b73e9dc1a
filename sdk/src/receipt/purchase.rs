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

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::attribute::ReceiptAttribute;
use crate::{Error, Result};

/// Kind of product an [`InAppPurchase`] is for.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    /// The receipt does not say, or uses a code this crate does not know.
    #[default]
    Unknown,

    /// A non-consumable product.
    NonConsumable,

    /// A consumable product.
    Consumable,

    /// A subscription that does not renew automatically.
    NonRenewingSubscription,

    /// An auto-renewable subscription.
    AutoRenewableSubscription,
}

impl From<i64> for ProductType {
    fn from(code: i64) -> Self {
        match code {
            0 => Self::NonConsumable,
            1 => Self::Consumable,
            2 => Self::NonRenewingSubscription,
            3 => Self::AutoRenewableSubscription,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::NonConsumable => write!(f, "non-consumable"),
            Self::Consumable => write!(f, "consumable"),
            Self::NonRenewingSubscription => write!(f, "non-renewing subscription"),
            Self::AutoRenewableSubscription => write!(f, "auto-renewable subscription"),
        }
    }
}

/// One in-app purchase record, decoded from a type 17 receipt attribute.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct InAppPurchase {
    /// Number of items purchased. Defaults to 1.
    pub quantity: i64,

    /// Product identifier of the purchased item.
    pub product_identifier: String,

    /// Transaction identifier of the purchase.
    pub transaction_identifier: String,

    /// Transaction identifier of the original purchase. For a renewal this
    /// identifies the first purchase of the subscription.
    pub original_transaction_identifier: String,

    /// When the item was purchased.
    pub purchase_date: DateTime<Utc>,

    /// When the original transaction was made.
    pub original_purchase_date: Option<DateTime<Utc>>,

    /// Kind of product.
    pub product_type: ProductType,

    /// When the subscription expires or renews. Only present on
    /// auto-renewable subscriptions.
    pub subscription_expiration_date: Option<DateTime<Utc>>,

    /// Primary key identifying subscription purchases.
    pub web_order_line_item_id: Option<i64>,

    /// When the purchase was refunded or the subscription cancelled by
    /// customer support.
    pub cancellation_date: Option<DateTime<Utc>>,

    /// Whether the subscription is in its free trial period.
    pub subscription_trial_period: bool,

    /// Whether the subscription is in an introductory price period.
    pub subscription_introductory_price_period: bool,

    /// Identifier of the promotional offer that was redeemed, if any.
    pub promotional_offer_identifier: Option<String>,
}

impl InAppPurchase {
    pub(crate) fn from_attributes(attributes: &[ReceiptAttribute]) -> Result<Self> {
        let mut quantity = 1;
        let mut product_identifier = None;
        let mut transaction_identifier = String::new();
        let mut original_transaction_identifier = String::new();
        let mut purchase_date = None;
        let mut original_purchase_date = None;
        let mut product_type = ProductType::Unknown;
        let mut subscription_expiration_date = None;
        let mut web_order_line_item_id = None;
        let mut cancellation_date = None;
        let mut subscription_trial_period = false;
        let mut subscription_introductory_price_period = false;
        let mut promotional_offer_identifier = None;

        for attr in attributes {
            match attr.typ {
                1701 => quantity = attr.integer()?,
                1702 => product_identifier = Some(attr.string()?),
                1703 => transaction_identifier = attr.string().unwrap_or_default(),
                1704 => purchase_date = Some(attr.date()?),
                1705 => original_transaction_identifier = attr.string()?,
                1706 => original_purchase_date = attr.optional_date(),
                1707 => product_type = ProductType::from(attr.integer()?),
                1708 => subscription_expiration_date = attr.optional_date(),
                1711 => web_order_line_item_id = Some(attr.integer()?),
                1712 => cancellation_date = attr.optional_date(),
                1713 => subscription_trial_period = attr.integer()? != 0,
                1719 => subscription_introductory_price_period = attr.integer()? != 0,
                1721 => promotional_offer_identifier = attr.string().ok(),
                _ => {}
            }
        }

        let product_identifier = product_identifier
            .ok_or_else(|| Error::DecodingFailed("purchase has no product identifier".into()))?;
        let purchase_date = purchase_date
            .ok_or_else(|| Error::DecodingFailed("purchase has no purchase date".into()))?;

        Ok(Self {
            quantity,
            product_identifier,
            transaction_identifier,
            original_transaction_identifier,
            purchase_date,
            original_purchase_date,
            product_type,
            subscription_expiration_date,
            web_order_line_item_id,
            cancellation_date,
            subscription_trial_period,
            subscription_introductory_price_period,
            promotional_offer_identifier,
        })
    }

    /// Whether this purchase is a subscription that carries an expiration
    /// date.
    pub fn is_renewable_subscription(&self) -> bool {
        self.subscription_expiration_date.is_some()
    }

    /// Whether this subscription purchase is active at `date`.
    ///
    /// A cancelled purchase is never active. Otherwise it is active from the
    /// purchase date (inclusive) until the expiration date (exclusive).
    pub fn is_active_auto_renewable_subscription(&self, date: DateTime<Utc>) -> bool {
        if self.cancellation_date.is_some() {
            return false;
        }

        match self.subscription_expiration_date {
            Some(expiration) => self.purchase_date <= date && date < expiration,
            None => false,
        }
    }
}

#[cfg(test)]
pub mod tests {
    #![allow(clippy::unwrap_used)]

    use chrono::TimeZone;

    use super::*;

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn subscription() -> InAppPurchase {
        InAppPurchase {
            quantity: 1,
            product_identifier: "com.example.monthly".to_string(),
            transaction_identifier: "1".to_string(),
            original_transaction_identifier: "1".to_string(),
            purchase_date: utc(2024, 5, 1),
            original_purchase_date: None,
            product_type: ProductType::AutoRenewableSubscription,
            subscription_expiration_date: Some(utc(2024, 6, 1)),
            web_order_line_item_id: None,
            cancellation_date: None,
            subscription_trial_period: false,
            subscription_introductory_price_period: false,
            promotional_offer_identifier: None,
        }
    }

    #[test]
    fn product_type_codes() {
        assert_eq!(ProductType::from(0), ProductType::NonConsumable);
        assert_eq!(ProductType::from(1), ProductType::Consumable);
        assert_eq!(ProductType::from(2), ProductType::NonRenewingSubscription);
        assert_eq!(ProductType::from(3), ProductType::AutoRenewableSubscription);
        assert_eq!(ProductType::from(4), ProductType::Unknown);
        assert_eq!(ProductType::from(-1), ProductType::Unknown);
        assert_eq!(ProductType::default(), ProductType::Unknown);
    }

    #[test]
    fn active_window_bounds() {
        let purchase = subscription();

        assert!(!purchase.is_active_auto_renewable_subscription(utc(2024, 4, 30)));
        assert!(purchase.is_active_auto_renewable_subscription(utc(2024, 5, 1)));
        assert!(purchase.is_active_auto_renewable_subscription(utc(2024, 5, 15)));
        assert!(!purchase.is_active_auto_renewable_subscription(utc(2024, 6, 1)));
    }

    #[test]
    fn cancelled_is_never_active() {
        let mut purchase = subscription();
        purchase.cancellation_date = Some(utc(2024, 5, 10));

        assert!(!purchase.is_active_auto_renewable_subscription(utc(2024, 5, 5)));
        assert!(!purchase.is_active_auto_renewable_subscription(utc(2024, 5, 15)));
    }

    #[test]
    fn without_expiration() {
        let mut purchase = subscription();
        purchase.subscription_expiration_date = None;

        assert!(!purchase.is_renewable_subscription());
        assert!(!purchase.is_active_auto_renewable_subscription(utc(2024, 5, 15)));
    }

    fn attr(typ: i64, value: &[u8]) -> ReceiptAttribute {
        ReceiptAttribute {
            typ,
            version: 1,
            value: bytes::Bytes::copy_from_slice(value),
        }
    }

    fn minimal() -> Vec<ReceiptAttribute> {
        vec![
            attr(1702, b"\x0c\x01p"),
            attr(1704, b"\x16\x142024-05-01T00:00:00Z"),
        ]
    }

    #[test]
    fn malformed_identifiers_degrade() {
        let mut attributes = minimal();
        attributes.push(attr(1703, b"\x02\x01\x05"));
        attributes.push(attr(1721, b"\x02\x01\x05"));

        let purchase = InAppPurchase::from_attributes(&attributes).unwrap();
        assert_eq!(purchase.product_identifier, "p");
        assert_eq!(purchase.transaction_identifier, "");
        assert_eq!(purchase.promotional_offer_identifier, None);

        let mut attributes = minimal();
        attributes.push(attr(1721, b"\x0c\x01o"));

        let purchase = InAppPurchase::from_attributes(&attributes).unwrap();
        assert_eq!(purchase.promotional_offer_identifier.as_deref(), Some("o"));
    }

    #[test]
    fn required_fields() {
        assert!(matches!(
            InAppPurchase::from_attributes(&[]),
            Err(Error::DecodingFailed(_))
        ));
    }
}
