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

use bytes::Bytes;
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Serialize, Serializer};

use super::{
    attribute::{decode_attribute_set, ReceiptAttribute},
    InAppPurchase,
};
use crate::{Error, Result};

/// The App Store environment a receipt was issued in.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Environment {
    /// Live App Store purchases.
    Production,

    /// Sandbox purchases made by an app installed from the App Store.
    ProductionSandbox,

    /// Sandbox purchases.
    Sandbox,

    /// StoreKit testing in Xcode.
    Xcode,

    /// Any other value, kept as found. An absent environment is
    /// `Unknown("")`.
    Unknown(String),
}

impl Environment {
    /// Whether receipts from this environment are signed for testing rather
    /// than by the live App Store.
    pub fn is_sandbox(&self) -> bool {
        matches!(self, Self::Sandbox | Self::ProductionSandbox | Self::Xcode)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::Unknown(String::new())
    }
}

impl From<&str> for Environment {
    fn from(s: &str) -> Self {
        match s {
            "Production" => Self::Production,
            "ProductionSandbox" => Self::ProductionSandbox,
            "Sandbox" => Self::Sandbox,
            "Xcode" => Self::Xcode,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Production => write!(f, "Production"),
            Self::ProductionSandbox => write!(f, "ProductionSandbox"),
            Self::Sandbox => write!(f, "Sandbox"),
            Self::Xcode => write!(f, "Xcode"),
            Self::Unknown(s) => write!(f, "{s}"),
        }
    }
}

impl Serialize for Environment {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The decoded body of a receipt.
///
/// Fields that take part in cryptographic checks keep the bytes they were
/// decoded from: [`bundle_identifier_data`](Self::bundle_identifier_data)
/// feeds the device hash and [`raw`](Self::raw) is what the signature covers.
#[derive(Clone, Debug, Serialize)]
pub struct ReceiptPayload {
    /// Environment the receipt was issued in.
    pub environment: Environment,

    /// App Store identifier of the app.
    pub app_store_id: Option<i64>,

    /// Bundle identifier of the app.
    pub bundle_identifier: String,

    /// The encoded bundle identifier value, exactly as found.
    #[serde(serialize_with = "as_hex")]
    pub bundle_identifier_data: Bytes,

    /// App version the receipt was issued for.
    pub app_version: String,

    /// Opaque value used when computing the device hash.
    #[serde(serialize_with = "as_hex")]
    pub opaque_value: Bytes,

    /// SHA-1 hash binding the receipt to a device.
    #[serde(serialize_with = "as_hex")]
    pub receipt_hash: Bytes,

    /// When the request that produced this receipt was made.
    pub request_date: Option<DateTime<Utc>>,

    /// Version of the tool that fulfilled the purchase.
    pub fulfillment_tool_version: Option<i64>,

    /// Age rating of the app.
    pub age_rating: Option<String>,

    /// Developer account identifier.
    pub developer_id: Option<i64>,

    /// When the receipt was created.
    pub creation_date: DateTime<Utc>,

    /// Download identifier.
    pub download_id: Option<i64>,

    /// Installer version identifier.
    pub installer_version_id: Option<i64>,

    /// In-app purchases, in the order they appear.
    pub purchases: Vec<InAppPurchase>,

    /// When the app was first purchased.
    pub original_purchase_date: Option<DateTime<Utc>>,

    /// Version of the app that was originally purchased.
    pub original_app_version: Option<String>,

    /// When a Volume Purchase Program receipt expires.
    pub expiration_date: Option<DateTime<Utc>>,

    /// The encoded payload.
    #[serde(skip)]
    pub raw: Bytes,
}

impl ReceiptPayload {
    /// Decode a payload from its encoded attribute set.
    pub fn decode(raw: Bytes) -> Result<Self> {
        let attributes = decode_attribute_set(raw.clone()).map_err(|e| {
            debug!("payload is not an attribute set: {e}");
            Error::PayloadMissingOrInvalid
        })?;

        let mut payload = PartialPayload::default();
        for attr in &attributes {
            payload.apply(attr)?;
        }

        payload.finish(raw)
    }
}

#[derive(Default)]
struct PartialPayload {
    environment: Environment,
    app_store_id: Option<i64>,
    bundle_identifier: Option<(String, Bytes)>,
    app_version: Option<String>,
    opaque_value: Option<Bytes>,
    receipt_hash: Option<Bytes>,
    request_date: Option<DateTime<Utc>>,
    fulfillment_tool_version: Option<i64>,
    age_rating: Option<String>,
    developer_id: Option<i64>,
    creation_date: Option<DateTime<Utc>>,
    download_id: Option<i64>,
    installer_version_id: Option<i64>,
    purchases: Vec<InAppPurchase>,
    original_purchase_date: Option<DateTime<Utc>>,
    original_app_version: Option<String>,
    expiration_date: Option<DateTime<Utc>>,
}

impl PartialPayload {
    fn apply(&mut self, attr: &ReceiptAttribute) -> Result<()> {
        match attr.typ {
            0 => self.environment = Environment::from(attr.string()?.as_str()),
            1 => self.app_store_id = Some(attr.integer()?),
            2 => self.bundle_identifier = Some((attr.string()?, attr.value.clone())),
            3 => self.app_version = Some(attr.string()?),
            4 => self.opaque_value = Some(attr.value.clone()),
            5 => self.receipt_hash = Some(attr.value.clone()),
            8 => self.request_date = attr.optional_date(),
            9 => self.fulfillment_tool_version = Some(attr.integer()?),
            10 => self.age_rating = Some(attr.string()?),
            11 => self.developer_id = Some(attr.integer()?),
            12 => self.creation_date = Some(attr.date()?),
            15 => self.download_id = Some(attr.integer()?),
            16 => self.installer_version_id = Some(attr.integer()?),
            17 => {
                let purchase = InAppPurchase::from_attributes(&attr.attributes()?)?;
                self.purchases.push(purchase);
            }
            18 => self.original_purchase_date = attr.optional_date(),
            19 => self.original_app_version = Some(attr.string()?),
            21 => self.expiration_date = attr.optional_date(),
            _ => {}
        }

        Ok(())
    }

    fn finish(self, raw: Bytes) -> Result<ReceiptPayload> {
        let (bundle_identifier, bundle_identifier_data) =
            self.bundle_identifier.ok_or_else(|| missing("bundle identifier"))?;

        Ok(ReceiptPayload {
            environment: self.environment,
            app_store_id: self.app_store_id,
            bundle_identifier,
            bundle_identifier_data,
            app_version: self.app_version.ok_or_else(|| missing("app version"))?,
            opaque_value: self.opaque_value.ok_or_else(|| missing("opaque value"))?,
            receipt_hash: self.receipt_hash.ok_or_else(|| missing("receipt hash"))?,
            request_date: self.request_date,
            fulfillment_tool_version: self.fulfillment_tool_version,
            age_rating: self.age_rating,
            developer_id: self.developer_id,
            creation_date: self.creation_date.ok_or_else(|| missing("creation date"))?,
            download_id: self.download_id,
            installer_version_id: self.installer_version_id,
            purchases: self.purchases,
            original_purchase_date: self.original_purchase_date,
            original_app_version: self.original_app_version,
            expiration_date: self.expiration_date,
            raw,
        })
    }
}

fn missing(field: &str) -> Error {
    Error::DecodingFailed(format!("receipt has no {field}"))
}

fn as_hex<S: Serializer>(bytes: &Bytes, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(bytes))
}
