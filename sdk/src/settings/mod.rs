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

//! Validation settings.
//!
//! Settings are plain serde structures layered with the `config` crate, so a
//! partial JSON or TOML document only overrides the keys it names.
//!
//! ```toml
//! [validation]
//! blocking = false
//! verify_hash = true
//! verify_metadata = true
//! verify_revocation = true
//! # ocsp_responder = "http://ocsp.example.com"
//! # chain_backend = "trust_store"
//!
//! [identity]
//! bundle_id = "com.example.app"
//! app_version = "1.0"
//! device_id = "6F9619FF-8B86-D011-B42D-00C04FC964FF"
//!
//! [trust]
//! trust_anchors = "AppleRootCA.pem"
//! ```

use std::path::Path;

use app_receipt_crypto::chain::{ChainBackendKind, TrustAnchors};
use config::{Config, FileFormat};
use serde::{Deserialize, Serialize};

use crate::{validation::StaticDeviceIdentifier, Error, Result};

// trait used to validate user input to make sure user supplied configurations are valid
pub(crate) trait SettingsValidate {
    // returns error if settings are invalid
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Which checks run and how.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct ValidationSettings {
    /// Run checks one after the other instead of concurrently. Blocking
    /// validation never performs an OCSP check.
    pub blocking: bool,

    /// Check that the receipt was issued to this device.
    pub verify_hash: bool,

    /// Check the bundle identifier and app version.
    pub verify_metadata: bool,

    /// Check production signing certificates with OCSP.
    pub verify_revocation: bool,

    /// Send OCSP requests here instead of the certificate's responder.
    pub ocsp_responder: Option<String>,

    /// Force a certificate chain backend instead of choosing one by
    /// environment.
    pub chain_backend: Option<ChainBackendKind>,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            blocking: false,
            verify_hash: true,
            verify_metadata: true,
            verify_revocation: true,
            ocsp_responder: None,
            chain_backend: None,
        }
    }
}

impl SettingsValidate for ValidationSettings {
    fn validate(&self) -> Result<()> {
        match &self.ocsp_responder {
            Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => Err(
                Error::Settings(format!("OCSP responder must be an HTTP URL: {url}")),
            ),
            _ => Ok(()),
        }
    }
}

/// The app and device a receipt is expected to belong to.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct IdentitySettings {
    /// Expected bundle identifier.
    pub bundle_id: Option<String>,

    /// Expected app version.
    pub app_version: Option<String>,

    /// Device identifier, as a UUID or hex string.
    pub device_id: Option<String>,
}

impl SettingsValidate for IdentitySettings {
    fn validate(&self) -> Result<()> {
        match &self.device_id {
            Some(id) if StaticDeviceIdentifier::parse(id).is_none() => Err(Error::Settings(
                format!("device identifier is neither a UUID nor hex: {id}"),
            )),
            _ => Ok(()),
        }
    }
}

/// Trust anchors for the receipt signing chain.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct TrustSettings {
    /// Root certificates as a PEM bundle, or the path of a PEM file.
    pub trust_anchors: Option<String>,
}

impl TrustSettings {
    fn load(&self) -> Result<TrustAnchors> {
        let Some(anchors) = &self.trust_anchors else {
            return Ok(TrustAnchors::new());
        };

        let pem = if anchors.contains("-----BEGIN") {
            // allow for JSON-encoded PEMs with \n
            anchors.replace("\\n", "\n").into_bytes()
        } else {
            std::fs::read(anchors.trim())?
        };

        let anchors = TrustAnchors::from_pem(&pem)
            .map_err(|e| Error::Settings(format!("could not load trust anchors: {e}")))?;

        if anchors.is_empty() {
            return Err(Error::Settings("no certificates in trust anchors".into()));
        }

        Ok(anchors)
    }
}

impl SettingsValidate for TrustSettings {
    fn validate(&self) -> Result<()> {
        self.load().map(|_| ())
    }
}

/// All settings.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Which checks run and how.
    pub validation: ValidationSettings,

    /// Expected app and device.
    pub identity: IdentitySettings,

    /// Trust anchors.
    pub trust: TrustSettings,
}

impl Settings {
    /// Default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overlay a JSON document on these settings.
    pub fn with_json(self, json: &str) -> Result<Self> {
        self.with_string(json, FileFormat::Json)
    }

    /// Overlay a TOML document on these settings.
    pub fn with_toml(self, toml: &str) -> Result<Self> {
        self.with_string(toml, FileFormat::Toml)
    }

    /// Overlay a settings file. The format is taken from the `.json` or
    /// `.toml` extension.
    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Result<Self> {
        let path = path.as_ref();
        let format = match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => FileFormat::Json,
            Some(ext) if ext.eq_ignore_ascii_case("toml") => FileFormat::Toml,
            _ => {
                return Err(Error::Settings(
                    "settings file must have json or toml extension".into(),
                ))
            }
        };

        let settings_buf = std::fs::read(path)?;
        self.with_string(&String::from_utf8_lossy(&settings_buf), format)
    }

    fn with_string(self, settings_str: &str, format: FileFormat) -> Result<Self> {
        let current_config =
            Config::try_from(&self).map_err(|e| Error::Settings(e.to_string()))?;

        let updated_config = Config::builder()
            .add_source(current_config)
            .add_source(config::File::from_str(settings_str, format))
            .build()
            .map_err(|e| Error::Settings(format!("could not parse configuration: {e}")))?;

        let settings = updated_config
            .try_deserialize::<Settings>()
            .map_err(|e| Error::Settings(e.to_string()))?;

        settings.validate()?;

        Ok(settings)
    }

    /// Set one value by its dotted path, for example
    /// `"validation.blocking"`.
    pub fn with_value<T: Into<config::Value>>(self, path: &str, value: T) -> Result<Self> {
        let config = Config::try_from(&self).map_err(|e| Error::Settings(e.to_string()))?;

        let updated_config = Config::builder()
            .add_source(config)
            .set_override(path, value)
            .map_err(|e| Error::Settings(format!("invalid path '{path}': {e}")))?
            .build()
            .map_err(|e| Error::Settings(e.to_string()))?;

        let updated_settings = updated_config
            .try_deserialize::<Settings>()
            .map_err(|e| Error::Settings(format!("invalid value for '{path}': {e}")))?;

        updated_settings.validate()?;

        Ok(updated_settings)
    }

    /// Load the configured trust anchors. No configured anchors yields an
    /// empty set.
    pub fn trust_anchors(&self) -> Result<TrustAnchors> {
        self.trust.load()
    }

    /// The configured device identifier, if any.
    pub fn device_identifier(&self) -> Result<Option<StaticDeviceIdentifier>> {
        match &self.identity.device_id {
            Some(id) => StaticDeviceIdentifier::parse(id)
                .map(Some)
                .ok_or_else(|| Error::Settings(format!("invalid device identifier: {id}"))),
            None => Ok(None),
        }
    }
}

impl SettingsValidate for Settings {
    fn validate(&self) -> Result<()> {
        self.validation.validate()?;
        self.identity.validate()?;
        self.trust.validate()
    }
}
