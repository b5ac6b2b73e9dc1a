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

#![doc = include_str!("../README.md")]

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use app_receipt::{Error, Receipt, ReceiptValidator, Settings};
use clap::Parser;
use log::debug;
use serde_json::json;

/// Tool for decoding and validating App Store receipts.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct CliArgs {
    /// Path to the receipt file.
    path: PathBuf,

    /// The file holds base64 text instead of binary DER.
    #[arg(long)]
    base64: bool,

    /// Validate the receipt and report the outcome.
    #[arg(long)]
    validate: bool,

    /// Path to a JSON or TOML settings file.
    #[arg(long, env = "RECEIPT_TOOL_SETTINGS")]
    settings: Option<PathBuf>,

    /// Expected bundle identifier.
    #[arg(long)]
    bundle_id: Option<String>,

    /// Expected app version.
    #[arg(long)]
    app_version: Option<String>,

    /// Device identifier as a UUID or hex string.
    #[arg(long)]
    device_id: Option<String>,

    /// Path to a PEM file of trusted root certificates.
    #[arg(long, env = "RECEIPT_TOOL_TRUST_ANCHORS")]
    anchors: Option<PathBuf>,

    /// Run checks one after the other, without an OCSP check.
    #[arg(long)]
    blocking: bool,

    /// Do not check the device hash.
    #[arg(long)]
    skip_hash: bool,

    /// Do not check the bundle identifier and app version.
    #[arg(long)]
    skip_metadata: bool,

    /// Do not check the signing certificate with OCSP.
    #[arg(long)]
    skip_revocation: bool,
}

impl CliArgs {
    fn settings(&self) -> Result<Settings> {
        let mut settings = Settings::new();

        if let Some(path) = &self.settings {
            settings = settings
                .with_file(path)
                .with_context(|| format!("loading settings from {}", path.display()))?;
        }

        if let Some(bundle_id) = &self.bundle_id {
            settings = settings.with_value("identity.bundle_id", bundle_id.as_str())?;
        }
        if let Some(app_version) = &self.app_version {
            settings = settings.with_value("identity.app_version", app_version.as_str())?;
        }
        if let Some(device_id) = &self.device_id {
            settings = settings.with_value("identity.device_id", device_id.as_str())?;
        }
        if let Some(anchors) = &self.anchors {
            settings = settings
                .with_value("trust.trust_anchors", anchors.display().to_string())?;
        }
        if self.blocking {
            settings = settings.with_value("validation.blocking", true)?;
        }
        if self.skip_hash {
            settings = settings.with_value("validation.verify_hash", false)?;
        }
        if self.skip_metadata {
            settings = settings.with_value("validation.verify_metadata", false)?;
        }
        if self.skip_revocation {
            settings = settings.with_value("validation.verify_revocation", false)?;
        }

        Ok(settings)
    }
}

fn load_receipt(args: &CliArgs) -> Result<Receipt> {
    let receipt = if args.base64 {
        let text = std::fs::read_to_string(&args.path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound,
            _ => Error::Io(e),
        });
        text.and_then(|text| Receipt::from_base64(&text))
    } else {
        Receipt::from_file(&args.path)
    };

    // Map some errors to strings we expect
    receipt.map_err(|e| match e {
        Error::NotFound => anyhow!("file not found: {}", args.path.display()),
        _ => anyhow!("could not decode receipt: {e}"),
    })
}

fn main() -> Result<()> {
    let args = CliArgs::parse();

    // set RUST_LOG=debug to get detailed debug logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("error")).init();

    let receipt = load_receipt(&args)?;

    if !args.validate {
        println!("{}", serde_json::to_string_pretty(&receipt)?);
        return Ok(());
    }

    let settings = args.settings()?;
    let outcome = match ReceiptValidator::from_settings(&settings, receipt.environment()) {
        Ok(validator) if settings.validation.blocking => validator.validate_blocking(&receipt),
        Ok(validator) => {
            debug!("validating with {validator:?}");
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(validator.validate(&receipt))
        }
        Err(err) => Err(err),
    };

    let report = json!({
        "receipt": receipt,
        "validation": {
            "valid": outcome.is_ok(),
            "error": outcome.as_ref().err().map(|e| e.to_string()),
        },
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    outcome.map_err(|e| anyhow!("receipt is not valid: {e}"))
}
