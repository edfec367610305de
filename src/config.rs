use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::agent::Cadence;

/// Vendor allow-list: only invoices from known vendors are payable.
///
/// Parsed from `VENDOR_ALLOWLIST`, e.g. `"Acme Corp=sei1abc,Globex Inc=sei1def"`.
#[derive(Debug, Clone, Default)]
pub struct VendorAllowlist {
    entries: HashMap<String, String>,
}

impl VendorAllowlist {
    pub fn parse(raw: &str) -> Result<Self, config::ConfigError> {
        let mut entries = HashMap::new();
        for pair in raw.split(',').filter(|p| !p.trim().is_empty()) {
            let (name, address) = pair.split_once('=').ok_or_else(|| {
                config::ConfigError::Message(format!(
                    "vendor allowlist entry missing '=': {}",
                    pair
                ))
            })?;
            let name = name.trim();
            let address = address.trim();
            if name.is_empty() || address.is_empty() {
                return Err(config::ConfigError::Message(format!(
                    "vendor allowlist entry has empty name or address: {}",
                    pair
                )));
            }
            entries.insert(name.to_string(), address.to_string());
        }
        Ok(Self { entries })
    }

    /// Look up the payment address for a vendor name.
    pub fn resolve(&self, vendor_name: &str) -> Option<&str> {
        self.entries.get(vendor_name.trim()).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    /// Base URL of the signer sidecar that builds, signs and broadcasts
    /// transactions against the chain and the lending pool.
    pub signer_url: String,
    /// Stablecoin denom used for all amounts.
    pub denom: String,
    /// Smallest-unit scaling: 6 means 1.0 == 1_000_000 base units.
    pub decimals: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    pub api_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    /// Days before the due date at which payment execution triggers.
    pub payment_buffer_days: i64,
    /// Minimum operating balance retained outside the yield pool.
    pub treasury_keep_threshold: Decimal,
    /// How far ahead the rebalancer looks for scheduled payments when
    /// deciding whether to replenish the operating balance.
    pub liquidity_lookahead_hours: i64,
    pub invoice_check_cadence: Cadence,
    pub treasury_cadence: Cadence,
    pub vendors: VendorAllowlist,
    pub gateway: GatewayConfig,
    pub extraction: ExtractionConfig,
    /// Directory polled for raw invoice text blobs.
    pub inbox_dir: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let payment_buffer_days = parse_var("PAYMENT_BUFFER_DAYS", 2i64)?;
        if payment_buffer_days < 0 {
            return Err(config::ConfigError::Message(
                "PAYMENT_BUFFER_DAYS must be >= 0".to_string(),
            ));
        }

        Ok(Self {
            bind_address: std::env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            payment_buffer_days,
            treasury_keep_threshold: parse_var(
                "TREASURY_KEEP_THRESHOLD",
                Decimal::new(100, 0),
            )?,
            liquidity_lookahead_hours: parse_var("LIQUIDITY_LOOKAHEAD_HOURS", 24i64)?,
            invoice_check_cadence: parse_var("INVOICE_CHECK_CADENCE", Cadence::hourly())?,
            treasury_cadence: parse_var(
                "TREASURY_CADENCE",
                Cadence::Interval { secs: 6 * 3600 },
            )?,
            vendors: VendorAllowlist::parse(
                &std::env::var("VENDOR_ALLOWLIST").unwrap_or_default(),
            )?,
            gateway: GatewayConfig {
                signer_url: std::env::var("SIGNER_URL")
                    .unwrap_or_else(|_| "http://127.0.0.1:9090".to_string()),
                denom: std::env::var("STABLECOIN_DENOM")
                    .unwrap_or_else(|_| "usei".to_string()),
                decimals: 6,
            },
            extraction: ExtractionConfig {
                api_url: std::env::var("EXTRACTION_API_URL").unwrap_or_else(|_| {
                    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-preview-05-20:generateContent"
                        .to_string()
                }),
                api_key: std::env::var("EXTRACTION_API_KEY").unwrap_or_default(),
            },
            inbox_dir: std::env::var("INVOICE_INBOX_DIR")
                .unwrap_or_else(|_| "./inbox".to_string()),
        })
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> Result<T, config::ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse::<T>().map_err(|e| {
            config::ConfigError::Message(format!("invalid {}: {}", key, e))
        }),
        Err(_) => Ok(default),
    }
}
