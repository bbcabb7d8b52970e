use std::time::Duration;

use chrono_tz::Tz;
use kuitti_printer::QrMethod;
use kuitti_printer::transport::NetworkOptions;
use shared::{DEFAULT_PAPER_WIDTH, PrintMode, PrintSettings};

use crate::printing::retry::ReconnectPolicy;
use crate::receipt::layout::ShopHeader;

/// Receipt timestamps default to the shop's local zone
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::Helsinki;

/// Edge configuration
///
/// # Environment variables
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | LOG_LEVEL | info | tracing level |
/// | LOG_DIR | - | rolling log directory |
/// | PAPER_WIDTH | 48 | characters per line |
/// | TIMEZONE | Europe/Helsinki | receipt timestamp zone |
/// | SHOP_NAME / SHOP_ADDRESS / SHOP_PHONE | - | receipt header |
/// | NETWORK_CONNECT_TIMEOUT_MS | 5000 | TCP connect timeout |
/// | NETWORK_WRITE_TIMEOUT_MS | 10000 | TCP write timeout |
/// | NETWORK_KEEP_WARM | true | keep the socket open between jobs |
/// | RECONNECT_MAX_ATTEMPTS | 3 | bounded reconnect attempts |
/// | RECONNECT_BASE_DELAY_MS | 500 | first backoff delay |
/// | RECONNECT_MAX_DELAY_MS | 8000 | backoff ceiling |
/// | STAR_QR_METHOD | sub-function | `sub-function`, `d1` or `escpos` |
/// | CLOUDPRNT_SERVER_URL | - | CloudPRNT submission server |
/// | CLOUDPRNT_TIMEOUT_MS | 10000 | HTTP timeout |
/// | BLE_SCAN_TIMEOUT_MS | 4000 | LE scan window |
/// | RFCOMM_BINDINGS | - | `MAC=/dev/rfcommN[=Name]`, comma separated |
/// | PRINTERS_FILE | printers.json | persisted printer rows |
/// | PRINT_MODE | network | `direct`, `network` or `cloudprnt` |
/// | DEFAULT_PRINTER_ID | - | printer used by `print` without `--printer` |
/// | AUTO_RECONNECT | false | reconnect before dispatch |
///
/// # Example
///
/// ```ignore
/// PRINT_MODE=cloudprnt CLOUDPRNT_SERVER_URL=https://print.example.fi kuitti-edge cloud-status
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub log_dir: Option<String>,
    pub paper_width: usize,
    pub timezone: Tz,
    pub shop_name: Option<String>,
    pub shop_address: Option<String>,
    pub shop_phone: Option<String>,

    // === Network driver ===
    pub network_connect_timeout_ms: u64,
    pub network_write_timeout_ms: u64,
    pub network_keep_warm: bool,

    // === Reconnect policy ===
    pub reconnect_max_attempts: u32,
    pub reconnect_base_delay_ms: u64,
    pub reconnect_max_delay_ms: u64,

    pub star_qr_method: QrMethod,

    // === Remote and wireless channels ===
    pub cloudprnt_server_url: Option<String>,
    pub cloudprnt_timeout_ms: u64,
    pub ble_scan_timeout_ms: u64,
    pub rfcomm_bindings: Option<String>,

    /// Persisted printer rows exported by the BaaS
    pub printers_file: String,

    // === Persisted print settings ===
    pub print_mode: PrintMode,
    pub default_printer_id: Option<String>,
    pub auto_reconnect: bool,
}

fn var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    var(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn flag(name: &str, default: bool) -> bool {
    match var(name).map(|v| v.to_ascii_lowercase()) {
        Some(v) => matches!(v.as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

impl Config {
    /// Load configuration from the environment
    ///
    /// Unset or unparsable values fall back to their defaults.
    pub fn from_env() -> Self {
        let timezone = match var("TIMEZONE") {
            Some(name) => name.parse().unwrap_or_else(|_| {
                tracing::warn!(timezone = %name, "Unknown TIMEZONE, using Europe/Helsinki");
                DEFAULT_TIMEZONE
            }),
            None => DEFAULT_TIMEZONE,
        };

        let star_qr_method = match var("STAR_QR_METHOD") {
            Some(method) => method.parse().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Invalid STAR_QR_METHOD, using sub-function");
                QrMethod::StarSubFunction
            }),
            None => QrMethod::StarSubFunction,
        };

        let print_mode = match var("PRINT_MODE") {
            Some(mode) => mode.parse().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Invalid PRINT_MODE, using network");
                PrintMode::Network
            }),
            None => PrintMode::Network,
        };

        Self {
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            log_dir: var("LOG_DIR"),
            paper_width: parse_or("PAPER_WIDTH", DEFAULT_PAPER_WIDTH),
            timezone,
            shop_name: var("SHOP_NAME"),
            shop_address: var("SHOP_ADDRESS"),
            shop_phone: var("SHOP_PHONE"),

            network_connect_timeout_ms: parse_or("NETWORK_CONNECT_TIMEOUT_MS", 5000),
            network_write_timeout_ms: parse_or("NETWORK_WRITE_TIMEOUT_MS", 10_000),
            network_keep_warm: flag("NETWORK_KEEP_WARM", true),

            reconnect_max_attempts: parse_or("RECONNECT_MAX_ATTEMPTS", 3),
            reconnect_base_delay_ms: parse_or("RECONNECT_BASE_DELAY_MS", 500),
            reconnect_max_delay_ms: parse_or("RECONNECT_MAX_DELAY_MS", 8000),

            star_qr_method,

            cloudprnt_server_url: var("CLOUDPRNT_SERVER_URL"),
            cloudprnt_timeout_ms: parse_or("CLOUDPRNT_TIMEOUT_MS", 10_000),
            ble_scan_timeout_ms: parse_or("BLE_SCAN_TIMEOUT_MS", 4000),
            rfcomm_bindings: var("RFCOMM_BINDINGS"),

            printers_file: var("PRINTERS_FILE").unwrap_or_else(|| "printers.json".into()),

            print_mode,
            default_printer_id: var("DEFAULT_PRINTER_ID"),
            auto_reconnect: flag("AUTO_RECONNECT", false),
        }
    }

    pub fn network_options(&self) -> NetworkOptions {
        NetworkOptions {
            connect_timeout: Duration::from_millis(self.network_connect_timeout_ms),
            write_timeout: Duration::from_millis(self.network_write_timeout_ms),
            keep_warm: self.network_keep_warm,
            ..NetworkOptions::default()
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            self.reconnect_max_attempts,
            Duration::from_millis(self.reconnect_base_delay_ms),
            Duration::from_millis(self.reconnect_max_delay_ms),
        )
    }

    /// Print settings from the environment; the printers file may override them
    pub fn print_settings(&self) -> PrintSettings {
        PrintSettings {
            mode: self.print_mode,
            default_printer_id: self.default_printer_id.clone(),
            auto_reconnect: self.auto_reconnect,
        }
    }

    pub fn shop_header(&self) -> Option<ShopHeader> {
        self.shop_name.as_ref().map(|name| ShopHeader {
            name: name.clone(),
            address: self.shop_address.clone(),
            phone: self.shop_phone.clone(),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
