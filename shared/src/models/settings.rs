//! Print Settings Model
//!
//! Persisted by the BaaS, consumed here as plain configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::printer::{ParseModelError, TransportKind};

/// How receipts leave the till
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrintMode {
    Direct,
    #[default]
    Network,
    #[serde(rename = "cloudprnt")]
    CloudPrnt,
}

impl PrintMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrintMode::Direct => "direct",
            PrintMode::Network => "network",
            PrintMode::CloudPrnt => "cloudprnt",
        }
    }

    /// Whether a printer reached over `kind` serves this mode
    ///
    /// Bluetooth printers are locally attached, so they serve network mode.
    pub fn accepts(&self, kind: TransportKind) -> bool {
        match self {
            PrintMode::Direct => kind == TransportKind::Direct,
            PrintMode::Network => matches!(
                kind,
                TransportKind::Network | TransportKind::BluetoothClassic | TransportKind::BluetoothLe
            ),
            PrintMode::CloudPrnt => kind == TransportKind::CloudPrnt,
        }
    }
}

impl fmt::Display for PrintMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrintMode {
    type Err = ParseModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(PrintMode::Direct),
            "network" => Ok(PrintMode::Network),
            "cloudprnt" | "cloud" => Ok(PrintMode::CloudPrnt),
            _ => Err(ParseModelError {
                kind: "print mode",
                value: s.to_string(),
            }),
        }
    }
}

/// Persisted printer configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintSettings {
    pub mode: PrintMode,
    pub default_printer_id: Option<String>,
    pub auto_reconnect: bool,
}
