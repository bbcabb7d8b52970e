//! Printer Device Model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default raw TCP port for network printers
pub const DEFAULT_NETWORK_PORT: u16 = 9100;

/// Characters per line on 80mm paper
pub const DEFAULT_PAPER_WIDTH: usize = 48;

/// Value could not be parsed into a model enum
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct ParseModelError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseModelError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Physical channel used to reach a printer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransportKind {
    Network,
    BluetoothClassic,
    #[serde(rename = "bluetoothLE")]
    BluetoothLe,
    Direct,
    CloudPrnt,
}

impl TransportKind {
    pub const ALL: [TransportKind; 5] = [
        TransportKind::Network,
        TransportKind::BluetoothClassic,
        TransportKind::BluetoothLe,
        TransportKind::Direct,
        TransportKind::CloudPrnt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Network => "network",
            TransportKind::BluetoothClassic => "bluetoothClassic",
            TransportKind::BluetoothLe => "bluetoothLE",
            TransportKind::Direct => "direct",
            TransportKind::CloudPrnt => "cloudPrnt",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = ParseModelError;

    /// Accepts both the camelCase wire names and the snake_case DB names
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "network" | "tcp" => Ok(TransportKind::Network),
            "bluetoothclassic" | "bluetooth" | "bt" => Ok(TransportKind::BluetoothClassic),
            "bluetoothle" | "ble" => Ok(TransportKind::BluetoothLe),
            "direct" | "system" => Ok(TransportKind::Direct),
            "cloudprnt" | "cloud" => Ok(TransportKind::CloudPrnt),
            _ => Err(ParseModelError::new("transport", s)),
        }
    }
}

/// Command set spoken by the printer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrinterFamily {
    Star,
    #[default]
    Escpos,
}

impl PrinterFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrinterFamily::Star => "star",
            PrinterFamily::Escpos => "escpos",
        }
    }
}

impl fmt::Display for PrinterFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrinterFamily {
    type Err = ParseModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', '-', '/'], "").as_str() {
            "star" | "starprnt" => Ok(PrinterFamily::Star),
            "escpos" | "epson" | "generic" => Ok(PrinterFamily::Escpos),
            _ => Err(ParseModelError::new("printer family", s)),
        }
    }
}

/// Connection state, owned by the printer registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionState {
    /// Whether the state machine allows moving from `self` to `next`
    ///
    /// ```text
    /// disconnected --connect--> connecting --ok--> connected
    /// connecting --fail--> error --retry--> connecting
    /// connected --disconnect / send failure--> disconnected
    /// error --disconnect--> disconnected
    /// ```
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Error)
                | (Error, Connecting)
                | (Error, Disconnected)
                | (Connected, Disconnected)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the printer can do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrinterCapabilities {
    /// Paper width in characters (32 for 58mm, 48 for 80mm)
    pub paper_width: usize,
    pub supports_qr: bool,
}

impl Default for PrinterCapabilities {
    fn default() -> Self {
        Self {
            paper_width: DEFAULT_PAPER_WIDTH,
            supports_qr: true,
        }
    }
}

/// A physical or virtual printer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrinterDevice {
    /// Stable id: transport address or MAC
    pub id: String,
    pub name: String,
    pub transport_kind: TransportKind,
    pub printer_family: PrinterFamily,
    /// IP / hostname, Bluetooth MAC, OS queue name or CloudPRNT MAC
    pub address: String,
    /// Network printers only
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub connection_state: ConnectionState,
    #[serde(default)]
    pub capabilities: PrinterCapabilities,
    /// Removed devices are deactivated, never deleted
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl PrinterDevice {
    /// Create a network printer; the id is `address:port`
    pub fn network(name: impl Into<String>, address: impl Into<String>, port: Option<u16>) -> Self {
        let address = address.into();
        let port = port.unwrap_or(DEFAULT_NETWORK_PORT);
        Self {
            id: format!("{}:{}", address, port),
            name: name.into(),
            transport_kind: TransportKind::Network,
            printer_family: PrinterFamily::Escpos,
            address,
            port: Some(port),
            connection_state: ConnectionState::Disconnected,
            capabilities: PrinterCapabilities::default(),
            is_active: true,
        }
    }

    /// Create a printer reached by MAC or queue name; the id is the address
    pub fn with_address(
        name: impl Into<String>,
        transport_kind: TransportKind,
        address: impl Into<String>,
    ) -> Self {
        let address = address.into();
        Self {
            id: address.clone(),
            name: name.into(),
            transport_kind,
            printer_family: PrinterFamily::Escpos,
            address,
            port: None,
            connection_state: ConnectionState::Disconnected,
            capabilities: PrinterCapabilities::default(),
            is_active: true,
        }
    }

    pub fn with_family(mut self, family: PrinterFamily) -> Self {
        self.printer_family = family;
        self
    }

    pub fn with_capabilities(mut self, capabilities: PrinterCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// TCP port, falling back to 9100
    pub fn network_port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_NETWORK_PORT)
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state == ConnectionState::Connected
    }
}
