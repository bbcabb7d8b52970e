//! Persisted printer configuration
//!
//! The BaaS stores printers and print settings as snake_case rows. They are
//! converted into the canonical model here and nowhere else.
//!
//! ```json
//! {
//!   "printers": [
//!     { "id": "kitchen", "name": "Keittiö", "connection_type": "network",
//!       "printer_type": "escpos", "ip_address": "192.168.1.50", "port": 9100 }
//!   ],
//!   "settings": { "printer_mode": "network", "default_printer_id": "kitchen",
//!                 "auto_reconnect": true }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use shared::{
    ConnectionState, DEFAULT_PAPER_WIDTH, PrintMode, PrintSettings, PrinterCapabilities,
    PrinterDevice, PrinterFamily, TransportKind,
};
use tracing::{info, warn};

use crate::core::{EdgeError, Result};

/// Printer row as stored by the BaaS
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrinterRow {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub connection_type: String,
    #[serde(default)]
    pub printer_type: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub mac_address: Option<String>,
    /// OS queue name for direct printing
    #[serde(default)]
    pub queue_name: Option<String>,
    #[serde(default)]
    pub paper_width: Option<usize>,
    #[serde(default)]
    pub supports_qr: Option<bool>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Print settings row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrintSettingsRow {
    #[serde(default)]
    pub printer_mode: Option<String>,
    #[serde(default)]
    pub default_printer_id: Option<String>,
    #[serde(default)]
    pub auto_reconnect: Option<bool>,
}

/// Layout of the printers file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrintersFile {
    #[serde(default)]
    pub printers: Vec<PrinterRow>,
    #[serde(default)]
    pub settings: Option<PrintSettingsRow>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl TryFrom<PrinterRow> for PrinterDevice {
    type Error = EdgeError;

    fn try_from(row: PrinterRow) -> Result<Self> {
        let kind: TransportKind = row
            .connection_type
            .parse()
            .map_err(|e| EdgeError::Persistence(format!("printer {}: {}", row.name, e)))?;
        let family = match non_empty(row.printer_type) {
            Some(t) => t
                .parse::<PrinterFamily>()
                .map_err(|e| EdgeError::Persistence(format!("printer {}: {}", row.name, e)))?,
            None => PrinterFamily::default(),
        };

        let address = match kind {
            TransportKind::Network => non_empty(row.ip_address),
            TransportKind::BluetoothClassic | TransportKind::BluetoothLe | TransportKind::CloudPrnt => {
                non_empty(row.mac_address)
            }
            TransportKind::Direct => non_empty(row.queue_name).or_else(|| Some(row.name.clone())),
        }
        .ok_or_else(|| {
            EdgeError::Persistence(format!("printer {} has no address for {}", row.name, kind))
        })?;

        let mut device = match kind {
            TransportKind::Network => PrinterDevice::network(row.name.clone(), address, row.port),
            _ => PrinterDevice::with_address(row.name.clone(), kind, address),
        };
        if let Some(id) = non_empty(row.id) {
            device.id = id;
        }
        device.printer_family = family;
        device.capabilities = PrinterCapabilities {
            paper_width: row.paper_width.filter(|w| *w > 0).unwrap_or(DEFAULT_PAPER_WIDTH),
            supports_qr: row.supports_qr.unwrap_or(true),
        };
        device.connection_state = ConnectionState::Disconnected;
        device.is_active = row.is_active.unwrap_or(true);
        Ok(device)
    }
}

impl From<&PrinterDevice> for PrinterRow {
    fn from(device: &PrinterDevice) -> Self {
        let mut row = PrinterRow {
            id: Some(device.id.clone()),
            name: device.name.clone(),
            connection_type: match device.transport_kind {
                TransportKind::Network => "network",
                TransportKind::BluetoothClassic => "bluetooth_classic",
                TransportKind::BluetoothLe => "bluetooth_le",
                TransportKind::Direct => "direct",
                TransportKind::CloudPrnt => "cloudprnt",
            }
            .to_string(),
            printer_type: Some(device.printer_family.as_str().to_string()),
            paper_width: Some(device.capabilities.paper_width),
            supports_qr: Some(device.capabilities.supports_qr),
            is_active: Some(device.is_active),
            ..Default::default()
        };
        match device.transport_kind {
            TransportKind::Network => {
                row.ip_address = Some(device.address.clone());
                row.port = Some(device.network_port());
            }
            TransportKind::Direct => row.queue_name = Some(device.address.clone()),
            _ => row.mac_address = Some(device.address.clone()),
        }
        row
    }
}

impl TryFrom<PrintSettingsRow> for PrintSettings {
    type Error = EdgeError;

    fn try_from(row: PrintSettingsRow) -> Result<Self> {
        let mode = match non_empty(row.printer_mode) {
            Some(mode) => mode
                .parse::<PrintMode>()
                .map_err(|e| EdgeError::Persistence(e.to_string()))?,
            None => PrintMode::default(),
        };
        Ok(PrintSettings {
            mode,
            default_printer_id: non_empty(row.default_printer_id),
            auto_reconnect: row.auto_reconnect.unwrap_or(false),
        })
    }
}

impl From<&PrintSettings> for PrintSettingsRow {
    fn from(settings: &PrintSettings) -> Self {
        PrintSettingsRow {
            printer_mode: Some(settings.mode.as_str().to_string()),
            default_printer_id: settings.default_printer_id.clone(),
            auto_reconnect: Some(settings.auto_reconnect),
        }
    }
}

/// Printers and settings loaded from disk
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    pub printers: Vec<PrinterDevice>,
    pub settings: Option<PrintSettings>,
}

/// Load the printers file; a missing file is an empty configuration
///
/// Rows that cannot be converted are skipped with a warning so one bad
/// record does not take every printer offline.
pub fn load_printers_file(path: &Path) -> Result<LoadedConfig> {
    if !path.exists() {
        info!(path = %path.display(), "No printers file, starting empty");
        return Ok(LoadedConfig::default());
    }

    let raw = std::fs::read_to_string(path)?;
    let file: PrintersFile = serde_json::from_str(&raw)
        .map_err(|e| EdgeError::Persistence(format!("{}: {}", path.display(), e)))?;

    let mut printers = Vec::with_capacity(file.printers.len());
    for row in file.printers {
        let name = row.name.clone();
        match PrinterDevice::try_from(row) {
            Ok(device) => printers.push(device),
            Err(e) => warn!(printer = %name, error = %e, "Skipping printer row"),
        }
    }
    let settings = file.settings.map(PrintSettings::try_from).transpose()?;

    info!(path = %path.display(), printers = printers.len(), "Printers file loaded");
    Ok(LoadedConfig { printers, settings })
}

/// Write the printers file, replacing it atomically
pub fn save_printers_file(
    path: &Path,
    printers: &[PrinterDevice],
    settings: Option<&PrintSettings>,
) -> Result<()> {
    let file = PrintersFile {
        printers: printers.iter().map(PrinterRow::from).collect(),
        settings: settings.map(PrintSettingsRow::from),
    };
    let json = serde_json::to_string_pretty(&file)?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_convert_to_canonical_devices() {
        let row = PrinterRow {
            name: "Keittiö".into(),
            connection_type: "network".into(),
            printer_type: Some("star".into()),
            ip_address: Some("192.168.1.50".into()),
            ..Default::default()
        };
        let device = PrinterDevice::try_from(row).unwrap();
        assert_eq!(device.id, "192.168.1.50:9100");
        assert_eq!(device.printer_family, PrinterFamily::Star);
        assert!(device.is_active);

        let row = PrinterRow {
            id: Some("bt-1".into()),
            name: "Mobiili".into(),
            connection_type: "bluetooth_classic".into(),
            mac_address: Some("00:11:22:33:44:55".into()),
            paper_width: Some(32),
            ..Default::default()
        };
        let device = PrinterDevice::try_from(row).unwrap();
        assert_eq!(device.id, "bt-1");
        assert_eq!(device.address, "00:11:22:33:44:55");
        assert_eq!(device.capabilities.paper_width, 32);
    }

    #[test]
    fn test_bad_rows_are_rejected() {
        let missing_ip = PrinterRow {
            name: "X".into(),
            connection_type: "network".into(),
            ..Default::default()
        };
        assert!(matches!(
            PrinterDevice::try_from(missing_ip),
            Err(EdgeError::Persistence(_))
        ));

        let unknown = PrinterRow {
            name: "X".into(),
            connection_type: "usb".into(),
            ..Default::default()
        };
        assert!(PrinterDevice::try_from(unknown).is_err());
    }

    #[test]
    fn test_device_survives_row_round_trip() {
        let device = PrinterDevice::with_address("Pilvi", TransportKind::CloudPrnt, "00:11:62:AA:BB:CC")
            .with_family(PrinterFamily::Star);
        let back = PrinterDevice::try_from(PrinterRow::from(&device)).unwrap();
        assert_eq!(back, device);
    }

    #[test]
    fn test_settings_row() {
        let settings = PrintSettings::try_from(PrintSettingsRow {
            printer_mode: Some("cloudprnt".into()),
            default_printer_id: Some(" ".into()),
            auto_reconnect: Some(true),
        })
        .unwrap();
        assert_eq!(settings.mode, PrintMode::CloudPrnt);
        assert_eq!(settings.default_printer_id, None);
        assert!(settings.auto_reconnect);
    }

    #[test]
    fn test_printers_file_load_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("printers.json");

        let empty = load_printers_file(&path).unwrap();
        assert!(empty.printers.is_empty());
        assert!(empty.settings.is_none());

        std::fs::write(
            &path,
            r#"{
                "printers": [
                    { "name": "Keittiö", "connection_type": "network",
                      "ip_address": "192.168.1.50", "port": 9101 },
                    { "name": "Rikki", "connection_type": "usb" }
                ],
                "settings": { "printer_mode": "network", "auto_reconnect": true }
            }"#,
        )
        .unwrap();
        let loaded = load_printers_file(&path).unwrap();
        assert_eq!(loaded.printers.len(), 1);
        assert_eq!(loaded.printers[0].id, "192.168.1.50:9101");
        assert!(loaded.settings.as_ref().unwrap().auto_reconnect);

        save_printers_file(&path, &loaded.printers, loaded.settings.as_ref()).unwrap();
        let reloaded = load_printers_file(&path).unwrap();
        assert_eq!(reloaded.printers, loaded.printers);
        assert_eq!(reloaded.settings, loaded.settings);
    }
}
