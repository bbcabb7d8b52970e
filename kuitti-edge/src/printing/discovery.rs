//! Discovery ingestion
//!
//! Drivers report what they see as a finite stream of events; the registry
//! consumes it here. Nothing calls back into the caller.

use futures::stream::{BoxStream, StreamExt};
use kuitti_printer::DiscoveryEvent;
use shared::{PrinterDevice, TransportKind};
use tracing::{info, warn};

use super::registry::PrinterRegistry;

/// What one discovery pass found
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DiscoveryReport {
    /// Newly registered or refreshed devices
    pub found: Vec<PrinterDevice>,
    /// Seen but not offered (address, reason)
    pub skipped: Vec<(String, String)>,
    /// Channels that could not scan (kind, reason)
    pub unavailable: Vec<(TransportKind, String)>,
}

/// Drain a discovery stream into the registry
///
/// Devices already known keep their connection state and id. Devices the
/// operator removed stay removed and are reported as skipped.
pub async fn ingest(
    registry: &PrinterRegistry,
    mut events: BoxStream<'static, DiscoveryEvent>,
) -> DiscoveryReport {
    let mut report = DiscoveryReport::default();

    while let Some(event) = events.next().await {
        match event {
            DiscoveryEvent::Found(device) => {
                if registry.get(&device.id).is_some_and(|known| !known.is_active) {
                    info!(device_id = %device.id, "Removed printer seen again, not restoring");
                    report
                        .skipped
                        .push((device.address, "removed by operator".to_string()));
                    continue;
                }
                let device = registry.register(PrinterDevice {
                    is_active: true,
                    ..device
                });
                info!(device_id = %device.id, name = %device.name, "Printer discovered");
                report.found.push(device);
            }
            DiscoveryEvent::Skipped { address, reason } => {
                warn!(address = %address, reason = %reason, "Discovery result skipped");
                report.skipped.push((address, reason));
            }
            DiscoveryEvent::Unavailable { kind, reason } => {
                warn!(transport = %kind, reason = %reason, "Discovery unavailable");
                report.unavailable.push((kind, reason));
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use shared::ConnectionState;

    #[tokio::test]
    async fn test_ingest_registers_found_devices_only() {
        let registry = PrinterRegistry::new();
        let known = PrinterDevice::network("Keittiö", "10.0.0.5", None);
        registry.register(known.clone());
        registry
            .transition(&known.id, ConnectionState::Connecting)
            .unwrap();

        let events = stream::iter(vec![
            DiscoveryEvent::Found(PrinterDevice::with_address(
                "TM-m30",
                TransportKind::BluetoothClassic,
                "00:11:22:33:44:55",
            )),
            DiscoveryEvent::Found(known.clone()),
            DiscoveryEvent::Skipped {
                address: "AA:BB:CC:DD:EE:FF".into(),
                reason: "unnamed".into(),
            },
            DiscoveryEvent::Unavailable {
                kind: TransportKind::BluetoothLe,
                reason: "Bluetooth is off".into(),
            },
        ])
        .boxed();

        let report = ingest(&registry, events).await;
        assert_eq!(report.found.len(), 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.unavailable[0].0, TransportKind::BluetoothLe);
        assert_eq!(registry.list().len(), 2);
        assert_eq!(registry.state(&known.id), Some(ConnectionState::Connecting));
        assert!(!registry.contains("AA:BB:CC:DD:EE:FF"));
    }

    #[tokio::test]
    async fn test_removed_printer_stays_removed() {
        let registry = PrinterRegistry::new();
        let removed = PrinterDevice::network("Keittiö", "10.0.0.5", None);
        registry.register(removed.clone());
        registry.deactivate(&removed.id).unwrap();

        let events = stream::iter(vec![DiscoveryEvent::Found(removed.clone())]).boxed();
        let report = ingest(&registry, events).await;

        assert!(report.found.is_empty());
        assert_eq!(report.skipped, vec![("10.0.0.5".to_string(), "removed by operator".to_string())]);
        assert!(!registry.get(&removed.id).unwrap().is_active);
    }
}
