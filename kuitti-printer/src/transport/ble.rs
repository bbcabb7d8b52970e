//! Bluetooth LE (GATT) printers
//!
//! Experimental. Connect, discover services, then write the payload in
//! small chunks to a writable characteristic. Which characteristic accepts
//! print data is model-specific; a short list of UUIDs used by common
//! printer modules is tried first, then any writable characteristic.
//!
//! The radio itself sits behind [`GattCentral`]; without one the driver
//! reports the transport as unavailable.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use shared::{ConnectionState, PrintJob, PrinterDevice, TransportKind};
use tracing::{debug, info, instrument, warn};

use super::{Delivery, DiscoveryEvent, Session, SessionHandle, Transport};
use crate::error::{PrintError, PrintResult};

/// Default ATT payload (23-byte MTU minus header)
pub const DEFAULT_CHUNK_SIZE: usize = 20;

/// Write characteristics of common printer modules
pub const KNOWN_PRINT_CHARACTERISTICS: &[&str] = &[
    // ISSC / Microchip transparent UART
    "49535343-8841-43f4-a8d4-ecbe34729bb3",
    "0000ff02-0000-1000-8000-00805f9b34fb",
    "0000fff2-0000-1000-8000-00805f9b34fb",
    "00002af1-0000-1000-8000-00805f9b34fb",
];

const CHUNK_DELAY: Duration = Duration::from_millis(2);

/// One advertisement seen during a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub address: String,
    pub name: Option<String>,
    pub rssi: Option<i16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattCharacteristic {
    pub uuid: String,
    pub write: bool,
    pub write_without_response: bool,
}

impl GattCharacteristic {
    pub fn is_writable(&self) -> bool {
        self.write || self.write_without_response
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
    pub uuid: String,
    pub characteristics: Vec<GattCharacteristic>,
}

/// Connected LE peripheral
#[async_trait]
pub trait GattPeripheral: Send {
    async fn discover_services(&mut self) -> PrintResult<Vec<GattService>>;

    async fn write(
        &mut self,
        service: &str,
        characteristic: &str,
        data: &[u8],
        with_response: bool,
    ) -> PrintResult<()>;

    async fn disconnect(&mut self);
}

/// LE radio
#[async_trait]
pub trait GattCentral: Send + Sync {
    async fn is_powered(&self) -> bool;

    async fn scan(&self, window: Duration) -> PrintResult<Vec<Advertisement>>;

    async fn connect(&self, address: &str) -> PrintResult<Box<dyn GattPeripheral>>;
}

/// Peripheral plus the characteristic chosen for print data
pub struct GattLink {
    peripheral: Box<dyn GattPeripheral>,
    service: String,
    characteristic: GattCharacteristic,
}

impl GattLink {
    pub fn characteristic(&self) -> &GattCharacteristic {
        &self.characteristic
    }
}

/// Pick the characteristic that receives print data
pub fn select_write_characteristic(
    services: &[GattService],
) -> Option<(String, GattCharacteristic)> {
    let writable = || {
        services.iter().flat_map(|s| {
            s.characteristics
                .iter()
                .filter(|c| c.is_writable())
                .map(move |c| (s.uuid.clone(), c.clone()))
        })
    };
    writable()
        .find(|(_, c)| {
            KNOWN_PRINT_CHARACTERISTICS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(&c.uuid))
        })
        .or_else(|| writable().next())
}

/// Scan and keep named devices only
///
/// Unnamed advertisements cannot be told apart from headphones or tags,
/// so they are reported as skipped.
pub async fn scan_named(central: &dyn GattCentral, window: Duration) -> Vec<DiscoveryEvent> {
    if !central.is_powered().await {
        return vec![DiscoveryEvent::Unavailable {
            kind: TransportKind::BluetoothLe,
            reason: "Bluetooth is off".to_string(),
        }];
    }
    let ads = match central.scan(window).await {
        Ok(ads) => ads,
        Err(e) => {
            warn!(error = %e, "LE scan failed");
            return vec![DiscoveryEvent::Unavailable {
                kind: TransportKind::BluetoothLe,
                reason: e.to_string(),
            }];
        }
    };

    ads.into_iter()
        .map(|ad| match ad.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => DiscoveryEvent::Found(PrinterDevice::with_address(
                name,
                TransportKind::BluetoothLe,
                ad.address,
            )),
            _ => {
                debug!(address = %ad.address, "Skipping unnamed LE device");
                DiscoveryEvent::Skipped {
                    address: ad.address,
                    reason: "unnamed device".to_string(),
                }
            }
        })
        .collect()
}

/// Bluetooth LE driver
pub struct BleTransport {
    central: Option<Arc<dyn GattCentral>>,
    chunk_size: usize,
    scan_window: Duration,
    write_timeout: Duration,
}

impl BleTransport {
    pub fn new(central: Option<Arc<dyn GattCentral>>) -> Self {
        Self {
            central,
            chunk_size: DEFAULT_CHUNK_SIZE,
            scan_window: Duration::from_secs(4),
            write_timeout: Duration::from_secs(10),
        }
    }

    /// Larger chunks for peripherals that negotiated a bigger MTU
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    pub fn with_scan_window(mut self, window: Duration) -> Self {
        self.scan_window = window;
        self
    }

    /// Upper bound for each chunk write
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    async fn central(&self) -> PrintResult<&Arc<dyn GattCentral>> {
        let central = self.central.as_ref().ok_or_else(|| {
            PrintError::TransportUnavailable("No Bluetooth LE adapter".to_string())
        })?;
        if !central.is_powered().await {
            return Err(PrintError::TransportUnavailable("Bluetooth is off".to_string()));
        }
        Ok(central)
    }
}

#[async_trait]
impl Transport for BleTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::BluetoothLe
    }

    #[instrument(skip(self, device), fields(device_id = %device.id, address = %device.address))]
    async fn connect(&self, device: &PrinterDevice) -> PrintResult<Session> {
        let central = self.central().await?;
        let mut peripheral = central.connect(&device.address).await?;

        let services = match peripheral.discover_services().await {
            Ok(services) => services,
            Err(e) => {
                peripheral.disconnect().await;
                return Err(e);
            }
        };
        let Some((service, characteristic)) = select_write_characteristic(&services) else {
            peripheral.disconnect().await;
            return Err(PrintError::TransportUnavailable(format!(
                "{} exposes no writable characteristic",
                device.name
            )));
        };
        info!(service = %service, characteristic = %characteristic.uuid, "GATT link ready");

        Ok(Session::new(
            device,
            SessionHandle::Gatt(GattLink {
                peripheral,
                service,
                characteristic,
            }),
        ))
    }

    #[instrument(skip(self, session, job), fields(device_id = %session.device_id(), data_len = job.payload.len()))]
    async fn send(&self, session: &mut Session, job: &PrintJob) -> PrintResult<Delivery> {
        if job.payload.is_empty() {
            return Err(PrintError::ProtocolEncoding("Empty print payload".to_string()));
        }
        let SessionHandle::Gatt(link) = &mut session.handle else {
            return Err(PrintError::InvalidState(format!(
                "{} is not a GATT session",
                session.device_id
            )));
        };

        let with_response = !link.characteristic.write_without_response;
        let mut chunks = job.payload.chunks(self.chunk_size).peekable();
        while let Some(chunk) = chunks.next() {
            let write =
                link.peripheral
                    .write(&link.service, &link.characteristic.uuid, chunk, with_response);
            tokio::time::timeout(self.write_timeout, write)
                .await
                .map_err(|_| {
                    warn!("GATT write timed out");
                    PrintError::ConnectionTimeout(format!(
                        "Bluetooth LE write timeout: {}",
                        session.device_id
                    ))
                })??;
            if chunks.peek().is_some() {
                tokio::time::sleep(CHUNK_DELAY).await;
            }
        }
        info!("Print job sent successfully");
        Ok(Delivery::Printed)
    }

    async fn disconnect(&self, session: Session) {
        if let SessionHandle::Gatt(mut link) = session.handle {
            link.peripheral.disconnect().await;
        }
    }

    async fn probe(&self, device: &PrinterDevice) -> ConnectionState {
        let Ok(central) = self.central().await else {
            return ConnectionState::Error;
        };
        match central.scan(self.scan_window).await {
            Ok(ads) if ads.iter().any(|a| a.address.eq_ignore_ascii_case(&device.address)) => {
                ConnectionState::Connected
            }
            _ => ConnectionState::Error,
        }
    }

    fn discover(&self) -> BoxStream<'static, DiscoveryEvent> {
        let Some(central) = self.central.clone() else {
            return stream::iter(vec![DiscoveryEvent::Unavailable {
                kind: TransportKind::BluetoothLe,
                reason: "No Bluetooth LE adapter".to_string(),
            }])
            .boxed();
        };
        let window = self.scan_window;
        stream::once(async move { scan_named(central.as_ref(), window).await })
            .flat_map(stream::iter)
            .boxed()
    }
}
