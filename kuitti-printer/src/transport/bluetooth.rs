//! Bluetooth classic printers (RFCOMM / serial port profile)
//!
//! The OS owns pairing. This driver talks to a [`BluetoothBridge`] that
//! enumerates paired devices and opens a byte link to one of them. The
//! bundled [`RfcommBridge`] uses RFCOMM device nodes bound ahead of time:
//!
//! ```bash
//! $ bluetoothctl pair 00:11:62:AA:BB:CC
//! $ sudo rfcomm bind 0 00:11:62:AA:BB:CC   # creates /dev/rfcomm0
//! ```
//!
//! Discovery offers the paired set only. When nothing is paired, a
//! Bluetooth LE advertisement scan is the last resort, and only named
//! devices are offered.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use shared::{ConnectionState, PrintJob, PrinterDevice, TransportKind};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use super::ble::{GattCentral, scan_named};
use super::{Delivery, DiscoveryEvent, Session, SessionHandle, Transport};
use crate::error::{PrintError, PrintResult};

/// Chunk size for writes (bytes)
const CHUNK_SIZE: usize = 4096;

/// Delay between chunks
const CHUNK_DELAY: Duration = Duration::from_millis(2);

/// Where the kernel lists Bluetooth adapters
const ADAPTER_DIR: &str = "/sys/class/bluetooth";

/// `AA:BB:CC:DD:EE:FF` (or dash separated)
pub fn is_valid_mac(s: &str) -> bool {
    let parts: Vec<&str> = s.split([':', '-']).collect();
    parts.len() == 6
        && parts
            .iter()
            .all(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_hexdigit()))
}

/// A device the OS has paired
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairedDevice {
    pub mac: String,
    pub name: Option<String>,
}

/// Open byte link to a paired printer
#[async_trait]
pub trait BluetoothLink: Send {
    async fn write(&mut self, data: &[u8]) -> PrintResult<()>;

    async fn close(&mut self);
}

/// OS-side Bluetooth capabilities
#[async_trait]
pub trait BluetoothBridge: Send + Sync {
    async fn is_enabled(&self) -> bool;

    async fn paired_devices(&self) -> PrintResult<Vec<PairedDevice>>;

    async fn open(&self, mac: &str) -> PrintResult<Box<dyn BluetoothLink>>;
}

/// `MAC -> /dev/rfcommN` binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RfcommBinding {
    pub mac: String,
    pub path: PathBuf,
    pub name: Option<String>,
}

/// Bridge over pre-bound RFCOMM device nodes
#[derive(Debug, Clone)]
pub struct RfcommBridge {
    bindings: Vec<RfcommBinding>,
    adapter_dir: PathBuf,
}

impl RfcommBridge {
    pub fn new(bindings: Vec<RfcommBinding>) -> Self {
        Self {
            bindings,
            adapter_dir: PathBuf::from(ADAPTER_DIR),
        }
    }

    /// Override where adapters are looked up
    pub fn with_adapter_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.adapter_dir = dir.into();
        self
    }

    /// Parse `MAC=/dev/rfcomm0[=Name],MAC=/dev/rfcomm1`
    pub fn parse_bindings(spec: &str) -> PrintResult<Vec<RfcommBinding>> {
        let mut out = Vec::new();
        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let mut parts = entry.splitn(3, '=');
            let mac = parts.next().unwrap_or_default().trim();
            let path = parts.next().map(str::trim).unwrap_or_default();
            if !is_valid_mac(mac) || path.is_empty() {
                return Err(PrintError::InvalidConfig(format!(
                    "Invalid RFCOMM binding: {}",
                    entry
                )));
            }
            out.push(RfcommBinding {
                mac: mac.to_ascii_uppercase(),
                path: PathBuf::from(path),
                name: parts.next().map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            });
        }
        Ok(out)
    }

    fn binding(&self, mac: &str) -> Option<&RfcommBinding> {
        self.bindings.iter().find(|b| b.mac.eq_ignore_ascii_case(mac))
    }
}

#[async_trait]
impl BluetoothBridge for RfcommBridge {
    async fn is_enabled(&self) -> bool {
        match tokio::fs::read_dir(&self.adapter_dir).await {
            Ok(mut entries) => matches!(entries.next_entry().await, Ok(Some(_))),
            Err(_) => false,
        }
    }

    async fn paired_devices(&self) -> PrintResult<Vec<PairedDevice>> {
        Ok(self
            .bindings
            .iter()
            .map(|b| PairedDevice {
                mac: b.mac.clone(),
                name: b.name.clone(),
            })
            .collect())
    }

    async fn open(&self, mac: &str) -> PrintResult<Box<dyn BluetoothLink>> {
        let binding = self.binding(mac).ok_or_else(|| {
            PrintError::TransportUnavailable(format!("{} is not paired or not bound to RFCOMM", mac))
        })?;
        let link = RfcommLink::open(&binding.path).await?;
        Ok(Box::new(link))
    }
}

/// Writable RFCOMM device node
pub struct RfcommLink {
    file: File,
    path: PathBuf,
}

impl RfcommLink {
    pub async fn open(path: &Path) -> PrintResult<Self> {
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .await
            .map_err(|e| match PrintError::from(e) {
                PrintError::TransportUnavailable(msg) => PrintError::TransportUnavailable(format!(
                    "Failed to open {}: {}",
                    path.display(),
                    msg
                )),
                other => other,
            })?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }
}

#[async_trait]
impl BluetoothLink for RfcommLink {
    async fn write(&mut self, data: &[u8]) -> PrintResult<()> {
        let mut chunks = data.chunks(CHUNK_SIZE).peekable();
        while let Some(chunk) = chunks.next() {
            self.file.write_all(chunk).await?;
            if chunks.peek().is_some() {
                tokio::time::sleep(CHUNK_DELAY).await;
            }
        }
        self.file.flush().await?;
        debug!(path = %self.path.display(), bytes = data.len(), "RFCOMM write complete");
        Ok(())
    }

    async fn close(&mut self) {
        let _ = self.file.flush().await;
    }
}

/// Bluetooth classic driver
pub struct BluetoothClassicTransport {
    bridge: Arc<dyn BluetoothBridge>,
    le_scanner: Option<Arc<dyn GattCentral>>,
    scan_window: Duration,
    open_timeout: Duration,
    write_timeout: Duration,
}

impl BluetoothClassicTransport {
    pub fn new(bridge: Arc<dyn BluetoothBridge>) -> Self {
        Self {
            bridge,
            le_scanner: None,
            scan_window: Duration::from_secs(4),
            open_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(10),
        }
    }

    /// Upper bound for writing one job to the link
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Scanner used when no device is paired
    pub fn with_le_fallback(mut self, scanner: Arc<dyn GattCentral>, window: Duration) -> Self {
        self.le_scanner = Some(scanner);
        self.scan_window = window;
        self
    }

    async fn ensure_enabled(&self) -> PrintResult<()> {
        if self.bridge.is_enabled().await {
            Ok(())
        } else {
            Err(PrintError::TransportUnavailable("Bluetooth is off".to_string()))
        }
    }
}

#[async_trait]
impl Transport for BluetoothClassicTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::BluetoothClassic
    }

    #[instrument(skip(self, device), fields(device_id = %device.id, mac = %device.address))]
    async fn connect(&self, device: &PrinterDevice) -> PrintResult<Session> {
        if !is_valid_mac(&device.address) {
            return Err(PrintError::InvalidConfig(format!(
                "Invalid Bluetooth address: {}",
                device.address
            )));
        }
        self.ensure_enabled().await?;

        let link = tokio::time::timeout(self.open_timeout, self.bridge.open(&device.address))
            .await
            .map_err(|_| {
                PrintError::ConnectionTimeout(format!("Bluetooth connect timeout: {}", device.address))
            })??;
        info!("Bluetooth link open");
        Ok(Session::new(device, SessionHandle::Bluetooth(link)))
    }

    #[instrument(skip(self, session, job), fields(device_id = %session.device_id(), data_len = job.payload.len()))]
    async fn send(&self, session: &mut Session, job: &PrintJob) -> PrintResult<Delivery> {
        if job.payload.is_empty() {
            return Err(PrintError::ProtocolEncoding("Empty print payload".to_string()));
        }
        let SessionHandle::Bluetooth(link) = &mut session.handle else {
            return Err(PrintError::InvalidState(format!(
                "{} is not a Bluetooth session",
                session.device_id
            )));
        };
        match tokio::time::timeout(self.write_timeout, link.write(&job.payload)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(error = %e, "Bluetooth write failed");
                return Err(e);
            }
            Err(_) => {
                warn!("Bluetooth write timed out");
                return Err(PrintError::ConnectionTimeout(format!(
                    "Bluetooth write timeout: {}",
                    session.device_id
                )));
            }
        }
        info!("Print job sent successfully");
        Ok(Delivery::Printed)
    }

    async fn disconnect(&self, session: Session) {
        if let SessionHandle::Bluetooth(mut link) = session.handle {
            link.close().await;
        }
    }

    async fn probe(&self, device: &PrinterDevice) -> ConnectionState {
        if !self.bridge.is_enabled().await {
            return ConnectionState::Error;
        }
        match self.bridge.paired_devices().await {
            Ok(paired) if paired.iter().any(|p| p.mac.eq_ignore_ascii_case(&device.address)) => {
                ConnectionState::Connected
            }
            _ => ConnectionState::Error,
        }
    }

    fn discover(&self) -> BoxStream<'static, DiscoveryEvent> {
        let bridge = self.bridge.clone();
        let scanner = self.le_scanner.clone();
        let window = self.scan_window;

        stream::once(async move {
            if !bridge.is_enabled().await {
                return vec![DiscoveryEvent::Unavailable {
                    kind: TransportKind::BluetoothClassic,
                    reason: "Bluetooth is off".to_string(),
                }];
            }
            let paired = match bridge.paired_devices().await {
                Ok(paired) => paired,
                Err(e) => {
                    return vec![DiscoveryEvent::Unavailable {
                        kind: TransportKind::BluetoothClassic,
                        reason: e.to_string(),
                    }];
                }
            };
            if !paired.is_empty() {
                return paired
                    .into_iter()
                    .map(|p| {
                        let name = p.name.unwrap_or_else(|| format!("Bluetooth printer {}", p.mac));
                        DiscoveryEvent::Found(PrinterDevice::with_address(
                            name,
                            TransportKind::BluetoothClassic,
                            p.mac,
                        ))
                    })
                    .collect();
            }
            match scanner {
                Some(scanner) => {
                    debug!("No paired printers, falling back to LE scan");
                    scan_named(scanner.as_ref(), window).await
                }
                None => Vec::new(),
            }
        })
        .flat_map(stream::iter)
        .boxed()
    }
}
