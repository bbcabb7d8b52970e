//! Transport drivers
//!
//! One driver per channel. Every driver speaks the same contract:
//! `connect` opens a [`Session`], `send` writes one job through it,
//! `disconnect` releases it and `probe` checks reachability without
//! touching registry state. Native failures are translated into
//! [`PrintError`](crate::PrintError) before they leave the driver.
//!
//! Dropping a `Session` (or a future holding one) closes the underlying
//! socket, file or GATT link.

pub mod ble;
pub mod bluetooth;
pub mod cloudprnt;
pub mod direct;
pub mod network;

use std::fmt;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use shared::{ConnectionState, PrintJob, PrinterDevice, PrinterFamily, TransportKind};

use crate::error::PrintResult;

pub use ble::{Advertisement, BleTransport, GattCentral, GattCharacteristic, GattPeripheral};
pub use bluetooth::{BluetoothBridge, BluetoothClassicTransport, BluetoothLink, PairedDevice, RfcommBridge};
pub use cloudprnt::{CloudPrntClient, CloudPrntTransport};
pub use direct::{DirectTransport, LpSpooler, PrintSpooler};
pub use network::{NetworkOptions, NetworkTransport};

/// What a successful send actually achieved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Bytes reached the printer
    Printed,
    /// Accepted into a remote queue, printing happens when the printer polls
    Queued { job_id: Option<String> },
    /// Handed to the host print service
    HandedToSpooler,
}

impl Delivery {
    pub fn operator_message(&self) -> String {
        match self {
            Delivery::Printed => "Printed".to_string(),
            Delivery::Queued { job_id: Some(id) } => {
                format!("Job {} accepted but not yet confirmed printed", id)
            }
            Delivery::Queued { job_id: None } => {
                "Job accepted but not yet confirmed printed".to_string()
            }
            Delivery::HandedToSpooler => "Sent to the system print service".to_string(),
        }
    }

    /// Remote job id for queued deliveries
    pub fn remote_job_id(&self) -> Option<String> {
        match self {
            Delivery::Queued { job_id } => job_id.clone(),
            _ => None,
        }
    }
}

/// Driver-specific live handle
pub enum SessionHandle {
    Network(network::NetworkLink),
    Bluetooth(Box<dyn BluetoothLink>),
    Gatt(ble::GattLink),
    /// Nothing held open between jobs (CloudPRNT, spooler)
    Stateless,
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionHandle::Network(_) => "Network",
            SessionHandle::Bluetooth(_) => "Bluetooth",
            SessionHandle::Gatt(_) => "Gatt",
            SessionHandle::Stateless => "Stateless",
        };
        f.write_str(name)
    }
}

/// One live connection to one device
#[derive(Debug)]
pub struct Session {
    device_id: String,
    kind: TransportKind,
    family: PrinterFamily,
    address: String,
    pub(crate) handle: SessionHandle,
}

impl Session {
    pub fn new(device: &PrinterDevice, handle: SessionHandle) -> Self {
        Self {
            device_id: device.id.clone(),
            kind: device.transport_kind,
            family: device.printer_family,
            address: device.address.clone(),
            handle,
        }
    }

    /// Session with no live handle
    pub fn stateless(device: &PrinterDevice) -> Self {
        Self::new(device, SessionHandle::Stateless)
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    pub fn family(&self) -> PrinterFamily {
        self.family
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

/// Discovery results, consumed as a finite stream
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryEvent {
    Found(PrinterDevice),
    /// Seen but not offered (e.g. unnamed LE advertisement)
    Skipped { address: String, reason: String },
    /// The channel cannot scan right now
    Unavailable { kind: TransportKind, reason: String },
}

/// Uniform driver contract
#[async_trait]
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    async fn connect(&self, device: &PrinterDevice) -> PrintResult<Session>;

    async fn send(&self, session: &mut Session, job: &PrintJob) -> PrintResult<Delivery>;

    async fn disconnect(&self, session: Session);

    /// Reachability check: `Connected` when a connect would succeed now
    async fn probe(&self, device: &PrinterDevice) -> ConnectionState;

    /// Devices this channel can see
    fn discover(&self) -> BoxStream<'static, DiscoveryEvent> {
        stream::empty().boxed()
    }
}
