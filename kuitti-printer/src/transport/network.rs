//! Network printers (raw TCP, port 9100)
//!
//! Most thermal printers accept a raw byte stream on port 9100 with no
//! framing. The socket is either kept warm between jobs or opened per job.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use shared::{ConnectionState, PrintJob, PrinterDevice, TransportKind};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, lookup_host};
use tracing::{debug, info, instrument, warn};

use super::{Delivery, Session, SessionHandle, Transport};
use crate::error::{PrintError, PrintResult};

/// Socket behaviour
#[derive(Debug, Clone, Copy)]
pub struct NetworkOptions {
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
    /// Keep the socket open between jobs instead of closing after each one
    pub keep_warm: bool,
    pub probe_timeout: Duration,
}

impl Default for NetworkOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(10),
            keep_warm: true,
            probe_timeout: Duration::from_millis(500),
        }
    }
}

/// Open (or re-openable) socket to one printer
#[derive(Debug)]
pub struct NetworkLink {
    addr: SocketAddr,
    stream: Option<TcpStream>,
}

impl NetworkLink {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

/// Raw TCP driver
#[derive(Debug, Clone, Default)]
pub struct NetworkTransport {
    options: NetworkOptions,
}

impl NetworkTransport {
    pub fn new(options: NetworkOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &NetworkOptions {
        &self.options
    }

    async fn resolve(&self, device: &PrinterDevice) -> PrintResult<SocketAddr> {
        if device.address.trim().is_empty() {
            return Err(PrintError::InvalidConfig(format!(
                "Printer {} has no address",
                device.id
            )));
        }
        let target = (device.address.as_str(), device.network_port());
        let mut addrs = tokio::time::timeout(self.options.connect_timeout, lookup_host(target))
            .await
            .map_err(|_| {
                PrintError::ConnectionTimeout(format!("Resolving {} timed out", device.address))
            })?
            .map_err(|e| {
                PrintError::InvalidConfig(format!("Invalid address {}: {}", device.address, e))
            })?;
        addrs.next().ok_or_else(|| {
            PrintError::InvalidConfig(format!("Address {} did not resolve", device.address))
        })
    }

    async fn open(&self, addr: SocketAddr, timeout: Duration) -> PrintResult<TcpStream> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| PrintError::ConnectionTimeout(format!("Connection timeout: {}", addr)))?
            .map_err(PrintError::from)?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

#[async_trait]
impl Transport for NetworkTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Network
    }

    #[instrument(skip(self, device), fields(device_id = %device.id, address = %device.address))]
    async fn connect(&self, device: &PrinterDevice) -> PrintResult<Session> {
        let addr = self.resolve(device).await?;
        info!(%addr, "Connecting to printer");
        let stream = self.open(addr, self.options.connect_timeout).await?;
        info!(%addr, "Connected");

        Ok(Session::new(
            device,
            SessionHandle::Network(NetworkLink {
                addr,
                stream: Some(stream),
            }),
        ))
    }

    #[instrument(skip(self, session, job), fields(device_id = %session.device_id(), job_id = %job.id, data_len = job.payload.len()))]
    async fn send(&self, session: &mut Session, job: &PrintJob) -> PrintResult<Delivery> {
        if job.payload.is_empty() {
            return Err(PrintError::ProtocolEncoding("Empty print payload".to_string()));
        }
        let SessionHandle::Network(link) = &mut session.handle else {
            return Err(PrintError::InvalidState(format!(
                "{} is not a network session",
                session.device_id
            )));
        };

        let mut stream = match link.stream.take() {
            Some(stream) => stream,
            None => {
                debug!(addr = %link.addr, "Reopening socket");
                self.open(link.addr, self.options.connect_timeout).await?
            }
        };

        let write = async {
            stream.write_all(&job.payload).await?;
            stream.flush().await?;
            Ok::<(), std::io::Error>(())
        };
        match tokio::time::timeout(self.options.write_timeout, write).await {
            Err(_) => {
                warn!(addr = %link.addr, "Write timed out");
                return Err(PrintError::ConnectionTimeout(format!(
                    "Write timeout: {}",
                    link.addr
                )));
            }
            Ok(Err(e)) => {
                warn!(addr = %link.addr, error = %e, "Write failed");
                return Err(PrintError::from(e));
            }
            Ok(Ok(())) => {}
        }

        if self.options.keep_warm {
            link.stream = Some(stream);
        } else {
            let _ = stream.shutdown().await;
        }

        info!("Print job sent successfully");
        Ok(Delivery::Printed)
    }

    #[instrument(skip(self, session), fields(device_id = %session.device_id()))]
    async fn disconnect(&self, session: Session) {
        if let SessionHandle::Network(NetworkLink {
            stream: Some(mut stream),
            ..
        }) = session.handle
        {
            let _ = stream.shutdown().await;
        }
        debug!("Disconnected");
    }

    #[instrument(skip(self, device), fields(device_id = %device.id))]
    async fn probe(&self, device: &PrinterDevice) -> ConnectionState {
        let addr = match self.resolve(device).await {
            Ok(addr) => addr,
            Err(e) => {
                warn!(error = %e, "Printer address invalid");
                return ConnectionState::Error;
            }
        };
        match self.open(addr, self.options.probe_timeout).await {
            Ok(_) => {
                info!("Printer online");
                ConnectionState::Connected
            }
            Err(e) => {
                warn!(error = %e, "Printer offline");
                ConnectionState::Error
            }
        }
    }
}
