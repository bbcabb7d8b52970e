//! Direct printing through the host print service
//!
//! No custom protocol: the bytes are handed to the OS spooler and success
//! means "the spooler accepted it", not "paper came out". The device
//! address is the spooler queue name.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use shared::{ConnectionState, PrintJob, PrinterDevice, TransportKind};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{info, instrument, warn};

use super::{Delivery, DiscoveryEvent, Session, Transport};
use crate::error::{PrintError, PrintResult};

/// Host print service
#[async_trait]
pub trait PrintSpooler: Send + Sync {
    async fn is_available(&self) -> bool;

    /// Queue names the spooler knows
    async fn queues(&self) -> PrintResult<Vec<String>>;

    async fn submit(&self, queue: &str, title: &str, data: &[u8]) -> PrintResult<()>;
}

/// CUPS command line spooler (`lp -o raw`)
#[derive(Debug, Clone)]
pub struct LpSpooler {
    lp: String,
    lpstat: String,
}

impl Default for LpSpooler {
    fn default() -> Self {
        Self {
            lp: "lp".to_string(),
            lpstat: "lpstat".to_string(),
        }
    }
}

impl LpSpooler {
    pub fn new(lp: impl Into<String>, lpstat: impl Into<String>) -> Self {
        Self {
            lp: lp.into(),
            lpstat: lpstat.into(),
        }
    }
}

#[async_trait]
impl PrintSpooler for LpSpooler {
    async fn is_available(&self) -> bool {
        Command::new(&self.lpstat)
            .arg("-r")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    async fn queues(&self) -> PrintResult<Vec<String>> {
        let output = Command::new(&self.lpstat)
            .arg("-e")
            .kill_on_drop(true)
            .output()
            .await?;
        if !output.status.success() {
            return Err(PrintError::TransportUnavailable(format!(
                "{} -e failed: {}",
                self.lpstat,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn submit(&self, queue: &str, title: &str, data: &[u8]) -> PrintResult<()> {
        let mut child = Command::new(&self.lp)
            .args(["-d", queue, "-t", title, "-o", "raw"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(data).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(PrintError::InvalidConfig(format!(
                "Print service rejected job for {}: {}",
                queue,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

/// OS direct-print driver
pub struct DirectTransport {
    spooler: Arc<dyn PrintSpooler>,
}

impl DirectTransport {
    pub fn new(spooler: Arc<dyn PrintSpooler>) -> Self {
        Self { spooler }
    }
}

#[async_trait]
impl Transport for DirectTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Direct
    }

    #[instrument(skip(self, device), fields(device_id = %device.id, queue = %device.address))]
    async fn connect(&self, device: &PrinterDevice) -> PrintResult<Session> {
        if device.address.trim().is_empty() {
            return Err(PrintError::InvalidConfig(format!(
                "Printer {} has no queue name",
                device.id
            )));
        }
        if !self.spooler.is_available().await {
            return Err(PrintError::TransportUnavailable(
                "System print service is not running".to_string(),
            ));
        }
        Ok(Session::stateless(device))
    }

    #[instrument(skip(self, session, job), fields(queue = %session.address(), data_len = job.payload.len()))]
    async fn send(&self, session: &mut Session, job: &PrintJob) -> PrintResult<Delivery> {
        if job.payload.is_empty() {
            return Err(PrintError::ProtocolEncoding("Empty print payload".to_string()));
        }
        let title = format!("receipt-{}", job.id);
        self.spooler
            .submit(session.address(), &title, &job.payload)
            .await
            .inspect_err(|e| warn!(error = %e, "Spooler submission failed"))?;
        info!("Job handed to print service");
        Ok(Delivery::HandedToSpooler)
    }

    async fn disconnect(&self, _session: Session) {}

    async fn probe(&self, device: &PrinterDevice) -> ConnectionState {
        match self.spooler.queues().await {
            Ok(queues) if queues.iter().any(|q| q == &device.address) => ConnectionState::Connected,
            _ => ConnectionState::Error,
        }
    }

    fn discover(&self) -> BoxStream<'static, DiscoveryEvent> {
        let spooler = self.spooler.clone();
        stream::once(async move {
            match spooler.queues().await {
                Ok(queues) => queues
                    .into_iter()
                    .map(|q| {
                        DiscoveryEvent::Found(PrinterDevice::with_address(
                            q.clone(),
                            TransportKind::Direct,
                            q,
                        ))
                    })
                    .collect(),
                Err(e) => vec![DiscoveryEvent::Unavailable {
                    kind: TransportKind::Direct,
                    reason: e.to_string(),
                }],
            }
        })
        .flat_map(stream::iter)
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockSpooler {
        available: bool,
        submitted: Mutex<Vec<(String, usize)>>,
    }

    #[async_trait]
    impl PrintSpooler for MockSpooler {
        async fn is_available(&self) -> bool {
            self.available
        }
        async fn queues(&self) -> PrintResult<Vec<String>> {
            Ok(vec!["Kitchen_TM20".to_string()])
        }
        async fn submit(&self, queue: &str, _title: &str, data: &[u8]) -> PrintResult<()> {
            self.submitted.lock().unwrap().push((queue.to_string(), data.len()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_send_hands_to_spooler() {
        let spooler = Arc::new(MockSpooler {
            available: true,
            ..Default::default()
        });
        let transport = DirectTransport::new(spooler.clone());
        let device = PrinterDevice::with_address("Kitchen", TransportKind::Direct, "Kitchen_TM20");

        let mut session = transport.connect(&device).await.unwrap();
        let job = PrintJob::new(device.id.clone(), vec![1, 2, 3]);
        let delivery = transport.send(&mut session, &job).await.unwrap();

        assert_eq!(delivery, Delivery::HandedToSpooler);
        assert_eq!(*spooler.submitted.lock().unwrap(), vec![("Kitchen_TM20".to_string(), 3)]);
        assert_eq!(transport.probe(&device).await, ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_missing_spooler_is_unavailable() {
        let transport = DirectTransport::new(Arc::new(MockSpooler::default()));
        let device = PrinterDevice::with_address("Kitchen", TransportKind::Direct, "Kitchen_TM20");
        let err = transport.connect(&device).await.unwrap_err();
        assert!(matches!(err, PrintError::TransportUnavailable(_)));
    }

    #[tokio::test]
    async fn test_missing_lp_binary_is_unavailable() {
        let spooler = LpSpooler::new("/nonexistent/lp", "/nonexistent/lpstat");
        assert!(!spooler.is_available().await);
        let err = spooler.submit("q", "t", b"x").await.unwrap_err();
        assert!(matches!(err, PrintError::TransportUnavailable(_)));
    }
}
