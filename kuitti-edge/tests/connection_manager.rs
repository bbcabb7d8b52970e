//! Connection manager against mock and real transports

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use kuitti_edge::{ConnectionManager, PrinterRegistry};
use kuitti_printer::transport::{NetworkOptions, NetworkTransport};
use kuitti_printer::{Delivery, PrintError, PrintResult, Session, Transport};
use shared::{ConnectionState, PrintJob, PrinterDevice, TransportKind};
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

/// Counts connect calls; each one takes a while
#[derive(Default)]
struct CountingTransport {
    connects: AtomicUsize,
}

#[async_trait]
impl Transport for CountingTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::BluetoothClassic
    }

    async fn connect(&self, device: &PrinterDevice) -> PrintResult<Session> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(Session::stateless(device))
    }

    async fn send(&self, _session: &mut Session, _job: &PrintJob) -> PrintResult<Delivery> {
        Ok(Delivery::Printed)
    }

    async fn disconnect(&self, _session: Session) {}

    async fn probe(&self, _device: &PrinterDevice) -> ConnectionState {
        ConnectionState::Connected
    }
}

#[tokio::test]
async fn test_concurrent_connects_share_one_attempt() {
    let registry = Arc::new(PrinterRegistry::new());
    let device = PrinterDevice::with_address("Mobiili", TransportKind::BluetoothClassic, "00:11:22:33:44:55");
    registry.register(device.clone());
    let transport = Arc::new(CountingTransport::default());
    let manager = Arc::new(ConnectionManager::new(registry.clone(), vec![transport.clone()]));

    let (a, b) = tokio::join!(manager.connect(&device.id), manager.connect(&device.id));
    a.unwrap();
    b.unwrap();

    assert_eq!(transport.connects.load(Ordering::SeqCst), 1);
    assert_eq!(registry.state(&device.id), Some(ConnectionState::Connected));

    // Already connected: no new attempt
    manager.connect(&device.id).await.unwrap();
    assert_eq!(transport.connects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_network_driver_over_loopback() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut received = Vec::new();
        socket.read_to_end(&mut received).await.unwrap();
        received
    });

    let registry = Arc::new(PrinterRegistry::new());
    let device = PrinterDevice::network("Keittiö", "127.0.0.1", Some(port));
    registry.register(device.clone());
    let transport: Arc<dyn Transport> = Arc::new(NetworkTransport::new(NetworkOptions::default()));
    let manager = Arc::new(ConnectionManager::new(registry.clone(), vec![transport]));

    manager.connect(&device.id).await.unwrap();
    let mut job = PrintJob::new(device.id.clone(), b"\x1B@hello\n".to_vec());
    assert_eq!(manager.send_job(&device.id, &mut job).await.unwrap(), Delivery::Printed);
    assert_eq!(job.attempts, 1);
    manager.disconnect(&device.id).await.unwrap();

    let received = tokio::time::timeout(Duration::from_secs(2), server)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received, b"\x1B@hello\n");
    assert_eq!(registry.state(&device.id), Some(ConnectionState::Disconnected));
}

#[tokio::test]
async fn test_refused_connection_enters_error_state() {
    // Bind then drop to get a port nobody listens on
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let registry = Arc::new(PrinterRegistry::new());
    let device = PrinterDevice::network("Baari", "127.0.0.1", Some(port));
    registry.register(device.clone());
    let transport: Arc<dyn Transport> = Arc::new(NetworkTransport::new(NetworkOptions::default()));
    let manager = Arc::new(ConnectionManager::new(registry.clone(), vec![transport]));

    let err = manager.connect(&device.id).await.unwrap_err();
    assert!(matches!(err, PrintError::ConnectionRefused(_)));
    assert!(err.is_retryable());
    assert_eq!(registry.state(&device.id), Some(ConnectionState::Error));
    assert_eq!(manager.probe(&device.id).await.unwrap(), ConnectionState::Error);
}
