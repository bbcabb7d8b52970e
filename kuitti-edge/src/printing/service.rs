//! Print service
//!
//! The operator-facing API. Owns the registry, the connection manager and
//! the per-device workers, and turns orders into bytes for each printer's
//! family and paper width.

use std::sync::Arc;
use std::time::Duration;

use kuitti_printer::transport::{
    BleTransport, BluetoothClassicTransport, CloudPrntClient, CloudPrntTransport, DirectTransport,
    LpSpooler, NetworkTransport, RfcommBridge,
};
use kuitti_printer::{Delivery, Encoder, PrintError, QrMethod, Transport, encoder_for};
use parking_lot::RwLock;
use shared::cloudprnt::{PrinterRecord, StatusResponse};
use shared::{ConnectionState, Order, PrintJob, PrintSettings, PrinterDevice, PrinterFamily, Receipt, TransportKind};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::discovery::{self, DiscoveryReport};
use super::dispatcher::PrintDispatcher;
use super::manager::ConnectionManager;
use super::registry::{PrinterRegistry, RegistryEvent};
use super::retry::ReconnectPolicy;
use crate::core::{Config, EdgeError, Result};
use crate::receipt::{ReceiptRenderer, build_receipt, pricing};

pub struct PrintService {
    manager: Arc<ConnectionManager>,
    dispatcher: PrintDispatcher,
    renderer: ReceiptRenderer,
    settings: RwLock<PrintSettings>,
    star_qr_method: QrMethod,
    policy: ReconnectPolicy,
    cloudprnt: Option<CloudPrntClient>,
}

impl PrintService {
    pub fn new(manager: Arc<ConnectionManager>, shutdown: CancellationToken) -> Self {
        Self {
            dispatcher: PrintDispatcher::new(manager.clone(), shutdown),
            manager,
            renderer: ReceiptRenderer::default(),
            settings: RwLock::new(PrintSettings::default()),
            star_qr_method: QrMethod::StarSubFunction,
            policy: ReconnectPolicy::default(),
            cloudprnt: None,
        }
    }

    pub fn with_renderer(mut self, renderer: ReceiptRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_settings(self, settings: PrintSettings) -> Self {
        *self.settings.write() = settings;
        self
    }

    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_star_qr_method(mut self, method: QrMethod) -> Self {
        self.star_qr_method = method;
        self
    }

    pub fn with_cloudprnt(mut self, client: Option<CloudPrntClient>) -> Self {
        self.cloudprnt = client;
        self
    }

    /// Wire every driver from configuration
    pub fn from_config(config: &Config, shutdown: CancellationToken) -> Result<Self> {
        let cloudprnt = match config.cloudprnt_server_url.as_deref() {
            Some(url) => Some(CloudPrntClient::new(
                url,
                Duration::from_millis(config.cloudprnt_timeout_ms),
            )?),
            None => None,
        };
        let bindings = match config.rfcomm_bindings.as_deref() {
            Some(spec) => RfcommBridge::parse_bindings(spec)?,
            None => Vec::new(),
        };

        let transports: Vec<Arc<dyn Transport>> = vec![
            Arc::new(NetworkTransport::new(config.network_options())),
            Arc::new(BluetoothClassicTransport::new(Arc::new(RfcommBridge::new(
                bindings,
            )))),
            Arc::new(
                BleTransport::new(None)
                    .with_scan_window(Duration::from_millis(config.ble_scan_timeout_ms)),
            ),
            Arc::new(DirectTransport::new(Arc::new(LpSpooler::default()))),
            Arc::new(CloudPrntTransport::new(cloudprnt.clone())),
        ];

        let registry = Arc::new(PrinterRegistry::new());
        let manager = Arc::new(ConnectionManager::new(registry, transports));
        let renderer = ReceiptRenderer::new(config.paper_width, config.timezone)
            .with_header(config.shop_header());

        Ok(Self::new(manager, shutdown)
            .with_renderer(renderer)
            .with_settings(config.print_settings())
            .with_policy(config.reconnect_policy())
            .with_star_qr_method(config.star_qr_method)
            .with_cloudprnt(cloudprnt))
    }

    pub fn registry(&self) -> &Arc<PrinterRegistry> {
        self.manager.registry()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.registry().subscribe()
    }

    pub fn settings(&self) -> PrintSettings {
        self.settings.read().clone()
    }

    pub fn update_settings(&self, settings: PrintSettings) {
        info!(mode = %settings.mode, auto_reconnect = settings.auto_reconnect, "Print settings updated");
        *self.settings.write() = settings;
    }

    // ========== Registry ==========

    pub fn register_printer(&self, device: PrinterDevice) -> PrinterDevice {
        self.registry().register(device)
    }

    pub fn printers(&self) -> Vec<PrinterDevice> {
        self.registry().list()
    }

    fn device(&self, id: &str) -> Result<PrinterDevice> {
        match self.registry().get(id) {
            Some(device) if device.is_active => Ok(device),
            _ => Err(EdgeError::PrinterNotFound(id.to_string())),
        }
    }

    /// Run every driver's discovery and register what it finds
    pub async fn discover(&self) -> DiscoveryReport {
        let report = discovery::ingest(self.registry(), self.manager.discover()).await;
        info!(
            found = report.found.len(),
            skipped = report.skipped.len(),
            unavailable = report.unavailable.len(),
            "Discovery finished"
        );
        report
    }

    // ========== Connections ==========

    pub async fn connect(&self, id: &str) -> Result<()> {
        self.device(id)?;
        Ok(self.manager.connect(id).await?)
    }

    pub async fn disconnect(&self, id: &str) -> Result<()> {
        self.device(id)?;
        Ok(self.manager.disconnect(id).await?)
    }

    pub async fn retry(&self, id: &str) -> Result<()> {
        self.device(id)?;
        Ok(self.manager.retry(id).await?)
    }

    pub async fn remove(&self, id: &str) -> Result<()> {
        self.device(id)?;
        Ok(self.manager.remove(id).await?)
    }

    pub async fn probe(&self, id: &str) -> Result<ConnectionState> {
        self.device(id)?;
        Ok(self.manager.probe(id).await?)
    }

    // ========== Receipts ==========

    pub fn build_receipt(&self, order: &Order) -> Result<Receipt> {
        Ok(build_receipt(order)?)
    }

    /// Plain-text rendering at the configured width
    pub fn preview(&self, order: &Order) -> Result<String> {
        let receipt = self.build_receipt(order)?;
        Ok(self.renderer.render(&receipt)?.preview_text())
    }

    fn encoder(&self, device: &PrinterDevice) -> Box<dyn Encoder> {
        let qr_method = (device.printer_family == PrinterFamily::Star).then_some(self.star_qr_method);
        encoder_for(device.printer_family, qr_method)
    }

    /// Bytes for one device
    ///
    /// CloudPRNT devices get an empty payload; the server renders from the
    /// structured receipt.
    pub fn encode_for(&self, device: &PrinterDevice, receipt: &Receipt) -> Result<Vec<u8>> {
        // CloudPRNT servers render the structured receipt themselves
        if device.transport_kind == TransportKind::CloudPrnt {
            pricing::validate(receipt)?;
            return Ok(Vec::new());
        }
        let doc = self
            .renderer
            .with_width(device.capabilities.paper_width)
            .render(receipt)?;
        Ok(self.encoder(device).encode(&doc)?)
    }

    // ========== Printing ==========

    /// Print a built receipt on one printer
    #[instrument(skip(self, receipt), fields(order = %receipt.order_number))]
    pub async fn print_receipt(&self, id: &str, receipt: Receipt) -> Result<Delivery> {
        let device = self.device(id)?;
        let payload = self.encode_for(&device, &receipt)?;
        let job = PrintJob::new(id, payload).with_receipt(receipt);
        self.dispatch(&device, job).await
    }

    pub async fn print_order(&self, id: &str, order: &Order) -> Result<Delivery> {
        let receipt = self.build_receipt(order)?;
        self.print_receipt(id, receipt).await
    }

    /// Printer used when the caller names none
    ///
    /// The configured default wins; otherwise the first active printer
    /// whose transport serves the print mode.
    pub fn default_printer(&self) -> Result<PrinterDevice> {
        let settings = self.settings();
        if let Some(id) = settings.default_printer_id.as_deref() {
            match self.device(id) {
                Ok(device) => return Ok(device),
                Err(_) => warn!(device_id = %id, "Default printer unavailable, picking by mode"),
            }
        }
        self.printers()
            .into_iter()
            .find(|d| settings.mode.accepts(d.transport_kind))
            .ok_or_else(|| EdgeError::NoPrinter(settings.mode.to_string()))
    }

    pub async fn print_to_default(&self, order: &Order) -> Result<(PrinterDevice, Delivery)> {
        let device = self.default_printer()?;
        let delivery = self.print_order(&device.id, order).await?;
        Ok((device, delivery))
    }

    pub async fn test_print(&self, id: &str) -> Result<Delivery> {
        let device = self.raw_capable(id)?;
        let doc = self.renderer.test_page(&device);
        let payload = self.encoder(&device).encode(&doc)?;
        self.dispatch(&device, PrintJob::new(id, payload)).await
    }

    pub async fn open_drawer(&self, id: &str) -> Result<Delivery> {
        let device = self.raw_capable(id)?;
        let payload = self.encoder(&device).drawer_kick();
        self.dispatch(&device, PrintJob::new(id, payload)).await
    }

    /// One labelled QR per layout, cut once after the last
    pub async fn qr_calibration(&self, id: &str) -> Result<Delivery> {
        let device = self.raw_capable(id)?;
        let payload = self.qr_calibration_bytes(&device)?;
        self.dispatch(&device, PrintJob::new(id, payload)).await
    }

    pub fn qr_calibration_bytes(&self, device: &PrinterDevice) -> Result<Vec<u8>> {
        let width = device.capabilities.paper_width;
        let mut payload = Vec::new();
        for (i, method) in QrMethod::ALL.iter().enumerate() {
            let mut doc = self.renderer.qr_calibration_section(*method, width);
            doc.cut = i + 1 == QrMethod::ALL.len();
            payload.extend(encoder_for(device.printer_family, Some(*method)).encode(&doc)?);
        }
        Ok(payload)
    }

    fn raw_capable(&self, id: &str) -> Result<PrinterDevice> {
        let device = self.device(id)?;
        if device.transport_kind == TransportKind::CloudPrnt {
            return Err(PrintError::InvalidConfig(
                "CloudPRNT printers only accept receipts".to_string(),
            )
            .into());
        }
        Ok(device)
    }

    /// Queue a job on the device's worker
    ///
    /// With auto-reconnect on, a disconnected device is reconnected first
    /// and retryable send failures get the remaining attempts. Otherwise a
    /// device that is not connected fails fast.
    async fn dispatch(&self, device: &PrinterDevice, mut job: PrintJob) -> Result<Delivery> {
        let auto_reconnect = self.settings.read().auto_reconnect;
        let id = device.id.as_str();

        if auto_reconnect && self.registry().state(id) != Some(ConnectionState::Connected) {
            self.reconnect(id).await?;
        }

        let mut attempt = 1;
        loop {
            let outcome = self.dispatcher.submit(job).await?;
            job = outcome.job;
            match outcome.result {
                Ok(delivery) => {
                    info!(device_id = %id, job_id = %job.id, message = %delivery.operator_message(), "Print job delivered");
                    return Ok(delivery);
                }
                Err(e) if auto_reconnect && e.is_retryable() && attempt < self.policy.max_attempts => {
                    warn!(device_id = %id, job_id = %job.id, attempt, error = %e, "Print failed, reconnecting");
                    attempt += 1;
                    tokio::time::sleep(self.policy.delay_after(attempt - 1)).await;
                    self.reconnect(id).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn reconnect(&self, id: &str) -> Result<()> {
        Ok(self.manager.reconnect(id, &self.policy).await?)
    }

    // ========== CloudPRNT ==========

    pub async fn cloud_status(&self) -> Result<(StatusResponse, Vec<PrinterRecord>)> {
        let client = self
            .cloudprnt
            .as_ref()
            .ok_or_else(|| EdgeError::Config("CLOUDPRNT_SERVER_URL is not set".to_string()))?;
        let status = client.status().await?;
        let printers = client.printers().await?;
        Ok((status, printers))
    }

    /// Stop the workers and close every open session
    pub async fn shutdown(&self) {
        self.dispatcher.shutdown();
        for device in self.registry().list() {
            if device.connection_state == ConnectionState::Connected
                && let Err(e) = self.manager.disconnect(&device.id).await
            {
                warn!(device_id = %device.id, error = %e, "Disconnect on shutdown failed");
            }
        }
        info!("Print service stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kuitti_printer::{PrintResult, Session};
    use crate::receipt::ReceiptError;
    use shared::{OrderItem, PrintMode};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Loses the first `drop_sends` writes
    #[derive(Default)]
    struct LossyTransport {
        drop_sends: AtomicUsize,
        connects: AtomicUsize,
        printed: Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl Transport for LossyTransport {
        fn kind(&self) -> TransportKind {
            TransportKind::Network
        }

        async fn connect(&self, device: &PrinterDevice) -> PrintResult<Session> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Session::stateless(device))
        }

        async fn send(&self, _session: &mut Session, job: &PrintJob) -> PrintResult<Delivery> {
            let remaining = self.drop_sends.load(Ordering::SeqCst);
            if remaining > 0 {
                self.drop_sends.store(remaining - 1, Ordering::SeqCst);
                return Err(PrintError::ConnectionLost("reset by peer".into()));
            }
            self.printed.lock().unwrap().push(job.payload.clone());
            Ok(Delivery::Printed)
        }

        async fn disconnect(&self, _session: Session) {}

        async fn probe(&self, _device: &PrinterDevice) -> ConnectionState {
            ConnectionState::Connected
        }
    }

    fn service(transport: Arc<LossyTransport>, auto_reconnect: bool) -> PrintService {
        let registry = Arc::new(PrinterRegistry::new());
        registry.register(PrinterDevice::network("Keittiö", "10.0.0.5", None));
        registry.register(
            PrinterDevice::network("Tiski", "10.0.0.6", None).with_family(PrinterFamily::Star),
        );
        let manager = Arc::new(ConnectionManager::new(registry, vec![transport]));
        PrintService::new(manager, CancellationToken::new())
            .with_settings(PrintSettings {
                mode: PrintMode::Network,
                default_printer_id: Some("10.0.0.6:9100".into()),
                auto_reconnect,
            })
            .with_policy(ReconnectPolicy::new(
                3,
                Duration::from_millis(1),
                Duration::from_millis(2),
            ))
    }

    fn order() -> Order {
        Order {
            order_number: "7".into(),
            created_at: chrono::Utc::now(),
            customer: Default::default(),
            order_type: Default::default(),
            payment_method: "cash".into(),
            items: vec![OrderItem {
                name: "Kebab".into(),
                quantity: 1,
                unit_price: 11.5,
                toppings: Vec::new(),
                notes: None,
                included_toppings_count: None,
                is_choice_product: false,
            }],
            delivery_fee: 0.0,
            discount: 0.0,
            special_instructions: None,
        }
    }

    #[tokio::test]
    async fn test_fail_fast_without_auto_reconnect() {
        let transport = Arc::new(LossyTransport::default());
        let service = service(transport.clone(), false);

        let err = service.print_order("10.0.0.5:9100", &order()).await.unwrap_err();
        assert!(matches!(err, EdgeError::Print(PrintError::NotConnected(_))));
        assert_eq!(transport.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_auto_reconnect_connects_and_retries() {
        let transport = Arc::new(LossyTransport::default());
        transport.drop_sends.store(1, Ordering::SeqCst);
        let service = service(transport.clone(), true);

        let delivery = service.print_order("10.0.0.5:9100", &order()).await.unwrap();
        assert_eq!(delivery, Delivery::Printed);
        assert_eq!(transport.connects.load(Ordering::SeqCst), 2);
        assert_eq!(transport.printed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_default_printer_resolution() {
        let service = service(Arc::new(LossyTransport::default()), false);
        assert_eq!(service.default_printer().unwrap().name, "Tiski");

        service.update_settings(PrintSettings {
            mode: PrintMode::Network,
            default_printer_id: Some("gone".into()),
            auto_reconnect: false,
        });
        assert_eq!(service.default_printer().unwrap().name, "Keittiö");

        service.update_settings(PrintSettings {
            mode: PrintMode::CloudPrnt,
            default_printer_id: None,
            auto_reconnect: false,
        });
        assert!(matches!(service.default_printer(), Err(EdgeError::NoPrinter(_))));
    }

    #[tokio::test]
    async fn test_qr_calibration_cuts_once() {
        // Star partial cut is ESC d 2
        let service = service(Arc::new(LossyTransport::default()), false);
        let device = service.device("10.0.0.6:9100").unwrap();
        let bytes = service.qr_calibration_bytes(&device).unwrap();

        let cuts = bytes.windows(3).filter(|w| *w == [0x1B, 0x64, 0x02]).count();
        assert_eq!(cuts, 1);
        for method in QrMethod::ALL {
            let label = format!("KUITTI-QR-{}", method.as_str().to_uppercase());
            assert!(bytes.windows(label.len()).any(|w| w == label.as_bytes()));
        }
    }

    #[tokio::test]
    async fn test_unknown_printer() {
        let service = service(Arc::new(LossyTransport::default()), false);
        assert!(matches!(
            service.test_print("nope").await,
            Err(EdgeError::PrinterNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_tampered_total_rejected_on_every_transport() {
        let service = service(Arc::new(LossyTransport::default()), false);
        let cloud = service.register_printer(
            PrinterDevice::with_address("Pilvi", TransportKind::CloudPrnt, "00:11:62:AA:BB:CC")
                .with_family(PrinterFamily::Star),
        );
        let network = service.device("10.0.0.5:9100").unwrap();

        let mut receipt = service.build_receipt(&order()).unwrap();
        assert!(service.encode_for(&cloud, &receipt).unwrap().is_empty());

        receipt.total = 999.0;
        for device in [&cloud, &network] {
            assert!(matches!(
                service.encode_for(device, &receipt),
                Err(EdgeError::Receipt(ReceiptError::TotalMismatch { .. }))
            ));
        }
    }
}
