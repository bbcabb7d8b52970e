//! CloudPRNT submission
//!
//! The printer polls a server for work; this side only submits jobs to
//! that server. A successful send means the job sits in the remote queue,
//! so it is reported as [`Delivery::Queued`], never as printed. Failures
//! surface immediately: there is no local offline queue.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use serde::de::DeserializeOwned;
use shared::cloudprnt::{
    PRINTERS_PATH, PrinterRecord, PrintersResponse, STATUS_PATH, SUBMIT_JOB_PATH, StatusResponse,
    SubmitJobRequest, SubmitJobResponse,
};
use shared::{ConnectionState, PrintJob, PrinterDevice, PrinterFamily, TransportKind};
use tracing::{info, instrument, warn};

use super::bluetooth::is_valid_mac;
use super::{Delivery, DiscoveryEvent, Session, Transport};
use crate::error::{PrintError, PrintResult};

/// HTTP client for the CloudPRNT server
#[derive(Debug, Clone)]
pub struct CloudPrntClient {
    client: Client,
    base_url: String,
}

impl CloudPrntClient {
    pub fn new(base_url: &str, timeout: Duration) -> PrintResult<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(PrintError::InvalidConfig(format!(
                "CloudPRNT server URL must be http(s): {}",
                base_url
            )));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PrintError::InvalidConfig(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> PrintResult<T> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PrintError::RemoteSubmission(format!(
                "HTTP {}: {}",
                status.as_u16(),
                text.trim()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| PrintError::RemoteSubmission(format!("Invalid response: {}", e)))
    }

    /// Queue a job; `Ok` only when the server says `success: true`
    #[instrument(skip(self, request), fields(mac = %request.printer_mac, order = %request.receipt_data.order_number))]
    pub async fn submit_job(&self, request: &SubmitJobRequest) -> PrintResult<SubmitJobResponse> {
        let response = self
            .client
            .post(self.url(SUBMIT_JOB_PATH))
            .json(request)
            .send()
            .await
            .map_err(server_unreachable)?;
        let body: SubmitJobResponse = Self::handle_response(response).await?;
        if !body.success {
            let reason = body.error.unwrap_or_else(|| "job rejected".to_string());
            warn!(reason = %reason, "CloudPRNT server rejected job");
            return Err(PrintError::RemoteSubmission(reason));
        }
        info!(job_id = ?body.job_id, "CloudPRNT job queued");
        Ok(body)
    }

    pub async fn status(&self) -> PrintResult<StatusResponse> {
        let response = self
            .client
            .get(self.url(STATUS_PATH))
            .send()
            .await
            .map_err(server_unreachable)?;
        Self::handle_response(response).await
    }

    pub async fn printers(&self) -> PrintResult<Vec<PrinterRecord>> {
        let response = self
            .client
            .get(self.url(PRINTERS_PATH))
            .send()
            .await
            .map_err(server_unreachable)?;
        let body: PrintersResponse = Self::handle_response(response).await?;
        Ok(body.printers)
    }
}

fn server_unreachable(e: reqwest::Error) -> PrintError {
    PrintError::RemoteSubmission(format!("Could not reach CloudPRNT server: {}", e))
}

/// CloudPRNT driver; the device address is the printer MAC
pub struct CloudPrntTransport {
    client: Option<CloudPrntClient>,
}

impl CloudPrntTransport {
    pub fn new(client: Option<CloudPrntClient>) -> Self {
        Self { client }
    }

    fn client(&self) -> PrintResult<&CloudPrntClient> {
        self.client.as_ref().ok_or_else(|| {
            PrintError::TransportUnavailable("CloudPRNT server URL is not configured".to_string())
        })
    }
}

#[async_trait]
impl Transport for CloudPrntTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::CloudPrnt
    }

    async fn connect(&self, device: &PrinterDevice) -> PrintResult<Session> {
        self.client()?;
        if !is_valid_mac(&device.address) {
            return Err(PrintError::InvalidConfig(format!(
                "Invalid CloudPRNT printer MAC: {}",
                device.address
            )));
        }
        Ok(Session::stateless(device))
    }

    #[instrument(skip(self, session, job), fields(mac = %session.address(), job_id = %job.id))]
    async fn send(&self, session: &mut Session, job: &PrintJob) -> PrintResult<Delivery> {
        let client = self.client()?;
        let receipt = job.receipt.clone().ok_or_else(|| {
            PrintError::ProtocolEncoding("CloudPRNT jobs need the structured receipt".to_string())
        })?;

        let request = SubmitJobRequest {
            printer_mac: session.address().to_string(),
            receipt_data: receipt,
            original_order: None,
            printer_type: session.family(),
        };
        let response = client.submit_job(&request).await?;
        Ok(Delivery::Queued {
            job_id: response.job_id,
        })
    }

    async fn disconnect(&self, _session: Session) {}

    async fn probe(&self, device: &PrinterDevice) -> ConnectionState {
        let Ok(client) = self.client() else {
            return ConnectionState::Error;
        };
        match client.printers().await {
            Ok(printers) if printers.iter().any(|p| p.mac.eq_ignore_ascii_case(&device.address)) => {
                ConnectionState::Connected
            }
            Ok(_) => ConnectionState::Error,
            Err(e) => {
                warn!(error = %e, "CloudPRNT probe failed");
                ConnectionState::Error
            }
        }
    }

    fn discover(&self) -> BoxStream<'static, DiscoveryEvent> {
        let Some(client) = self.client.clone() else {
            return stream::empty().boxed();
        };
        stream::once(async move {
            match client.printers().await {
                Ok(printers) => printers
                    .into_iter()
                    .map(|p| {
                        let name = p.name.unwrap_or_else(|| format!("CloudPRNT {}", p.mac));
                        DiscoveryEvent::Found(
                            PrinterDevice::with_address(name, TransportKind::CloudPrnt, p.mac)
                                .with_family(PrinterFamily::Star),
                        )
                    })
                    .collect(),
                Err(e) => vec![DiscoveryEvent::Unavailable {
                    kind: TransportKind::CloudPrnt,
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
    use axum::{Json, Router, routing::{get, post}};
    use chrono::Utc;
    use serde_json::{Value, json};
    use shared::{Customer, OrderType, Receipt};
    use std::sync::{Arc, Mutex};

    fn receipt() -> Receipt {
        Receipt {
            order_number: "1042".into(),
            timestamp: Utc::now(),
            customer: Customer {
                name: "Aino".into(),
                ..Default::default()
            },
            order_type: OrderType::Pickup,
            payment_method: "card".into(),
            items: vec![],
            subtotal: 0.0,
            delivery_fee: 0.0,
            discount: 0.0,
            total: 0.0,
            special_instructions: None,
        }
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn device() -> PrinterDevice {
        PrinterDevice::with_address("Cloud", TransportKind::CloudPrnt, "00:11:62:AA:BB:CC")
            .with_family(PrinterFamily::Star)
    }

    #[tokio::test]
    async fn test_submit_reports_queued_not_printed() {
        let seen: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
        let captured = seen.clone();
        let router = Router::new().route(
            "/cloudprnt-api/submit-job",
            post(move |Json(body): Json<Value>| {
                let captured = captured.clone();
                async move {
                    *captured.lock().unwrap() = Some(body);
                    Json(json!({"success": true, "jobId": "job-7"}))
                }
            }),
        );
        let url = serve(router).await;
        let transport = CloudPrntTransport::new(Some(CloudPrntClient::new(&url, Duration::from_secs(5)).unwrap()));

        let mut session = transport.connect(&device()).await.unwrap();
        let job = PrintJob::new("00:11:62:AA:BB:CC", vec![]).with_receipt(receipt());
        let delivery = transport.send(&mut session, &job).await.unwrap();

        assert_eq!(delivery, Delivery::Queued { job_id: Some("job-7".into()) });
        let body = seen.lock().unwrap().clone().unwrap();
        assert_eq!(body["printerMac"], "00:11:62:AA:BB:CC");
        assert_eq!(body["printerType"], "star");
        assert_eq!(body["receiptData"]["orderNumber"], "1042");
        assert!(body.get("originalOrder").is_none());
    }

    #[tokio::test]
    async fn test_rejected_and_non_2xx_are_remote_failures() {
        let router = Router::new()
            .route(
                "/cloudprnt-api/submit-job",
                post(|| async { Json(json!({"success": false, "error": "unknown printer"})) }),
            )
            .route(
                "/cloudprnt-api/status",
                get(|| async { (axum::http::StatusCode::SERVICE_UNAVAILABLE, "down") }),
            );
        let url = serve(router).await;
        let client = CloudPrntClient::new(&url, Duration::from_secs(5)).unwrap();
        let transport = CloudPrntTransport::new(Some(client.clone()));

        let mut session = transport.connect(&device()).await.unwrap();
        let job = PrintJob::new("00:11:62:AA:BB:CC", vec![]).with_receipt(receipt());
        let err = transport.send(&mut session, &job).await.unwrap_err();
        assert_eq!(err, PrintError::RemoteSubmission("unknown printer".into()));
        assert!(!err.is_retryable());

        let err = client.status().await.unwrap_err();
        assert!(matches!(err, PrintError::RemoteSubmission(msg) if msg.starts_with("HTTP 503")));
    }

    #[tokio::test]
    async fn test_job_without_receipt_is_encoding_error() {
        let client = CloudPrntClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let transport = CloudPrntTransport::new(Some(client));
        let mut session = transport.connect(&device()).await.unwrap();
        let job = PrintJob::new("00:11:62:AA:BB:CC", vec![1]);
        let err = transport.send(&mut session, &job).await.unwrap_err();
        assert!(matches!(err, PrintError::ProtocolEncoding(_)));
    }

    #[tokio::test]
    async fn test_unconfigured_server_is_unavailable() {
        let transport = CloudPrntTransport::new(None);
        let err = transport.connect(&device()).await.unwrap_err();
        assert!(matches!(err, PrintError::TransportUnavailable(_)));
        assert!(CloudPrntClient::new("ftp://x", Duration::from_secs(1)).is_err());
    }
}
