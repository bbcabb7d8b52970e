//! CloudPRNT submission contract
//!
//! Client side of the remote job queue. The server persists jobs until the
//! physical printer polls for them; this side only submits and inspects.
//!
//! ```text
//! POST {server}/cloudprnt-api/submit-job   SubmitJobRequest -> SubmitJobResponse
//! GET  {server}/cloudprnt-api/status       -> StatusResponse
//! GET  {server}/cloudprnt-api/printers     -> PrintersResponse
//! ```

use serde::{Deserialize, Serialize};

use crate::models::{PrinterFamily, Receipt};

pub const SUBMIT_JOB_PATH: &str = "cloudprnt-api/submit-job";
pub const STATUS_PATH: &str = "cloudprnt-api/status";
pub const PRINTERS_PATH: &str = "cloudprnt-api/printers";

/// Job submission body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobRequest {
    pub printer_mac: String,
    pub receipt_data: Receipt,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_order: Option<serde_json::Value>,
    pub printer_type: PrinterFamily,
}

/// Job submission result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobResponse {
    pub success: bool,
    pub job_id: Option<String>,
    pub error: Option<String>,
}

/// Server health
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub queued_jobs: Option<u64>,
    #[serde(default)]
    pub connected_printers: Option<u64>,
}

/// Printer known to the CloudPRNT server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrinterRecord {
    pub mac: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Last time the printer polled, as reported by the server
    #[serde(default)]
    pub last_poll: Option<String>,
    #[serde(default)]
    pub queued_jobs: u64,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrintersResponse {
    #[serde(default)]
    pub printers: Vec<PrinterRecord>,
}
