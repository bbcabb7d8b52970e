//! Print Job Model

use serde::{Deserialize, Serialize};

use super::receipt::Receipt;

/// Lifecycle of one transport attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    #[default]
    Queued,
    Sending,
    Acked,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Acked | JobState::Failed)
    }
}

/// Encoded payload on its way to one printer
///
/// Discarded after reaching a terminal state; CloudPRNT jobs live on in the
/// remote queue under `remote_job_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintJob {
    pub id: String,
    pub target_printer: String,
    #[serde(skip)]
    pub payload: Vec<u8>,
    /// Structured receipt, required by CloudPRNT submission
    pub receipt: Option<Receipt>,
    pub attempts: u32,
    pub state: JobState,
    pub last_error: Option<String>,
    pub remote_job_id: Option<String>,
}

impl PrintJob {
    pub fn new(target_printer: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            target_printer: target_printer.into(),
            payload,
            receipt: None,
            attempts: 0,
            state: JobState::Queued,
            last_error: None,
            remote_job_id: None,
        }
    }

    pub fn with_receipt(mut self, receipt: Receipt) -> Self {
        self.receipt = Some(receipt);
        self
    }

    /// Enter `Sending` and count the attempt
    pub fn begin_attempt(&mut self) {
        self.attempts += 1;
        self.state = JobState::Sending;
    }

    pub fn mark_acked(&mut self, remote_job_id: Option<String>) {
        self.state = JobState::Acked;
        self.last_error = None;
        self.remote_job_id = remote_job_id;
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.state = JobState::Failed;
        self.last_error = Some(error.into());
    }
}
