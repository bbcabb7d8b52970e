use kuitti_printer::PrintError;
use thiserror::Error;

use crate::receipt::ReceiptError;

#[derive(Error, Debug)]
pub enum EdgeError {
    #[error(transparent)]
    Print(#[from] PrintError),

    #[error(transparent)]
    Receipt(#[from] ReceiptError),

    #[error("Printer not found: {0}")]
    PrinterNotFound(String),

    #[error("No active printer for {0} mode")]
    NoPrinter(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Printer configuration file: {0}")]
    Persistence(String),

    #[error("Print worker for {0} has stopped")]
    WorkerStopped(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl EdgeError {
    /// Text for the operator; driver failures keep their specific wording
    pub fn operator_message(&self) -> String {
        match self {
            EdgeError::Print(e) => e.operator_message(),
            EdgeError::Receipt(e) => format!("Receipt could not be printed: {}", e),
            EdgeError::PrinterNotFound(id) => format!("Unknown printer {}", id),
            EdgeError::NoPrinter(mode) => {
                format!("No printer configured for {} printing", mode)
            }
            other => other.to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, EdgeError::Print(e) if e.is_retryable())
    }
}

pub type Result<T> = std::result::Result<T, EdgeError>;
