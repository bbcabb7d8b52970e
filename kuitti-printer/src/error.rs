//! Error types for the printer library
//!
//! Every driver translates its native failures into [`PrintError`] before they
//! leave the driver boundary.

use std::io;
use thiserror::Error;

/// Printer error types
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PrintError {
    /// Connect or write did not finish in time
    #[error("Timeout: {0}")]
    ConnectionTimeout(String),

    /// Remote end refused the connection
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    /// Established connection was reset or closed mid-job
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Missing OS capability: Bluetooth off, bridge absent, no spooler
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    /// Receipt or document could not be turned into bytes
    #[error("Encoding failed: {0}")]
    ProtocolEncoding(String),

    /// CloudPRNT server rejected the job or answered non-2xx
    #[error("Remote submission failed: {0}")]
    RemoteSubmission(String),

    /// Operation attempted on a device that is not connected
    #[error("Printer not connected: {0}")]
    NotConnected(String),

    /// Invalid printer configuration (address, port, MAC)
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Illegal connection state transition or unknown device
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl PrintError {
    /// Timeouts, refusals and dropped links are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PrintError::ConnectionTimeout(_)
                | PrintError::ConnectionRefused(_)
                | PrintError::ConnectionLost(_)
        )
    }

    /// Message shown to the operator; each variant maps to a different action
    pub fn operator_message(&self) -> String {
        match self {
            PrintError::ConnectionTimeout(_)
            | PrintError::ConnectionRefused(_)
            | PrintError::ConnectionLost(_) => {
                "Printer offline: check that it is switched on and reachable".to_string()
            }
            PrintError::TransportUnavailable(detail) => {
                format!("Configuration problem: {}", detail)
            }
            PrintError::ProtocolEncoding(detail) => {
                format!("Receipt could not be printed: {}", detail)
            }
            PrintError::RemoteSubmission(_) => "Could not reach print service".to_string(),
            PrintError::NotConnected(_) => {
                "Printer not connected: connect it before printing".to_string()
            }
            PrintError::InvalidConfig(detail) => format!("Configuration problem: {}", detail),
            PrintError::InvalidState(detail) => format!("Printer busy or unknown: {}", detail),
        }
    }
}

impl From<io::Error> for PrintError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                PrintError::ConnectionTimeout(e.to_string())
            }
            io::ErrorKind::ConnectionRefused => PrintError::ConnectionRefused(e.to_string()),
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::NotConnected => PrintError::ConnectionLost(e.to_string()),
            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                PrintError::TransportUnavailable(e.to_string())
            }
            io::ErrorKind::InvalidInput | io::ErrorKind::AddrNotAvailable => {
                PrintError::InvalidConfig(e.to_string())
            }
            _ => PrintError::ConnectionLost(e.to_string()),
        }
    }
}

/// Result type for printer operations
pub type PrintResult<T> = Result<T, PrintError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_translation() {
        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        assert!(matches!(PrintError::from(refused), PrintError::ConnectionRefused(_)));

        let reset = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        assert!(matches!(PrintError::from(reset), PrintError::ConnectionLost(_)));

        let missing = io::Error::new(io::ErrorKind::NotFound, "/dev/rfcomm0");
        assert!(matches!(PrintError::from(missing), PrintError::TransportUnavailable(_)));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(PrintError::ConnectionTimeout("x".into()).is_retryable());
        assert!(PrintError::ConnectionRefused("x".into()).is_retryable());
        assert!(PrintError::ConnectionLost("x".into()).is_retryable());
        assert!(!PrintError::TransportUnavailable("bluetooth off".into()).is_retryable());
        assert!(!PrintError::RemoteSubmission("500".into()).is_retryable());
        assert!(!PrintError::NotConnected("p1".into()).is_retryable());
    }

    #[test]
    fn test_operator_messages_are_distinct() {
        let offline = PrintError::ConnectionTimeout("x".into()).operator_message();
        let service = PrintError::RemoteSubmission("x".into()).operator_message();
        let config = PrintError::TransportUnavailable("bluetooth off".into()).operator_message();
        assert!(offline.starts_with("Printer offline"));
        assert_eq!(service, "Could not reach print service");
        assert!(config.contains("bluetooth off"));
    }
}
