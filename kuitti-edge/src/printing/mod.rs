//! Printing module - printers, connections and jobs
//!
//! - [`registry`]: device records and their connection state
//! - [`manager`]: connect / send / disconnect on top of the transport drivers
//! - [`retry`]: bounded reconnect backoff
//! - [`dispatcher`]: one worker and one queue per printer
//! - [`discovery`]: feeds driver discovery into the registry
//! - [`persistence`]: printer rows from the BaaS export
//! - [`service`]: the operator-facing API tying it together

pub mod discovery;
pub mod dispatcher;
pub mod manager;
pub mod persistence;
pub mod registry;
pub mod retry;
pub mod service;

pub use discovery::DiscoveryReport;
pub use dispatcher::{DispatchOutcome, PrintDispatcher};
pub use manager::ConnectionManager;
pub use persistence::{LoadedConfig, PrinterRow, PrintSettingsRow, load_printers_file, save_printers_file};
pub use registry::{PrinterRegistry, RegistryEvent};
pub use retry::ReconnectPolicy;
pub use service::PrintService;
