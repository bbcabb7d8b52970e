//! Kuitti Edge - receipt printing for the till
//!
//! # Overview
//!
//! Turns orders into receipts and gets them onto thermal printers:
//!
//! - **Receipts** (`receipt`): size and topping price resolution, totals,
//!   fixed-width layout
//! - **Printing** (`printing`): printer registry, connection state machine,
//!   per-printer job workers, discovery and persisted printer rows
//! - **Core** (`core`): configuration and errors
//!
//! Byte encoding and the transport drivers live in `kuitti-printer`.
//!
//! # Module layout
//!
//! ```text
//! kuitti-edge/src/
//! ├── core/          # Config, EdgeError
//! ├── receipt/       # builder, pricing, size, layout, money
//! ├── printing/      # registry, manager, dispatcher, service
//! └── utils/         # logging
//! ```

pub mod core;
pub mod printing;
pub mod receipt;
pub mod utils;

pub use core::{Config, EdgeError, Result};
pub use printing::{ConnectionManager, PrintService, PrinterRegistry, ReconnectPolicy, RegistryEvent};
pub use receipt::{ReceiptError, ReceiptRenderer, build_receipt};
pub use utils::logger::{cleanup_old_logs, init_logger_with_file};
