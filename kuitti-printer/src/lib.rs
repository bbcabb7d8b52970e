//! # kuitti-printer
//!
//! Thermal printer library - low-level printing capabilities only.
//!
//! ## Scope
//!
//! This crate handles HOW to print:
//! - ESC/POS and StarPRNT command building
//! - QR and Code39 sub-protocols, with a selectable Star QR layout
//! - Windows-1252 text conversion for Finnish receipts
//! - Transport drivers: TCP 9100, Bluetooth classic, Bluetooth LE,
//!   the host print service and CloudPRNT submission
//!
//! Business logic (WHAT to print) stays in `kuitti-edge`: receipt building,
//! pricing, layout and the printer registry.
//!
//! ## Example
//!
//! ```ignore
//! use kuitti_printer::{PrintDocument, Transport, encoder_for};
//! use kuitti_printer::transport::NetworkTransport;
//!
//! let mut doc = PrintDocument::new(48);
//! doc.text("**TILAUS #1042**").qr("1042");
//!
//! let bytes = encoder_for(PrinterFamily::Star, None).encode(&doc)?;
//!
//! let transport = NetworkTransport::default();
//! let mut session = transport.connect(&device).await?;
//! transport.send(&mut session, &PrintJob::new(device.id.clone(), bytes)).await?;
//! ```

pub mod barcode;
pub mod document;
pub mod encoder;
pub mod encoding;
mod error;
pub mod escpos;
pub mod qr;
pub mod star;
pub mod transport;

// Re-exports
pub use document::{DocLine, PrintDocument, Span, parse_markers};
pub use encoder::{Encoder, EscPosEncoder, StarEncoder, encoder_for};
pub use encoding::{ellipsize, encode_cp1252, text_width, truncate};
pub use error::{PrintError, PrintResult};
pub use escpos::EscPosBuilder;
pub use qr::{QrErrorLevel, QrMethod, QrOptions};
pub use star::StarBuilder;
pub use transport::{Delivery, DiscoveryEvent, Session, Transport};
