//! Data models
//!
//! One canonical representation per concept. Persistence row shapes live in
//! `kuitti-edge::printing::persistence` and are converted at that boundary.

pub mod order;
pub mod print_job;
pub mod printer;
pub mod receipt;
pub mod settings;

// Re-exports
pub use order::*;
pub use print_job::*;
pub use printer::*;
pub use receipt::*;
pub use settings::*;
