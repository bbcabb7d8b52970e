//! Core module - configuration and error types
//!
//! # Contents
//!
//! - [`Config`] - environment configuration
//! - [`EdgeError`] - errors surfaced by the print service

pub mod config;
pub mod error;

pub use config::Config;
pub use error::{EdgeError, Result};
