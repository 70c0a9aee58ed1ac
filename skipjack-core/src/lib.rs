//! Core types for Skipjack
//!
//! This crate contains the fundamental types and error handling used throughout
//! the Skipjack project. It provides:
//!
//! - Common error types with [`Error`] and [`Result`]
//! - Construction-time tuning parameters via [`SkipListConfig`]
//!
//! # Example
//!
//! ```
//! use skipjack_core::SkipListConfig;
//!
//! let config = SkipListConfig {
//!     max_height: 12,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

pub mod config;
pub mod error;

pub use config::{SkipListConfig, DEFAULT_MAX_HEIGHT, DEFAULT_PROBABILITY, MAX_HEIGHT_LIMIT};
pub use error::{Error, Result};
