//! Error types for Skipjack
//!
//! This module defines the error types used throughout Skipjack.

use thiserror::Error;

/// The main error type for Skipjack operations
#[derive(Error, Debug)]
pub enum Error {
    /// An I/O error occurred while writing a diagnostic dump
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A construction parameter was rejected
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A specialized Result type for Skipjack operations
pub type Result<T> = std::result::Result<T, Error>;
