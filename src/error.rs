//! Custom error types for callring

use thiserror::Error;

/// Main error type for callring operations
#[derive(Error, Debug)]
pub enum CallRingError {
    #[cfg(any(windows, test))]
    #[error("Popup window error: {0}")]
    Popup(String),

    #[cfg(any(windows, test))]
    #[error("Icon error: {0}")]
    Icon(String),

    #[cfg(windows)]
    #[error("Windows API error: {0}")]
    WindowsApi(#[from] windows::core::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for callring operations
pub type CallRingResult<T> = Result<T, CallRingError>;
