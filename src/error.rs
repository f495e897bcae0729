// src/error.rs

//! Unified error handling for the watcher.

use std::fmt;

use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Missing or invalid configuration. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The snapshot file exists but could not be parsed
    #[error("Corrupt state in {path}: {message}")]
    CorruptState { path: String, message: String },

    /// Fetching or extracting products failed
    #[error("Acquisition error for {context}: {message}")]
    Acquisition { context: String, message: String },

    /// A single notification could not be delivered
    #[error("Notification error: {0}")]
    Notification(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a corrupt state error for the given snapshot location.
    pub fn corrupt_state(path: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::CorruptState {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create an acquisition error with context.
    pub fn acquisition(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Acquisition {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a notification error.
    pub fn notification(message: impl fmt::Display) -> Self {
        Self::Notification(message.to_string())
    }

    /// Whether this error must stop the process instead of failing one cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
