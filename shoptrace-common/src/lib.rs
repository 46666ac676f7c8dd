//! Common types and utilities shared across shoptrace crates.
//!
//! This crate defines the shared error type and observability helpers used
//! throughout the shoptrace workspace. It is intentionally lightweight so
//! that every crate can depend on it without heavy transitive costs.
//!
//! # Overview
//!
//! - [`observability`]: Centralised tracing/logging initialisation
//! - [`TraceError`] and [`Result`]: Shared error handling
//!
//! # Examples
//!
//! ```rust
//! use shoptrace_common::TraceError;
//!
//! let err = TraceError::NoElementAtPoint { x: 10.0, y: 20.0 };
//! assert_eq!(err.to_string(), "No element at point (10, 20)");
//! ```

pub mod observability;

/// Error types used across the shoptrace system.
#[derive(thiserror::Error, Debug)]
pub enum TraceError {
    /// A driver (WebDriver session, renderer backend) reported an error.
    #[error("Driver error: {0}")]
    Driver(#[from] anyhow::Error),

    /// A point query returned nothing.
    #[error("No element at point ({x}, {y})")]
    NoElementAtPoint { x: f64, y: f64 },

    /// The ancestor walk from the popup never settled on a container.
    #[error("Popup container not found after {depth} ancestors")]
    PopupContainerNotFound { depth: usize },

    /// Scheduled interaction was cancelled before it completed.
    #[error("Interaction cancelled")]
    Cancelled,
}

impl TraceError {
    /// Wrap an arbitrary backend message as a driver error.
    pub fn driver(msg: impl std::fmt::Display) -> Self {
        Self::Driver(anyhow::anyhow!("{msg}"))
    }
}

/// Convenient alias for results that use [`TraceError`].
pub type Result<T> = std::result::Result<T, TraceError>;
