//! Shared types and utilities for the Vigilance workspace.
//!
//! This crate holds the workspace-level error type and the logging
//! initialiser. It stays dependency-light so every other member can
//! depend on it.
//!
//! # Overview
//!
//! - [`observability`]: Centralised tracing/logging initialisation
//! - [`VigilanceError`]: Failures that stop a run before or after normalization
//! - [`ExitStatus`]: Process-level outcome signalled to schedulers
//!
//! # Examples
//!
//! Mapping a failure to its process exit code:
//!
//! ```rust
//! use vigilance_common::{ExitStatus, VigilanceError};
//!
//! let err = VigilanceError::Acquisition("connection refused".into());
//! assert_eq!(err.exit_status(), ExitStatus::NormalizationFailed);
//! assert_eq!(ExitStatus::NormalizationFailed.code(), 1);
//! ```

pub mod observability;

/// Outcome of one invocation, as seen by whatever scheduled it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Record normalized and persisted.
    Success,
    /// Input could not be acquired or normalized; the error record was persisted.
    NormalizationFailed,
    /// The record could not be written.
    PersistenceFailed,
    /// Configuration was incomplete or invalid; nothing ran.
    ConfigInvalid,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::NormalizationFailed => 1,
            ExitStatus::PersistenceFailed => 2,
            ExitStatus::ConfigInvalid => 3,
        }
    }
}

/// Error types used across the Vigilance workspace.
#[derive(thiserror::Error, Debug)]
pub enum VigilanceError {
    /// Raw input could not be obtained from the configured source.
    #[error("Acquisition error: {0}")]
    Acquisition(String),

    /// The sink could not write the record.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input acquisition exceeded its deadline.
    #[error("Timeout occurred after {0}s")]
    Timeout(u64),

    /// Start-up plumbing failed.
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl VigilanceError {
    /// Exit status reported for this failure.
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            VigilanceError::Acquisition(_) | VigilanceError::Timeout(_) => {
                ExitStatus::NormalizationFailed
            }
            VigilanceError::Persistence(_) => ExitStatus::PersistenceFailed,
            VigilanceError::Config(_) | VigilanceError::Internal(_) => ExitStatus::ConfigInvalid,
        }
    }
}
