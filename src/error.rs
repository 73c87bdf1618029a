//! Domain-specific error types for the Ansible provisioner.
//!
//! This module defines `ProvisionerError`, a `thiserror`-based enum that
//! provides typed error variants for every way a provisioning run can end
//! badly. Public API functions return `Result<T, ProvisionerError>` for
//! programmatic error handling, while trait boundaries (`Communicator`,
//! `TemplateEngine`) continue to use `anyhow::Result`.
//!
//! `ProvisionerError` implements `Into<anyhow::Error>`, so the `?` operator
//! converts it automatically in the CLI layer.

use std::fmt;
use std::io;

use crate::provisioner::Step;

/// Formats an IO error kind into a human-readable message.
///
/// Provides consistent, user-friendly messages for common IO error kinds
/// (e.g., "I/O error: not found") instead of the OS-level messages
/// (e.g., "No such file or directory (os error 2)"). For unrecognized
/// error kinds, falls back to including the OS-level error message
/// directly (e.g., "I/O error: connection refused").
pub(crate) fn io_error_kind_message(err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::NotFound => "I/O error: not found".to_string(),
        io::ErrorKind::PermissionDenied => "I/O error: permission denied".to_string(),
        io::ErrorKind::IsADirectory => "I/O error: is a directory".to_string(),
        _ => format!("I/O error: {}", err),
    }
}

/// Every defect found while validating a configuration.
///
/// Validation never stops at the first problem; each field check appends
/// here and the whole set is reported at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one defect.
    pub fn push(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Records the defect carried by `result`, if any.
    pub(crate) fn collect(&mut self, result: Result<(), String>) {
        if let Err(e) = result {
            self.push(e);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.errors.iter().map(String::as_str)
    }

    /// Returns true if any recorded defect contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.iter().any(|e| e.contains(needle))
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} error(s) occurred:", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n* {}", error)?;
        }
        Ok(())
    }
}

/// Domain-specific error type for the provisioner.
///
/// Provides typed variants for common failure modes, enabling callers
/// to tell "the tool ran and failed" apart from "the tool could not be run"
/// without parsing error message strings.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ProvisionerError {
    /// The raw configuration layers do not have the shape of a configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// One or more configuration values failed validation.
    #[error("{0}")]
    Validation(ValidationErrors),

    /// A staging, upload or execution step failed at the channel level.
    #[error("error {step}: {cause:#}")]
    Step {
        /// The step that was being attempted.
        step: Step,
        /// The underlying failure reported by the communicator or the local filesystem.
        cause: anyhow::Error,
    },

    /// `ansible-playbook` ran to completion and reported failure.
    #[error("non-zero exit status: {status}")]
    NonZeroExit {
        /// The command that was executed on the target.
        command: String,
        /// The exit status reported by the communicator.
        status: i32,
    },

    /// The run was cancelled before the named step started.
    #[error("provisioning cancelled before {step}")]
    Cancelled {
        /// The first step that was not attempted.
        step: Step,
    },
}

impl ProvisionerError {
    /// Wraps a step failure, preserving the cause's context chain.
    pub(crate) fn step(step: Step, cause: impl Into<anyhow::Error>) -> Self {
        Self::Step {
            step,
            cause: cause.into(),
        }
    }

    /// Returns the exit status if the remote command ran and failed.
    pub fn exit_status(&self) -> Option<i32> {
        match self {
            Self::NonZeroExit { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the failed step for channel-level failures and cancellations.
    pub fn failed_step(&self) -> Option<Step> {
        match self {
            Self::Step { step, .. } | Self::Cancelled { step } => Some(*step),
            _ => None,
        }
    }
}
