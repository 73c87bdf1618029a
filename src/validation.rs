//! Configuration validation.
//!
//! [`ConfigValidator`] turns raw configuration layers into a
//! [`ProvisionConfig`]. Every check runs regardless of earlier failures and
//! all defects are returned together in one
//! [`ValidationErrors`](crate::error::ValidationErrors).

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde_yaml::Value;
use tracing::debug;

use crate::config::{ProvisionConfig, RawConfig, apply_defaults};
use crate::error::{ProvisionerError, io_error_kind_message};
use crate::template::{JinjaTemplateEngine, TemplateEngine};

/// The kind of filesystem entry a configured path must point to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathKind {
    #[default]
    File,
    Directory,
}

/// Checks a single configured path.
///
/// `key` is the configuration key used to tag the error message. Returns
/// one human-readable defect on failure.
pub fn validate_path(path: &Utf8Path, key: &str, kind: PathKind) -> Result<(), String> {
    let metadata = fs::metadata(path)
        .map_err(|e| format!("{}: {} is invalid: {}", key, path, io_error_kind_message(&e)))?;

    match kind {
        PathKind::File if !metadata.is_file() => {
            Err(format!("{}: {} must point to a file", key, path))
        }
        PathKind::Directory if !metadata.is_dir() => {
            Err(format!("{}: {} must point to a directory", key, path))
        }
        _ => Ok(()),
    }
}

/// Checks a single-valued file setting, optionally requiring it to be set.
pub fn validate_file_config(path: &Utf8Path, key: &str, required: bool) -> Result<(), String> {
    if path.as_str().is_empty() {
        if required {
            return Err(format!("{} must be specified", key));
        }
        return Ok(());
    }
    validate_path(path, key, PathKind::File)
}

/// Builds a validated [`ProvisionConfig`] from raw configuration layers.
pub struct ConfigValidator {
    engine: Box<dyn TemplateEngine>,
    base_dir: Option<Utf8PathBuf>,
    playbook_paths_kind: PathKind,
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigValidator {
    /// Creates a validator using [`JinjaTemplateEngine`].
    pub fn new() -> Self {
        Self::with_engine(Box::new(JinjaTemplateEngine::new()))
    }

    pub fn with_engine(engine: Box<dyn TemplateEngine>) -> Self {
        Self {
            engine,
            base_dir: None,
            playbook_paths_kind: PathKind::File,
        }
    }

    /// Resolves relative local paths against `base_dir` before checking them.
    #[must_use]
    pub fn with_base_dir(mut self, base_dir: impl Into<Utf8PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    /// Sets the entry kind required for each `playbook_paths` item.
    #[must_use]
    pub fn with_playbook_paths_kind(mut self, kind: PathKind) -> Self {
        self.playbook_paths_kind = kind;
        self
    }

    /// Decodes, defaults, expands and checks the configuration.
    ///
    /// # Errors
    ///
    /// - `ProvisionerError::Config` if a raw layer is not a mapping.
    /// - `ProvisionerError::Validation` carrying every defect found.
    pub fn validate(&self, raws: &[Value]) -> Result<ProvisionConfig, ProvisionerError> {
        let (raw, mut errs) = RawConfig::decode(raws)?;
        let mut raw = apply_defaults(raw);
        if let Some(base_dir) = &self.base_dir {
            raw.resolve_paths(base_dir);
        }

        for key in raw.unused.keys() {
            errs.push(format!("unknown configuration key: {}", key));
        }

        let staging_template = raw.staging_directory.take().unwrap_or_default();
        let staging_dir = match self
            .engine
            .expand(&staging_template, &raw.common.packer_user_variables)
        {
            Ok(expanded) => expanded,
            Err(e) => {
                errs.push(format!("error processing staging_directory: {:#}", e));
                staging_template
            }
        };

        errs.collect(validate_file_config(&raw.playbook_file, "playbook_file", true));

        for path in &raw.playbook_paths {
            errs.collect(validate_path(path, "playbook_paths", self.playbook_paths_kind));
        }

        for path in &raw.role_paths {
            errs.collect(validate_path(path, "role_paths", PathKind::Directory));
        }

        if !errs.is_empty() {
            debug!("configuration rejected with {} error(s)", errs.len());
            return Err(ProvisionerError::Validation(errs));
        }

        Ok(ProvisionConfig {
            common: raw.common,
            playbook_file: raw.playbook_file,
            playbook_paths: raw.playbook_paths,
            role_paths: raw.role_paths,
            staging_dir,
        })
    }
}
