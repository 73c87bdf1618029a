//! Execution and file-transfer channel to the target machine.
//!
//! This module provides:
//! - [`RemoteCmd`]: Specification for a command to run on the target
//! - [`Communicator`]: Trait for channels (SSH, WinRM, local shell, ...)
//! - [`LocalCommunicator`]: Implementation targeting the local machine

mod local;
mod pipe;

use std::io::Read;

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};

use crate::ui::Ui;

pub use local::LocalCommunicator;

/// Specification for a command to run on the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCmd {
    /// Shell command line, interpreted by the target's shell
    pub command: String,
    /// Working directory on the target (optional, defaults to the channel's own)
    pub cwd: Option<Utf8PathBuf>,
}

impl RemoteCmd {
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            cwd: None,
        }
    }

    /// Sets the working directory
    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<Utf8PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

/// Channel to the machine being provisioned.
///
/// Every method blocks until the operation has completed or failed. An
/// `Err` means the channel could not carry out the request; a command that
/// ran and failed is reported through the exit status of [`start`](Self::start)
/// instead.
///
/// Implementations must be `Send + Sync` so a host pipeline can share one
/// channel between provisioners. Serializing concurrent use is the
/// implementation's responsibility.
pub trait Communicator: Send + Sync {
    /// Creates `path` and any missing parents on the target.
    fn create_dir(&self, path: &Utf8Path) -> Result<()>;

    /// Writes everything read from `data` to the file `path` on the target.
    fn upload(&self, path: &Utf8Path, data: &mut dyn Read) -> Result<()>;

    /// Recursively copies the local directory `src` into `dst` on the target.
    ///
    /// Without a trailing slash `src` itself is placed inside `dst`
    /// (`roles/common` lands at `<dst>/common`); with a trailing slash only
    /// its contents are copied.
    fn upload_dir(&self, dst: &Utf8Path, src: &Utf8Path) -> Result<()>;

    /// Runs `cmd` on the target, streaming output to `ui`, and returns its exit status.
    fn start(&self, cmd: &RemoteCmd, ui: &dyn Ui) -> Result<i32>;
}
