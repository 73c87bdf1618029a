//! Ansible local provisioner.
//!
//! Stages the playbook, roles and extra playbooks in a directory on the
//! target through a [`Communicator`], then runs `ansible-playbook` there
//! against `localhost` with a local connection. The run is a fixed, linear
//! sequence of [`Step`]s; the first failing step ends it.

use std::fs::File;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::communicator::{Communicator, RemoteCmd};
use crate::config::ProvisionConfig;
use crate::error::ProvisionerError;
use crate::ui::Ui;

/// Subdirectory of the staging directory that receives role directories.
pub const ROLES_DIR: &str = "roles";

/// One stage of a provisioning run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Step {
    #[strum(serialize = "creating staging directory")]
    StagingDirectory,
    #[strum(serialize = "uploading main playbook")]
    MainPlaybook,
    #[strum(serialize = "uploading roles")]
    Roles,
    #[strum(serialize = "uploading playbooks")]
    Playbooks,
    #[strum(serialize = "executing Ansible")]
    Execute,
}

/// Result of a completed `ansible-playbook` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionOutcome {
    /// The command that was executed on the target
    pub command: String,
    /// Exit status reported by the communicator
    pub exit_status: i32,
}

impl ProvisionOutcome {
    /// Returns true if the command exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }

    /// Converts a non-zero exit status into `ProvisionerError::NonZeroExit`.
    pub fn into_result(self) -> Result<Self, ProvisionerError> {
        if self.success() {
            Ok(self)
        } else {
            Err(ProvisionerError::NonZeroExit {
                command: self.command,
                status: self.exit_status,
            })
        }
    }
}

/// Builds the `ansible-playbook` command line for a staged playbook.
///
/// `playbook` is the playbook's name relative to the staging directory; it
/// is shell-quoted when it contains characters the shell would interpret.
pub fn ansible_command(playbook: &str) -> String {
    format!("ansible-playbook {} --verbose --connection=local", shell_words::quote(playbook))
}

/// Returns the final component of a local path, as used on the target.
fn staged_name(path: &Utf8Path) -> anyhow::Result<&str> {
    path.file_name()
        .with_context(|| format!("cannot determine file name of {}", path))
}

/// Provisioner that runs Ansible on the target machine itself.
///
/// ## Lifecycle
///
/// 1. [`ConfigValidator::validate()`](crate::validation::ConfigValidator::validate)
///    produces the [`ProvisionConfig`]
/// 2. [`new()`](Self::new) wraps it
/// 3. [`provision()`](Self::provision) runs the staging/upload/execute sequence
/// 4. [`cancel()`](Self::cancel) may be called from another thread at any time
#[derive(Debug)]
pub struct AnsibleLocalProvisioner {
    config: ProvisionConfig,
    cancel: CancellationToken,
}

impl AnsibleLocalProvisioner {
    pub fn new(config: ProvisionConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &ProvisionConfig {
        &self.config
    }

    /// Requests cancellation of the current or next run.
    ///
    /// Cancellation is checked before each step. A step already in progress,
    /// including a running `ansible-playbook`, is not interrupted and may
    /// keep running on the target. Nothing already uploaded is removed.
    pub fn cancel(&self) {
        info!("cancellation requested");
        self.cancel.cancel();
    }

    /// Returns a handle that cancels this provisioner when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn ensure_not_cancelled(&self, step: Step) -> Result<(), ProvisionerError> {
        if self.cancel.is_cancelled() {
            return Err(ProvisionerError::Cancelled { step });
        }
        Ok(())
    }

    fn staging_path(&self, name: &str) -> Utf8PathBuf {
        Utf8Path::new(&self.config.staging_dir).join(name)
    }

    /// Runs the full provisioning sequence against `comm`.
    ///
    /// # Errors
    ///
    /// - `ProvisionerError::Cancelled` if cancellation was requested before a step
    /// - `ProvisionerError::Step` if the communicator fails a request
    /// - `ProvisionerError::NonZeroExit` if `ansible-playbook` exits non-zero
    pub fn provision(
        &self,
        ui: &dyn Ui,
        comm: &dyn Communicator,
    ) -> Result<ProvisionOutcome, ProvisionerError> {
        ui.say("Provisioning with Ansible...");

        self.ensure_not_cancelled(Step::StagingDirectory)?;
        ui.message("Creating Ansible staging directory...");
        let staging_dir = Utf8Path::new(&self.config.staging_dir);
        comm.create_dir(staging_dir)
            .map_err(|e| ProvisionerError::step(Step::StagingDirectory, e))?;

        self.ensure_not_cancelled(Step::MainPlaybook)?;
        ui.message("Uploading main Playbook file...");
        self.upload_file(comm, &self.config.playbook_file)
            .map_err(|e| ProvisionerError::step(Step::MainPlaybook, e))?;

        if !self.config.role_paths.is_empty() {
            self.ensure_not_cancelled(Step::Roles)?;
            ui.message("Uploading role directories...");
            let roles_dir = self.staging_path(ROLES_DIR);
            for path in &self.config.role_paths {
                debug!("uploading role directory {} to {}", path, roles_dir);
                comm.upload_dir(&roles_dir, path)
                    .with_context(|| format!("failed to upload {}", path))
                    .map_err(|e| ProvisionerError::step(Step::Roles, e))?;
            }
        }

        if !self.config.playbook_paths.is_empty() {
            self.ensure_not_cancelled(Step::Playbooks)?;
            ui.message("Uploading additional Playbooks...");
            for path in &self.config.playbook_paths {
                self.upload_file(comm, path)
                    .map_err(|e| ProvisionerError::step(Step::Playbooks, e))?;
            }
        }

        self.ensure_not_cancelled(Step::Execute)?;
        self.execute_ansible(ui, comm)
    }

    /// Uploads a local file to the staging directory under its own name.
    ///
    /// The local file is closed when this returns, on every path.
    fn upload_file(&self, comm: &dyn Communicator, src: &Utf8Path) -> anyhow::Result<()> {
        let dst = self.staging_path(staged_name(src)?);
        let mut file = File::open(src).with_context(|| format!("failed to open {}", src))?;
        debug!("uploading {} to {}", src, dst);
        comm.upload(&dst, &mut file)
            .with_context(|| format!("failed to upload {}", src))
    }

    fn execute_ansible(
        &self,
        ui: &dyn Ui,
        comm: &dyn Communicator,
    ) -> Result<ProvisionOutcome, ProvisionerError> {
        let playbook = staged_name(&self.config.playbook_file)
            .map_err(|e| ProvisionerError::step(Step::Execute, e))?;
        let command = ansible_command(playbook);

        ui.message(&format!("Executing Ansible: {}", command));
        let cmd = RemoteCmd::new(command.clone()).with_cwd(self.config.staging_dir.as_str());
        let exit_status = comm
            .start(&cmd, ui)
            .map_err(|e| ProvisionerError::step(Step::Execute, e))?;

        info!("ansible-playbook exited with status {}", exit_status);
        ProvisionOutcome {
            command,
            exit_status,
        }
        .into_result()
    }
}
