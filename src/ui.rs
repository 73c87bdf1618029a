//! User-facing message sink.
//!
//! The provisioner reports progress through [`Ui`] rather than writing to
//! the terminal itself, so a host build pipeline can route messages into
//! its own output. [`TracingUi`] forwards everything to `tracing`.

/// Leveled text output for progress reporting.
///
/// Implementations must be `Send + Sync` because communicators stream
/// command output to the UI from reader threads.
pub trait Ui: Send + Sync {
    /// A top-level announcement (e.g., "Provisioning with Ansible...").
    fn say(&self, message: &str);

    /// A progress or output line belonging to the current step.
    fn message(&self, message: &str);

    /// An error line (e.g., stderr of the remote command).
    fn error(&self, message: &str);
}

/// UI that emits every message as a `tracing` event.
///
/// `say` and `message` are logged at INFO so that command output is visible
/// in real-time at the default log level; `error` is logged at WARN because
/// tools such as ansible-playbook print warnings on stderr.
#[derive(Debug, Default, Clone)]
pub struct TracingUi;

impl Ui for TracingUi {
    fn say(&self, message: &str) {
        tracing::info!("==> {}", message);
    }

    fn message(&self, message: &str) {
        tracing::info!("    {}", message);
    }

    fn error(&self, message: &str) {
        tracing::warn!("    {}", message);
    }
}
