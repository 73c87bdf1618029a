//! Shared test doubles and fixtures.

use std::io::Read;
use std::sync::Mutex;

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use ansible_local::communicator::{Communicator, RemoteCmd};
use ansible_local::config::ProvisionConfig;
use ansible_local::ui::Ui;
use ansible_local::validation::ConfigValidator;
use ansible_local::ProvisionerError;
use tempfile::TempDir;

/// A single request received by [`RecordingCommunicator`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(dead_code)]
pub enum Call {
    CreateDir(String),
    /// Remote path and the uploaded bytes
    Upload(String, String),
    /// Remote destination and local source
    UploadDir(String, String),
    Start(RemoteCmd),
}

impl Call {
    /// Short name used to select which call should fail.
    pub fn kind(&self) -> &'static str {
        match self {
            Call::CreateDir(_) => "create_dir",
            Call::Upload(..) => "upload",
            Call::UploadDir(..) => "upload_dir",
            Call::Start(_) => "start",
        }
    }
}

/// Communicator that records every request and never touches the system.
///
/// The `fail_on`-th call (1-indexed) returns an error; `start` returns
/// `exit_status` otherwise.
#[derive(Default)]
pub struct RecordingCommunicator {
    calls: Mutex<Vec<Call>>,
    fail_on: Option<usize>,
    exit_status: i32,
    output: Vec<String>,
}

#[allow(dead_code)]
impl RecordingCommunicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on_call(fail_on: usize) -> Self {
        Self {
            fail_on: Some(fail_on),
            ..Self::default()
        }
    }

    pub fn with_exit_status(mut self, exit_status: i32) -> Self {
        self.exit_status = exit_status;
        self
    }

    /// Lines `start` writes to the UI before returning.
    pub fn with_output(mut self, lines: &[&str]) -> Self {
        self.output = lines.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_kinds(&self) -> Vec<&'static str> {
        self.calls().iter().map(Call::kind).collect()
    }

    fn record(&self, call: Call) -> Result<()> {
        let mut calls = self.calls.lock().unwrap();
        let kind = call.kind();
        calls.push(call);
        if self.fail_on == Some(calls.len()) {
            anyhow::bail!("mock {} failure", kind);
        }
        Ok(())
    }
}

impl Communicator for RecordingCommunicator {
    fn create_dir(&self, path: &Utf8Path) -> Result<()> {
        self.record(Call::CreateDir(path.to_string()))
    }

    fn upload(&self, path: &Utf8Path, data: &mut dyn Read) -> Result<()> {
        let mut contents = String::new();
        data.read_to_string(&mut contents)?;
        self.record(Call::Upload(path.to_string(), contents))
    }

    fn upload_dir(&self, dst: &Utf8Path, src: &Utf8Path) -> Result<()> {
        self.record(Call::UploadDir(dst.to_string(), src.to_string()))
    }

    fn start(&self, cmd: &RemoteCmd, ui: &dyn Ui) -> Result<i32> {
        self.record(Call::Start(cmd.clone()))?;
        for line in &self.output {
            ui.message(line);
        }
        Ok(self.exit_status)
    }
}

/// UI that keeps every message with its level.
#[derive(Default)]
pub struct RecordingUi {
    lines: Mutex<Vec<(&'static str, String)>>,
}

#[allow(dead_code)]
impl RecordingUi {
    pub fn lines(&self) -> Vec<(&'static str, String)> {
        self.lines.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.lines().into_iter().map(|(_, m)| m).collect()
    }
}

impl Ui for RecordingUi {
    fn say(&self, message: &str) {
        self.lines.lock().unwrap().push(("say", message.to_string()));
    }

    fn message(&self, message: &str) {
        self.lines.lock().unwrap().push(("message", message.to_string()));
    }

    fn error(&self, message: &str) {
        self.lines.lock().unwrap().push(("error", message.to_string()));
    }
}

/// A temporary directory holding playbooks and roles.
pub struct Workspace {
    _temp_dir: TempDir,
    pub root: Utf8PathBuf,
}

#[allow(dead_code)]
impl Workspace {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
        let root = Utf8PathBuf::from_path_buf(temp_dir.path().to_path_buf())
            .expect("path should be valid UTF-8");
        Self {
            _temp_dir: temp_dir,
            root,
        }
    }

    /// Writes a file (creating parent directories) and returns its path.
    pub fn file(&self, relative: &str, contents: &str) -> Utf8PathBuf {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent dir");
        }
        std::fs::write(&path, contents).expect("failed to write file");
        path
    }

    /// Creates a directory and returns its path.
    pub fn dir(&self, relative: &str) -> Utf8PathBuf {
        let path = self.root.join(relative);
        std::fs::create_dir_all(&path).expect("failed to create dir");
        path
    }

    /// Creates a role directory with a `tasks/main.yml`.
    pub fn role(&self, relative: &str) -> Utf8PathBuf {
        self.file(&format!("{}/tasks/main.yml", relative), "- debug: msg=hi\n");
        self.root.join(relative)
    }

    pub fn path(&self, relative: &str) -> Utf8PathBuf {
        self.root.join(relative)
    }

    /// Validates `yaml` with relative paths resolved against this workspace.
    pub fn validate(&self, yaml: &str) -> Result<ProvisionConfig, ProvisionerError> {
        validate_yaml_in(yaml, &self.root)
    }
}

/// Parses a YAML configuration layer.
#[allow(dead_code)]
pub fn yaml(s: &str) -> serde_yaml::Value {
    serde_yaml::from_str(s).expect("test yaml should parse")
}

#[allow(dead_code)]
pub fn validate_yaml_in(yaml_str: &str, base_dir: &Utf8Path) -> Result<ProvisionConfig, ProvisionerError> {
    ConfigValidator::new()
        .with_base_dir(base_dir)
        .validate(&[yaml(yaml_str)])
}
