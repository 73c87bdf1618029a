//! Communicator for the local machine.
//!
//! This module provides [`LocalCommunicator`], which treats the machine the
//! provisioner runs on as the target: uploads are filesystem copies and
//! commands run through `sh -c` with real-time output streaming.

use std::fs::{self, File};
use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;

use anyhow::{Context, Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use walkdir::WalkDir;
use which::which;

use super::pipe::{StreamType, panic_message, read_pipe_to_ui};
use super::{Communicator, RemoteCmd};
use crate::ui::Ui;

/// Kills a child process after an internal failure so that the reader
/// threads see EOF and the surrounding thread scope can join them.
fn kill_child(child: &mut Child) {
    let pid = child.id();
    if let Err(e) = child.kill() {
        tracing::debug!(pid = pid, "kill returned error (process may have already exited): {}", e);
    }
    if let Err(e) = child.wait() {
        tracing::warn!(pid = pid, "failed to wait for child process after kill: {}", e);
    }
}

/// Communicator whose target is the local machine.
///
/// When `dry_run` is true, every operation is logged but not performed and
/// `start()` reports exit status 0.
#[derive(Debug, Default, Clone)]
pub struct LocalCommunicator {
    pub dry_run: bool,
}

impl LocalCommunicator {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    /// Waits for `child` while its output is forwarded to `ui` from two reader threads.
    fn stream_and_wait(child: &mut Child, command: &str, ui: &dyn Ui) -> Result<ExitStatus> {
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();

        thread::scope(|scope| {
            let stdout_handle = match thread::Builder::new()
                .name("stdout-reader".to_string())
                .spawn_scoped(scope, move || read_pipe_to_ui(stdout_pipe, StreamType::Stdout, ui))
            {
                Ok(handle) => handle,
                Err(e) => {
                    kill_child(child);
                    bail!("{}: failed to spawn stdout reader thread: {}", command, e);
                }
            };

            let stderr_handle = match thread::Builder::new()
                .name("stderr-reader".to_string())
                .spawn_scoped(scope, move || read_pipe_to_ui(stderr_pipe, StreamType::Stderr, ui))
            {
                Ok(handle) => handle,
                Err(e) => {
                    kill_child(child);
                    bail!("{}: failed to spawn stderr reader thread: {}", command, e);
                }
            };

            let status = match child.wait() {
                Ok(status) => status,
                Err(e) => {
                    kill_child(child);
                    bail!("{}: failed to wait for command: {}", command, e);
                }
            };

            let mut panicked_streams = Vec::new();
            for (name, handle) in [("stdout", stdout_handle), ("stderr", stderr_handle)] {
                if let Err(e) = handle.join() {
                    let msg = panic_message(&*e);
                    tracing::error!(stream = name, panic = msg, "reader thread panicked");
                    panicked_streams.push(format!("{}: {}", name, msg));
                }
            }
            if !panicked_streams.is_empty() {
                bail!(
                    "{}: reader thread(s) panicked during command execution: {}",
                    command,
                    panicked_streams.join(", ")
                );
            }

            Ok(status)
        })
    }
}

impl Communicator for LocalCommunicator {
    fn create_dir(&self, path: &Utf8Path) -> Result<()> {
        if self.dry_run {
            tracing::info!("dry run: create directory {}", path);
            return Ok(());
        }
        fs::create_dir_all(path).with_context(|| format!("failed to create directory: {}", path))
    }

    fn upload(&self, path: &Utf8Path, data: &mut dyn Read) -> Result<()> {
        if self.dry_run {
            tracing::info!("dry run: upload to {}", path);
            return Ok(());
        }
        let mut file =
            File::create(path).with_context(|| format!("failed to create file: {}", path))?;
        let written =
            io::copy(data, &mut file).with_context(|| format!("failed to write file: {}", path))?;
        tracing::debug!("uploaded {} byte(s) to {}", written, path);
        Ok(())
    }

    fn upload_dir(&self, dst: &Utf8Path, src: &Utf8Path) -> Result<()> {
        let target_root = if src.as_str().ends_with('/') {
            dst.to_path_buf()
        } else {
            let name = src
                .file_name()
                .with_context(|| format!("cannot determine directory name of {}", src))?;
            dst.join(name)
        };

        if self.dry_run {
            tracing::info!("dry run: upload directory {} to {}", src, target_root);
            return Ok(());
        }

        for entry in WalkDir::new(src).follow_links(true) {
            let entry = entry.with_context(|| format!("failed to walk directory: {}", src))?;
            let path = Utf8PathBuf::try_from(entry.path().to_path_buf())
                .with_context(|| format!("non UTF-8 path under {}", src))?;
            let relative = path
                .strip_prefix(src)
                .with_context(|| format!("{} is not under {}", path, src))?;
            let target = target_root.join(relative);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&target)
                    .with_context(|| format!("failed to create directory: {}", target))?;
            } else {
                fs::copy(&path, &target)
                    .with_context(|| format!("failed to copy {} to {}", path, target))?;
                tracing::trace!("copied {} to {}", path, target);
            }
        }
        Ok(())
    }

    fn start(&self, cmd: &RemoteCmd, ui: &dyn Ui) -> Result<i32> {
        if self.dry_run {
            tracing::info!("dry run: {:?}", cmd);
            return Ok(0);
        }

        let shell = which("sh").context("command not found: sh")?;
        tracing::trace!("shell found: {}", shell.to_string_lossy());

        let mut command = Command::new(shell);
        command.arg("-c").arg(&cmd.command);
        if let Some(ref cwd) = cmd.cwd {
            command.current_dir(cwd);
        }
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .with_context(|| format!("failed to spawn command `{}`", cmd.command))?;
        tracing::trace!("spawned command: {}: pid={}", cmd.command, child.id());

        let status = Self::stream_and_wait(&mut child, &cmd.command, ui)?;
        tracing::trace!("executed command: {}: success={}", cmd.command, status.success());

        match status.code() {
            Some(code) => Ok(code),
            None => bail!(
                "{}: process exited without status (possibly killed by signal)",
                cmd.command
            ),
        }
    }
}
