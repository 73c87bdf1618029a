//! Line forwarding from a child's output pipes to a [`Ui`].

use std::any::Any;
use std::io::{BufRead, BufReader, Read};

use crate::ui::Ui;

/// Which pipe a line came from. Stdout lines are progress, stderr lines
/// are shown as errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub(super) enum StreamType {
    Stdout,
    Stderr,
}

/// Best-effort text of a reader thread's panic payload.
pub(super) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        *msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic"
    }
}

/// Forwards `pipe` to `ui` one line at a time until EOF.
///
/// A read error ends forwarding early; the command's exit status still
/// decides the outcome of the run.
pub(super) fn read_pipe_to_ui<R: Read>(pipe: Option<R>, stream_type: StreamType, ui: &dyn Ui) {
    let Some(pipe) = pipe else {
        tracing::error!(stream = %stream_type, "{} was not captured", stream_type);
        return;
    };

    for line in BufReader::new(pipe).split(b'\n') {
        match line {
            Ok(line) => forward_line(&line, stream_type, ui),
            Err(e) => {
                tracing::warn!(stream = %stream_type, "stopped reading output: {}", e);
                break;
            }
        }
    }
}

/// Sends one line to `ui` without its trailing CR.
fn forward_line(line: &[u8], stream_type: StreamType, ui: &dyn Ui) {
    let text = String::from_utf8_lossy(line);
    let trimmed = text.trim_end_matches('\r');
    match stream_type {
        StreamType::Stdout => ui.message(trimmed),
        StreamType::Stderr => ui.error(trimmed),
    }
}
