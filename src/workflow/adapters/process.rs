//! Shell command execution shared by the command-backed handlers.

use crate::workflow::ports::{StepHandlerError, StepHandlerResult};
use camino::Utf8Path;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Runs `command` through `bash -c` inside `dir`.
///
/// Returns standard output followed by standard error. The child is killed
/// if `cancellation` fires first.
pub(super) async fn run_shell(
    kind: &'static str,
    command: &str,
    dir: &Utf8Path,
    cancellation: &CancellationToken,
) -> StepHandlerResult<String> {
    tracing::debug!(kind, command, dir = %dir, "running shell command");
    let child = Command::new("bash")
        .arg("-c")
        .arg(command)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|err| StepHandlerError::launch(kind, err))?;

    let output = tokio::select! {
        result = child.wait_with_output() => {
            result.map_err(|err| StepHandlerError::launch(kind, err))?
        }
        () = cancellation.cancelled() => {
            tracing::warn!(kind, command, "shell command cancelled");
            return Err(StepHandlerError::Cancelled);
        }
    };

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    if output.status.success() {
        Ok(combined)
    } else {
        Err(StepHandlerError::CommandFailed {
            kind,
            status: output.status.to_string(),
            output: combined,
        })
    }
}
