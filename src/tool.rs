//! Helpers for running external command-line tools.

use crate::error::{EarshotError, Result};
use std::ffi::OsStr;
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::debug;

/// Run `binary` with `args` and return its output if it exited successfully.
///
/// A missing binary maps to [`EarshotError::ToolNotFound`]; a non-zero exit
/// maps to [`EarshotError::ToolFailed`] carrying the tool's stderr.
pub(crate) async fn run<I, S>(binary: &str, args: I) -> Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    debug!("Running {}", binary);

    let result = Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await;

    let output = match result {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(EarshotError::ToolNotFound(binary.to_string()));
        }
        Err(e) => {
            return Err(EarshotError::ToolFailed(format!("{binary} execution failed: {e}")));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(EarshotError::ToolFailed(format!("{binary}: {}", stderr.trim())));
    }

    Ok(output)
}

/// Whether `binary` can be started at all.
pub(crate) async fn is_available(binary: &str) -> bool {
    Command::new(binary)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_tool_not_found() {
        let result = run("earshot-no-such-tool", ["--help"]).await;
        assert!(matches!(result, Err(EarshotError::ToolNotFound(name)) if name == "earshot-no-such-tool"));
        assert!(!is_available("earshot-no-such-tool").await);
    }
}
