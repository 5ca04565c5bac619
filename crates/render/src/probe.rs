//! Availability checks for external tools, reported by the health endpoint.

use std::time::Duration;

use serde::Serialize;
use tokio::process::Command;

use crate::subprocess::run_command;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Whether a tool could be run, and what it reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolStatus {
    Available { version: String },
    Unavailable { reason: String },
}

impl ToolStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, ToolStatus::Available { .. })
    }
}

/// Run `binary version_flag` and report the first line it prints.
pub async fn probe_version(binary: &str, version_flag: &str) -> ToolStatus {
    let mut cmd = Command::new(binary);
    cmd.arg(version_flag);
    match run_command(&mut cmd, PROBE_TIMEOUT).await {
        Ok(output) if output.success() => {
            let text = if output.stdout.trim().is_empty() {
                &output.stderr
            } else {
                &output.stdout
            };
            ToolStatus::Available {
                version: text.lines().next().unwrap_or_default().trim().to_string(),
            }
        }
        Ok(output) => ToolStatus::Unavailable {
            reason: format!("exited with code {}", output.exit_code),
        },
        Err(e) => ToolStatus::Unavailable {
            reason: e.to_string(),
        },
    }
}
