//! Hand a persisted artifact to the platform's share/open facility.

use std::path::Path;
use std::process::{Command, Stdio};

use crate::config::ShareConfig;
use crate::error::ShareError;

/// Offers an artifact path to something outside the process. Failures are
/// reported to the caller, which logs and absorbs them.
pub trait ShareHandoff: Send + Sync + 'static {
    fn offer(&self, path: &Path) -> Result<(), ShareError>;
}

/// Platform opener for the artifact.
fn platform_command() -> Option<Vec<String>> {
    let program = if cfg!(target_os = "windows") {
        "explorer"
    } else if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(unix) {
        "xdg-open"
    } else {
        return None;
    };
    Some(vec![program.to_string()])
}

/// Runs an external program with the artifact path as its last argument and
/// waits for it to exit.
#[derive(Debug, Clone)]
pub struct SystemShare {
    command: Option<Vec<String>>,
}

impl SystemShare {
    /// Use `command` (program + leading args), or the platform opener when `None`.
    pub fn new(command: Option<Vec<String>>) -> Self {
        let command = command
            .filter(|c| !c.is_empty())
            .or_else(platform_command);
        Self { command }
    }

    pub fn from_config(cfg: &ShareConfig) -> Self {
        Self::new(cfg.command.clone())
    }

    pub fn command(&self) -> Option<&[String]> {
        self.command.as_deref()
    }
}

impl ShareHandoff for SystemShare {
    fn offer(&self, path: &Path) -> Result<(), ShareError> {
        let argv = self.command.as_deref().ok_or(ShareError::Unsupported)?;
        let (program, args) = argv.split_first().ok_or(ShareError::Unsupported)?;
        tracing::debug!(program = %program, path = %path.display(), "offering artifact");
        let status = Command::new(program)
            .args(args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|source| ShareError::Launch {
                program: program.clone(),
                source,
            })?;
        if !status.success() {
            return Err(ShareError::Exit {
                program: program.clone(),
                status: status.to_string(),
            });
        }
        Ok(())
    }
}

/// Sharing disabled: accepts every offer and does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoShare;

impl ShareHandoff for NoShare {
    fn offer(&self, path: &Path) -> Result<(), ShareError> {
        tracing::debug!(path = %path.display(), "sharing disabled; artifact left in place");
        Ok(())
    }
}
