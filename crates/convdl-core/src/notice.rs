//! Two-field user notification for a finished job.

use std::fmt;

use crate::error::JobError;
use crate::session::JobReport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }

    /// Notice shown when a job ends. Only validation failures get a specific
    /// message; every other failure asks the user to retry, and the detail
    /// goes to the log.
    pub fn for_report(report: &JobReport) -> Self {
        match &report.outcome {
            Ok(artifact) => Notice::new(
                "Success",
                format!("File downloaded to {}", artifact.path.display()),
            ),
            Err(JobError::Validation { .. }) => Notice::new("Error", "Please enter a valid link"),
            Err(_) => Notice::new("Error", "Failed to download file. Please try again."),
        }
    }

    pub fn is_error(&self) -> bool {
        self.title == "Error"
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.message)
    }
}
