//! URL validation for submissions.
//!
//! A submission must parse as a well-formed absolute URL. The check is purely
//! syntactic: no DNS, no reachability, no host allow-list.

use url::Url;

use crate::error::JobError;

/// Parse `input` as an absolute URL. Surrounding whitespace is ignored.
pub fn validate(input: &str) -> Result<Url, JobError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(invalid(input, "empty"));
    }
    let url = Url::parse(trimmed).map_err(|e| invalid(input, &e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(invalid(input, "not a hierarchical URL"));
    }
    Ok(url)
}

fn invalid(input: &str, reason: &str) -> JobError {
    JobError::Validation {
        url: input.to_string(),
        reason: reason.to_string(),
    }
}
