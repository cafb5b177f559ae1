use crate::types::UpdatePolicy;
use thiserror::Error;

/// Failures surfaced by the update engine.
///
/// Everything below `main` returns these; `main` decides whether to print and exit.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("Proxy {url} is invalid: {reason}")]
    InvalidProxy { url: String, reason: String },

    #[error("No version found in the repository listing for policy {policy}")]
    NoVersionFound { policy: UpdatePolicy },

    #[error("{target} not found on any mirror (tried: {})", .urls.join(", "))]
    ArtifactNotFound { target: String, urls: Vec<String> },

    #[error("{context}{}", format_failures(.failures))]
    FetchFailed {
        context: String,
        failures: Vec<String>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl UpdateError {
    /// Errors that will not change if the same request is repeated.
    pub fn is_deterministic(&self) -> bool {
        matches!(
            self,
            UpdateError::ArtifactNotFound { .. } | UpdateError::NoVersionFound { .. }
        )
    }
}

fn format_failures(failures: &[String]) -> String {
    let mut out = String::new();
    for (i, failure) in failures.iter().enumerate() {
        out.push_str(&format!("\n  [{}] {}", i + 1, failure));
    }
    out
}
