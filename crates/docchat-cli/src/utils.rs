//! Shared utilities

use std::path::PathBuf;

use docchat_core::{ExclusionReason, FileCandidate, SelectionReport};

/// Truncate a string to `max` characters, appending "..." if truncated.
/// Operates on Unicode char boundaries, not bytes.
pub fn truncate_chars(s: &str, max: usize) -> String {
    let mut chars = s.chars();
    let truncated: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}

/// Read every path into an upload candidate.
///
/// Unreadable paths are returned separately with the reason.
pub async fn read_candidates(paths: &[PathBuf]) -> (Vec<FileCandidate>, Vec<String>) {
    let mut candidates = Vec::with_capacity(paths.len());
    let mut unreadable = Vec::new();
    for path in paths {
        match FileCandidate::from_path(path).await {
            Ok(candidate) => candidates.push(candidate),
            Err(e) => {
                tracing::debug!("Cannot read {}: {}", path.display(), e);
                unreadable.push(format!("{}: {}", path.display(), e));
            }
        }
    }
    (candidates, unreadable)
}

/// User-facing text for a failed backend operation
pub fn describe_error(error: &docchat_core::Error) -> String {
    match error {
        docchat_core::Error::Client(e) if e.is_connection() => {
            "backend is not reachable".to_string()
        }
        docchat_core::Error::Client(e) if e.is_rejection() => {
            format!("rejected by the backend ({})", e)
        }
        other => other.to_string(),
    }
}

/// One line per excluded file, e.g. `c.pdf (only .txt and .md)`
pub fn describe_exclusions(report: &SelectionReport) -> Vec<String> {
    report
        .excluded
        .iter()
        .map(|e| {
            let reason = match e.reason {
                ExclusionReason::UnsupportedType => "only .txt and .md",
                ExclusionReason::OverLimit => "batch is full",
            };
            format!("{} ({})", e.name, reason)
        })
        .collect()
}
