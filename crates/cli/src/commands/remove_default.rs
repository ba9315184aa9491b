//! Remove the `default` organization from written artifacts.

use std::path::Path;

use tracing::info;

use crate::pipeline::{self, DEFAULT_ORGANIZATION, PipelineError};

/// Removes the `default` organization from the artifacts in `out`.
///
/// # Errors
///
/// Returns an error if the artifacts cannot be read or rewritten.
pub fn run(out: &Path) -> Result<(), PipelineError> {
    if pipeline::remove_default(out)? {
        info!(org = DEFAULT_ORGANIZATION, "Organization removed");
    } else {
        info!(org = DEFAULT_ORGANIZATION, "Organization not present, nothing to do");
    }
    Ok(())
}
