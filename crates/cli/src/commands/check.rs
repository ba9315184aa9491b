//! Validate organization documents without writing anything.

use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::pipeline::{self, PipelineError};

#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("{0} organization document(s) rejected")]
    Rejected(usize),
}

/// Runs the pipeline and reports warnings and rejections.
///
/// # Errors
///
/// Returns [`CheckError::Rejected`] if any document was rejected.
#[allow(clippy::print_stdout)]
pub fn run(organizations: &Path, defaults: &Path) -> Result<(), CheckError> {
    let outcome = pipeline::run(organizations, defaults)?;

    for warning in &outcome.artifacts.warnings {
        println!("warning: {warning}");
    }
    for rejection in &outcome.rejected {
        println!("rejected: {}: {}", rejection.document.display(), rejection.error);
    }

    if !outcome.rejected.is_empty() {
        return Err(CheckError::Rejected(outcome.rejected.len()));
    }
    info!(organizations = outcome.artifacts.catalog.len(), "All organizations valid");
    Ok(())
}
