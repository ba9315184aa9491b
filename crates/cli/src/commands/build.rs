//! Build the configuration artifacts.

use std::path::PathBuf;

use tracing::info;

use crate::assets;
use crate::pipeline::{self, DEFAULT_ORGANIZATION, PipelineError};

/// Arguments of `wifi-login build`.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub organizations: PathBuf,
    pub defaults: PathBuf,
    pub out: PathBuf,
    pub skip_default: bool,
}

/// Runs the pipeline and writes artifacts and asset directories to `out`.
///
/// Rejected documents are logged and left out of the artifacts.
///
/// # Errors
///
/// Returns an error if the default template is unusable or the output cannot
/// be written.
pub fn run(options: &BuildOptions) -> Result<(), PipelineError> {
    let mut outcome = pipeline::run(&options.organizations, &options.defaults)?;
    if options.skip_default && outcome.remove_default() {
        info!(org = DEFAULT_ORGANIZATION, "Skipping organization");
    }

    pipeline::write_artifacts(&outcome.artifacts, &options.out)?;
    for (slug, source) in &outcome.sources {
        assets::install(slug, source, &options.out)?;
    }

    info!(
        organizations = outcome.artifacts.catalog.len(),
        rejected = outcome.rejected.len(),
        out = %options.out.display(),
        "Build finished"
    );
    Ok(())
}
