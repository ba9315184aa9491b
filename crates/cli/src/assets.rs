//! Organization asset directories.

use std::fs;
use std::path::Path;

use tracing::debug;
use wifi_login_core::Slug;

use crate::pipeline::PipelineError;

const CLIENT_ASSETS: &str = "client_assets";
const SERVER_ASSETS: &str = "server_assets";

/// Creates `client/assets/<slug>` and `server/assets/<slug>` below `out` and
/// copies the organization's `client_assets` and `server_assets` into them.
///
/// Running it twice leaves the same tree behind. Missing source directories
/// are fine; the target directories are still created.
///
/// # Errors
///
/// Returns an error if a directory cannot be created or a file copied.
pub fn install(slug: &Slug, source: &Path, out: &Path) -> Result<(), PipelineError> {
    let client_target = out.join("client/assets").join(slug.as_str());
    let server_target = out.join("server/assets").join(slug.as_str());

    copy_tree(&source.join(CLIENT_ASSETS), &client_target)?;
    copy_tree(&source.join(SERVER_ASSETS), &server_target)?;
    debug!(org = %slug, "Assets installed");
    Ok(())
}

fn copy_tree(from: &Path, to: &Path) -> Result<(), PipelineError> {
    fs::create_dir_all(to).map_err(|e| PipelineError::io(to, e))?;
    if !from.is_dir() {
        return Ok(());
    }

    for entry in fs::read_dir(from).map_err(|e| PipelineError::io(from, e))? {
        let path = entry.map_err(|e| PipelineError::io(from, e))?.path();
        let Some(name) = path.file_name() else {
            continue;
        };
        let target = to.join(name);
        if path.is_dir() {
            copy_tree(&path, &target)?;
        } else {
            fs::copy(&path, &target).map_err(|e| PipelineError::io(&path, e))?;
        }
    }
    Ok(())
}
