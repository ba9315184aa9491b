//! Markdown modal content (privacy policy, terms and conditions).
//!
//! Files are read from `<artifacts>/server/assets/<slug>/`, rendered to HTML
//! with comrak and cached in memory for 5 minutes. Raw HTML in the markdown is
//! not passed through.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use comrak::{Options, markdown_to_html};
use moka::future::Cache;
use thiserror::Error;
use wifi_login_core::Slug;

/// Errors that can occur while loading modal content.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("invalid content path: {0}")]
    InvalidPath(String),
}

/// Rendered markdown files of every organization.
#[derive(Clone)]
pub struct ModalContent {
    assets_dir: PathBuf,
    cache: Cache<PathBuf, Arc<str>>,
}

impl ModalContent {
    /// Serves files below `assets_dir/<slug>/`.
    #[must_use]
    pub fn new(assets_dir: PathBuf) -> Self {
        let cache = Cache::builder()
            .max_capacity(500)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Self { assets_dir, cache }
    }

    /// Renders `file` of organization `slug` to HTML.
    ///
    /// # Errors
    ///
    /// Returns an error if `file` escapes the organization's asset directory
    /// or cannot be read.
    pub async fn render(&self, slug: &Slug, file: &str) -> Result<Arc<str>, ContentError> {
        let relative = Path::new(file);
        let is_plain = !file.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !is_plain {
            return Err(ContentError::InvalidPath(file.to_string()));
        }

        let path = self.assets_dir.join(slug.as_str()).join(relative);
        if let Some(html) = self.cache.get(&path).await {
            return Ok(html);
        }

        let markdown = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ContentError::Io(format!("{}: {e}", path.display())))?;
        let html: Arc<str> = render_markdown(&markdown).into();

        self.cache.insert(path, Arc::clone(&html)).await;
        Ok(html)
    }
}

fn render_markdown(content: &str) -> String {
    let mut options = Options::default();

    // Enable GFM extensions
    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;

    markdown_to_html(content, &options)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn slug() -> Slug {
        Slug::parse("default").unwrap()
    }

    #[test]
    fn test_render_markdown_strips_raw_html() {
        let html = render_markdown("# Privacy\n\n<script>alert(1)</script>\n\n**bold**");
        assert!(html.contains("<h1>Privacy</h1>"));
        assert!(html.contains("<strong>bold</strong>"));
        assert!(!html.contains("<script>"));
    }

    #[tokio::test]
    async fn test_render_reads_organization_file() {
        let dir = tempfile::tempdir().unwrap();
        let org_dir = dir.path().join("default");
        std::fs::create_dir_all(&org_dir).unwrap();
        std::fs::write(org_dir.join("privacy-policy.md"), "# Policy").unwrap();

        let content = ModalContent::new(dir.path().to_path_buf());
        let html = content.render(&slug(), "privacy-policy.md").await.unwrap();
        assert!(html.contains("<h1>Policy</h1>"));

        // Served from cache once the file is gone.
        std::fs::remove_file(org_dir.join("privacy-policy.md")).unwrap();
        assert!(content.render(&slug(), "privacy-policy.md").await.is_ok());
    }

    #[tokio::test]
    async fn test_render_rejects_traversal() {
        let content = ModalContent::new(PathBuf::from("/nonexistent"));
        for file in ["../other/secret.md", "/etc/passwd", "", "./a.md"] {
            assert!(matches!(
                content.render(&slug(), file).await,
                Err(ContentError::InvalidPath(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_render_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let content = ModalContent::new(dir.path().to_path_buf());
        assert!(matches!(
            content.render(&slug(), "missing.md").await,
            Err(ContentError::Io(_))
        ));
    }
}
