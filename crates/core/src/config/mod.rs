//! Organization configuration: the value tree, merge/prune, the resolved
//! document and its projections, and the build pipeline.

mod document;
mod merge;
mod merger;
mod value;

pub use document::{project, ClientConfig, ResolvedConfig, ServerConfig, Settings, REQUIRED_KEYS};
pub use merge::{deep_merge, is_pruned, merge_and_prune, prune};
pub use merger::{
    Artifacts, AssetLookup, ConfigMerger, ContentIssue, ContentWarning, Variant, CONTENT_FIELDS,
    SERVER_ASSETS_DIR,
};
pub use value::{ConfigValue, Mapping, Scalar};

use crate::types::{Slug, SlugError};

/// Errors that reject a single organization document.
#[derive(thiserror::Error, Debug)]
pub enum SetupError {
    /// The document could not be parsed.
    #[error("malformed document: {0}")]
    Malformed(String),

    /// The document or its directory could not be read.
    #[error("unreadable: {0}")]
    Unreadable(String),

    /// The merged document is not a mapping.
    #[error("configuration must be a mapping")]
    NotAMapping,

    #[error("required key(s) missing: {}", .0.join(", "))]
    MissingKeys(Vec<&'static str>),

    #[error("invalid slug {slug:?}: {source}")]
    InvalidSlug {
        slug: String,
        #[source]
        source: SlugError,
    },

    #[error("invalid uuid {0:?}")]
    InvalidUuid(String),

    /// Another organization already uses this slug.
    #[error("slug {0} is already used by another organization")]
    DuplicateSlug(Slug),
}
