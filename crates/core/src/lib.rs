//! WiFi Login Core - configuration and session routing logic.
//!
//! This crate holds the logic shared by the build pipeline and the portal
//! server:
//! - `cli` - Resolves organization documents into client and server artifacts
//! - `server` - Serves the guarded per-organization portal pages
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no filesystem
//! access, no HTTP clients, no logging. Cookies and session storage are reached
//! through the [`session::SessionStore`] trait and content files through
//! [`config::AssetLookup`], so every decision here is testable in memory.
//!
//! # Modules
//!
//! - [`config`] - Config tree, deep merge/prune, projections and [`ConfigMerger`]
//! - [`catalog`] - Ordered set of known organizations
//! - [`session`] - Cookie/session classification of the visitor
//! - [`verification`] - Whether a verification step is required
//! - [`guard`] - Render-or-redirect decision per requested page
//! - [`portal`] - Runtime state machine tying the above together
//! - [`links`] - Header/footer link visibility
//! - [`types`] - Newtype wrappers for slugs and the user record

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod config;
pub mod guard;
pub mod links;
pub mod portal;
pub mod session;
pub mod types;
pub mod verification;

pub use catalog::OrganizationCatalog;
pub use config::{ClientConfig, ConfigMerger, ConfigValue, ServerConfig, Settings, SetupError};
pub use guard::{GuardState, Page, Route, RouteDecision};
pub use portal::PortalState;
pub use session::{SessionResolver, SessionStore};
pub use types::*;
pub use verification::{VerificationMethod, VerificationRequirement};
