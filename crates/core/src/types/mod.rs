//! Core types for WiFi login pages.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod slug;
pub mod user;

pub use slug::{Slug, SlugError};
pub use user::UserData;
