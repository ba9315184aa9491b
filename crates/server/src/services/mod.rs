//! Clients and helpers used by the route handlers.

pub mod radius;
pub mod signing;

pub use radius::{AccountApi, AccountApiError, Credentials, LoginResponse, RadiusClient};
