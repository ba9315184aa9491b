//! HTTP middleware stack for the portal server.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Session layer (tower-sessions with the in-memory store)
//! 5. Security headers

pub mod portal_session;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use portal_session::{PortalSession, RequestSessionStore, SetCookies};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
