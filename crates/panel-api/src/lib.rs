//! Test Panel HTTP API.
//!
//! Axum service exposing the submission, catalog, queue and admin
//! endpoints the test tool and the admin UI talk to. Every response
//! carries a `"success"` flag; errors come back as
//! `{"success": false, "error": "..."}` with a matching status code.
//!
//! # Modules
//!
//! - [`auth`]: API key / session token middleware
//! - [`error`]: `ApiError` and the response envelope
//! - [`handlers`]: the endpoint implementations
//! - [`router`]: the route table
//! - [`state`]: shared [`state::AppState`]

pub mod auth;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use auth::{API_KEY_HEADER, AuthLayer, CurrentUser, SESSION_HEADER};
pub use error::{ApiError, ApiResult};
pub use router::build_router;
pub use state::AppState;
