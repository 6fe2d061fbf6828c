//! Integration test modules.

mod admin_surface;
mod auth_flow;
mod submit_flow;
