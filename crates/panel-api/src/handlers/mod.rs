//! HTTP handlers, grouped by surface.

pub mod account;
pub mod admin;
pub mod catalog;
pub mod queue;
pub mod records;
pub mod submission;
