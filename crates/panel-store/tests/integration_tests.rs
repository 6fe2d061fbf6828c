//! Integration test suite for the panel store.
//!
//! Exercises the full submission lifecycle against a real in-memory SQLite
//! database: first submission, hash precheck, archive-on-update, regression
//! flagging, and the retest/notification loop.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

mod common;
mod integration;
