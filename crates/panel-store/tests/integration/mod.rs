//! Integration test modules.

mod retest_flow;
mod submission_flow;
