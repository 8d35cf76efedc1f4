//! Integration tests for demoflow
//!
//! These tests drive the orchestrator, relay and page agents together through the
//! in-memory fabric, and the binary through its command line.

#[path = "../common/mod.rs"]
pub mod common;

pub mod cli;
pub mod playback_flow;
pub mod sync_protocol;
