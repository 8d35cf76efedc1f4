//! Shared test utilities for demoflow
//!
//! Store fixtures and sample scripts used by the integration tests.

pub mod fixtures;
