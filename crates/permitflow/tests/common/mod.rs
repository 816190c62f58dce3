//! Shared test utilities for permitflow integration tests.
//!
//! This module provides:
//! - `TestHarness` with an engine over a temporary database and seeded users
//! - Builders for evidence uploads and configuration files

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
