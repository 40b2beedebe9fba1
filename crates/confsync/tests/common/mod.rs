//! Shared test utilities for confsync integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated sync runs against a temp output root
//! - `DocumentBuilder` for assembling configuration documents

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
