//! # Dungeon Test Utilities
//!
//! Shared testing utilities for the dungeon crates:
//! - Scenario builder for integration tests
//! - Determinism test harness
//! - Tracing setup for tests and benches
//! - Fixed-point helpers for test setup
//!
//! Everything here is test support; nothing ships in the engine.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;
pub mod logging;

/// Re-export proptest for convenience.
pub use proptest;
