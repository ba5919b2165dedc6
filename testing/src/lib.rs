//! Shared test fixtures for the context resolution workspace.
//!
//! Provides:
//! - A sample registry catalog covering every context type
//! - A snapshot builder for the identity/environment/time/student/flags
//!   regions
//! - Misbehaving registries (failing, slow, counting) and cascade levels
//!   (failing, panicking)
//! - One-time tracing initialisation for tests

mod fixtures;

pub use fixtures::*;
