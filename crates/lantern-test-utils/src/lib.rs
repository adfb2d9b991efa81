#![deny(unsafe_code)]

//! Shared test utilities for the Lantern workspace.
//!
//! Provides on-disk project fixtures, config builders, and tracing helpers
//! so that individual crate tests stay concise and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! lantern-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod fixture;
pub mod tracing_setup;
