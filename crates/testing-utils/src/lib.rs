//! # Gigmarket Testing Utils
//!
//! Shared testing utilities for the workspace: in-memory implementations of
//! every repository port, entity builders, service wiring helpers and a
//! PostgreSQL test container.
//!
//! ```toml
//! [dev-dependencies]
//! gigmarket-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod containers;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use containers::*;
pub use helpers::*;
pub use mocks::*;
