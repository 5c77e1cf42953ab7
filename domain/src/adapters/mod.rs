//! Test-only adapters that live inside the domain crate for convenience.
//!
//! These are intended for unit tests and local demos. Real stores (MongoDB,
//! SQLite) live in separate adapter crates.

pub mod memory_repo;
