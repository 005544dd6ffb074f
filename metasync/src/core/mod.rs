//! Deterministic, pure logic for the publication pipeline.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs suitable for tests.

pub mod authorize;
pub mod gate;
pub mod repo_id;
pub mod types;
