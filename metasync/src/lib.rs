//! Change-gated publication of a generated artifact.
//!
//! A run regenerates one artifact file with an external command, compares it
//! byte-for-byte with the committed version, and only on change commits it with
//! a fixed identity. The commit is pushed only when the run executes in the
//! configured canonical repository, so forks never publish.
//!
//! - **[`core`]**: Pure, deterministic logic (diff gate, push authorization,
//!   repository identity). No I/O.
//! - **[`io`]**: Side-effecting adapters (git, child processes, config, run logs),
//!   behind traits where tests substitute fakes.
//!
//! Orchestration ([`pipeline`], [`publish`], [`check`]) wires core logic to I/O
//! for the CLI commands.

pub mod check;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod publish;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
