//! I/O adapters for the publication pipeline.

pub mod config;
pub mod fetcher;
pub mod generator;
pub mod git;
pub mod init;
pub mod message;
pub mod process;
pub mod run_context;
pub mod run_log;
pub mod vcs;
