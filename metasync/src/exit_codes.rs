//! Stable exit codes for metasync CLI commands.

/// Run finished: nothing to publish, or published (pushed or push withheld).
pub const OK: i32 = 0;
/// Invalid config/arguments, or a pipeline stage failed.
pub const FAILED: i32 = 1;
/// `metasync check` found that the artifact would change.
pub const CHANGED: i32 = 2;
