//! Queries over lowered async function bodies
//!
//! - Reachability of return/throw/break/continue exits
//! - Suspension point detection
//! - Name usage (references, assignments, declarations)

pub mod reachability;
pub mod references;

pub use reachability::{always_exits, may_fall_through, paths_reach, ExitKinds, Reach};
pub use references::{count_suspensions, expr_suspends, stmt_suspends, stmts_suspend};
