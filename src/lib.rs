//! async-to-promises: lowers JavaScript `async`/`await` into promise chains
//!
//! This library parses a JavaScript module, rewrites every async function and
//! async generator into continuation-passing code over a small runtime helper
//! library, and prints the result.

pub mod analysis;
pub mod ast;
pub mod cli;
pub mod error;
pub mod helpers;
pub mod ir;
pub mod options;
pub mod rewrite;
pub mod transformer;

pub use error::{Error, Result};
pub use options::{Target, TransformOptions};
pub use transformer::{transform, TransformOutput, Transformer};

// Re-export commonly used types
pub use ast::{FunctionReport, OpaqueStore};
pub use helpers::HelperTable;
