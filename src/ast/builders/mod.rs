//! AST construction utilities
//!
//! This module turns rewritten `ir` trees back into oxc arena nodes.

pub mod emitter;

pub use emitter::Emitter;
