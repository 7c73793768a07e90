//! Bridge between the oxc arena tree and the owned rewrite tree
//!
//! The module is organized into sub-modules by direction:
//!
//! - `scan`: read-only queries over oxc nodes (names, `eval`, `this`)
//! - `opaque_store`: arena nodes parked while their function is rewritten
//! - `lowering/`: oxc statements and expressions into `ir`
//! - `builders/`: `ir` back into oxc nodes
//! - `pass`: the post-order visitor that drives all of the above

pub mod builders;
pub mod lowering;
pub mod opaque_store;
pub mod pass;
pub mod scan;

pub use builders::Emitter;
pub use lowering::Lowerer;
pub use opaque_store::{OpaqueNode, OpaqueStore};
pub use pass::{AsyncLowering, FunctionForm, FunctionReport, PassOutput};
