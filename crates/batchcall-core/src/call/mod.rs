//! Building blocks of a batch call: invocations, assemblers and the tree
//! that orders them.

mod assembler;
mod invocation;
mod tree;

pub use assembler::{CollectAssembler, FoldAssembler, PlainAssembler, ResultAssembler};
pub use invocation::Invocation;
pub use tree::{BatchCall, BatchCallTree, StepInfo};
