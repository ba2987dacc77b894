//! Abstract syntax tree for the optimizer's input programs.
//!
//! The AST is the structured statement/expression model the CSE pass works
//! on: blocks nest, branches and loops own their bodies, and every expression
//! slot can be addressed by an [`ExprPath`] so occurrences can be rewritten in
//! place after analysis.

mod types;
pub use types::*;

mod visit;
pub use visit::{
    collect_block_writes, Access, Branches, Container, ExprPath, LoopParts, ModifiedSet,
    StmtKind,
};

mod printer;
