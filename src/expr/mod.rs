//! Expression trees rebuilt from a method's flat instruction stream.
//!
//! Each instruction becomes one node; a node adopts as children the most recent
//! unconsumed nodes, as many as its resolved arity.

mod arity;
mod node;
mod tree;

pub use arity::{ArityClass, resolve_arity};
pub use node::{BranchOperand, Comparison, ExprNode, FieldAccess, MathOp, NodeId, NodeKind, make_node};
pub use tree::{ExprTree, describe};
