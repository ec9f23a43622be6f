pub mod ast;
pub mod eval;
pub mod parse;

pub use ast::{AssertionValue, FilterNode};
pub use eval::{evaluate, matches, EvalContext, Ternary};
pub use parse::parse;
