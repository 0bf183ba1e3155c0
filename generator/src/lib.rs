mod symbol;
mod tree;
mod environment;
mod fill;
mod builder;
mod generator;
mod config;
mod emit;
mod error;

pub use crate::symbol::{FuncName, VarName};
pub use crate::tree::{
    ArithmeticOp, Block, ComparisonOp, Expr, InsertionPoint, PoiId, Program, Shape, Signature, Skeleton, Stmt,
};
pub use crate::environment::{scope_at, Environment};
pub use crate::fill::Fillable;
pub use crate::builder::Builder;
pub use crate::generator::{validate, Enumerator, Rejection, Stats, MIN_BINDING_ARITY};
pub use crate::config::{Library, Operator};
pub use crate::emit::{render, Emit, Emitter};
pub use crate::error::{GenError, Result};

/// Every scope-valid program buildable from `library`, lazily.
pub fn control_flows(library: &Library) -> Enumerator<'_> {
    Enumerator::new(library)
}

/// Rendered text of every program buildable from `library`.
pub fn generate(library: &Library) -> impl Iterator<Item = Result<String>> + '_ {
    control_flows(library).map(|p| p.map(|p| render(&p)))
}
