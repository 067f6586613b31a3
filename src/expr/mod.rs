//! # Expression Evaluation
//!
//! The expression tree, the tuple model it evaluates against, aggregate
//! accumulators, and subquery execution.

pub mod aggregator;
mod expression;
mod subquery;
mod tuple;

pub use aggregator::{create_aggregator, AggregateKind, Aggregator};
pub use expression::{
    compare_with_casts, AggregateRefExpr, ArithOp, ArithmeticExpr, CastExpr, CompOp,
    ComparisonExpr, ConjunctionExpr, ConjunctionKind, Expr, FieldExpr, LiteralExpr,
};
pub use subquery::SubqueryExpr;
pub use tuple::{CompositeTuple, RowTuple, Tuple, TupleCellSpec, ValueListTuple};
