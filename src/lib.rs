//! hybridopt: a cascades-style memo and cross-engine push-down planner for a
//! hybrid relational/time-series database.
//!
//! This crate is a thin facade over the workspace's member crates:
//! - [`hybridopt_ir`] defines the expression/operator shapes the memo plans
//!   over.
//! - [`hybridopt_optimizer`] holds the memo, the interner, the
//!   logical-property builder, the ordering simplifier and filter
//!   reorderer, the cross-engine push-down planner, the parallelism
//!   chooser, and the staleness checker.
//! - [`hybridopt_common`] holds the shared error type and scalar value/type
//!   representations.
//!
//! See [`hybridopt_optimizer::optimize`] for the top-level entry point:
//! build an expression tree into a [`Memo`], then call `optimize` with the
//! session's [`EvalContext`] already baked into the memo and an
//! [`OptimizerSettings`] describing the statistics provider, column
//! metadata, white-list oracle, and deployment shape.

pub use hybridopt_common::error::{Error, Result};
pub use hybridopt_common::types::{DataType, Value};
pub use hybridopt_ir::{
    ColumnId, ColumnMetadata, ColumnRole, GroupId, RelExprNode, RelOperator, TableId,
    TableMetadata,
};
pub use hybridopt_optimizer::{
    optimize, AllowAllOracle, EngineTag, EvalContext, MapWhiteListOracle, Memo, OptimizationLevel,
    OptimizedPlan, OptimizerSettings, PlanNode, RuleFlags, WhiteListOracle,
};
