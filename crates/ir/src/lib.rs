//! Expression and operator types shared by the hybridopt memo and planner.
//!
//! This crate defines the *shape* of the tree the optimizer works over: the
//! closed operator tag set (§3 "Operator"), scalar sub-expressions, column
//! and table metadata, functional dependencies, and required physical
//! properties. It deliberately does not know about memos, interning, costs,
//! or engine assignment — those live in `hybridopt-optimizer` and decorate
//! these types rather than extend them.

#![warn(missing_docs)]
#![allow(missing_docs)]

pub mod column;
pub mod expr;
pub mod fd;
pub mod operator;
pub mod props;
pub mod scalar;

pub use column::{ColumnId, ColumnMetadata, ColumnRole, TableId, TableMetadata};
pub use expr::{GroupId, RelExprNode};
pub use fd::FuncDepSet;
pub use operator::{
    ExplainPrivate, ExportPrivate, GroupHint, GroupingFlags, GroupingPrivate, JoinKind,
    JoinPrivate, LimitPrivate, OffsetPrivate, OrderedScanType, OrdinalityPrivate, PrimaryTagValue,
    ProjectPrivate, RelOperator, ScanAgg, ScanAggParam, ScanHint, ScanPrivate, SelectPrivate,
    SetOpKind, SetOpPrivate, SortPrivate, TimeSeriesScanPrivate, ValuesPrivate,
    VirtualScanPrivate, WindowPrivate, WithPrivate, WithScanPrivate,
};
pub use props::{OrderingChoice, OrderingGroup, PhysicalProps, Presentation};
pub use scalar::{AggFunc, CmpOp, ConstValue, ProjectionElemKind, ScalarExpr, ScalarExprKind};
