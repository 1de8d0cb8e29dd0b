//! Scalar expressions: pure, costless sub-trees carried by relational
//! operators (filter predicates, projection lists, aggregate arguments).
//!
//! Scalar expressions nest directly (unlike relational expressions, whose
//! children are memo-group references) because they never need to share a
//! group's multiple physical realizations — they are pure values.

use hybridopt_common::types::DataType;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::column::ColumnId;
use crate::expr::GroupId;

/// An inline literal. Kept intentionally small: this core never evaluates
/// expressions, it only needs literals to recognize scan-agg parameters and
/// constant-folded predicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstValue {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(OrderedFloat<f64>),
    String(String),
}

/// Comparison operators recognized by the filter reorderer and predicate
/// classification helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Aggregate function codes. The statistic-usable subset (§3
/// "Scan-aggregate") and the parallelizable subset (§4.6 step 4) are each a
/// strict subset of this tag set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggFunc {
    Sum,
    Min,
    Max,
    Avg,
    Count,
    CountRows,
    First,
    FirstTs,
    FirstRow,
    FirstRowTs,
    Last,
    LastTs,
    LastRow,
    LastRowTs,
    AnyNotNull,
    ConstAgg,
    CountDistinct,
    Other(String),
}

impl AggFunc {
    /// The ts-engine's statistic reader can compute this aggregate directly
    /// from storage-maintained statistics without reading rows (§3).
    pub fn is_statistic_usable(&self) -> bool {
        matches!(
            self,
            AggFunc::Sum
                | AggFunc::Min
                | AggFunc::Max
                | AggFunc::Avg
                | AggFunc::Count
                | AggFunc::CountRows
                | AggFunc::First
                | AggFunc::FirstTs
                | AggFunc::FirstRow
                | AggFunc::FirstRowTs
                | AggFunc::Last
                | AggFunc::LastTs
                | AggFunc::LastRow
                | AggFunc::LastRowTs
                | AggFunc::AnyNotNull
        )
    }

    /// This aggregate can run in parallel across hash-point ranges in the
    /// ts-engine (§4.6 step 4).
    pub fn is_parallelizable(&self) -> bool {
        matches!(
            self,
            AggFunc::Max
                | AggFunc::Min
                | AggFunc::Sum
                | AggFunc::Avg
                | AggFunc::Count
                | AggFunc::CountRows
                | AggFunc::First
                | AggFunc::FirstRow
                | AggFunc::FirstTs
                | AggFunc::FirstRowTs
                | AggFunc::Last
                | AggFunc::LastRow
                | AggFunc::LastTs
                | AggFunc::LastRowTs
                | AggFunc::ConstAgg
        )
    }
}

/// The kind of a projection element, classified by the push-down planner's
/// `Project` rule (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionElemKind {
    Col,
    Const,
    Func,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarExprKind {
    Column(ColumnId),
    Const(ConstValue),
    Func {
        name: String,
        args: Vec<ScalarExpr>,
    },
    AggOp {
        func: AggFunc,
        args: Vec<ScalarExpr>,
        distinct: bool,
    },
    And(Vec<ScalarExpr>),
    Or(Vec<ScalarExpr>),
    Not(Box<ScalarExpr>),
    Cmp {
        op: CmpOp,
        left: Box<ScalarExpr>,
        right: Box<ScalarExpr>,
    },
    /// `time_bucket(source, width)`, recognized by `canTimeBucketOpt` (§4.6).
    TimeBucket {
        width: ConstValue,
        source: Box<ScalarExpr>,
    },
    /// A sub-query embedded in a tag filter or select conjunct (§4.6
    /// "Sub-queries appearing in tag filters are descended into and
    /// themselves planned"). `plan` points at the sub-query's own memo
    /// group; `outer_refs` lists the enclosing scope's columns the
    /// sub-query correlates against, which the planner folds into the
    /// parent's `outer_columns` (§3 "Logical properties").
    Subquery {
        plan: GroupId,
        outer_refs: Vec<ColumnId>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScalarExpr {
    pub kind: ScalarExprKind,
    pub result_type: DataType,
}

impl ScalarExpr {
    pub fn column(id: ColumnId, ty: DataType) -> Self {
        ScalarExpr {
            kind: ScalarExprKind::Column(id),
            result_type: ty,
        }
    }

    pub fn constant(value: ConstValue, ty: DataType) -> Self {
        ScalarExpr {
            kind: ScalarExprKind::Const(value),
            result_type: ty,
        }
    }

    pub fn as_column(&self) -> Option<ColumnId> {
        match &self.kind {
            ScalarExprKind::Column(c) => Some(*c),
            _ => None,
        }
    }

    pub fn is_const(&self) -> bool {
        matches!(self.kind, ScalarExprKind::Const(_))
    }

    pub fn is_time_bucket(&self) -> bool {
        matches!(self.kind, ScalarExprKind::TimeBucket { .. })
    }

    /// Classification used by the push-down planner's `Project` rule.
    pub fn classify_projection_elem(&self) -> ProjectionElemKind {
        match &self.kind {
            ScalarExprKind::Column(_) => ProjectionElemKind::Col,
            ScalarExprKind::Const(_) => ProjectionElemKind::Const,
            ScalarExprKind::Func { .. }
            | ScalarExprKind::AggOp { .. }
            | ScalarExprKind::TimeBucket { .. } => ProjectionElemKind::Func,
            _ => ProjectionElemKind::Other,
        }
    }

    /// Splits a top-level AND tree into its conjuncts (for the filter
    /// reorderer and predicate push-down classification); a non-AND
    /// expression is its own single conjunct.
    pub fn split_conjuncts(&self) -> Vec<&ScalarExpr> {
        match &self.kind {
            ScalarExprKind::And(children) => {
                children.iter().flat_map(ScalarExpr::split_conjuncts).collect()
            }
            _ => vec![self],
        }
    }

    /// Walks every scalar sub-expression depth-first, including `self`.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a ScalarExpr)) {
        visit(self);
        match &self.kind {
            ScalarExprKind::Func { args, .. } | ScalarExprKind::AggOp { args, .. } => {
                for a in args {
                    a.walk(visit);
                }
            }
            ScalarExprKind::And(items) | ScalarExprKind::Or(items) => {
                for a in items {
                    a.walk(visit);
                }
            }
            ScalarExprKind::Not(inner) => inner.walk(visit),
            ScalarExprKind::Cmp { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            ScalarExprKind::TimeBucket { source, .. } => source.walk(visit),
            ScalarExprKind::Column(_) | ScalarExprKind::Const(_) | ScalarExprKind::Subquery { .. } => {}
        }
    }

    /// Collects every embedded sub-query reachable from `self` (§4.6
    /// sub-query descent).
    pub fn subqueries(&self) -> Vec<(GroupId, &[ColumnId])> {
        let mut out = Vec::new();
        self.walk(&mut |e| {
            if let ScalarExprKind::Subquery { plan, outer_refs } = &e.kind {
                out.push((*plan, outer_refs.as_slice()));
            }
        });
        out
    }
}
