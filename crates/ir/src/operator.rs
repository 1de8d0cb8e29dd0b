//! The closed operator tag set (§3 "Operator") and each operator's private
//! decoration.

use serde::{Deserialize, Serialize};

use crate::column::{ColumnId, TableId};
use crate::props::OrderingChoice;
use crate::scalar::{AggFunc, ConstValue, ScalarExpr};

/// A primary-tag value. Represented as raw bytes so the ordered-scan
/// eligibility check (§4.6 "disable ordered scan if ... any primary-tag
/// value has length > 100") is a plain length check.
pub type PrimaryTagValue = Vec<u8>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderedScanType {
    None,
    Ordered,
    SortAfterScan,
    ForceOrdered,
}

/// One aggregate the ts-engine will compute in-scan from storage-maintained
/// statistics (§3 "Scan-aggregate").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanAgg {
    pub params: Vec<ScanAggParam>,
    pub func: AggFunc,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanAggParam {
    Column(ColumnId),
    Const(ConstValue),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanHint {
    None,
    OnlyTag,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanPrivate {
    pub table_id: TableId,
    pub table_name: String,
    pub output_columns: Vec<ColumnId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSeriesScanPrivate {
    pub table_id: TableId,
    pub table_name: String,
    pub output_columns: Vec<ColumnId>,
    pub primary_tag_values: Vec<PrimaryTagValue>,
    pub hash_point_range: Option<(u64, u64)>,
    pub ordered_scan: OrderedScanType,
    pub filters: Vec<ScalarExpr>,
    pub scan_aggs: Vec<ScanAgg>,
    pub hint: ScanHint,
}

impl TimeSeriesScanPrivate {
    /// §4.6 "Disable ordered scan if the primary-tag-value set is empty or
    /// any primary-tag value has length > 100".
    pub fn ordered_scan_eligible(&self) -> bool {
        !self.primary_tag_values.is_empty()
            && self.primary_tag_values.iter().all(|v| v.len() <= 100)
    }

    /// §4.6 "if any primary-tag value is a singleton, set
    /// `onlyOnePrimaryTagValue = true`".
    pub fn only_one_primary_tag_value(&self) -> bool {
        self.primary_tag_values.len() == 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectPrivate {
    pub conjuncts: Vec<ScalarExpr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectPrivate {
    pub exprs: Vec<ScalarExpr>,
    pub output_columns: Vec<ColumnId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Semi,
    Anti,
    Cross,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JoinPrivate {
    pub kind: JoinKind,
    pub condition: Option<ScalarExpr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SetOpKind {
    Union,
    Intersect,
    Except,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SetOpPrivate {
    pub kind: SetOpKind,
    pub all: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupHint {
    None,
    ForceRelationalGroup,
}

/// The group-by decoration (§3 "Grouping-private"). Shared by `GroupBy`,
/// `ScalarGroupBy`, and `DistinctOn`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupingFlags {
    pub push_local_agg_to_scan: bool,
    pub prune_local_agg: bool,
    pub prune_final_agg: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupingPrivate {
    pub group_cols: Vec<ColumnId>,
    pub aggregates: Vec<ScalarExpr>,
    pub ordering: OrderingChoice,
    pub flags: GroupingFlags,
    /// For each output aggregate, the (possibly multi-entry, for two-phase
    /// aggregates) list of positions into the producing scan's `scan_aggs`.
    pub agg_index: Vec<Vec<usize>>,
    pub time_bucket_col: Option<ColumnId>,
    pub time_bucket_gap_fill_col: Option<ColumnId>,
    pub hint: GroupHint,
    pub distinct_aggregates: bool,
}

impl GroupingPrivate {
    pub fn new(group_cols: Vec<ColumnId>, aggregates: Vec<ScalarExpr>) -> Self {
        GroupingPrivate {
            group_cols,
            aggregates,
            ordering: OrderingChoice::any(),
            flags: GroupingFlags::default(),
            agg_index: Vec::new(),
            time_bucket_col: None,
            time_bucket_gap_fill_col: None,
            hint: GroupHint::None,
            distinct_aggregates: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortPrivate {
    pub ordering: OrderingChoice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LimitPrivate {
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OffsetPrivate {
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WithPrivate {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WithScanPrivate {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValuesPrivate {
    pub rows: Vec<Vec<ScalarExpr>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VirtualScanPrivate {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExplainPrivate {
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowPrivate {
    pub partition_by: Vec<ColumnId>,
    pub ordering: OrderingChoice,
    pub window_exprs: Vec<ScalarExpr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrdinalityPrivate {
    pub output_column: ColumnId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExportPrivate {
    pub destination: String,
}

/// The closed tag set of relational operators (§3 "Operator"). Children are
/// carried separately, as `GroupId`s, by `RelExprNode` in `crate::expr`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelOperator {
    Scan(ScanPrivate),
    TimeSeriesScan(TimeSeriesScanPrivate),
    Select(SelectPrivate),
    Project(ProjectPrivate),
    Join(JoinPrivate),
    SetOp(SetOpPrivate),
    GroupBy(GroupingPrivate),
    ScalarGroupBy(GroupingPrivate),
    DistinctOn(GroupingPrivate),
    Sort(SortPrivate),
    Limit(LimitPrivate),
    Offset(OffsetPrivate),
    With(WithPrivate),
    WithScan(WithScanPrivate),
    Values(ValuesPrivate),
    VirtualScan(VirtualScanPrivate),
    Explain(ExplainPrivate),
    Window(WindowPrivate),
    Ordinality(OrdinalityPrivate),
    Max1Row,
    Export(ExportPrivate),
}

impl RelOperator {
    /// A short, stable tag name — used by the interner's hash mix and by
    /// diagnostics/tracing spans.
    pub fn tag(&self) -> &'static str {
        match self {
            RelOperator::Scan(_) => "Scan",
            RelOperator::TimeSeriesScan(_) => "TimeSeriesScan",
            RelOperator::Select(_) => "Select",
            RelOperator::Project(_) => "Project",
            RelOperator::Join(_) => "Join",
            RelOperator::SetOp(_) => "SetOp",
            RelOperator::GroupBy(_) => "GroupBy",
            RelOperator::ScalarGroupBy(_) => "ScalarGroupBy",
            RelOperator::DistinctOn(_) => "DistinctOn",
            RelOperator::Sort(_) => "Sort",
            RelOperator::Limit(_) => "Limit",
            RelOperator::Offset(_) => "Offset",
            RelOperator::With(_) => "With",
            RelOperator::WithScan(_) => "WithScan",
            RelOperator::Values(_) => "Values",
            RelOperator::VirtualScan(_) => "VirtualScan",
            RelOperator::Explain(_) => "Explain",
            RelOperator::Window(_) => "Window",
            RelOperator::Ordinality(_) => "Ordinality",
            RelOperator::Max1Row => "Max1Row",
            RelOperator::Export(_) => "Export",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_scan_eligibility_rejects_long_or_empty_tag_sets() {
        let mut ts = TimeSeriesScanPrivate {
            table_id: 0,
            table_name: "t".into(),
            output_columns: vec![],
            primary_tag_values: vec![],
            hash_point_range: None,
            ordered_scan: OrderedScanType::None,
            filters: vec![],
            scan_aggs: vec![],
            hint: ScanHint::None,
        };
        assert!(!ts.ordered_scan_eligible());

        ts.primary_tag_values = vec![vec![1, 2, 3]];
        assert!(ts.ordered_scan_eligible());
        assert!(ts.only_one_primary_tag_value());

        ts.primary_tag_values = vec![vec![0u8; 101]];
        assert!(!ts.ordered_scan_eligible());
    }
}
