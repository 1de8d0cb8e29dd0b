//! The logical-property builder (§4.3): output columns, outer columns,
//! functional dependencies, cardinality bounds, row/column statistics, and
//! the `has-placeholder` flag, derived on demand and cached per expression.

use hybridopt_common::types::Value;
use hybridopt_ir::{ColumnId, FuncDepSet, GroupId, RelOperator, ScalarExpr};
use rustc_hash::FxHashMap;

use crate::memo::Memo;
use crate::stats::TableStats;

/// Collects the correlated columns of every sub-query embedded in `exprs`
/// (§4.6 sub-query descent), deduplicated and in first-seen order.
fn outer_refs_in(exprs: &[ScalarExpr]) -> Vec<ColumnId> {
    let mut seen = rustc_hash::FxHashSet::default();
    let mut out = Vec::new();
    for expr in exprs {
        for (_, refs) in expr.subqueries() {
            for &col in refs {
                if seen.insert(col) {
                    out.push(col);
                }
            }
        }
    }
    out
}

/// A cached, per-column statistics summary (distinct count, nullability,
/// bounds) attached to a logical expression's properties. Cleared by
/// `Memo::Detach()` (§4.3).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnStatSummary {
    pub distinct_count: usize,
    pub null_count: usize,
    pub min_value: Option<Value>,
    pub max_value: Option<Value>,
}

/// Cardinality bounds: a confident lower bound and a best-effort upper
/// bound. `max` is `None` when no bound could be derived (e.g. unbounded
/// scan over an untracked table).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Cardinality {
    pub min: usize,
    pub max: Option<usize>,
}

impl Cardinality {
    pub fn exact(n: usize) -> Self {
        Cardinality { min: n, max: Some(n) }
    }

    pub fn unbounded() -> Self {
        Cardinality { min: 0, max: None }
    }

    /// Scales both bounds by `selectivity`, rounding the minimum down and
    /// the maximum up so the bound never tightens incorrectly.
    pub fn scale(&self, selectivity: f64) -> Self {
        Cardinality {
            min: ((self.min as f64) * selectivity).floor() as usize,
            max: self.max.map(|m| ((m as f64) * selectivity).ceil() as usize),
        }
    }
}

/// Derived, cached properties of one relational expression (§4.3). Stored
/// on the owning memo group; a group's members all produce the same
/// multiset, so logical properties are a property of the group, not of any
/// individual member.
#[derive(Debug, Clone, Default)]
pub struct LogicalProps {
    output_columns: Vec<ColumnId>,
    outer_columns: Vec<ColumnId>,
    fds: FuncDepSet,
    cardinality: Cardinality,
    row_count: Option<usize>,
    column_stats: FxHashMap<ColumnId, ColumnStatSummary>,
    has_placeholder: bool,
}

impl LogicalProps {
    pub fn output_columns(&self) -> &[ColumnId] {
        &self.output_columns
    }

    pub fn outer_columns(&self) -> &[ColumnId] {
        &self.outer_columns
    }

    pub fn fds(&self) -> &FuncDepSet {
        &self.fds
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn has_placeholder(&self) -> bool {
        self.has_placeholder
    }

    /// `RowsProcessed`: `None` after `Detach()` clears it, matching
    /// "not-available" semantics (§4.3).
    pub fn rows_processed(&self) -> Option<usize> {
        self.row_count
    }

    /// `RequestColStat`: `None` for an untracked column or after `Detach()`.
    pub fn request_col_stat(&self, col: ColumnId) -> Option<&ColumnStatSummary> {
        self.column_stats.get(&col)
    }

    pub fn column_stat_count(&self) -> usize {
        self.column_stats.len()
    }

    pub fn set_column_stat(&mut self, col: ColumnId, stat: ColumnStatSummary) {
        self.column_stats.insert(col, stat);
    }

    /// Clears per-expression column statistics and the row-count estimate;
    /// called by `Memo::Detach()` (§4.3).
    pub fn clear_column_stats(&mut self) {
        self.column_stats.clear();
        self.row_count = None;
    }

    #[cfg(test)]
    pub fn for_test_with_placeholder(has_placeholder: bool) -> Self {
        LogicalProps {
            has_placeholder,
            ..Default::default()
        }
    }
}

/// Computes and caches logical properties over a memo's group tree,
/// consulting an external statistics provider for row counts and column
/// stats (§6 "Statistics provider").
pub struct LogicalPropsBuilder<'a> {
    stats_by_table: &'a FxHashMap<u32, TableStats>,
}

impl<'a> LogicalPropsBuilder<'a> {
    pub fn new(stats_by_table: &'a FxHashMap<u32, TableStats>) -> Self {
        LogicalPropsBuilder { stats_by_table }
    }

    /// Returns the cached properties for `group`, computing (and caching)
    /// them bottom-up the first time they are requested.
    pub fn build(&self, memo: &mut Memo, group: GroupId) -> LogicalProps {
        if let Some(cached) = &memo.group(group).logical_props {
            return cached.clone();
        }
        let children: Vec<GroupId> = memo.group(group).members[0].children.clone();
        let child_props: Vec<LogicalProps> =
            children.iter().map(|&c| self.build(memo, c)).collect();
        let op = memo.group(group).members[0].op.clone();
        let props = self.derive(&op, &child_props);
        memo.group_mut(group).logical_props = Some(props.clone());
        props
    }

    fn derive(&self, op: &RelOperator, children: &[LogicalProps]) -> LogicalProps {
        let mut props = LogicalProps::default();
        match op {
            RelOperator::Scan(scan) => {
                props.output_columns = scan.output_columns.clone();
                if let Some(stats) = self.stats_by_table.get(&scan.table_id) {
                    props.cardinality = Cardinality::exact(stats.row_count);
                    props.row_count = Some(stats.row_count);
                    for (col, col_stats) in &stats.column_stats {
                        props.column_stats.insert(
                            *col,
                            ColumnStatSummary {
                                distinct_count: col_stats.distinct_count,
                                null_count: col_stats.null_count,
                                min_value: col_stats.min_value.clone(),
                                max_value: col_stats.max_value.clone(),
                            },
                        );
                    }
                } else {
                    props.cardinality = Cardinality::unbounded();
                }
            }
            RelOperator::TimeSeriesScan(ts) => {
                props.output_columns = ts.output_columns.clone();
                props.outer_columns = outer_refs_in(&ts.filters);
                if let Some(stats) = self.stats_by_table.get(&ts.table_id) {
                    props.cardinality = Cardinality::exact(stats.row_count);
                    props.row_count = Some(stats.row_count);
                } else {
                    props.cardinality = Cardinality::unbounded();
                }
            }
            RelOperator::Select(select) => {
                let input = &children[0];
                props.output_columns = input.output_columns.clone();
                props.outer_columns = input
                    .outer_columns
                    .iter()
                    .copied()
                    .chain(outer_refs_in(&select.conjuncts))
                    .collect();
                props.fds.copy_from(&input.fds);
                props.has_placeholder = input.has_placeholder;
                // Cardinality estimation from conjunct selectivity needs a
                // statistics provider keyed by this expression's source
                // columns; the filter reorderer (which already consults
                // `TableStats::estimate_selectivity` per conjunct) is the
                // authoritative place that number is computed, so here we
                // only pass the input's bounds through unscaled.
                props.cardinality = input.cardinality;
                props.row_count = input.row_count;
            }
            RelOperator::Project(project) => {
                props.output_columns = project.output_columns.clone();
                props.outer_columns = children[0].outer_columns.clone();
                props.fds.copy_from(&children[0].fds);
                props.cardinality = children[0].cardinality;
                props.row_count = children[0].row_count;
                props.has_placeholder = children[0].has_placeholder;
            }
            RelOperator::GroupBy(grouping)
            | RelOperator::ScalarGroupBy(grouping)
            | RelOperator::DistinctOn(grouping) => {
                let input = &children[0];
                props.output_columns = grouping.group_cols.clone();
                props.fds.copy_from(&input.fds);
                props.has_placeholder = input.has_placeholder;
                let distinct_estimate = grouping
                    .group_cols
                    .iter()
                    .filter_map(|c| input.column_stats.get(c).map(|s| s.distinct_count.max(1)))
                    .product::<usize>()
                    .max(1);
                props.cardinality = Cardinality {
                    min: 1.min(input.cardinality.min),
                    max: input.cardinality.max.map(|m| m.min(distinct_estimate)),
                };
                props.row_count = input.row_count.map(|r| r.min(distinct_estimate));
            }
            RelOperator::Sort(_) | RelOperator::Limit(_) | RelOperator::Offset(_) => {
                let input = &children[0];
                props.output_columns = input.output_columns.clone();
                props.outer_columns = input.outer_columns.clone();
                props.fds.copy_from(&input.fds);
                props.cardinality = input.cardinality;
                props.row_count = input.row_count;
                props.has_placeholder = input.has_placeholder;
                if let RelOperator::Limit(l) = op {
                    if let Some(limit) = l.limit {
                        props.cardinality.max =
                            Some(props.cardinality.max.unwrap_or(usize::MAX).min(limit as usize));
                    }
                }
            }
            RelOperator::Join(join) => {
                let (left, right) = (&children[0], &children[1]);
                props.output_columns = left
                    .output_columns
                    .iter()
                    .chain(right.output_columns.iter())
                    .copied()
                    .collect();
                props.outer_columns = left
                    .outer_columns
                    .iter()
                    .chain(right.outer_columns.iter())
                    .copied()
                    .collect();
                props.has_placeholder = left.has_placeholder || right.has_placeholder;
                let max = match (left.cardinality.max, right.cardinality.max) {
                    (Some(a), Some(b)) => Some(a.saturating_mul(b)),
                    _ => None,
                };
                props.cardinality = Cardinality {
                    min: 0,
                    max,
                };
                let _ = join;
            }
            RelOperator::SetOp(_) => {
                let (left, right) = (&children[0], &children[1]);
                props.output_columns = left.output_columns.clone();
                props.has_placeholder = left.has_placeholder || right.has_placeholder;
                let max = match (left.cardinality.max, right.cardinality.max) {
                    (Some(a), Some(b)) => Some(a + b),
                    _ => None,
                };
                props.cardinality = Cardinality { min: 0, max };
            }
            RelOperator::Values(values) => {
                props.cardinality = Cardinality::exact(values.rows.len());
                props.row_count = Some(values.rows.len());
            }
            RelOperator::Max1Row => {
                props.cardinality = Cardinality::exact(1);
                props.row_count = Some(1);
                if !children.is_empty() {
                    props.output_columns = children[0].output_columns.clone();
                }
            }
            _ => {
                // Pass-through default for nodes that do not change
                // cardinality or columns in a way this core needs to model
                // precisely (With, WithScan, VirtualScan, Explain, Export,
                // Window, Ordinality, Opaque-style boundaries).
                if let Some(first) = children.first() {
                    props.output_columns = first.output_columns.clone();
                    props.outer_columns = first.outer_columns.clone();
                    props.fds.copy_from(&first.fds);
                    props.cardinality = first.cardinality;
                    props.row_count = first.row_count;
                    props.has_placeholder = first.has_placeholder;
                } else {
                    props.cardinality = Cardinality::unbounded();
                }
            }
        }
        props
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::ColumnStats;
    use hybridopt_ir::{RelExprNode, ScanPrivate};

    fn stats_with_one_table() -> FxHashMap<u32, TableStats> {
        let mut stats = TableStats::new(500);
        stats.column_stats.insert(
            1,
            ColumnStats {
                distinct_count: 10,
                null_count: 0,
                min_value: None,
                max_value: None,
            },
        );
        let mut map = FxHashMap::default();
        map.insert(1u32, stats);
        map
    }

    #[test]
    fn scan_properties_pull_row_count_and_column_stats_from_the_provider() {
        let mut memo = Memo::new();
        let g = memo.add_expr(RelExprNode::leaf(RelOperator::Scan(ScanPrivate {
            table_id: 1,
            table_name: "t".into(),
            output_columns: vec![1, 2],
        })));
        let stats = stats_with_one_table();
        let builder = LogicalPropsBuilder::new(&stats);
        let props = builder.build(&mut memo, g);
        assert_eq!(props.output_columns(), &[1, 2]);
        assert_eq!(props.rows_processed(), Some(500));
        assert_eq!(props.request_col_stat(1).unwrap().distinct_count, 10);
    }

    #[test]
    fn logical_props_are_cached_after_first_build() {
        let mut memo = Memo::new();
        let g = memo.add_expr(RelExprNode::leaf(RelOperator::Scan(ScanPrivate {
            table_id: 1,
            table_name: "t".into(),
            output_columns: vec![1],
        })));
        let stats = stats_with_one_table();
        let builder = LogicalPropsBuilder::new(&stats);
        builder.build(&mut memo, g);
        assert!(memo.group(g).logical_props.is_some());
        // Second build call returns the same cached value without panicking
        // on a missing stats table (table 99 is absent from `stats`).
        let props_again = builder.build(&mut memo, g);
        assert_eq!(props_again.rows_processed(), Some(500));
    }

    #[test]
    fn limit_tightens_the_cardinality_upper_bound() {
        let mut memo = Memo::new();
        let scan_group = memo.add_expr(RelExprNode::leaf(RelOperator::Scan(ScanPrivate {
            table_id: 1,
            table_name: "t".into(),
            output_columns: vec![1],
        })));
        let limit_group = memo.add_expr(RelExprNode::new(
            RelOperator::Limit(hybridopt_ir::LimitPrivate { limit: Some(10) }),
            vec![scan_group],
        ));
        let stats = stats_with_one_table();
        let builder = LogicalPropsBuilder::new(&stats);
        let props = builder.build(&mut memo, limit_group);
        assert_eq!(props.cardinality().max, Some(10));
    }
}
