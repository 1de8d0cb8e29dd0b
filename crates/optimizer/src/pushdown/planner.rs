//! The cross-engine push-down traversal (§4.6): walks a fully-built
//! expression tree bottom-up, tagging each node with an execution engine,
//! inserting the minimum set of synchronizer barriers, and opportunistically
//! installing scan-embedded aggregates.
//!
//! The memo's interned expressions (§4.1) are never mutated in place — they
//! are shared and content-addressed. This traversal instead extracts a
//! fresh, owned copy of the tree (`PlanNode`) from the memo's chosen
//! members, decorating each node's own private fields (`scan_aggs`,
//! `ordered_scan`, grouping `flags`/`agg_index`) as it goes, exactly the way
//! a final plan-materialization step would.

use hybridopt_common::{Error, Result};
use hybridopt_ir::{
    AggFunc, ColumnId, ColumnMetadata, GroupId, GroupingPrivate, OrderedScanType, RelOperator,
    ScalarExpr, ScalarExprKind, ScanAgg, ScanAggParam, ScanHint, TimeSeriesScanPrivate,
};
use rustc_hash::FxHashMap;
use tracing::{debug, instrument};

use crate::logical_props::LogicalProps;
use crate::memo::Memo;
use crate::pushdown::scan_agg::{as_agg_op, build_entries, StatisticAggTable};
use crate::pushdown::whitelist::{expr_hash, ExprKind, Position, WhiteListOracle};
use crate::pushdown::{PushHelperEntry, PushHelperExprKind, PushHelperMap};

/// Tagged engine a node is assigned to. `unset` (§3) never escapes this
/// module — every node resolves to one of these two before `plan` returns
/// (§4.6 "Terminal states").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineTag {
    Relational,
    TimeSeries,
}

/// One node of the annotated output tree (§6 "Produced output").
pub struct PlanNode {
    pub op: RelOperator,
    pub children: Vec<PlanNode>,
    pub engine: EngineTag,
    pub needs_synchronizer: bool,
    pub can_time_bucket_opt: bool,
}

/// Everything the traversal needs that isn't part of the memo itself (§4.6
/// pre-conditions, §6 external interfaces).
pub struct PushdownContext<'a> {
    pub oracle: &'a dyn WhiteListOracle,
    pub columns: &'a FxHashMap<ColumnId, ColumnMetadata>,
    pub single_node: bool,
    pub force_push_group: bool,
    /// The column recognized as the ts-scan's event timestamp, consulted by
    /// the scan-agg filter guard (§4.6 step 5: "filters reference only the
    /// timestamp column or constants").
    pub timestamp_column: Option<ColumnId>,
    pub row_count_threshold: usize,
    pub push_helper: PushHelperMap,
}

/// Plans the whole tree rooted at `root`, returning the annotated output
/// tree. `logical_props` must already hold an entry for every group that has
/// outer columns worth checking (built ahead of time: logical properties
/// are computed on demand, before cross-engine planning consults them).
pub fn plan(
    memo: &Memo,
    root: GroupId,
    logical_props: &FxHashMap<GroupId, LogicalProps>,
    ctx: &PushdownContext,
) -> Result<PlanNode> {
    plan_group(memo, root, logical_props, ctx)
}

#[instrument(skip(memo, logical_props, ctx))]
fn plan_group(
    memo: &Memo,
    group: GroupId,
    logical_props: &FxHashMap<GroupId, LogicalProps>,
    ctx: &PushdownContext,
) -> Result<PlanNode> {
    let node = &memo.group(group).members[0];
    let children = node.children.clone();

    match &node.op {
        RelOperator::TimeSeriesScan(ts) => plan_ts_scan(memo, ts, logical_props, ctx),
        RelOperator::Scan(scan) => Ok(PlanNode {
            op: RelOperator::Scan(scan.clone()),
            children: Vec::new(),
            engine: EngineTag::Relational,
            needs_synchronizer: false,
            can_time_bucket_opt: false,
        }),
        RelOperator::Select(select) => {
            let mut input = plan_group(memo, children[0], logical_props, ctx)?;
            // Sub-queries appearing in conjuncts are descended into and
            // themselves planned (§4.6 "Select").
            for conjunct in &select.conjuncts {
                for (sub_group, _outer_refs) in conjunct.subqueries() {
                    plan_group(memo, sub_group, logical_props, ctx)?;
                }
            }
            let mut exec_in_ts = input.engine == EngineTag::TimeSeries;
            if exec_in_ts {
                for conjunct in &select.conjuncts {
                    if !ctx.oracle.check(hash_scalar(conjunct), Position::Select) {
                        debug!(group, "select conjunct rejected by white-list oracle");
                        exec_in_ts = false;
                        break;
                    }
                }
            }
            let has_outer_columns = logical_props
                .get(&group)
                .is_some_and(|p| !p.outer_columns().is_empty());
            if has_outer_columns {
                debug!(group, "select has outer columns, forcing relational");
                exec_in_ts = false;
            }
            if exec_in_ts != (input.engine == EngineTag::TimeSeries) {
                debug!(group, exec_in_ts, "inserting synchronizer above select input");
                input.needs_synchronizer = true;
            }
            Ok(PlanNode {
                op: RelOperator::Select(select.clone()),
                children: vec![input],
                engine: tag(exec_in_ts),
                needs_synchronizer: false,
                can_time_bucket_opt: false,
            })
        }
        RelOperator::Project(project) => {
            let mut input = plan_group(memo, children[0], logical_props, ctx)?;
            let mut exec_in_ts = input.engine == EngineTag::TimeSeries;
            let mut saw_time_bucket = false;
            let mut all_bucket_const_or_col = true;
            for (i, expr) in project.exprs.iter().enumerate() {
                use hybridopt_ir::ProjectionElemKind;
                match expr.classify_projection_elem() {
                    ProjectionElemKind::Func => {
                        if exec_in_ts && !ctx.oracle.check(hash_scalar(expr), Position::Projection) {
                            exec_in_ts = false;
                        }
                        if expr.is_time_bucket() {
                            saw_time_bucket = true;
                        } else {
                            all_bucket_const_or_col = false;
                        }
                    }
                    ProjectionElemKind::Other => all_bucket_const_or_col = false,
                    ProjectionElemKind::Col => {
                        if exec_in_ts
                            && !ctx
                                .oracle
                                .check_all(hash_scalar(expr), Position::Projection, ExprKind::Col)
                        {
                            exec_in_ts = false;
                        }
                    }
                    ProjectionElemKind::Const => {
                        if exec_in_ts
                            && !ctx.oracle.check_all(
                                hash_scalar(expr),
                                Position::Projection,
                                ExprKind::Const,
                            )
                        {
                            exec_in_ts = false;
                        }
                    }
                }
                if let Some(&col) = project.output_columns.get(i) {
                    ctx.push_helper.insert(
                        col,
                        PushHelperEntry {
                            kind: classify_push_helper_kind(expr),
                            introduced_at: Position::Projection,
                            hash: hash_scalar(expr),
                            is_time_bucket: expr.is_time_bucket(),
                        },
                    );
                }
            }
            let can_time_bucket_opt = exec_in_ts && saw_time_bucket && all_bucket_const_or_col;
            if exec_in_ts != (input.engine == EngineTag::TimeSeries) {
                input.needs_synchronizer = true;
            }
            Ok(PlanNode {
                op: RelOperator::Project(project.clone()),
                children: vec![input],
                engine: tag(exec_in_ts),
                needs_synchronizer: false,
                can_time_bucket_opt,
            })
        }
        RelOperator::GroupBy(grouping) | RelOperator::ScalarGroupBy(grouping) | RelOperator::DistinctOn(grouping) => {
            plan_group_by(memo, &node.op, grouping, children[0], group, logical_props, ctx)
        }
        RelOperator::Sort(sort) => {
            let input = plan_group(memo, children[0], logical_props, ctx)?;
            let engine = input.engine;
            let can_time_bucket_opt = input.can_time_bucket_opt;
            Ok(PlanNode {
                op: RelOperator::Sort(sort.clone()),
                needs_synchronizer: input.needs_synchronizer,
                children: vec![input],
                engine,
                can_time_bucket_opt,
            })
        }
        RelOperator::Limit(limit) => {
            let input = plan_group(memo, children[0], logical_props, ctx)?;
            let engine = input.engine;
            Ok(PlanNode {
                op: RelOperator::Limit(*limit),
                needs_synchronizer: input.needs_synchronizer,
                children: vec![input],
                engine,
                can_time_bucket_opt: false,
            })
        }
        RelOperator::Join(join) => {
            let mut left = plan_group(memo, children[0], logical_props, ctx)?;
            let mut right = plan_group(memo, children[1], logical_props, ctx)?;
            if left.engine == EngineTag::TimeSeries {
                left.needs_synchronizer = true;
            }
            if right.engine == EngineTag::TimeSeries {
                right.needs_synchronizer = true;
            }
            Ok(PlanNode {
                op: RelOperator::Join(join.clone()),
                children: vec![left, right],
                engine: EngineTag::Relational,
                needs_synchronizer: false,
                can_time_bucket_opt: false,
            })
        }
        RelOperator::SetOp(set_op) => {
            let mut left = plan_group(memo, children[0], logical_props, ctx)?;
            let mut right = plan_group(memo, children[1], logical_props, ctx)?;
            if left.engine == EngineTag::TimeSeries {
                left.needs_synchronizer = true;
            }
            if right.engine == EngineTag::TimeSeries {
                right.needs_synchronizer = true;
            }
            Ok(PlanNode {
                op: RelOperator::SetOp(set_op.clone()),
                children: vec![left, right],
                engine: EngineTag::Relational,
                needs_synchronizer: false,
                can_time_bucket_opt: false,
            })
        }
        other => {
            // Offset, Values, With, WithScan, VirtualScan, Explain, Window,
            // Ordinality, Max1Row, Export: synchronization boundaries. None
            // of these run in-ts; any in-ts child is synchronized here.
            let mut planned_children = Vec::with_capacity(children.len());
            for &child in &children {
                let mut planned = plan_group(memo, child, logical_props, ctx)?;
                if planned.engine == EngineTag::TimeSeries {
                    planned.needs_synchronizer = true;
                }
                planned_children.push(planned);
            }
            Ok(PlanNode {
                op: other.clone(),
                children: planned_children,
                engine: EngineTag::Relational,
                needs_synchronizer: false,
                can_time_bucket_opt: false,
            })
        }
    }
}

fn tag(is_ts: bool) -> EngineTag {
    if is_ts {
        EngineTag::TimeSeries
    } else {
        EngineTag::Relational
    }
}

fn plan_ts_scan(
    memo: &Memo,
    ts: &TimeSeriesScanPrivate,
    logical_props: &FxHashMap<GroupId, LogicalProps>,
    ctx: &PushdownContext,
) -> Result<PlanNode> {
    if ts.hint == ScanHint::OnlyTag {
        for &col in &ts.output_columns {
            if !ctx.columns.get(&col).is_some_and(ColumnMetadata::is_tag) {
                return Err(Error::unsupported(
                    "only-tag scan hint selects a non-tag column",
                ));
            }
        }
    }
    // Sub-queries appearing in tag filters are descended into and
    // themselves planned (§4.6 "Time-series scan").
    for filter in &ts.filters {
        for (sub_group, _outer_refs) in filter.subqueries() {
            plan_group(memo, sub_group, logical_props, ctx)?;
        }
    }
    for &col in &ts.output_columns {
        ctx.push_helper.insert(
            col,
            PushHelperEntry {
                kind: PushHelperExprKind::Col,
                introduced_at: Position::None,
                hash: 0,
                is_time_bucket: false,
            },
        );
    }
    Ok(PlanNode {
        op: RelOperator::TimeSeriesScan(ts.clone()),
        children: Vec::new(),
        engine: EngineTag::TimeSeries,
        needs_synchronizer: false,
        can_time_bucket_opt: true,
    })
}

fn classify_push_helper_kind(expr: &ScalarExpr) -> PushHelperExprKind {
    match &expr.kind {
        ScalarExprKind::Column(_) => PushHelperExprKind::Col,
        ScalarExprKind::Const(_) => PushHelperExprKind::Const,
        ScalarExprKind::AggOp { .. } => PushHelperExprKind::AggOp,
        _ => PushHelperExprKind::Func,
    }
}

/// Hashes a scalar expression's shape the way the white-list oracle expects
/// (§6): operator tag, argument result types, argument arity.
pub fn hash_scalar(expr: &ScalarExpr) -> u64 {
    let (tag, arg_types): (String, Vec<hybridopt_common::types::DataType>) = match &expr.kind {
        ScalarExprKind::Column(_) => ("column".into(), vec![]),
        ScalarExprKind::Const(_) => ("const".into(), vec![]),
        ScalarExprKind::Func { name, args } => {
            (name.clone(), args.iter().map(|a| a.result_type.clone()).collect())
        }
        ScalarExprKind::AggOp { args, .. } => {
            ("agg".into(), args.iter().map(|a| a.result_type.clone()).collect())
        }
        ScalarExprKind::And(items) => ("and".into(), items.iter().map(|a| a.result_type.clone()).collect()),
        ScalarExprKind::Or(items) => ("or".into(), items.iter().map(|a| a.result_type.clone()).collect()),
        ScalarExprKind::Not(_) => ("not".into(), vec![]),
        ScalarExprKind::Cmp { left, right, .. } => {
            ("cmp".into(), vec![left.result_type.clone(), right.result_type.clone()])
        }
        ScalarExprKind::TimeBucket { source, .. } => {
            ("time_bucket".into(), vec![source.result_type.clone()])
        }
        ScalarExprKind::Subquery { .. } => ("subquery".into(), vec![]),
    };
    let arity = arg_types.len();
    expr_hash(&tag, &arg_types, arity)
}

/// `checkOptTimeBucketFlag` (§4.6 step 1): the input must bottom out,
/// through any number of sorts, at a project whose expressions are all
/// `time_bucket` calls, columns, or constants, with at least one
/// `time_bucket` present.
fn check_opt_time_bucket_flag(input: &PlanNode) -> bool {
    match &input.op {
        RelOperator::Sort(_) => check_opt_time_bucket_flag(&input.children[0]),
        RelOperator::Project(project) => {
            project.exprs.iter().any(ScalarExpr::is_time_bucket)
                && project.exprs.iter().all(|e| {
                    e.is_time_bucket() || e.is_const() || matches!(e.kind, ScalarExprKind::Column(_))
                })
        }
        _ => false,
    }
}

/// Walks down through `Select`/`Project` ancestors to find the underlying
/// time-series scan, collecting filter conjuncts encountered along the way.
/// `None` if the chain does not bottom out at a ts-scan.
fn collect_scan_chain<'n>(node: &'n PlanNode) -> Option<(&'n TimeSeriesScanPrivate, Vec<&'n ScalarExpr>)> {
    match &node.op {
        RelOperator::TimeSeriesScan(ts) => Some((ts, Vec::new())),
        RelOperator::Select(select) => {
            let (ts, mut filters) = collect_scan_chain(&node.children[0])?;
            filters.extend(select.conjuncts.iter());
            Some((ts, filters))
        }
        RelOperator::Project(_) => collect_scan_chain(&node.children[0]),
        _ => None,
    }
}

fn filters_use_only_timestamp_or_const(filters: &[&ScalarExpr], timestamp_column: Option<ColumnId>) -> bool {
    filters.iter().all(|f| {
        let mut ok = true;
        f.walk(&mut |e| {
            if let ScalarExprKind::Column(c) = &e.kind {
                if Some(*c) != timestamp_column {
                    ok = false;
                }
            }
        });
        ok
    })
}

/// Mutates the first time-series scan found by walking down through
/// `Select`/`Project` nodes, installing new scan-aggs and (optionally) an
/// ordered-scan override. `false` if the chain does not reach a ts-scan.
fn patch_ts_scan(node: &mut PlanNode, new_aggs: Vec<ScanAgg>, ordered_scan: Option<OrderedScanType>) -> bool {
    match &mut node.op {
        RelOperator::TimeSeriesScan(ts) => {
            ts.scan_aggs.extend(new_aggs);
            if let Some(os) = ordered_scan {
                ts.ordered_scan = os;
            }
            true
        }
        RelOperator::Select(_) | RelOperator::Project(_) => {
            patch_ts_scan(&mut node.children[0], new_aggs, ordered_scan)
        }
        _ => false,
    }
}

fn rewrap_grouping(template: &RelOperator, grouping: GroupingPrivate) -> RelOperator {
    match template {
        RelOperator::GroupBy(_) => RelOperator::GroupBy(grouping),
        RelOperator::ScalarGroupBy(_) => RelOperator::ScalarGroupBy(grouping),
        RelOperator::DistinctOn(_) => RelOperator::DistinctOn(grouping),
        _ => unreachable!("rewrap_grouping called on a non-grouping template"),
    }
}

#[allow(clippy::too_many_arguments)]
fn plan_group_by(
    memo: &Memo,
    template: &RelOperator,
    grouping: &GroupingPrivate,
    input_group: GroupId,
    group: GroupId,
    logical_props: &FxHashMap<GroupId, LogicalProps>,
    ctx: &PushdownContext,
) -> Result<PlanNode> {
    let _ = group;
    let mut input = plan_group(memo, input_group, logical_props, ctx)?;
    let mut exec_in_ts = input.engine == EngineTag::TimeSeries;
    let mut has_sync = input.needs_synchronizer;

    if grouping.hint == hybridopt_ir::GroupHint::ForceRelationalGroup {
        exec_in_ts = false;
    }

    // Step 1.
    let can_time_bucket_opt = exec_in_ts && check_opt_time_bucket_flag(&input);

    // Step 2: grouping columns.
    if exec_in_ts {
        for &col in &grouping.group_cols {
            let permitted =
                ctx.oracle
                    .check_all(expr_hash("column", &[], 0), Position::GroupBy, ExprKind::Col);
            let type_ok = ctx
                .columns
                .get(&col)
                .map(|c| !c.type_family.is_bytes_like())
                .unwrap_or(true);
            let tb_ok = if can_time_bucket_opt {
                let is_tb = ctx.push_helper.get(col).is_some_and(|e| e.is_time_bucket);
                let is_primary_tag = ctx.columns.get(&col).is_some_and(ColumnMetadata::is_primary_tag);
                is_tb || is_primary_tag
            } else {
                true
            };
            if !permitted || !type_ok || !tb_ok {
                exec_in_ts = false;
                break;
            }
        }
    }

    // Step 3: aggregates.
    let mut any_distinct = grouping.distinct_aggregates;
    if exec_in_ts {
        for agg in &grouping.aggregates {
            if let Some((_func, args)) = as_agg_op(agg) {
                for arg in args {
                    if !ctx.oracle.check(hash_scalar(arg), Position::Projection) {
                        exec_in_ts = false;
                    }
                }
                if !ctx.oracle.check(hash_scalar(agg), Position::Projection) {
                    exec_in_ts = false;
                }
            }
            if let ScalarExprKind::AggOp { distinct, .. } = &agg.kind {
                any_distinct = any_distinct || *distinct;
            }
        }
    }
    if any_distinct && !ctx.single_node {
        has_sync = true;
        exec_in_ts = false;
    }

    // Step 4: parallelism.
    let all_parallelizable = grouping.aggregates.iter().all(|a| match &a.kind {
        ScalarExprKind::AggOp { func, .. } => func.is_parallelizable(),
        _ => true,
    });
    if exec_in_ts && !all_parallelizable && !has_sync {
        has_sync = true;
    }

    if exec_in_ts != (input.engine == EngineTag::TimeSeries) {
        input.needs_synchronizer = true;
    } else if has_sync {
        input.needs_synchronizer = true;
    }

    let mut flags = grouping.flags.clone();
    let mut agg_index = grouping.agg_index.clone();

    // Step 5: scan-agg installation. Only attempted when the group-by still
    // runs in-ts and the chain beneath it bottoms out at a plain ts-scan
    // over primary-tag grouping columns with timestamp/const-only filters.
    if exec_in_ts {
        if let Some((scan, filters)) = collect_scan_chain(&input) {
            let grouping_cols_are_primary_tags = grouping
                .group_cols
                .iter()
                .all(|c| ctx.columns.get(c).is_some_and(ColumnMetadata::is_primary_tag));
            let filters_ok = filters_use_only_timestamp_or_const(&filters, ctx.timestamp_column);
            let total_primary_tags = ctx.columns.values().filter(|c| c.is_primary_tag()).count();
            let prune_final_agg = total_primary_tags > 0 && total_primary_tags == grouping.group_cols.len();

            if grouping_cols_are_primary_tags && filters_ok {
                let base_len = scan.scan_aggs.len();
                let mut new_aggs: Vec<ScanAgg> = Vec::new();
                // One `ANY_NOT_NULL` scan-agg per grouping column, ahead of
                // the aggregate-derived entries (§8 S2: "scan-aggs =
                // [{ptag-col, ANY_NOT_NULL}, {v-col, SUM}]"). These are
                // grouping-key materializations, not output aggregates, so
                // they get no `agg_index` slots.
                for &col in &grouping.group_cols {
                    new_aggs.push(ScanAgg {
                        params: vec![ScanAggParam::Column(col)],
                        func: AggFunc::AnyNotNull,
                    });
                }
                let mut new_agg_index = Vec::with_capacity(grouping.aggregates.len());
                let mut all_installed = true;
                for agg in &grouping.aggregates {
                    let Some((func, args)) = as_agg_op(agg) else {
                        all_installed = false;
                        break;
                    };
                    let Some(installation) = StatisticAggTable::install(func, prune_final_agg) else {
                        all_installed = false;
                        break;
                    };
                    let Some(entries) = build_entries(args, &installation) else {
                        all_installed = false;
                        break;
                    };
                    let start = base_len + new_aggs.len();
                    new_agg_index.push((start..start + entries.len()).collect());
                    new_aggs.extend(entries);
                }
                if all_installed {
                    if patch_ts_scan(&mut input, new_aggs, None) {
                        debug!(group, prune_final_agg, "installed scan-aggregates");
                        flags.push_local_agg_to_scan = true;
                        flags.prune_final_agg = prune_final_agg;
                        flags.prune_local_agg = scan.only_one_primary_tag_value();
                        agg_index = new_agg_index;
                    }
                } else {
                    debug!(group, "scan-aggregate installation declined, falling back");
                }
                // A failed installation degrades silently: no scan-aggs are
                // added and the group-by keeps whatever `exec_in_ts` above
                // already decided.
            }
        }
    }

    // Step 6: order-group-by swap. When the immediate input is a sort and
    // the group-by still runs in-ts, the sort is re-linked above the
    // group-by in the output tree and the underlying scan is asked for an
    // ordered read.
    if exec_in_ts {
        if let RelOperator::Sort(sort) = input.op.clone() {
            let sort_child = input.children.into_iter().next().expect("sort has one child");
            let mut grouping_private = grouping.clone();
            grouping_private.flags = flags;
            grouping_private.agg_index = agg_index;

            let mut swapped_child = sort_child;
            if let Some((scan, _filters)) = collect_scan_chain(&swapped_child) {
                // Disable ordered scan if the primary-tag-value set is
                // empty or any primary-tag value has length > 100 (§4.6).
                let ordered = if scan.ordered_scan_eligible() {
                    Some(OrderedScanType::Ordered)
                } else {
                    None
                };
                patch_ts_scan(&mut swapped_child, Vec::new(), ordered);
            }

            let group_node = PlanNode {
                op: rewrap_grouping(template, grouping_private),
                needs_synchronizer: swapped_child.needs_synchronizer,
                can_time_bucket_opt,
                children: vec![swapped_child],
                engine: tag(exec_in_ts),
            };
            let sort_engine = if ctx.single_node { EngineTag::TimeSeries } else { EngineTag::Relational };
            return Ok(PlanNode {
                op: RelOperator::Sort(sort),
                children: vec![group_node],
                engine: sort_engine,
                needs_synchronizer: false,
                can_time_bucket_opt: false,
            });
        }
    }

    // Step 7: row-count guard — only block non-time-bucket pushes when
    // neither `force_push_group` nor a sufficient row count justifies them.
    // Row-count is read from the caller's logical properties for the input
    // group when available.
    if exec_in_ts && !can_time_bucket_opt && !ctx.force_push_group {
        if let Some(props) = logical_props.get(&input_group) {
            if let Some(rows) = props.rows_processed() {
                if rows < ctx.row_count_threshold {
                    exec_in_ts = false;
                }
            }
        }
    }

    let mut grouping_private = grouping.clone();
    grouping_private.flags = flags;
    grouping_private.agg_index = agg_index;

    Ok(PlanNode {
        op: rewrap_grouping(template, grouping_private),
        needs_synchronizer: false,
        children: vec![input],
        engine: tag(exec_in_ts),
        can_time_bucket_opt,
    })
}
