//! End-to-end scenarios from §8: literal query shapes fed through the
//! public `plan`/`optimize` entry points, checking the engine tags,
//! synchronizer placement, and scan-agg installation each one names.

use hybridopt_common::types::DataType;
use hybridopt_ir::{
    AggFunc, ColumnId, ColumnMetadata, ColumnRole, CmpOp, ConstValue, GroupHint, GroupingPrivate,
    JoinKind, JoinPrivate, OrderedScanType, OrderingChoice, RelExprNode, RelOperator, ScalarExpr,
    ScalarExprKind, ScanHint, ScanPrivate, SortPrivate, TimeSeriesScanPrivate,
};
use hybridopt_optimizer::{
    AllowAllOracle, EngineTag, EvalContext, Memo, PushHelperMap, PushdownContext,
};
use rustc_hash::FxHashMap;

fn col(id: ColumnId, role: ColumnRole, ty: DataType) -> ColumnMetadata {
    ColumnMetadata {
        id,
        alias: format!("c{id}"),
        table_id: 1,
        role,
        type_family: ty,
        width: 8,
    }
}

fn ts_scan(output_columns: Vec<ColumnId>) -> TimeSeriesScanPrivate {
    TimeSeriesScanPrivate {
        table_id: 1,
        table_name: "ts".into(),
        output_columns,
        primary_tag_values: vec![],
        hash_point_range: None,
        ordered_scan: OrderedScanType::None,
        filters: vec![],
        scan_aggs: vec![],
        hint: ScanHint::None,
    }
}

fn count_rows_agg() -> ScalarExpr {
    ScalarExpr {
        kind: ScalarExprKind::AggOp {
            func: AggFunc::CountRows,
            args: vec![],
            distinct: false,
        },
        result_type: DataType::Int64,
    }
}

fn sum_agg(arg_col: ColumnId) -> ScalarExpr {
    ScalarExpr {
        kind: ScalarExprKind::AggOp {
            func: AggFunc::Sum,
            args: vec![ScalarExpr::column(arg_col, DataType::Float64)],
            distinct: false,
        },
        result_type: DataType::Float64,
    }
}

fn ts_gt_const(ts_col: ColumnId) -> ScalarExpr {
    ScalarExpr {
        kind: ScalarExprKind::Cmp {
            op: CmpOp::Gt,
            left: Box::new(ScalarExpr::column(ts_col, DataType::Timestamp)),
            right: Box::new(ScalarExpr::constant(ConstValue::Int64(100), DataType::Int64)),
        },
        result_type: DataType::Bool,
    }
}

/// S1: `SELECT count(*) FROM ts WHERE k_timestamp > 100` produces one ts-scan
/// with one scan-agg and an in-ts group-by.
#[test]
fn s1_count_star_with_timestamp_filter_installs_one_scan_agg() {
    let mut memo = Memo::new();
    memo.init(EvalContext::default());

    let mut scan = ts_scan(vec![1]);
    scan.primary_tag_values = vec![vec![9, 9, 9]];
    let scan_group = memo.add_expr(RelExprNode::leaf(RelOperator::TimeSeriesScan(scan)));
    let select_group = memo.add_expr(RelExprNode::new(
        RelOperator::Select(hybridopt_ir::SelectPrivate {
            conjuncts: vec![ts_gt_const(1)],
        }),
        vec![scan_group],
    ));
    let grouping = GroupingPrivate::new(vec![], vec![count_rows_agg()]);
    let root = memo.add_expr(RelExprNode::new(
        RelOperator::ScalarGroupBy(grouping),
        vec![select_group],
    ));

    let columns = FxHashMap::default();
    let oracle = AllowAllOracle;
    let ctx = PushdownContext {
        oracle: &oracle,
        columns: &columns,
        single_node: true,
        force_push_group: true,
        timestamp_column: Some(1),
        row_count_threshold: 0,
        push_helper: PushHelperMap::new(),
    };
    let lp = FxHashMap::default();
    let plan_node = hybridopt_optimizer::plan(&memo, root, &lp, &ctx).unwrap();

    assert_eq!(plan_node.engine, EngineTag::TimeSeries);
    let RelOperator::ScalarGroupBy(g) = &plan_node.op else {
        panic!("expected scalar group-by at root")
    };
    assert!(g.flags.push_local_agg_to_scan);
    // The scan's predicate narrows to a single primary-tag value, so
    // `prune_local_agg` is driven by `onlyOnePrimaryTagValue` (§3/§8 S1),
    // independent of `prune_final_agg` (there is no grouping column here
    // to prune against).
    assert!(g.flags.prune_local_agg);

    let RelOperator::TimeSeriesScan(ts) = &plan_node.children[0].op else {
        panic!("expected ts-scan beneath group-by")
    };
    assert_eq!(ts.scan_aggs.len(), 1);
    assert_eq!(ts.scan_aggs[0].func, AggFunc::CountRows);
}

/// S2: `SELECT sum(v) FROM ts GROUP BY ptag` where `ptag` is the entire
/// primary-tag set triggers `prune_final_agg`.
#[test]
fn s2_group_by_full_primary_tag_set_prunes_final_agg() {
    let mut memo = Memo::new();
    memo.init(EvalContext::default());

    let scan_group = memo.add_expr(RelExprNode::leaf(RelOperator::TimeSeriesScan(ts_scan(vec![
        1, 2, 3,
    ]))));
    let grouping = GroupingPrivate::new(vec![2], vec![sum_agg(3)]);
    let root = memo.add_expr(RelExprNode::new(
        RelOperator::GroupBy(grouping),
        vec![scan_group],
    ));

    let mut columns = FxHashMap::default();
    columns.insert(2, col(2, ColumnRole::PrimaryTag, DataType::String));
    let oracle = AllowAllOracle;
    let ctx = PushdownContext {
        oracle: &oracle,
        columns: &columns,
        single_node: true,
        force_push_group: true,
        timestamp_column: Some(1),
        row_count_threshold: 0,
        push_helper: PushHelperMap::new(),
    };
    let lp = FxHashMap::default();
    let plan_node = hybridopt_optimizer::plan(&memo, root, &lp, &ctx).unwrap();

    assert_eq!(plan_node.engine, EngineTag::TimeSeries);
    let RelOperator::GroupBy(g) = &plan_node.op else {
        panic!("expected group-by at root")
    };
    assert!(g.flags.prune_final_agg);
    let RelOperator::TimeSeriesScan(ts) = &plan_node.children[0].op else {
        panic!("expected ts-scan beneath group-by")
    };
    // Full primary-tag-set grouping installs one `ANY_NOT_NULL` scan-agg
    // per grouping column ahead of the aggregate's own entry (§8 S2).
    assert_eq!(ts.scan_aggs.len(), 2);
    assert_eq!(ts.scan_aggs[0].func, AggFunc::AnyNotNull);
    assert_eq!(ts.scan_aggs[1].func, AggFunc::Sum);
}

/// S3: grouping by a non-tag column leaves scan-aggs empty but the group-by
/// still runs in-ts when the column is permitted at group-by position.
#[test]
fn s3_group_by_non_tag_column_has_no_scan_aggs_but_stays_in_ts() {
    let mut memo = Memo::new();
    memo.init(EvalContext::default());

    let scan_group = memo.add_expr(RelExprNode::leaf(RelOperator::TimeSeriesScan(ts_scan(vec![
        1, 2, 3,
    ]))));
    let grouping = GroupingPrivate::new(vec![2], vec![sum_agg(3)]);
    let root = memo.add_expr(RelExprNode::new(
        RelOperator::GroupBy(grouping),
        vec![scan_group],
    ));

    let mut columns = FxHashMap::default();
    columns.insert(2, col(2, ColumnRole::Normal, DataType::Int64));
    let oracle = AllowAllOracle;
    let ctx = PushdownContext {
        oracle: &oracle,
        columns: &columns,
        single_node: true,
        force_push_group: true,
        timestamp_column: Some(1),
        row_count_threshold: 0,
        push_helper: PushHelperMap::new(),
    };
    let lp = FxHashMap::default();
    let plan_node = hybridopt_optimizer::plan(&memo, root, &lp, &ctx).unwrap();

    assert_eq!(plan_node.engine, EngineTag::TimeSeries);
    let RelOperator::TimeSeriesScan(ts) = &plan_node.children[0].op else {
        panic!("expected ts-scan beneath group-by")
    };
    assert!(ts.scan_aggs.is_empty(), "non-tag grouping column must not install a scan-agg");
}

/// S4: a ts-rel join is always relational; only the ts-side child gets a
/// synchronizer, and no scan-agg is installed anywhere.
#[test]
fn s4_join_is_relational_and_synchronizes_only_the_ts_side() {
    let mut memo = Memo::new();
    memo.init(EvalContext::default());

    let ts_side = memo.add_expr(RelExprNode::leaf(RelOperator::TimeSeriesScan(ts_scan(vec![
        1, 2,
    ]))));
    let rel_side = memo.add_expr(RelExprNode::leaf(RelOperator::Scan(ScanPrivate {
        table_id: 2,
        table_name: "rel".into(),
        output_columns: vec![10],
    })));
    let join = memo.add_expr(RelExprNode::new(
        RelOperator::Join(JoinPrivate {
            kind: JoinKind::Inner,
            condition: Some(ScalarExpr {
                kind: ScalarExprKind::Cmp {
                    op: CmpOp::Eq,
                    left: Box::new(ScalarExpr::column(2, DataType::String)),
                    right: Box::new(ScalarExpr::column(10, DataType::String)),
                },
                result_type: DataType::Bool,
            }),
        }),
        vec![ts_side, rel_side],
    ));

    let mut columns = FxHashMap::default();
    columns.insert(2, col(2, ColumnRole::PrimaryTag, DataType::String));
    let oracle = AllowAllOracle;
    let ctx = PushdownContext {
        oracle: &oracle,
        columns: &columns,
        single_node: true,
        force_push_group: true,
        timestamp_column: Some(1),
        row_count_threshold: 0,
        push_helper: PushHelperMap::new(),
    };
    let lp = FxHashMap::default();
    let plan_node = hybridopt_optimizer::plan(&memo, join, &lp, &ctx).unwrap();

    assert_eq!(plan_node.engine, EngineTag::Relational);
    assert!(plan_node.children[0].needs_synchronizer);
    assert!(!plan_node.children[1].needs_synchronizer);
    if let RelOperator::TimeSeriesScan(ts) = &plan_node.children[0].op {
        assert!(ts.scan_aggs.is_empty());
    }
}

/// S5: `time_bucket` + `avg` + `ORDER BY tb LIMIT 10` sets
/// `can_time_bucket_opt`, requests an ordered scan, swaps the sort above the
/// group-by, and tags the sort `timeseries` in single-node mode.
#[test]
fn s5_time_bucket_group_by_order_limit_swaps_sort_above_group_by() {
    let mut memo = Memo::new();
    memo.init(EvalContext::default());

    let mut scan = ts_scan(vec![1, 3]);
    scan.primary_tag_values = vec![vec![1], vec![2]];
    let scan_group = memo.add_expr(RelExprNode::leaf(RelOperator::TimeSeriesScan(scan)));
    let select_group = memo.add_expr(RelExprNode::new(
        RelOperator::Select(hybridopt_ir::SelectPrivate {
            conjuncts: vec![ts_gt_const(1)],
        }),
        vec![scan_group],
    ));

    let time_bucket_expr = ScalarExpr {
        kind: ScalarExprKind::TimeBucket {
            width: ConstValue::String("1 min".into()),
            source: Box::new(ScalarExpr::column(1, DataType::Timestamp)),
        },
        result_type: DataType::Timestamp,
    };
    let project_group = memo.add_expr(RelExprNode::new(
        RelOperator::Project(hybridopt_ir::ProjectPrivate {
            exprs: vec![time_bucket_expr, ScalarExpr::column(3, DataType::Float64)],
            output_columns: vec![100, 3],
        }),
        vec![select_group],
    ));

    let sort_group = memo.add_expr(RelExprNode::new(
        RelOperator::Sort(SortPrivate {
            ordering: OrderingChoice::single(100, false),
        }),
        vec![project_group],
    ));

    let grouping = GroupingPrivate::new(vec![100], vec![sum_agg(3)]);
    let group_by = memo.add_expr(RelExprNode::new(
        RelOperator::GroupBy(grouping),
        vec![sort_group],
    ));

    let root = memo.add_expr(RelExprNode::new(
        RelOperator::Limit(hybridopt_ir::LimitPrivate { limit: Some(10) }),
        vec![group_by],
    ));

    let mut columns = FxHashMap::default();
    columns.insert(100, col(100, ColumnRole::Normal, DataType::Timestamp));
    let oracle = AllowAllOracle;
    let ctx = PushdownContext {
        oracle: &oracle,
        columns: &columns,
        single_node: true,
        force_push_group: true,
        timestamp_column: Some(1),
        row_count_threshold: 0,
        push_helper: PushHelperMap::new(),
    };
    let lp = FxHashMap::default();
    let plan_node = hybridopt_optimizer::plan(&memo, root, &lp, &ctx).unwrap();

    let RelOperator::Limit(_) = &plan_node.op else {
        panic!("expected limit at root")
    };
    let sort_node = &plan_node.children[0];
    let RelOperator::Sort(_) = &sort_node.op else {
        panic!("expected sort swapped above the group-by")
    };
    assert_eq!(sort_node.engine, EngineTag::TimeSeries, "single-node sort above an in-ts group-by is tagged time-series");

    let group_node = &sort_node.children[0];
    let RelOperator::GroupBy(_) = &group_node.op else {
        panic!("expected group-by beneath the swapped sort")
    };
    assert_eq!(group_node.engine, EngineTag::TimeSeries);

    // The swap relinks the project/select/scan chain as the group-by's own
    // child; the underlying scan is asked for an ordered read there.
    fn find_ts_scan(node: &hybridopt_optimizer::PlanNode) -> &TimeSeriesScanPrivate {
        match &node.op {
            RelOperator::TimeSeriesScan(ts) => ts,
            _ => find_ts_scan(&node.children[0]),
        }
    }
    let ts = find_ts_scan(&group_node.children[0]);
    assert_eq!(ts.ordered_scan, OrderedScanType::Ordered);
}

/// S6: `count(DISTINCT v) GROUP BY ptag`, multi-node: the distinct aggregate
/// forces synchronization and a relational group-by.
#[test]
fn s6_distinct_aggregate_multi_node_forces_relational_group_by() {
    let mut memo = Memo::new();
    memo.init(EvalContext::default());

    let scan_group = memo.add_expr(RelExprNode::leaf(RelOperator::TimeSeriesScan(ts_scan(vec![
        1, 2, 3,
    ]))));
    let agg = ScalarExpr {
        kind: ScalarExprKind::AggOp {
            func: AggFunc::CountDistinct,
            args: vec![ScalarExpr::column(3, DataType::Int64)],
            distinct: true,
        },
        result_type: DataType::Int64,
    };
    let mut grouping = GroupingPrivate::new(vec![2], vec![agg]);
    grouping.hint = GroupHint::None;
    let root = memo.add_expr(RelExprNode::new(
        RelOperator::GroupBy(grouping),
        vec![scan_group],
    ));

    let mut columns = FxHashMap::default();
    columns.insert(2, col(2, ColumnRole::PrimaryTag, DataType::String));
    let oracle = AllowAllOracle;
    let ctx = PushdownContext {
        oracle: &oracle,
        columns: &columns,
        single_node: false,
        force_push_group: true,
        timestamp_column: Some(1),
        row_count_threshold: 0,
        push_helper: PushHelperMap::new(),
    };
    let lp = FxHashMap::default();
    let plan_node = hybridopt_optimizer::plan(&memo, root, &lp, &ctx).unwrap();

    assert_eq!(plan_node.engine, EngineTag::Relational);
    assert!(plan_node.children[0].needs_synchronizer);
}
