//! `hybridopt-optimizer`: a cascades-style memo, its logical-property
//! builder, the ordering simplifier and filter reorderer, and the
//! cross-engine push-down planner that decides, per node, whether a
//! relational expression executes in the time-series engine or the
//! relational engine.
//!
//! The top-level entry point is [`optimize`]: it builds logical properties
//! bottom-up over a memo's root group, then runs the cross-engine planner
//! over the result (§2 "Data flow").

pub mod filter_reorder;
pub mod fingerprint;
pub mod interner;
pub mod logical_props;
pub mod memo;
pub mod multi_model;
pub mod ordering_simplifier;
pub mod parallelism;
pub mod pushdown;
pub mod staleness;
pub mod stats;
#[cfg(test)]
mod test_utils;

pub use fingerprint::{CachedAutoLimit, EvalContext, MemoFingerprint, QueryOptMode};
pub use interner::{Interned, Interner};
pub use logical_props::{Cardinality, ColumnStatSummary, LogicalProps, LogicalPropsBuilder};
pub use memo::{BestPlan, Group, Memo};
pub use multi_model::{AggregationStrategy, JoinColumns, MultiModel, ResetReason};
pub use parallelism::{choose_dop, DopInputs, ParallelismLimits};
pub use pushdown::{
    expr_hash, plan, AllowAllOracle, EngineTag, ExprKind, MapWhiteListOracle, PlanNode, Position,
    PushdownContext, WhiteListOracle,
};
pub use stats::{ColumnStats, TableStats};

use rustc_hash::FxHashMap;

use hybridopt_common::Result;
use hybridopt_ir::{ColumnId, ColumnMetadata, GroupId};

/// Gates ordering simplification and filter reordering independently of the
/// push-down planner, mirroring the teacher's `OptimizationLevel`/
/// `RuleFlags` gating (§11 supplemented features).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum OptimizationLevel {
    None,
    #[default]
    Standard,
    Full,
}

/// Which optional rewrite passes run before the push-down planner. Each
/// defaults to "on at `Standard`" and can be forced independently, the same
/// shape as the teacher's `RuleFlags`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleFlags {
    pub ordering_simplifier: Option<bool>,
    pub filter_reorder: Option<bool>,
}

impl RuleFlags {
    fn enabled(flag: Option<bool>, level: OptimizationLevel) -> bool {
        flag.unwrap_or(level >= OptimizationLevel::Standard)
    }
}

/// Everything [`optimize`] needs beyond the memo itself: session/cluster
/// settings (via the caller-supplied [`EvalContext`] baked into the memo at
/// `Init` time), per-table statistics, per-column metadata, the white-list
/// oracle, and the deployment-shape flags the push-down planner's rules
/// consult (§4.6 pre-conditions, §6 external interfaces).
pub struct OptimizerSettings<'a> {
    pub level: OptimizationLevel,
    pub rules: RuleFlags,
    pub table_stats: &'a FxHashMap<u32, TableStats>,
    pub columns: &'a FxHashMap<ColumnId, ColumnMetadata>,
    pub oracle: &'a dyn WhiteListOracle,
    pub single_node: bool,
    pub force_push_group: bool,
    pub timestamp_column: Option<ColumnId>,
    pub row_count_threshold: usize,
}

impl<'a> OptimizerSettings<'a> {
    /// Whether the caller building the tree should run
    /// [`ordering_simplifier::simplify`] (and friends) before interning an
    /// ordering choice.
    pub fn ordering_simplifier_enabled(&self) -> bool {
        RuleFlags::enabled(self.rules.ordering_simplifier, self.level)
    }

    /// Whether the caller building the tree should run
    /// [`filter_reorder::reorder_select`] before interning a select's
    /// conjuncts.
    pub fn filter_reorder_enabled(&self) -> bool {
        RuleFlags::enabled(self.rules.filter_reorder, self.level)
    }
}

/// The result of [`optimize`]: the annotated, engine-tagged plan tree plus
/// the push-helper map accumulated while building it (useful to a caller
/// wiring up native-engine callbacks for the execution that follows, §5).
pub struct OptimizedPlan {
    pub root: PlanNode,
    pub push_helper: pushdown::PushHelperMap,
}

/// Runs the documented data flow (§2): compute logical properties bottom-up
/// over `root`, then run the cross-engine push-down planner over the same
/// tree. Ordering simplification and filter reordering are rule passes a
/// caller applies to the conjuncts/orderings it builds before interning
/// them; they are exposed as free functions
/// ([`ordering_simplifier::simplify`], [`filter_reorder::reorder_select`])
/// rather than folded into this entry point, since they operate on
/// not-yet-interned `ScalarExpr`/`OrderingChoice` values during tree
/// construction, before the memo has a root to plan from.
pub fn optimize(memo: &mut Memo, root: GroupId, settings: &OptimizerSettings) -> Result<OptimizedPlan> {
    let builder = LogicalPropsBuilder::new(settings.table_stats);
    let mut logical_props: FxHashMap<GroupId, LogicalProps> = FxHashMap::default();
    collect_logical_props(memo, root, &builder, &mut logical_props);

    let push_helper = pushdown::PushHelperMap::new();
    let ctx = PushdownContext {
        oracle: settings.oracle,
        columns: settings.columns,
        single_node: settings.single_node,
        force_push_group: settings.force_push_group,
        timestamp_column: settings.timestamp_column,
        row_count_threshold: settings.row_count_threshold,
        push_helper: push_helper.clone(),
    };
    let root_node = pushdown::plan(memo, root, &logical_props, &ctx)?;
    Ok(OptimizedPlan {
        root: root_node,
        push_helper,
    })
}

fn collect_logical_props(
    memo: &mut Memo,
    group: GroupId,
    builder: &LogicalPropsBuilder,
    out: &mut FxHashMap<GroupId, LogicalProps>,
) {
    if out.contains_key(&group) {
        return;
    }
    let children = memo.group(group).members[0].children.clone();
    for child in children {
        collect_logical_props(memo, child, builder, out);
    }
    let props = builder.build(memo, group);
    out.insert(group, props);
}
