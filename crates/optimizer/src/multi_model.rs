//! The multi-model helper (§2 component 9, §9 open question): bookkeeping
//! for plans that mix time-series and relational sub-trees — which
//! aggregation strategy a group-by ended up with, which columns a join
//! needs from each side, and why a cached decision was invalidated.
//!
//! Per §9: `ResetReasons` is populated but the excerpt does not name a
//! consumer. Treated as observability-only (see DESIGN.md) — nothing in
//! this crate branches on its contents.

use rustc_hash::FxHashSet;

use hybridopt_ir::ColumnId;

/// Mirrors `ScanAggInstallation`'s shape without depending on the pushdown
/// module, so callers that only need a coarse summary (e.g. `EXPLAIN`
/// output) don't have to pull in scan-agg internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationStrategy {
    /// Every aggregate is computed relationally; no scan-agg involved.
    Relational,
    /// At least one aggregate was installed as a single-phase scan-agg.
    ScanAggSingle,
    /// At least one aggregate needed a two-phase (local + final) scan-agg.
    ScanAggTwoPhase,
}

/// Why a cached multi-model decision was dropped and must be recomputed.
/// Observability-only (§9 open question) — nothing downstream currently
/// branches on the variant, only on whether the set is non-empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResetReason {
    StaleMemo,
    WhiteListChanged,
    StatisticsChanged,
    EngineTopologyChanged,
}

/// Per-join-side column requirements for a join spanning a time-series and
/// a relational input (§2 "join columns").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinColumns {
    pub left: Vec<ColumnId>,
    pub right: Vec<ColumnId>,
}

impl JoinColumns {
    pub fn new(left: Vec<ColumnId>, right: Vec<ColumnId>) -> Self {
        JoinColumns { left, right }
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty() && self.right.is_empty()
    }
}

/// Bookkeeping attached to one mixed-engine plan: the aggregation strategy
/// chosen for each group-by encountered, the join columns for each
/// cross-engine join, and the accumulated reset reasons.
#[derive(Debug, Clone, Default)]
pub struct MultiModel {
    aggregation_strategies: Vec<AggregationStrategy>,
    join_columns: Vec<JoinColumns>,
    reset_reasons: FxHashSet<ResetReason>,
}

impl MultiModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_aggregation_strategy(&mut self, strategy: AggregationStrategy) {
        self.aggregation_strategies.push(strategy);
    }

    pub fn aggregation_strategies(&self) -> &[AggregationStrategy] {
        &self.aggregation_strategies
    }

    pub fn record_join_columns(&mut self, columns: JoinColumns) {
        self.join_columns.push(columns);
    }

    pub fn join_columns(&self) -> &[JoinColumns] {
        &self.join_columns
    }

    pub fn add_reset_reason(&mut self, reason: ResetReason) {
        self.reset_reasons.insert(reason);
    }

    pub fn reset_reasons(&self) -> impl Iterator<Item = &ResetReason> {
        self.reset_reasons.iter()
    }

    pub fn has_reset_reasons(&self) -> bool {
        !self.reset_reasons.is_empty()
    }

    /// `true` iff any group-by in this plan used a scan-agg (single- or
    /// two-phase) rather than pure relational aggregation.
    pub fn uses_scan_agg(&self) -> bool {
        self.aggregation_strategies
            .iter()
            .any(|s| !matches!(s, AggregationStrategy::Relational))
    }

    pub fn clear_reset_reasons(&mut self) {
        self.reset_reasons.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uses_scan_agg_is_false_until_a_non_relational_strategy_is_recorded() {
        let mut model = MultiModel::new();
        assert!(!model.uses_scan_agg());
        model.record_aggregation_strategy(AggregationStrategy::Relational);
        assert!(!model.uses_scan_agg());
        model.record_aggregation_strategy(AggregationStrategy::ScanAggSingle);
        assert!(model.uses_scan_agg());
    }

    #[test]
    fn reset_reasons_deduplicate() {
        let mut model = MultiModel::new();
        model.add_reset_reason(ResetReason::StaleMemo);
        model.add_reset_reason(ResetReason::StaleMemo);
        model.add_reset_reason(ResetReason::StatisticsChanged);
        assert_eq!(model.reset_reasons().count(), 2);
        assert!(model.has_reset_reasons());
        model.clear_reset_reasons();
        assert!(!model.has_reset_reasons());
    }

    #[test]
    fn join_columns_records_both_sides() {
        let mut model = MultiModel::new();
        model.record_join_columns(JoinColumns::new(vec![1, 2], vec![3]));
        assert_eq!(model.join_columns().len(), 1);
        assert_eq!(model.join_columns()[0].left, vec![1, 2]);
        assert!(!model.join_columns()[0].is_empty());
    }
}
