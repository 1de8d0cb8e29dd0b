//! The filter reorderer (§4.5): sorts a select's top-level conjuncts by
//! ascending estimated selectivity and rebalances each conjunct's and/or
//! tree so cheap branches run first.

use hybridopt_ir::{ColumnId, ScalarExpr, ScalarExprKind};

use crate::stats::TableStats;

/// Estimates one scalar expression's selectivity against `stats`. Missing →
/// `None` ("unknown"), matching the statistics-provider contract (§6).
/// Only `Cmp(column, literal)` leaves are stats-backed; anything else is
/// unknown.
fn leaf_selectivity(expr: &ScalarExpr, stats: &TableStats) -> Option<f64> {
    match &expr.kind {
        ScalarExprKind::Cmp { op, left, right } => {
            let column = left.as_column().or_else(|| right.as_column())?;
            stats.estimate_selectivity(column, *op)
        }
        _ => None,
    }
}

/// Reorders `conjuncts` in place by ascending selectivity (stable sort).
/// Skips reordering entirely if any conjunct's selectivity is unknown or if
/// there is at most one conjunct (§4.5). Returns `true` if it reordered.
pub fn reorder_conjuncts(conjuncts: &mut Vec<ScalarExpr>, stats: &TableStats) -> bool {
    if conjuncts.len() <= 1 {
        return false;
    }
    let mut selectivities = Vec::with_capacity(conjuncts.len());
    for c in conjuncts.iter() {
        match leaf_selectivity(c, stats) {
            Some(s) => selectivities.push(s),
            None => return false,
        }
    }
    let mut indexed: Vec<(usize, f64)> = selectivities.into_iter().enumerate().collect();
    indexed.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    let reordered: Vec<ScalarExpr> = indexed
        .into_iter()
        .map(|(i, _)| conjuncts[i].clone())
        .collect();
    *conjuncts = reordered;
    true
}

/// A leaf's selectivity for rebalancing purposes; missing → 0 (§4.5
/// "Selectivity of a leaf is the constraint-builder's computed figure;
/// missing → 0").
fn rebalance_selectivity(expr: &ScalarExpr, stats: &TableStats) -> f64 {
    leaf_selectivity(expr, stats).unwrap_or(0.0)
}

/// Recursively rebalances `and`/`or` trees within one conjunct: for each
/// `and`, the lower-selectivity side goes left; for each `or`, the
/// higher-selectivity side goes left.
pub fn rebalance(expr: &mut ScalarExpr, stats: &TableStats) {
    match &mut expr.kind {
        ScalarExprKind::And(items) => {
            for item in items.iter_mut() {
                rebalance(item, stats);
            }
            items.sort_by(|a, b| {
                rebalance_selectivity(a, stats)
                    .partial_cmp(&rebalance_selectivity(b, stats))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        ScalarExprKind::Or(items) => {
            for item in items.iter_mut() {
                rebalance(item, stats);
            }
            items.sort_by(|a, b| {
                rebalance_selectivity(b, stats)
                    .partial_cmp(&rebalance_selectivity(a, stats))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        ScalarExprKind::Not(inner) => rebalance(inner, stats),
        _ => {}
    }
}

/// Full filter-reorder pass over a select's conjunct list: sort the
/// top-level conjuncts, then rebalance each one's internal and/or tree.
pub fn reorder_select(conjuncts: &mut Vec<ScalarExpr>, stats: &TableStats) {
    reorder_conjuncts(conjuncts, stats);
    for c in conjuncts.iter_mut() {
        rebalance(c, stats);
    }
}
