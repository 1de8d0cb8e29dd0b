//! Scan-aggregate installation (§4.6 step 5, §3 "Scan-aggregate"): turning a
//! group-by's aggregates into descriptors the ts-engine's statistic reader
//! can answer directly from storage-maintained statistics.

use hybridopt_ir::{AggFunc, ConstValue, ScalarExpr, ScalarExprKind, ScanAgg, ScanAggParam};

/// How one aggregate function is represented as scan-aggs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanAggInstallation {
    /// A single scan-agg directly answers this aggregate.
    Single(AggFunc),
    /// The aggregate is a combination of simpler statistic-usable
    /// aggregates that a final stage must recombine (currently only `avg`,
    /// decomposed into `sum` and `count-rows`).
    TwoPhase(Vec<AggFunc>),
}

/// The mapping from aggregate-function code to its scan-agg installation
/// strategy (§3 "Scan-aggregate", testable property 4).
pub struct StatisticAggTable;

impl StatisticAggTable {
    /// `None` when `func` is not in the statistic-usable set at all.
    pub fn install(func: &AggFunc, prune_final_agg: bool) -> Option<ScanAggInstallation> {
        if !func.is_statistic_usable() {
            return None;
        }
        match func {
            // Avg needs a final recombination (sum / count) across scan
            // results in general. When `prune-final-agg` holds there is
            // exactly one scan result per output group, so there is
            // nothing left to recombine and the single-phase form suffices
            // (§4.6 step 5: "When prune-final-agg applies ... emit only
            // the single-phase variant").
            AggFunc::Avg if !prune_final_agg => {
                Some(ScanAggInstallation::TwoPhase(vec![AggFunc::Sum, AggFunc::CountRows]))
            }
            other => Some(ScanAggInstallation::Single(other.clone())),
        }
    }
}

fn to_scan_agg_param(expr: &ScalarExpr) -> Option<ScanAggParam> {
    match &expr.kind {
        ScalarExprKind::Column(c) => Some(ScanAggParam::Column(*c)),
        ScalarExprKind::Const(v) => Some(ScanAggParam::Const(v.clone())),
        _ => None,
    }
}

/// Builds the scan-agg entries for one aggregate's argument list and
/// installation strategy. Returns `None` if an argument is not a plain
/// column or constant (unrepresentable as a `ScanAggParam`), in which case
/// the caller must degrade silently rather than fail the whole query
/// (§4.6 "statistics-usability failures degrade silently").
pub fn build_entries(args: &[ScalarExpr], installation: &ScanAggInstallation) -> Option<Vec<ScanAgg>> {
    let params: Vec<ScanAggParam> = args.iter().map(to_scan_agg_param).collect::<Option<_>>()?;
    match installation {
        ScanAggInstallation::Single(func) => Some(vec![ScanAgg {
            params,
            func: func.clone(),
        }]),
        ScanAggInstallation::TwoPhase(funcs) => Some(
            funcs
                .iter()
                .map(|f| ScanAgg {
                    params: params.clone(),
                    func: f.clone(),
                })
                .collect(),
        ),
    }
}

/// Extracts `(func, args)` from an aggregate's scalar expression, if it is
/// one.
pub fn as_agg_op(expr: &ScalarExpr) -> Option<(&AggFunc, &[ScalarExpr])> {
    match &expr.kind {
        ScalarExprKind::AggOp { func, args, .. } => Some((func, args)),
        _ => None,
    }
}

#[allow(dead_code)]
fn const_as_i64(v: &ConstValue) -> Option<i64> {
    match v {
        ConstValue::Int64(n) => Some(*n),
        _ => None,
    }
}
