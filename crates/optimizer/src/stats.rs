//! The statistics provider contract (§6 "Statistics provider"): row counts,
//! per-column distinct counts, and constraint selectivity. Returns "unknown"
//! (`None`) rather than failing — callers (the logical-property builder, the
//! filter reorderer, the parallelism chooser) must tolerate missing stats.

use hybridopt_common::types::Value;
use hybridopt_ir::{CmpOp, ColumnId};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Default)]
pub struct TableStats {
    pub row_count: usize,
    pub column_stats: FxHashMap<ColumnId, ColumnStats>,
    pub correlations: FxHashMap<(ColumnId, ColumnId), f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnStats {
    pub distinct_count: usize,
    pub null_count: usize,
    pub min_value: Option<Value>,
    pub max_value: Option<Value>,
}

impl TableStats {
    pub fn new(row_count: usize) -> Self {
        Self {
            row_count,
            column_stats: FxHashMap::default(),
            correlations: FxHashMap::default(),
        }
    }

    /// Selectivity estimate for `column <op> <literal>`. `None` means
    /// "unknown" per the statistics-provider contract, not "zero".
    pub fn estimate_selectivity(&self, column: ColumnId, op: CmpOp) -> Option<f64> {
        let stats = self.column_stats.get(&column)?;
        if stats.distinct_count == 0 {
            return None;
        }
        Some(match op {
            CmpOp::Eq => 1.0 / stats.distinct_count as f64,
            CmpOp::Lt | CmpOp::Gt | CmpOp::Le | CmpOp::Ge => 0.33,
            CmpOp::Ne => 1.0 - (1.0 / stats.distinct_count as f64),
        })
    }
}
