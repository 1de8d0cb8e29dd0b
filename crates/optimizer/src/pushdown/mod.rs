//! The cross-engine push-down planner (§4.6): marks a fully-built
//! expression tree with a per-node execution engine, installs scan-embedded
//! aggregates, and tracks the push-helper map consulted by native-engine
//! callbacks during execution.

pub mod planner;
pub mod scan_agg;
pub mod whitelist;

pub use planner::{plan, EngineTag, PlanNode, PushdownContext};
pub use whitelist::{expr_hash, AllowAllOracle, ExprKind, MapWhiteListOracle, Position, WhiteListOracle};

use std::sync::Arc;

use hybridopt_ir::ColumnId;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// How a push-helper entry's column expression is shaped (§3 "Push-helper
/// map").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushHelperExprKind {
    Col,
    Const,
    Func,
    AggOp,
}

/// One tracked column: where it was introduced, what shape it has, and
/// whether it is a `time_bucket` call (consulted by the group-by rule's
/// grouping-column check, §4.6 step 2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushHelperEntry {
    pub kind: PushHelperExprKind,
    pub introduced_at: Position,
    pub hash: u64,
    pub is_time_bucket: bool,
}

/// Column descriptors gathered during push-down, shared with native-engine
/// callbacks that may run on arbitrary threads once execution starts (§5
/// "Shared state"). Cloning shares the same underlying table.
#[derive(Clone, Default)]
pub struct PushHelperMap(Arc<Mutex<FxHashMap<ColumnId, PushHelperEntry>>>);

impl PushHelperMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, col: ColumnId, entry: PushHelperEntry) {
        self.0.lock().insert(col, entry);
    }

    pub fn get(&self, col: ColumnId) -> Option<PushHelperEntry> {
        self.0.lock().get(&col).cloned()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
