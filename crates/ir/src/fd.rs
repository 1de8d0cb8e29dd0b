//! Functional dependency sets, used by the ordering simplifier and the
//! logical-property builder.
//!
//! A closure-based structure: `determinants -> dependents` edges plus a set
//! of columns known to be constant within the current expression. Only the
//! two operations the spec names are needed: `add_constants` and
//! `copy_from` (§3 "Functional dependencies"), plus the closure query the
//! ordering simplifier relies on.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::column::ColumnId;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuncDepSet {
    /// `(determinant columns, dependent columns)` edges.
    deps: Vec<(Vec<ColumnId>, Vec<ColumnId>)>,
    /// Columns whose value is fixed within the current expression (e.g. by
    /// an equality filter, or a window's partition columns once a window
    /// function has fixed them per-partition).
    constants: FxHashSet<ColumnId>,
}

impl FuncDepSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dependency(&mut self, from: Vec<ColumnId>, to: Vec<ColumnId>) {
        self.deps.push((from, to));
    }

    /// Marks `cols` as constant-valued in this scope (§4.4 step 2 uses this
    /// for window partition columns before simplifying intra-partition
    /// ordering).
    pub fn add_constants(&mut self, cols: &[ColumnId]) {
        self.constants.extend(cols.iter().copied());
    }

    pub fn constants(&self) -> impl Iterator<Item = ColumnId> + '_ {
        self.constants.iter().copied()
    }

    pub fn is_constant(&self, col: ColumnId) -> bool {
        self.constants.contains(&col)
    }

    /// Copies another set's edges and constants into this one (used when a
    /// relational operator passes its input's FDs through unchanged, e.g. a
    /// `Select` over its `Filter`-free input).
    pub fn copy_from(&mut self, other: &FuncDepSet) {
        self.deps.extend(other.deps.iter().cloned());
        self.constants.extend(other.constants.iter().copied());
    }

    /// The closure of `cols` under the dependency edges: every column
    /// transitively determined by `cols` (or already constant).
    pub fn closure(&self, cols: &[ColumnId]) -> FxHashSet<ColumnId> {
        let mut known: FxHashSet<ColumnId> = cols.iter().copied().collect();
        known.extend(self.constants.iter().copied());
        loop {
            let mut grew = false;
            for (from, to) in &self.deps {
                if from.iter().all(|c| known.contains(c)) {
                    for c in to {
                        if known.insert(*c) {
                            grew = true;
                        }
                    }
                }
            }
            if !grew {
                break;
            }
        }
        known
    }

    /// `true` iff `to` is functionally determined by `from` (including the
    /// trivial case where `to` is constant).
    pub fn determines(&self, from: &[ColumnId], to: ColumnId) -> bool {
        if self.constants.contains(&to) {
            return true;
        }
        self.closure(from).contains(&to)
    }
}
