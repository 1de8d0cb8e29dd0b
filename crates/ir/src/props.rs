//! Required physical properties: presentation and ordering choice (§3).
//!
//! These are interned by pointer identity (see `hybridopt_optimizer::interner`);
//! the types here are plain, cheaply-clonable value types — the interner is
//! what gives them O(1) equality in the rest of the engine.

use serde::{Deserialize, Serialize};

use crate::column::ColumnId;
use crate::fd::FuncDepSet;

/// Required output column order/aliasing. An empty presentation means "any
/// order is acceptable", matching `MinRequired`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Presentation(pub Vec<ColumnId>);

impl Presentation {
    pub fn any() -> Self {
        Presentation(Vec::new())
    }

    pub fn is_any(&self) -> bool {
        self.0.is_empty()
    }
}

/// One position in an ordering choice: any permutation of `equiv_cols` is
/// acceptable at this position, all in the same direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderingGroup {
    pub equiv_cols: Vec<ColumnId>,
    pub descending: bool,
}

/// "Semantically: any permutation of the equivalent columns is acceptable."
/// (§3 "Ordering-choice").
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderingChoice {
    pub groups: Vec<OrderingGroup>,
}

impl OrderingChoice {
    pub fn any() -> Self {
        OrderingChoice { groups: Vec::new() }
    }

    pub fn single(col: ColumnId, descending: bool) -> Self {
        OrderingChoice {
            groups: vec![OrderingGroup {
                equiv_cols: vec![col],
                descending,
            }],
        }
    }

    pub fn is_any(&self) -> bool {
        self.groups.is_empty()
    }

    /// `true` iff at least one group can be dropped or shrunk given `fds`
    /// (§4.4 step 4 delegates to this before calling `simplify`).
    pub fn can_simplify(&self, fds: &FuncDepSet) -> bool {
        self.groups.iter().any(|g| {
            g.equiv_cols.iter().any(|c| fds.is_constant(*c)) || g.equiv_cols.len() > 1
        })
    }

    /// Drops ordering groups whose columns are all functionally constant
    /// (ordering among constants is vacuous) and, within a surviving group,
    /// keeps only one representative per equivalence class already implied
    /// by an earlier group's determinants. This is a semantic refinement:
    /// every tuple order satisfying `self` also satisfies the result,
    /// because we only ever drop constraints, never add them (§4.4,
    /// testable property 3).
    pub fn simplify(&self, fds: &FuncDepSet) -> OrderingChoice {
        let mut seen_determined: Vec<ColumnId> = Vec::new();
        let mut groups = Vec::new();
        for g in &self.groups {
            let all_constant = g.equiv_cols.iter().all(|c| fds.is_constant(*c));
            if all_constant {
                continue;
            }
            if !seen_determined.is_empty()
                && g.equiv_cols
                    .iter()
                    .all(|c| fds.determines(&seen_determined, *c))
            {
                continue;
            }
            seen_determined.extend(g.equiv_cols.iter().copied());
            groups.push(g.clone());
        }
        OrderingChoice { groups }
    }
}

/// A required physical properties record: `(presentation, ordering)`,
/// interned so that equal records are pointer-identical (§3, §4.1).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhysicalProps {
    pub presentation: Presentation,
    pub ordering: OrderingChoice,
}

impl PhysicalProps {
    pub fn min_required() -> Self {
        PhysicalProps::default()
    }

    /// `false` for `MinRequired` — used by `InternPhysicalProps` to decide
    /// whether to short-circuit to the singleton (§4.1).
    pub fn defined(&self) -> bool {
        !self.presentation.is_any() || !self.ordering.is_any()
    }
}
