//! The ordering simplifier (§4.4): relaxes ordering choices required by
//! limit/offset/group-by/window/ordinality/explain operators using
//! functional dependencies.

use hybridopt_ir::{FuncDepSet, GroupingPrivate, OrderingChoice, WindowPrivate};

/// Simplifies `ordering` for an operator that is not a window and does not
/// carry a group-by's extra guard (limit, offset, ordinality, explain,
/// sort). Step 1: unchanged if already `Any()`. Step 4: otherwise
/// `ordering.Simplify(fds)`.
pub fn simplify(ordering: &OrderingChoice, fds: &FuncDepSet) -> OrderingChoice {
    if ordering.is_any() {
        return ordering.clone();
    }
    ordering.simplify(fds)
}

/// Simplifies a window's intra-partition ordering. Step 2: augments `fds`
/// with `AddConstants(partition_cols)` first, since within one partition the
/// partition columns are fixed.
pub fn simplify_window(window: &WindowPrivate, fds: &FuncDepSet) -> OrderingChoice {
    if window.ordering.is_any() {
        return window.ordering.clone();
    }
    let mut augmented = fds.clone();
    augmented.add_constants(&window.partition_by);
    window.ordering.simplify(&augmented)
}

/// Simplifies a group-by's ordering. Step 3: refuses to simplify (returns
/// the ordering unchanged) when the group-by carries a non-zero
/// `time_bucket_gap_fill_col` — gap-filling depends on the exact requested
/// order being preserved.
pub fn simplify_group_by(grouping: &GroupingPrivate, fds: &FuncDepSet) -> OrderingChoice {
    if grouping.ordering.is_any() {
        return grouping.ordering.clone();
    }
    if grouping.time_bucket_gap_fill_col.is_some() {
        return grouping.ordering.clone();
    }
    grouping.ordering.simplify(fds)
}
