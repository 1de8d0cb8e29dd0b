//! The memo (§4.2): the forest of equivalent plans plus root decoration and
//! the invalidation fingerprint.
//!
//! A group is identified by its index into `Memo::groups`, never by a
//! pointer, so group membership cannot form a cycle (§9 "Cyclic references
//! between groups and expressions"). Interning happens through the memo's
//! own `Interner`: two expressions land in the same group iff their
//! canonical (interned) form is identical.

use hybridopt_common::{Error, Result};
use hybridopt_ir::{GroupId, PhysicalProps, RelExprNode};
use rustc_hash::FxHashMap;

use crate::fingerprint::{EvalContext, MemoFingerprint};
use crate::interner::{Interned, Interner};
use crate::logical_props::LogicalProps;

/// The chosen physical realization of a group for one required-properties
/// record: its provided properties and its cost. Written exactly once per
/// `(group, required)` pair (§4.2 `SetBestProps`).
#[derive(Debug, Clone, PartialEq)]
pub struct BestPlan {
    pub provided: Interned<PhysicalProps>,
    pub cost: f64,
}

/// One equivalence class: every member produces the same multiset (§3
/// "Memo group").
#[derive(Debug, Default)]
pub struct Group {
    pub members: Vec<Interned<RelExprNode>>,
    pub logical_props: Option<LogicalProps>,
    best: FxHashMap<u32, BestPlan>,
}

impl Group {
    /// The best plan recorded for `required`, if any.
    pub fn best(&self, required: &Interned<PhysicalProps>) -> Option<&BestPlan> {
        self.best.get(&required.id())
    }

    pub fn best_plans(&self) -> impl Iterator<Item = (u32, &BestPlan)> {
        self.best.iter().map(|(k, v)| (*k, v))
    }
}

/// Holds the forest of equivalent plans, the interner that feeds it, and the
/// root decoration. One memo per prepared statement or ad-hoc query (§3
/// "Lifecycles").
pub struct Memo {
    interner: Interner,
    groups: Vec<Group>,
    expr_to_group: FxHashMap<u32, GroupId>,
    root: Option<GroupId>,
    root_required: Option<Interned<PhysicalProps>>,
    eval_context: Option<EvalContext>,
    fingerprint: Option<MemoFingerprint>,
    next_id: u64,
    next_with_id: u64,
}

impl Default for Memo {
    fn default() -> Self {
        Memo {
            interner: Interner::new(),
            groups: Vec::new(),
            expr_to_group: FxHashMap::default(),
            root: None,
            root_required: None,
            eval_context: None,
            fingerprint: None,
            next_id: 0,
            next_with_id: 0,
        }
    }
}

impl Memo {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Init(eval-context)`: resets all mutable state and snapshots the
    /// session/setting fingerprint (§4.2).
    pub fn init(&mut self, ctx: EvalContext) {
        self.interner.clear();
        self.groups.clear();
        self.expr_to_group.clear();
        self.root = None;
        self.root_required = None;
        self.fingerprint = Some(MemoFingerprint::snapshot(&ctx));
        self.eval_context = Some(ctx);
        self.next_id = 0;
        self.next_with_id = 0;
    }

    pub fn eval_context(&self) -> Option<&EvalContext> {
        self.eval_context.as_ref()
    }

    pub fn fingerprint(&self) -> Option<&MemoFingerprint> {
        self.fingerprint.as_ref()
    }

    pub fn interner(&mut self) -> &mut Interner {
        &mut self.interner
    }

    pub fn group(&self, id: GroupId) -> &Group {
        &self.groups[id]
    }

    pub fn group_mut(&mut self, id: GroupId) -> &mut Group {
        &mut self.groups[id]
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Interns `node` and returns the group it belongs to, creating a new
    /// singleton group the first time this canonical expression is seen.
    /// A second structurally-equal node (even built independently) always
    /// resolves to the same group.
    pub fn add_expr(&mut self, node: RelExprNode) -> GroupId {
        let canonical = self.interner.intern_rel(node);
        if let Some(&group) = self.expr_to_group.get(&canonical.id()) {
            return group;
        }
        let group_id = self.groups.len();
        self.groups.push(Group {
            members: vec![canonical.clone()],
            logical_props: None,
            best: FxHashMap::default(),
        });
        self.expr_to_group.insert(canonical.id(), group_id);
        group_id
    }

    /// Adds `node` as an additional member of an already-known group
    /// (e.g. a rewrite rule producing a logically equivalent alternative).
    /// Fails with `invariant-violation` if `node`'s interned form already
    /// belongs to a *different* group — merging groups is out of scope for
    /// this core (§9 does not describe group-merge semantics).
    pub fn add_member(&mut self, group: GroupId, node: RelExprNode) -> Result<()> {
        let canonical = self.interner.intern_rel(node);
        match self.expr_to_group.get(&canonical.id()) {
            Some(&existing) if existing != group => Err(Error::invariant(
                "expression already belongs to a different memo group",
            )),
            Some(_) => Ok(()),
            None => {
                self.expr_to_group.insert(canonical.id(), group);
                self.groups[group].members.push(canonical);
                Ok(())
            }
        }
    }

    pub fn set_root(&mut self, group: GroupId, required: Interned<PhysicalProps>) {
        self.root = Some(group);
        self.root_required = Some(required);
    }

    pub fn root_expr(&self) -> Option<GroupId> {
        self.root
    }

    pub fn root_props(&self) -> Option<&Interned<PhysicalProps>> {
        self.root_required.as_ref()
    }

    /// `SetBestProps(expr, required, provided, cost)`: write exactly once
    /// per `(group, required)`. A second call with a different `provided`
    /// or `cost` is an `invariant-violation`; repeating the identical value
    /// is a no-op (idempotent re-optimization).
    pub fn set_best_props(
        &mut self,
        group: GroupId,
        required: Interned<PhysicalProps>,
        provided: Interned<PhysicalProps>,
        cost: f64,
    ) -> Result<()> {
        let entry = BestPlan { provided, cost };
        let group = &mut self.groups[group];
        match group.best.get(&required.id()) {
            Some(existing) if *existing != entry => Err(Error::invariant(
                "SetBestProps called twice with conflicting values for the same group/required pair",
            )),
            Some(_) => Ok(()),
            None => {
                group.best.insert(required.id(), entry);
                Ok(())
            }
        }
    }

    /// `HasPlaceholders()`: requires the root to be relational (i.e. set).
    pub fn has_placeholders(&self) -> Result<bool> {
        let root = self
            .root
            .ok_or_else(|| Error::invariant("HasPlaceholders called before SetRoot"))?;
        Ok(self.groups[root]
            .logical_props
            .as_ref()
            .is_some_and(LogicalProps::has_placeholder))
    }

    /// `Detach()`: releases the eval-context reference and clears
    /// per-expression column statistics, so subsequent stat requests report
    /// "not available" (§4.3) without discarding the rest of the memo.
    pub fn detach(&mut self) {
        self.eval_context = None;
        for group in &mut self.groups {
            if let Some(props) = &mut group.logical_props {
                props.clear_column_stats();
            }
        }
    }

    /// Monotonic id generator, independent of interner ids, used for
    /// synthesized artifacts (e.g. naming a new materialized `With`).
    pub fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// A separate monotonic namespace reserved for `With`/`WithScan` names,
    /// so they never collide with ids handed out by `next_id`.
    pub fn next_with_id(&mut self) -> u64 {
        let id = self.next_with_id;
        self.next_with_id += 1;
        id
    }

    /// Advisory memory estimate in bytes. Counted once per live stat (§9
    /// open question: the source this was distilled from double-counted one
    /// accumulator; this core adds each stat exactly once and only then
    /// doubles the total to approximate allocation overhead, per §5).
    pub fn memory_estimate_bytes(&self) -> u64 {
        const GROUP_OVERHEAD: u64 = 64;
        const INTERN_ENTRY_OVERHEAD: u64 = 48;
        const COLUMN_STAT_OVERHEAD: u64 = 32;

        let mut total = self.groups.len() as u64 * GROUP_OVERHEAD;
        total += self.interner.count() as u64 * INTERN_ENTRY_OVERHEAD;
        for group in &self.groups {
            if let Some(props) = &group.logical_props {
                total += props.column_stat_count() as u64 * COLUMN_STAT_OVERHEAD;
            }
        }
        total * 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybridopt_ir::{OrderingChoice, RelOperator, ScanPrivate, SelectPrivate};

    fn scan(id: u32) -> RelExprNode {
        RelExprNode::leaf(RelOperator::Scan(ScanPrivate {
            table_id: id,
            table_name: format!("t{id}"),
            output_columns: vec![1],
        }))
    }

    #[test]
    fn add_expr_deduplicates_into_the_same_group() {
        let mut memo = Memo::new();
        let g1 = memo.add_expr(scan(1));
        let g2 = memo.add_expr(scan(1));
        assert_eq!(g1, g2);
        assert_eq!(memo.group_count(), 1);
    }

    #[test]
    fn distinct_expressions_get_distinct_groups() {
        let mut memo = Memo::new();
        let g1 = memo.add_expr(scan(1));
        let g2 = memo.add_expr(scan(2));
        assert_ne!(g1, g2);
        assert_eq!(memo.group_count(), 2);
    }

    #[test]
    fn set_best_props_is_write_once() {
        let mut memo = Memo::new();
        let g = memo.add_expr(scan(1));
        let required = memo.interner().min_required();
        let provided = memo.interner().min_required();
        memo.set_best_props(g, required.clone(), provided.clone(), 10.0)
            .unwrap();
        // Repeating the identical value is fine.
        memo.set_best_props(g, required.clone(), provided.clone(), 10.0)
            .unwrap();
        // A conflicting cost for the same required-properties record fails.
        let err = memo
            .set_best_props(g, required, provided, 20.0)
            .unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
    }

    #[test]
    fn has_placeholders_requires_a_root() {
        let memo = Memo::new();
        let err = memo.has_placeholders().unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
    }

    #[test]
    fn has_placeholders_reads_the_root_groups_logical_props() {
        let mut memo = Memo::new();
        let g = memo.add_expr(scan(1));
        let required = memo.interner().min_required();
        memo.set_root(g, required);
        assert!(!memo.has_placeholders().unwrap());
        memo.group_mut(g).logical_props = Some(LogicalProps::for_test_with_placeholder(true));
        assert!(memo.has_placeholders().unwrap());
    }

    #[test]
    fn detach_clears_column_stats_but_keeps_the_memo_usable() {
        let mut memo = Memo::new();
        let g = memo.add_expr(scan(1));
        let mut props = LogicalProps::for_test_with_placeholder(false);
        props.set_column_stat(1, crate::logical_props::ColumnStatSummary::default());
        memo.group_mut(g).logical_props = Some(props);
        assert_eq!(memo.group(g).logical_props.as_ref().unwrap().column_stat_count(), 1);
        memo.detach();
        assert_eq!(memo.group(g).logical_props.as_ref().unwrap().column_stat_count(), 0);
    }

    #[test]
    fn next_id_and_next_with_id_are_independent_monotonic_counters() {
        let mut memo = Memo::new();
        assert_eq!(memo.next_id(), 0);
        assert_eq!(memo.next_id(), 1);
        assert_eq!(memo.next_with_id(), 0);
        assert_eq!(memo.next_id(), 2);
    }

    #[test]
    fn add_member_rejects_cross_group_merges() {
        let mut memo = Memo::new();
        let g1 = memo.add_expr(scan(1));
        let g2 = memo.add_expr(scan(2));
        let other_member = RelExprNode::new(
            RelOperator::Select(SelectPrivate { conjuncts: vec![] }),
            vec![g1],
        );
        // First registration under g2 is fine structurally, but this
        // expression is unrelated to g1's scan, so attaching it under g1
        // while it was already interned under its own group must fail.
        let _ = memo.add_expr(other_member.clone());
        let err = memo.add_member(g1, other_member).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
        let _ = g2;
        let _ = OrderingChoice::any();
    }
}
