//! The content-addressed interner (§4.1).
//!
//! Hash-then-probe: each value's hash mixes its full structural content
//! (operator tag, private fields, and — for relational expressions — child
//! *group ids*, which are themselves plain integers so comparing children is
//! already O(1) without needing pointer identity on them). Collisions are
//! resolved by full equality. Every subsequent comparison of two interned
//! values is then an id comparison, not a structural one.
//!
//! Rust has no native pointer-equality idiom as convenient as, say, Go's
//! interface comparison, so per the design notes (§9) each interned value
//! carries a monotonically assigned id; `Interned<T>`'s `PartialEq`/`Hash`
//! compare only that id.

use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::rc::Rc;

use hybridopt_ir::{ColumnId, PhysicalProps, RelExprNode, ScalarExpr};
use rustc_hash::{FxHashMap, FxHasher};

/// A canonical, pointer-identity-comparable handle to an interned value.
#[derive(Debug)]
pub struct Interned<T> {
    id: u32,
    value: Rc<T>,
}

impl<T> Clone for Interned<T> {
    fn clone(&self) -> Self {
        Interned {
            id: self.id,
            value: Rc::clone(&self.value),
        }
    }
}

impl<T> PartialEq for Interned<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl<T> Eq for Interned<T> {}

impl<T> Hash for Interned<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> Deref for Interned<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> Interned<T> {
    /// The assigned id, stable for the life of the owning interner.
    pub fn id(&self) -> u32 {
        self.id
    }
}

fn fx_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = FxHasher::default();
    value.hash(&mut hasher);
    hasher.finish()
}

/// One content-addressed bucket map for a single type `T`.
struct InternTable<T> {
    buckets: FxHashMap<u64, Vec<Interned<T>>>,
    next_id: u32,
}

impl<T> Default for InternTable<T> {
    fn default() -> Self {
        InternTable {
            buckets: FxHashMap::default(),
            next_id: 0,
        }
    }
}

impl<T: Eq + Hash> InternTable<T> {
    fn intern(&mut self, value: T) -> Interned<T> {
        let hash = fx_hash(&value);
        let bucket = self.buckets.entry(hash).or_default();
        if let Some(existing) = bucket.iter().find(|e| *e.value == value) {
            return existing.clone();
        }
        let id = self.next_id;
        self.next_id += 1;
        let interned = Interned {
            id,
            value: Rc::new(value),
        };
        bucket.push(interned.clone());
        interned
    }

    fn count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    fn clear(&mut self) {
        self.buckets.clear();
        self.next_id = 0;
    }
}

/// Deduplicates relational expressions, scalar expressions, column-id lists,
/// and required physical-properties records for one memo's lifetime.
///
/// Private to the owning memo and never concurrently accessed (§5); plain
/// `Rc`, no atomics, no locking.
#[derive(Default)]
pub struct Interner {
    rel_exprs: InternTable<RelExprNode>,
    scalar_exprs: InternTable<ScalarExpr>,
    column_lists: InternTable<Vec<ColumnId>>,
    physical_props: InternTable<PhysicalProps>,
    min_required: Option<Interned<PhysicalProps>>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Intern(expr) -> canonical` (§4.1). Children must already be group
    /// ids drawn from the enclosing memo; the interner does not validate
    /// that they exist (the memo does, via `invariant-violation`).
    pub fn intern_rel(&mut self, expr: RelExprNode) -> Interned<RelExprNode> {
        self.rel_exprs.intern(expr)
    }

    pub fn intern_scalar(&mut self, expr: ScalarExpr) -> Interned<ScalarExpr> {
        self.scalar_exprs.intern(expr)
    }

    pub fn intern_column_list(&mut self, cols: Vec<ColumnId>) -> Interned<Vec<ColumnId>> {
        self.column_lists.intern(cols)
    }

    /// `InternPhysicalProps(p) -> canonical`. `p.Defined() == false` returns
    /// the `MinRequired` singleton rather than probing the bucket map, so
    /// every undecorated group's required-properties pointer is the exact
    /// same `Interned<PhysicalProps>` (§3 "`MinRequired` is the singleton
    /// empty record").
    pub fn intern_physical_props(&mut self, props: PhysicalProps) -> Interned<PhysicalProps> {
        if !props.defined() {
            return self.min_required().clone();
        }
        self.physical_props.intern(props)
    }

    pub fn min_required(&mut self) -> Interned<PhysicalProps> {
        if self.min_required.is_none() {
            self.min_required = Some(self.physical_props.intern(PhysicalProps::min_required()));
        }
        self.min_required.clone().unwrap()
    }

    /// Total number of distinct interned values across all tables.
    pub fn count(&self) -> usize {
        self.rel_exprs.count()
            + self.scalar_exprs.count()
            + self.column_lists.count()
            + self.physical_props.count()
    }

    /// Clears all interning state. Per §4.1, the interner never fails or
    /// shrinks on its own — only the enclosing memo decides when to drop it
    /// (called from `Memo::Init`/`Memo::Detach`).
    pub fn clear(&mut self) {
        self.rel_exprs.clear();
        self.scalar_exprs.clear();
        self.column_lists.clear();
        self.physical_props.clear();
        self.min_required = None;
    }
}
