//! The white-list oracle contract (§6, §4.6 pre-conditions): "can this
//! expression/operator execute in the time-series engine at this syntactic
//! position?"

use hybridopt_common::types::DataType;

/// Syntactic position an expression is being checked at (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    None = 0,
    Select = 1,
    Projection = 2,
    GroupBy = 3,
}

/// Zero-argument classification used by `CheckAll` (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExprKind {
    Col = 0,
    Const = 1,
    Func = 2,
    Agg = 3,
}

/// Provided by the host; answers whether a given (hashed) expression may
/// run inside the time-series engine at a given position.
pub trait WhiteListOracle {
    fn check(&self, hash: u64, position: Position) -> bool;
    fn check_all(&self, hash: u64, position: Position, kind: ExprKind) -> bool;
}

/// FNV-1a-style mix of the operator tag, argument-type codes, and argument
/// arity (§6 "Hashes are computed by the planner using a FNV-style mix").
pub fn expr_hash(tag: &str, arg_types: &[DataType], arity: usize) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = FNV_OFFSET;
    for byte in tag.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    for ty in arg_types {
        hash ^= type_code(ty);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash ^= arity as u64;
    hash.wrapping_mul(FNV_PRIME)
}

fn type_code(ty: &DataType) -> u64 {
    match ty {
        DataType::Unknown => 0,
        DataType::Bool => 1,
        DataType::Int64 => 2,
        DataType::Float64 => 3,
        DataType::Decimal => 4,
        DataType::String => 5,
        DataType::Bytes => 6,
        DataType::Date => 7,
        DataType::Timestamp => 8,
        DataType::Interval => 9,
        DataType::Json => 10,
        DataType::Array(_) => 11,
        DataType::Struct(_) => 12,
    }
}

/// A simple reference oracle backed by explicit allow-lists, useful for
/// tests and for single-engine deployments where every hash/position pair
/// the planner could ask about is known ahead of time.
#[derive(Debug, Clone, Default)]
pub struct MapWhiteListOracle {
    positions: rustc_hash::FxHashSet<(u64, Position)>,
    kinds: rustc_hash::FxHashSet<(u64, Position, ExprKind)>,
}

impl MapWhiteListOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(mut self, hash: u64, position: Position) -> Self {
        self.positions.insert((hash, position));
        self
    }

    pub fn allow_all(mut self, hash: u64, position: Position, kind: ExprKind) -> Self {
        self.kinds.insert((hash, position, kind));
        self
    }
}

impl WhiteListOracle for MapWhiteListOracle {
    fn check(&self, hash: u64, position: Position) -> bool {
        self.positions.contains(&(hash, position))
    }

    fn check_all(&self, hash: u64, position: Position, kind: ExprKind) -> bool {
        self.kinds.contains(&(hash, position, kind))
    }
}

/// A permissive oracle that allows everything — matches a single-node,
/// fully-pushable deployment used by several of the §8 scenario tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllOracle;

impl WhiteListOracle for AllowAllOracle {
    fn check(&self, _hash: u64, _position: Position) -> bool {
        true
    }

    fn check_all(&self, _hash: u64, _position: Position, _kind: ExprKind) -> bool {
        true
    }
}
