//! Crate-internal test builders: a canned white-list oracle double plus a
//! couple of small tree-shape helpers reused across this crate's
//! `#[cfg(test)]` modules, matching the teacher's `test_utils` placement.

use hybridopt_common::types::DataType;
use hybridopt_ir::{RelExprNode, RelOperator, ScanPrivate};

use crate::pushdown::{ExprKind, Position, WhiteListOracle};

/// A scan leaf over a single output column, named `t{table_id}`.
pub fn scan_leaf(table_id: u32, output_columns: Vec<u32>) -> RelExprNode {
    RelExprNode::leaf(RelOperator::Scan(ScanPrivate {
        table_id,
        table_name: format!("t{table_id}"),
        output_columns,
    }))
}

/// An oracle that allows everything except a single blocked `(hash,
/// position)` pair, useful for exercising "pushdown rejected" branches
/// without hand-building a full `MapWhiteListOracle` allow-list.
pub struct BlockOneOracle {
    pub blocked_hash: u64,
    pub blocked_position: Position,
}

impl WhiteListOracle for BlockOneOracle {
    fn check(&self, hash: u64, position: Position) -> bool {
        !(hash == self.blocked_hash && position == self.blocked_position)
    }

    fn check_all(&self, hash: u64, position: Position, _kind: ExprKind) -> bool {
        self.check(hash, position)
    }
}

pub fn int64_type() -> DataType {
    DataType::Int64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_one_oracle_blocks_exactly_the_named_pair() {
        let oracle = BlockOneOracle {
            blocked_hash: 42,
            blocked_position: Position::Select,
        };
        assert!(!oracle.check(42, Position::Select));
        assert!(oracle.check(42, Position::Projection));
        assert!(oracle.check(1, Position::Select));
    }
}
