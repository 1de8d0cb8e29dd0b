//! The relational expression node shape stored inside the memo.
//!
//! Children are `GroupId`s, not boxed sub-expressions: membership in a group
//! is an index into the memo-owned array, never a back-pointer, so the tree
//! cannot form a cycle (§9 "Cyclic references between groups and
//! expressions").

use serde::{Deserialize, Serialize};

use crate::operator::RelOperator;

/// Index into a memo's group array. Defined here (rather than in the
/// optimizer crate) because `RelExprNode` needs it for its `children` field.
pub type GroupId = usize;

/// One member of a memo group: an operator plus its child group references.
/// Two `RelExprNode`s are structurally equal iff their operator (including
/// all private fields) and their child group ids match exactly — exactly
/// the condition `Interner::Intern` uses to decide canonicalization (§4.1).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelExprNode {
    pub op: RelOperator,
    pub children: Vec<GroupId>,
}

impl RelExprNode {
    pub fn new(op: RelOperator, children: Vec<GroupId>) -> Self {
        RelExprNode { op, children }
    }

    pub fn leaf(op: RelOperator) -> Self {
        RelExprNode {
            op,
            children: Vec::new(),
        }
    }

    pub fn arity(&self) -> usize {
        self.children.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::{RelOperator, ScanPrivate};

    #[test]
    fn structurally_equal_nodes_compare_equal() {
        let a = RelExprNode::leaf(RelOperator::Scan(ScanPrivate {
            table_id: 1,
            table_name: "t".into(),
            output_columns: vec![1, 2],
        }));
        let b = RelExprNode::leaf(RelOperator::Scan(ScanPrivate {
            table_id: 1,
            table_name: "t".into(),
            output_columns: vec![1, 2],
        }));
        assert_eq!(a, b);
    }

    #[test]
    fn differing_children_are_not_equal() {
        let op = RelOperator::Select(crate::operator::SelectPrivate { conjuncts: vec![] });
        let a = RelExprNode::new(op.clone(), vec![0]);
        let b = RelExprNode::new(op, vec![1]);
        assert_ne!(a, b);
    }
}
