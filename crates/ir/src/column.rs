//! Column and table metadata: the catalog-resolved facts the optimizer
//! treats as read-only input (§5 "Shared catalog/metadata objects").

use hybridopt_common::types::DataType;
use serde::{Deserialize, Serialize};

/// Stable identifier for a column, assigned by the (external) catalog /
/// binder before the expression tree ever reaches this crate.
pub type ColumnId = u32;

/// Stable identifier for a table.
pub type TableId = u32;

/// A column's role within its source table. Only `PrimaryTag` and `Tag`
/// columns are eligible for scan-aggregate statistic reads and ordered
/// time-series scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnRole {
    Normal,
    Tag,
    PrimaryTag,
}

/// Per-column metadata, as described in §3 "Column metadata".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub id: ColumnId,
    pub alias: String,
    pub table_id: TableId,
    pub role: ColumnRole,
    pub type_family: DataType,
    pub width: u32,
}

impl ColumnMetadata {
    pub fn is_primary_tag(&self) -> bool {
        matches!(self.role, ColumnRole::PrimaryTag)
    }

    pub fn is_tag(&self) -> bool {
        matches!(self.role, ColumnRole::Tag | ColumnRole::PrimaryTag)
    }
}

/// Per-table metadata. `primary_tag_count` lets the planner decide whether a
/// group-by's grouping columns cover the *entire* primary-tag set (§4.6
/// step 5, `prune-final-agg`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableMetadata {
    pub id: TableId,
    pub name: String,
    pub columns: Vec<ColumnId>,
    pub primary_tag_count: u32,
}
