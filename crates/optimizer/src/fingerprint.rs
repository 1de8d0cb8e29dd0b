//! Session/setting evaluation context and the memo invalidation fingerprint
//! (§3 "Memo fingerprint", §6 "Session/setting fingerprint").

use serde::{Deserialize, Serialize};

/// How aggressively the planner should prefer pushing work into the
/// time-series engine. One of the cluster-setting fields snapshotted into
/// the fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryOptMode {
    Default,
    Forced,
    Disabled,
}

impl Default for QueryOptMode {
    fn default() -> Self {
        QueryOptMode::Default
    }
}

/// Everything the caller presents that can affect planning: session fields
/// plus cluster-setting fields affecting ts planning (§3). Fields the caller
/// omits take the documented defaults (§6): `push_all_processor = true`,
/// `force_push_group = true`, `query_opt_mode = Default`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalContext {
    pub bytes_encode_format: String,
    pub join_reorder_limit: u32,
    pub multi_model: bool,
    pub zigzag_join: bool,
    pub optimizer_foreign_keys: bool,
    pub safe_updates: bool,
    pub save_tables_prefix: String,
    pub insert_fast_path: bool,

    pub ordered_scan: bool,
    pub push_all_processor: bool,
    pub force_push_group: bool,
    pub auto_limit_quantity: u64,
    pub query_opt_mode: QueryOptMode,
}

impl Default for EvalContext {
    fn default() -> Self {
        EvalContext {
            bytes_encode_format: String::new(),
            join_reorder_limit: 0,
            multi_model: false,
            zigzag_join: false,
            optimizer_foreign_keys: false,
            safe_updates: false,
            save_tables_prefix: String::new(),
            insert_fast_path: false,

            ordered_scan: false,
            push_all_processor: true,
            force_push_group: true,
            auto_limit_quantity: 0,
            query_opt_mode: QueryOptMode::default(),
        }
    }
}

/// What the cached plan itself remembers about its outer limit, needed by
/// the auto-limit consistency rule (§4.8). Set once the root is decorated;
/// `None` until then.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CachedAutoLimit {
    pub has_auto_limit: bool,
    pub outer_limit_literal: Option<u64>,
}

/// The snapshot taken at `Memo::Init` time, compared field-by-field against
/// a fresh `EvalContext` and catalog digest by the staleness checker.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoFingerprint {
    session: EvalContext,
    pub catalog_digest: u64,
}

impl MemoFingerprint {
    /// Snapshots the session/setting fields. The catalog digest is not
    /// known yet at `Init` time (it requires catalog I/O performed lazily
    /// by the staleness checker), so it starts at zero and is overwritten
    /// the first time `IsStale` runs to completion.
    pub fn snapshot(ctx: &EvalContext) -> Self {
        MemoFingerprint {
            session: ctx.clone(),
            catalog_digest: 0,
        }
    }

    pub fn session(&self) -> &EvalContext {
        &self.session
    }

    pub fn with_catalog_digest(mut self, digest: u64) -> Self {
        self.catalog_digest = digest;
        self
    }

    /// `true` iff any session/setting field differs from `current` (§4.8).
    pub fn session_differs(&self, current: &EvalContext) -> bool {
        &self.session != current
    }
}
