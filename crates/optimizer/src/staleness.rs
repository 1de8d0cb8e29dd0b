//! The staleness checker (§4.8): compares a cached memo's fingerprint
//! against current session/setting/catalog state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hybridopt_common::{Error, Result};
use tracing::debug;

use crate::fingerprint::{CachedAutoLimit, EvalContext, MemoFingerprint};

/// A cooperative cancellation flag (§5 "Suspension points"). Cloning shares
/// the underlying flag; `cancel()` from any clone is visible to all others.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// External collaborator that computes the catalog-dependency digest (§3
/// "Memo fingerprint": "a catalog-dependency digest over every referenced
/// object and the current user's privileges on each"). May perform I/O.
pub trait CatalogFingerprintSource {
    fn catalog_digest(&self, token: &CancellationToken) -> Result<u64>;
}

/// `true` iff the cached plan's auto-limit decoration is consistent with
/// the current auto-limit setting (§4.8, §4.2 staleness rule). Consistent
/// iff `flag == (quantity > 0)` and, when set, the cached outer limit
/// literal equals the quantity.
fn auto_limit_consistent(current: &EvalContext, cached: CachedAutoLimit) -> bool {
    let expected_flag = current.auto_limit_quantity > 0;
    if cached.has_auto_limit != expected_flag {
        return false;
    }
    if cached.has_auto_limit {
        if let Some(literal) = cached.outer_limit_literal {
            return literal == current.auto_limit_quantity;
        }
    }
    true
}

/// `IsStale(catalog) -> (bool, error)` (§4.2/§4.8). Stale iff any
/// fingerprint field differs, the catalog digest differs, or auto-limit
/// consistency fails. Catalog I/O errors propagate verbatim rather than
/// being swallowed as "stale" (§4.2: "errors must propagate").
pub fn is_stale(
    fingerprint: &MemoFingerprint,
    current: &EvalContext,
    auto_limit: CachedAutoLimit,
    catalog: &dyn CatalogFingerprintSource,
    token: &CancellationToken,
) -> Result<bool> {
    if token.is_cancelled() {
        return Err(Error::Cancelled);
    }
    if fingerprint.session_differs(current) {
        debug!("memo stale: session fingerprint differs");
        return Ok(true);
    }
    if !auto_limit_consistent(current, auto_limit) {
        debug!("memo stale: auto-limit decoration inconsistent");
        return Ok(true);
    }
    let digest = catalog.catalog_digest(token)?;
    if token.is_cancelled() {
        return Err(Error::Cancelled);
    }
    let stale = digest != fingerprint.catalog_digest;
    debug!(stale, "staleness verdict from catalog digest comparison");
    Ok(stale)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedDigest(u64);
    impl CatalogFingerprintSource for FixedDigest {
        fn catalog_digest(&self, _token: &CancellationToken) -> Result<u64> {
            Ok(self.0)
        }
    }

    struct FailingDigest;
    impl CatalogFingerprintSource for FailingDigest {
        fn catalog_digest(&self, _token: &CancellationToken) -> Result<u64> {
            Err(Error::StalenessCatalogError("catalog unreachable".into()))
        }
    }

    fn no_auto_limit() -> CachedAutoLimit {
        CachedAutoLimit::default()
    }

    #[test]
    fn matching_fingerprint_and_digest_is_not_stale() {
        let ctx = EvalContext::default();
        let fp = MemoFingerprint::snapshot(&ctx).with_catalog_digest(42);
        let catalog = FixedDigest(42);
        let token = CancellationToken::new();
        let stale = is_stale(&fp, &ctx, no_auto_limit(), &catalog, &token).unwrap();
        assert!(!stale);
    }

    #[test]
    fn changed_session_field_is_stale_without_touching_the_catalog() {
        let ctx = EvalContext::default();
        let fp = MemoFingerprint::snapshot(&ctx).with_catalog_digest(42);
        let mut changed = ctx.clone();
        changed.multi_model = !changed.multi_model;
        let catalog = FailingDigest;
        let token = CancellationToken::new();
        let stale = is_stale(&fp, &changed, no_auto_limit(), &catalog, &token).unwrap();
        assert!(stale);
    }

    #[test]
    fn changed_catalog_digest_is_stale() {
        let ctx = EvalContext::default();
        let fp = MemoFingerprint::snapshot(&ctx).with_catalog_digest(1);
        let catalog = FixedDigest(2);
        let token = CancellationToken::new();
        let stale = is_stale(&fp, &ctx, no_auto_limit(), &catalog, &token).unwrap();
        assert!(stale);
    }

    #[test]
    fn catalog_errors_propagate_verbatim() {
        let ctx = EvalContext::default();
        let fp = MemoFingerprint::snapshot(&ctx).with_catalog_digest(1);
        let catalog = FailingDigest;
        let token = CancellationToken::new();
        let err = is_stale(&fp, &ctx, no_auto_limit(), &catalog, &token).unwrap_err();
        assert!(matches!(err, Error::StalenessCatalogError(_)));
    }

    #[test]
    fn auto_limit_flag_mismatch_is_stale() {
        let mut ctx = EvalContext::default();
        ctx.auto_limit_quantity = 100;
        let fp = MemoFingerprint::snapshot(&ctx).with_catalog_digest(1);
        let catalog = FixedDigest(1);
        let token = CancellationToken::new();
        let cached = CachedAutoLimit {
            has_auto_limit: false,
            outer_limit_literal: None,
        };
        let stale = is_stale(&fp, &ctx, cached, &catalog, &token).unwrap();
        assert!(stale);
    }

    #[test]
    fn auto_limit_literal_mismatch_is_stale() {
        let mut ctx = EvalContext::default();
        ctx.auto_limit_quantity = 100;
        let fp = MemoFingerprint::snapshot(&ctx).with_catalog_digest(1);
        let catalog = FixedDigest(1);
        let token = CancellationToken::new();
        let cached = CachedAutoLimit {
            has_auto_limit: true,
            outer_limit_literal: Some(50),
        };
        let stale = is_stale(&fp, &ctx, cached, &catalog, &token).unwrap();
        assert!(stale);
    }

    #[test]
    fn cancelled_token_short_circuits_before_catalog_io() {
        let ctx = EvalContext::default();
        let fp = MemoFingerprint::snapshot(&ctx).with_catalog_digest(1);
        let catalog = FailingDigest;
        let token = CancellationToken::new();
        token.cancel();
        let err = is_stale(&fp, &ctx, no_auto_limit(), &catalog, &token).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn calling_is_stale_twice_without_mutation_is_idempotent() {
        let ctx = EvalContext::default();
        let fp = MemoFingerprint::snapshot(&ctx).with_catalog_digest(1);
        let catalog = FixedDigest(1);
        let token = CancellationToken::new();
        let first = is_stale(&fp, &ctx, no_auto_limit(), &catalog, &token).unwrap();
        let second = is_stale(&fp, &ctx, no_auto_limit(), &catalog, &token).unwrap();
        assert_eq!(first, second);
    }
}
