//! Cart reconciliation engine.
//!
//! Two directional passes keep the device-local cart and the user's remote
//! cart consistent:
//!
//! - **merge-in** (login, email verification): fetch the remote cart and fold
//!   it into the local cart, summing quantities per identity. Best-effort:
//!   failures become notices and never block the login flow.
//! - **sync-back** (logout): diff the local cart against a fresh fetch of the
//!   remote cart and issue the minimal create/update/delete calls, all in
//!   flight at once. Each call is independent; there is no rollback, and the
//!   returned [`SyncReport`] records the outcome of every call.
//!
//! Both passes run on the caller's task. Gateway errors never escape them.

pub mod plan;
mod report;
mod resolve;

use futures_util::future::join_all;
use tracing::{info, instrument, warn};

use cartwheel_core::{CartLine, VariantRef};

use crate::cart::{LocalCartStore, MergePolicy};
use crate::gateway::CartGateway;
use crate::session::SessionContext;
use crate::storage::KeyValueStore;

pub use plan::{PlanError, PlannedOp, SyncPlan};
pub use report::{
    LineOutcome, MergeReport, Notice, NoticeKind, Operation, Outcome, SkippedLine, SyncReport,
};
pub use resolve::{Resolution, VariantResolver};

/// A computed sync-back plan together with the lines left out of it.
#[derive(Debug, Clone, Default)]
pub struct PlannedSync {
    pub plan: SyncPlan,
    pub skipped: Vec<SkippedLine>,
}

/// Drives merge-in and sync-back against a [`CartGateway`].
#[derive(Clone)]
pub struct Reconciler<G> {
    gateway: G,
    resolver: VariantResolver,
    policy: MergePolicy,
}

impl<G: CartGateway> Reconciler<G> {
    /// Create a reconciler with the default merge policy.
    #[must_use]
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            resolver: VariantResolver::new(),
            policy: MergePolicy::default(),
        }
    }

    /// Set the merge policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: MergePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Use a specific resolver (e.g. one shared between sessions).
    #[must_use]
    pub fn with_resolver(mut self, resolver: VariantResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// The underlying gateway.
    #[must_use]
    pub const fn gateway(&self) -> &G {
        &self.gateway
    }

    /// The configured merge policy.
    #[must_use]
    pub const fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// Fold the user's remote cart into the local cart.
    #[instrument(skip_all, fields(user_id = %ctx.user().id()))]
    pub async fn merge_in<S: KeyValueStore>(
        &self,
        ctx: &SessionContext,
        store: &mut LocalCartStore<S>,
    ) -> MergeReport {
        let mut report = MergeReport::default();

        let remote = match self.gateway.fetch_all(ctx).await {
            Ok(lines) => lines,
            Err(e) => {
                warn!(error = %e, "Failed to fetch remote cart for merge-in");
                report
                    .notices
                    .push(Notice::new(NoticeKind::FetchFailed, "Could not load your saved cart"));
                return report;
            }
        };

        let resolution = self.resolver.resolve_lines(&self.gateway, ctx, remote).await;
        if !resolution.skipped.is_empty() {
            report.notices.push(Notice::new(
                NoticeKind::ResolutionFailed,
                format!(
                    "{} saved cart item(s) could not be loaded",
                    resolution.skipped.len()
                ),
            ));
        }
        report.skipped = resolution.skipped;

        match store.merge_in(resolution.lines, self.policy) {
            Ok(summary) => {
                report.merged = summary.merged;
                report.appended = summary.appended;
            }
            Err(e) => {
                warn!(error = %e, "Failed to persist merged cart");
                report.notices.push(Notice::new(
                    NoticeKind::StorageFailed,
                    "Your cart could not be saved on this device",
                ));
            }
        }

        info!(
            merged = report.merged,
            appended = report.appended,
            skipped = report.skipped.len(),
            "Merge-in complete"
        );
        report
    }

    /// Fetch and resolve the remote cart, then diff it against `current`.
    ///
    /// # Errors
    ///
    /// Returns the notice describing why no plan could be computed.
    #[instrument(skip_all, fields(user_id = %ctx.user().id()))]
    pub async fn plan(
        &self,
        ctx: &SessionContext,
        current: &[CartLine],
    ) -> Result<PlannedSync, Notice> {
        let remote = self.gateway.fetch_all(ctx).await.map_err(|e| {
            warn!(error = %e, "Failed to fetch remote cart for sync-back");
            Notice::new(NoticeKind::FetchFailed, "Cart sync failed: could not reach the store")
        })?;

        let Resolution { lines, skipped } =
            self.resolver.resolve_lines(&self.gateway, ctx, remote).await;

        let plan = SyncPlan::compute(current, &lines).map_err(|e| {
            warn!(error = %e, "Refusing to sync a cart with duplicate lines");
            Notice::new(NoticeKind::InvalidCart, format!("Cart sync failed: {e}"))
        })?;

        Ok(PlannedSync { plan, skipped })
    }

    /// Make the user's remote cart match `current`.
    ///
    /// Returns once every issued call has settled.
    #[instrument(skip_all, fields(user_id = %ctx.user().id(), lines = current.len()))]
    pub async fn sync_back(&self, ctx: &SessionContext, current: &[CartLine]) -> SyncReport {
        let mut report = SyncReport::default();

        let PlannedSync { plan, skipped } = match self.plan(ctx, current).await {
            Ok(planned) => planned,
            Err(notice) => {
                report.notices.push(notice);
                return report;
            }
        };

        if !skipped.is_empty() {
            report.notices.push(Notice::new(
                NoticeKind::ResolutionFailed,
                format!("{} saved cart item(s) could not be checked", skipped.len()),
            ));
        }
        report.skipped = skipped;

        report.outcomes = join_all(
            plan.into_ops()
                .into_iter()
                .map(|op| self.apply(ctx, op)),
        )
        .await;

        let failed = report.failed().count();
        if let Some(notice) = report.notice() {
            report.notices.push(notice);
        }

        info!(
            calls = report.calls_issued(),
            failed,
            skipped = report.skipped.len(),
            "Sync-back complete"
        );
        report
    }

    async fn apply(&self, ctx: &SessionContext, op: PlannedOp) -> LineOutcome {
        let operation = op.operation();
        let (identity, result) = match op {
            PlannedOp::Create { identity, quantity } => {
                let variant = VariantRef::Attributes(identity.clone());
                let result = self.gateway.create(ctx, &variant, quantity).await.map(drop);
                (identity, result)
            }
            PlannedOp::Update {
                identity,
                server_line_id,
                to,
                ..
            } => {
                let result = self
                    .gateway
                    .update_quantity(ctx, server_line_id, to)
                    .await
                    .map(drop);
                (identity, result)
            }
            PlannedOp::Delete {
                identity,
                server_line_id,
            } => (identity, self.gateway.delete(ctx, server_line_id).await),
        };

        let outcome = match result {
            Ok(()) => Outcome::Applied,
            Err(e) => {
                warn!(%identity, %operation, error = %e, "Cart sync call failed");
                Outcome::Failed(e.to_string())
            }
        };

        LineOutcome {
            identity,
            operation,
            outcome,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use cartwheel_core::{ServerLineId, VariantId};

    use super::*;
    use crate::storage::MemoryStore;
    use crate::testing::{FakeGateway, ctx, identity};

    fn local(product: &str, size: &str, quantity: u32) -> CartLine {
        CartLine::new(identity(product, size), quantity)
    }

    fn empty_store() -> LocalCartStore<MemoryStore> {
        LocalCartStore::load(MemoryStore::new())
    }

    /// Remote cart `{A/M: 2 (#10), B/M: 1 (#11)}`.
    fn seeded() -> FakeGateway {
        let gateway = FakeGateway::new();
        gateway.seed(ServerLineId::new(10), identity("A", "M"), 2);
        gateway.seed(ServerLineId::new(11), identity("B", "M"), 1);
        gateway
    }

    #[tokio::test]
    async fn test_merge_in_sums_and_appends() {
        let gateway = FakeGateway::new();
        gateway.seed(ServerLineId::new(10), identity("A", "M"), 3);
        gateway.register_variant(VariantId::new(7), identity("B", "L"));
        gateway.seed_by_variant(ServerLineId::new(11), VariantId::new(7), 1);

        let mut store = empty_store();
        let a = identity("A", "M");
        store
            .add(a.product_id().clone(), a.variant().clone(), 2)
            .unwrap();

        let report = Reconciler::new(gateway).merge_in(&ctx(), &mut store).await;

        assert!(report.is_clean());
        assert_eq!((report.merged, report.appended), (1, 1));
        assert_eq!(store.lines(), &[local("A", "M", 5), local("B", "L", 1)]);
    }

    #[tokio::test]
    async fn test_merge_in_fetch_failure_is_a_notice() {
        let gateway = seeded();
        gateway.fail_fetch(true);

        let mut store = empty_store();
        let report = Reconciler::new(gateway).merge_in(&ctx(), &mut store).await;

        assert_eq!(report.notices.len(), 1);
        assert_eq!(report.notices[0].kind, NoticeKind::FetchFailed);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_merge_in_skips_unresolvable_lines() {
        let gateway = FakeGateway::new();
        gateway.register_variant(VariantId::new(7), identity("B", "L"));
        gateway.seed_by_variant(ServerLineId::new(11), VariantId::new(7), 1);
        gateway.seed(ServerLineId::new(12), identity("C", "S"), 4);
        gateway.forget_variant(VariantId::new(7));

        let mut store = empty_store();
        let report = Reconciler::new(gateway).merge_in(&ctx(), &mut store).await;

        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].server_line_id, ServerLineId::new(11));
        assert_eq!(report.notices[0].kind, NoticeKind::ResolutionFailed);
        assert_eq!(store.lines(), &[local("C", "S", 4)]);
    }

    #[tokio::test]
    async fn test_sync_back_creates_and_deletes() {
        let gateway = seeded();
        let reconciler = Reconciler::new(gateway.clone());

        let report = reconciler
            .sync_back(&ctx(), &[local("A", "M", 2), local("C", "M", 5)])
            .await;

        assert!(report.is_clean());
        assert_eq!(report.calls_issued(), 2);
        assert_eq!(report.of(Operation::Create).count(), 1);
        assert_eq!(report.of(Operation::Delete).count(), 1);
        assert!(report.outcome_for(&identity("A", "M")).is_none());

        assert_eq!(gateway.remote_quantity(&identity("A", "M")), Some(2));
        assert_eq!(gateway.remote_quantity(&identity("B", "M")), None);
        assert_eq!(gateway.remote_quantity(&identity("C", "M")), Some(5));
    }

    #[tokio::test]
    async fn test_sync_back_updates_changed_quantity() {
        let gateway = seeded();
        let report = Reconciler::new(gateway.clone())
            .sync_back(&ctx(), &[local("A", "M", 4), local("B", "M", 1)])
            .await;

        assert_eq!(report.calls_issued(), 1);
        assert_eq!(
            report.outcome_for(&identity("A", "M")).map(|o| o.operation),
            Some(Operation::Update)
        );
        assert_eq!(gateway.remote_quantity(&identity("A", "M")), Some(4));
    }

    #[tokio::test]
    async fn test_second_sync_back_issues_no_calls() {
        let gateway = seeded();
        let reconciler = Reconciler::new(gateway.clone());
        let current = [local("A", "M", 3), local("C", "M", 1)];

        reconciler.sync_back(&ctx(), &current).await;
        let calls = gateway.mutation_calls();

        let report = reconciler.sync_back(&ctx(), &current).await;
        assert_eq!(report.calls_issued(), 0);
        assert_eq!(gateway.mutation_calls(), calls);
    }

    #[tokio::test]
    async fn test_partial_failure_does_not_affect_other_lines() {
        let gateway = seeded();
        gateway.fail_calls_for(identity("C", "M"));

        let report = Reconciler::new(gateway.clone())
            .sync_back(&ctx(), &[local("A", "M", 3), local("C", "M", 1)])
            .await;

        assert_eq!(report.calls_issued(), 3);
        assert_eq!(report.failed().count(), 1);
        assert!(report.outcome_for(&identity("C", "M")).unwrap().is_failed());
        assert_eq!(
            report.outcome_for(&identity("A", "M")).unwrap().outcome,
            Outcome::Applied
        );

        let notice = report
            .notices
            .iter()
            .find(|n| n.kind == NoticeKind::SyncFailed)
            .unwrap();
        assert_eq!(notice.message, "Cart sync failed for 1 item(s)");

        // No rollback
        assert_eq!(gateway.remote_quantity(&identity("A", "M")), Some(3));
        assert_eq!(gateway.remote_quantity(&identity("B", "M")), None);
    }

    #[tokio::test]
    async fn test_sync_back_fetch_failure_issues_no_calls() {
        let gateway = seeded();
        gateway.fail_fetch(true);

        let report = Reconciler::new(gateway.clone())
            .sync_back(&ctx(), &[local("C", "M", 1)])
            .await;

        assert_eq!(report.calls_issued(), 0);
        assert_eq!(report.notices[0].kind, NoticeKind::FetchFailed);
        assert_eq!(gateway.mutation_calls(), 0);
    }

    #[tokio::test]
    async fn test_sync_back_refuses_duplicate_local_lines() {
        let gateway = seeded();

        let report = Reconciler::new(gateway.clone())
            .sync_back(&ctx(), &[local("A", "M", 1), local("A", "M", 2)])
            .await;

        assert_eq!(report.notices[0].kind, NoticeKind::InvalidCart);
        assert_eq!(gateway.mutation_calls(), 0);
    }

    #[tokio::test]
    async fn test_plan_is_a_dry_run() {
        let gateway = seeded();
        let planned = Reconciler::new(gateway.clone())
            .plan(&ctx(), &[local("A", "M", 2), local("C", "M", 5)])
            .await
            .unwrap();

        assert_eq!(planned.plan.len(), 2);
        assert!(planned.skipped.is_empty());
        assert_eq!(gateway.mutation_calls(), 0);
    }

    #[tokio::test]
    async fn test_login_then_logout_round_trip_under_both_policies() {
        for policy in [MergePolicy::DropServerIds, MergePolicy::PreserveServerIds] {
            let gateway = seeded();
            let reconciler = Reconciler::new(gateway.clone()).with_policy(policy);

            let mut store = empty_store();
            let a = identity("A", "M");
            store
                .add(a.product_id().clone(), a.variant().clone(), 1)
                .unwrap();

            reconciler.merge_in(&ctx(), &mut store).await;
            assert_eq!(store.get(&a).unwrap().quantity(), 3);
            assert_eq!(
                store.get(&a).unwrap().server_line_id().is_some(),
                policy == MergePolicy::PreserveServerIds
            );

            let report = reconciler.sync_back(&ctx(), store.lines()).await;

            // Only A changed; no line is created twice
            assert!(report.is_clean(), "{policy:?}");
            assert_eq!(report.calls_issued(), 1, "{policy:?}");
            assert_eq!(gateway.remote_len(), 2, "{policy:?}");
            assert_eq!(gateway.remote_quantity(&a), Some(3), "{policy:?}");
        }
    }

    #[tokio::test]
    async fn test_duplicated_remote_cart_is_repaired() {
        let gateway = FakeGateway::new();
        gateway.register_variant(VariantId::new(7), identity("A", "M"));
        gateway.seed_by_variant(ServerLineId::new(10), VariantId::new(7), 2);
        let reconciler = Reconciler::new(gateway.clone());

        // The lookup for #10 fails, so the pass cannot see it and creates a
        // second remote line for A/M
        gateway.forget_variant(VariantId::new(7));
        let report = reconciler.sync_back(&ctx(), &[local("A", "M", 2)]).await;
        assert_eq!(report.of(Operation::Create).count(), 1);
        assert_eq!(gateway.remote_len(), 2);

        // Once the lookup recovers the extra line is deleted
        gateway.register_variant(VariantId::new(7), identity("A", "M"));
        let report = reconciler.sync_back(&ctx(), &[local("A", "M", 9)]).await;

        assert!(report.is_clean());
        assert_eq!(report.calls_issued(), 2);
        assert_eq!(report.of(Operation::Update).count(), 1);
        assert_eq!(report.of(Operation::Delete).count(), 1);
        assert_eq!(gateway.remote_len(), 1);
        assert_eq!(gateway.remote_quantity(&identity("A", "M")), Some(9));

        let report = reconciler.sync_back(&ctx(), &[local("A", "M", 9)]).await;
        assert_eq!(report.calls_issued(), 0);
    }
}
