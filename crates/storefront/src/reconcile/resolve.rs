//! Remote line resolution.
//!
//! Every remote line is normalized to a [`ResolvedLine`] before merge or diff
//! logic runs. Lines that embed their variant attributes resolve locally;
//! lines that only carry a variant id are looked up through the gateway,
//! all lookups in flight at once. Lookups are cached in-process via `moka`
//! (5 minute TTL) since a variant's attributes never change, and a variant
//! is looked up at most once per batch. Failed lookups are not cached.

use std::time::Duration;

use futures_util::future::join_all;
use moka::future::Cache;
use tracing::{debug, warn};

use cartwheel_core::{LineIdentity, RemoteLine, ResolvedLine, UnresolvedLine, VariantId};

use super::report::SkippedLine;
use crate::gateway::{CartGateway, GatewayError};
use crate::session::SessionContext;

const CACHE_CAPACITY: u64 = 1000;
const CACHE_TTL: Duration = Duration::from_secs(300);

/// Resolved lines plus the ones that could not be resolved.
#[derive(Debug, Default)]
pub struct Resolution {
    /// Resolved lines, in remote order.
    pub lines: Vec<ResolvedLine>,
    /// Lines whose variant lookup failed; they take no part in the pass.
    pub skipped: Vec<SkippedLine>,
}

/// Resolves variant ids to line identities, with caching.
#[derive(Clone)]
pub struct VariantResolver {
    cache: Cache<VariantId, LineIdentity>,
}

impl Default for VariantResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl VariantResolver {
    /// Create a resolver with the default cache settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(CACHE_TTL)
    }

    /// Create a resolver whose cache entries live for `ttl`.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    /// Normalize remote lines to resolved lines.
    ///
    /// A failed lookup drops only that line (recorded in `skipped`); it never
    /// fails the batch.
    pub async fn resolve_lines<G: CartGateway>(
        &self,
        gateway: &G,
        ctx: &SessionContext,
        lines: Vec<RemoteLine>,
    ) -> Resolution {
        let results = join_all(lines.into_iter().map(|line| async move {
            match line {
                RemoteLine::Resolved(line) => Ok(line),
                RemoteLine::Unresolved(line) => self.resolve_one(gateway, ctx, line).await,
            }
        }))
        .await;

        let mut resolution = Resolution::default();
        for result in results {
            match result {
                Ok(line) => resolution.lines.push(line),
                Err(skipped) => resolution.skipped.push(skipped),
            }
        }
        resolution
    }

    async fn resolve_one<G: CartGateway>(
        &self,
        gateway: &G,
        ctx: &SessionContext,
        line: UnresolvedLine,
    ) -> Result<ResolvedLine, SkippedLine> {
        if let Some(identity) = self.cache.get(&line.variant).await {
            debug!(variant = %line.variant, "Cache hit for variant");
            return Ok(line.resolve(identity));
        }

        // Concurrent lookups of one variant share a single gateway call
        match self
            .cache
            .try_get_with(line.variant, gateway.resolve_variant(ctx, line.variant))
            .await
        {
            Ok(identity) => Ok(line.resolve(identity)),
            Err(e) => {
                warn!(
                    variant = %line.variant,
                    server_line_id = %line.server_line_id,
                    error = %e,
                    "Failed to resolve remote cart line"
                );
                Err(skipped(line, &e))
            }
        }
    }

    /// Drop every cached variant.
    pub async fn invalidate_all(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }
}

fn skipped(line: UnresolvedLine, error: &GatewayError) -> SkippedLine {
    SkippedLine {
        server_line_id: line.server_line_id,
        variant: line.variant,
        reason: error.to_string(),
    }
}
