//! In-memory cart API for unit tests.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use secrecy::SecretString;

use cartwheel_core::{
    LineIdentity, ProductId, RemoteLine, ResolvedLine, ServerLineId, UnresolvedLine, UserId,
    VariantId, VariantKey, VariantRef,
};

use crate::gateway::{CartGateway, GatewayError};
use crate::session::{AuthPermission, SessionContext, UserIdentity};

/// `(product, color "1", size)`.
pub fn identity(product: &str, size: &str) -> LineIdentity {
    LineIdentity::new(
        ProductId::parse(product).unwrap(),
        VariantKey::new(Some("1"), size),
    )
}

pub fn user() -> UserIdentity {
    UserIdentity::new(UserId::new(1), SecretString::from("test-token"))
}

pub fn ctx() -> SessionContext {
    SessionContext::new(user(), AuthPermission::Granted)
}

#[derive(Clone, Copy)]
enum StoredVariant {
    Embedded,
    ById(VariantId),
}

struct StoredLine {
    id: ServerLineId,
    identity: LineIdentity,
    variant: StoredVariant,
    quantity: u32,
}

#[derive(Default)]
struct State {
    lines: Vec<StoredLine>,
    variants: HashMap<VariantId, LineIdentity>,
    next_id: i32,
    fail_fetch: bool,
    failing: HashSet<LineIdentity>,
    fetch_calls: usize,
    resolve_calls: usize,
    mutation_calls: usize,
}

impl State {
    fn as_remote(line: &StoredLine) -> RemoteLine {
        match line.variant {
            StoredVariant::Embedded => RemoteLine::Resolved(ResolvedLine {
                server_line_id: line.id,
                identity: line.identity.clone(),
                quantity: line.quantity,
            }),
            StoredVariant::ById(variant) => RemoteLine::Unresolved(UnresolvedLine {
                server_line_id: line.id,
                variant,
                quantity: line.quantity,
            }),
        }
    }

    fn injected_failure(&self, identity: &LineIdentity) -> Result<(), GatewayError> {
        if self.failing.contains(identity) {
            Err(GatewayError::Status {
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                body: format!("injected failure for {identity}"),
            })
        } else {
            Ok(())
        }
    }

    fn position(&self, id: ServerLineId) -> Result<usize, GatewayError> {
        self.lines
            .iter()
            .position(|line| line.id == id)
            .ok_or_else(|| GatewayError::NotFound(format!("cart line {id}")))
    }
}

/// A [`CartGateway`] over an in-memory remote cart. Clones share state.
#[derive(Clone, Default)]
pub struct FakeGateway {
    state: Arc<Mutex<State>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        let gateway = Self::default();
        gateway.state.lock().unwrap().next_id = 100;
        gateway
    }

    /// Add a remote line that embeds its variant attributes.
    pub fn seed(&self, id: ServerLineId, identity: LineIdentity, quantity: u32) {
        self.state.lock().unwrap().lines.push(StoredLine {
            id,
            identity,
            variant: StoredVariant::Embedded,
            quantity,
        });
    }

    /// Add a remote line that only references a registered variant.
    pub fn seed_by_variant(&self, id: ServerLineId, variant: VariantId, quantity: u32) {
        let mut state = self.state.lock().unwrap();
        let identity = state.variants.get(&variant).cloned().unwrap();
        state.lines.push(StoredLine {
            id,
            identity,
            variant: StoredVariant::ById(variant),
            quantity,
        });
    }

    pub fn register_variant(&self, variant: VariantId, identity: LineIdentity) {
        self.state.lock().unwrap().variants.insert(variant, identity);
    }

    /// Make lookups of `variant` 404 while lines referencing it remain.
    pub fn forget_variant(&self, variant: VariantId) {
        self.state.lock().unwrap().variants.remove(&variant);
    }

    pub fn fail_fetch(&self, fail: bool) {
        self.state.lock().unwrap().fail_fetch = fail;
    }

    /// Make every create/update/delete for `identity` fail.
    pub fn fail_calls_for(&self, identity: LineIdentity) {
        self.state.lock().unwrap().failing.insert(identity);
    }

    pub fn remote_quantity(&self, identity: &LineIdentity) -> Option<u32> {
        self.state
            .lock()
            .unwrap()
            .lines
            .iter()
            .find(|line| &line.identity == identity)
            .map(|line| line.quantity)
    }

    pub fn remote_len(&self) -> usize {
        self.state.lock().unwrap().lines.len()
    }

    pub fn fetch_calls(&self) -> usize {
        self.state.lock().unwrap().fetch_calls
    }

    pub fn resolve_calls(&self) -> usize {
        self.state.lock().unwrap().resolve_calls
    }

    pub fn mutation_calls(&self) -> usize {
        self.state.lock().unwrap().mutation_calls
    }
}

impl CartGateway for FakeGateway {
    async fn fetch_all(&self, _ctx: &SessionContext) -> Result<Vec<RemoteLine>, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.fetch_calls += 1;
        if state.fail_fetch {
            return Err(GatewayError::Unauthorized);
        }
        Ok(state.lines.iter().map(State::as_remote).collect())
    }

    async fn create(
        &self,
        _ctx: &SessionContext,
        variant: &VariantRef,
        quantity: u32,
    ) -> Result<RemoteLine, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.mutation_calls += 1;

        let (identity, stored) = match variant {
            VariantRef::Attributes(identity) => (identity.clone(), StoredVariant::Embedded),
            VariantRef::Id(id) => {
                let identity = state
                    .variants
                    .get(id)
                    .cloned()
                    .ok_or_else(|| GatewayError::NotFound(format!("variant {id}")))?;
                (identity, StoredVariant::ById(*id))
            }
        };
        state.injected_failure(&identity)?;

        state.next_id += 1;
        let line = StoredLine {
            id: ServerLineId::new(state.next_id),
            identity,
            variant: stored,
            quantity,
        };
        let remote = State::as_remote(&line);
        state.lines.push(line);
        Ok(remote)
    }

    async fn update_quantity(
        &self,
        _ctx: &SessionContext,
        id: ServerLineId,
        quantity: u32,
    ) -> Result<RemoteLine, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.mutation_calls += 1;

        let index = state.position(id)?;
        state.injected_failure(&state.lines[index].identity)?;
        state.lines[index].quantity = quantity;
        Ok(State::as_remote(&state.lines[index]))
    }

    async fn delete(&self, _ctx: &SessionContext, id: ServerLineId) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.mutation_calls += 1;

        let index = state.position(id)?;
        state.injected_failure(&state.lines[index].identity)?;
        state.lines.remove(index);
        Ok(())
    }

    async fn resolve_variant(
        &self,
        _ctx: &SessionContext,
        variant: VariantId,
    ) -> Result<LineIdentity, GatewayError> {
        // Let concurrent lookups interleave like real requests
        tokio::task::yield_now().await;
        let mut state = self.state.lock().unwrap();
        state.resolve_calls += 1;
        state
            .variants
            .get(&variant)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("variant {variant}")))
    }
}
