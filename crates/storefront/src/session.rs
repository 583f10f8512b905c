//! Session context and the login/logout flows.
//!
//! The authenticated identity and the authentication-permission marker live
//! in client storage next to the local cart. Business logic never reads them
//! ad hoc: the flows here load them once into a [`SessionContext`] and pass
//! that value to the reconciliation engine.
//!
//! # Flows
//!
//! - [`StorefrontSession::login`] - store the identity, then merge the remote
//!   cart into the local cart (also used after email verification)
//! - [`StorefrontSession::logout`] - sync the local cart back to the remote
//!   cart, wait for every call to settle, then clear identity and cart. The
//!   cart stays on the device when the sync never reached the remote cart.

use core::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use cartwheel_core::UserId;

use crate::cart::LocalCartStore;
use crate::error::{add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::gateway::CartGateway;
use crate::reconcile::{MergeReport, Notice, PlannedSync, Reconciler, SyncReport};
use crate::storage::{KeyValueStore, StorageError, keys};

/// Value stored under the permission key while a user is logged in.
const PERMISSION_GRANTED: &str = "granted";

// =============================================================================
// Session Types
// =============================================================================

/// The authenticated user: account id plus an opaque access token.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct UserIdentity {
    id: UserId,
    access_token: SecretString,
}

impl UserIdentity {
    /// Create an identity from an id and the token issued by the auth flow.
    #[must_use]
    pub const fn new(id: UserId, access_token: SecretString) -> Self {
        Self { id, access_token }
    }

    /// Account id.
    #[must_use]
    pub const fn id(&self) -> UserId {
        self.id
    }

    /// Access token for the cart API.
    #[must_use]
    pub const fn access_token(&self) -> &SecretString {
        &self.access_token
    }
}

impl fmt::Debug for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserIdentity")
            .field("id", &self.id)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// Persisted shape of [`UserIdentity`].
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredUser {
    id: UserId,
    access_token: String,
}

/// The authentication-permission marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPermission {
    /// The user has authenticated on this device.
    Granted,
}

/// What triggered a merge-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTrigger {
    Login,
    EmailVerification,
}

impl fmt::Display for SessionTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Login => "login",
            Self::EmailVerification => "email verification",
        })
    }
}

/// Everything the engine needs to know about the current session.
#[derive(Debug, Clone)]
pub struct SessionContext {
    user: UserIdentity,
    permission: AuthPermission,
}

impl SessionContext {
    /// Build a context for an authenticated user.
    #[must_use]
    pub const fn new(user: UserIdentity, permission: AuthPermission) -> Self {
        Self { user, permission }
    }

    /// The authenticated user.
    #[must_use]
    pub const fn user(&self) -> &UserIdentity {
        &self.user
    }

    /// The permission marker.
    #[must_use]
    pub const fn permission(&self) -> AuthPermission {
        self.permission
    }
}

/// Result of a logout.
#[derive(Debug, Default)]
pub struct LogoutReport {
    /// `None` when no user was logged in and no sync-back ran.
    pub sync: Option<SyncReport>,
    /// The local cart was left on the device because it exists nowhere else.
    pub cart_kept: bool,
}

impl LogoutReport {
    /// User-facing notices from the sync-back, if any.
    #[must_use]
    pub fn notices(&self) -> &[Notice] {
        self.sync
            .as_ref()
            .map(|sync| sync.notices.as_slice())
            .unwrap_or_default()
    }
}

// =============================================================================
// StorefrontSession
// =============================================================================

/// The local cart plus the session state and engine that drive it.
pub struct StorefrontSession<S, G> {
    storage: S,
    cart: LocalCartStore<S>,
    reconciler: Reconciler<G>,
}

impl<S, G> StorefrontSession<S, G>
where
    S: KeyValueStore + Clone,
    G: CartGateway,
{
    /// Open the session stored in `storage`.
    pub fn open(storage: S, reconciler: Reconciler<G>) -> Self {
        let cart = LocalCartStore::load(storage.clone());
        Self {
            storage,
            cart,
            reconciler,
        }
    }

    /// The local cart.
    #[must_use]
    pub const fn cart(&self) -> &LocalCartStore<S> {
        &self.cart
    }

    /// The local cart, for UI mutations.
    pub const fn cart_mut(&mut self) -> &mut LocalCartStore<S> {
        &mut self.cart
    }

    /// The reconciliation engine.
    #[must_use]
    pub const fn reconciler(&self) -> &Reconciler<G> {
        &self.reconciler
    }

    /// Load the current session context, if a user is logged in.
    ///
    /// A stored identity without the permission marker, or one that cannot
    /// be parsed, counts as logged out.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if storage cannot be read.
    pub fn current_session(&self) -> Result<Option<SessionContext>, StorageError> {
        if self.storage.get(keys::AUTH_PERMISSION)?.as_deref() != Some(PERMISSION_GRANTED) {
            return Ok(None);
        }

        let Some(raw) = self.storage.get(keys::CURRENT_USER)? else {
            return Ok(None);
        };

        match serde_json::from_str::<StoredUser>(&raw) {
            Ok(stored) => Ok(Some(SessionContext::new(
                UserIdentity::new(stored.id, SecretString::from(stored.access_token)),
                AuthPermission::Granted,
            ))),
            Err(e) => {
                warn!(error = %e, "Stored user is malformed, treating session as logged out");
                Ok(None)
            }
        }
    }

    /// Record a successful authentication and merge the remote cart in.
    ///
    /// Merge-in is best-effort: remote failures are reported in the returned
    /// [`MergeReport`] and never fail the login.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` only if the identity itself cannot be stored.
    #[instrument(skip(self, user), fields(user_id = %user.id()))]
    pub async fn login(
        &mut self,
        trigger: SessionTrigger,
        user: UserIdentity,
    ) -> Result<MergeReport, StorageError> {
        let stored = StoredUser {
            id: user.id(),
            access_token: user.access_token().expose_secret().to_owned(),
        };
        let raw = serde_json::to_string(&stored).map_err(|source| StorageError::Serialize {
            key: keys::CURRENT_USER.to_owned(),
            source,
        })?;

        self.storage.set(keys::CURRENT_USER, &raw)?;
        self.storage.set(keys::AUTH_PERMISSION, PERMISSION_GRANTED)?;

        set_sentry_user(&user.id());
        add_breadcrumb("auth", &format!("Session started by {trigger}"), None);
        info!(%trigger, "Session started, merging remote cart");

        let ctx = SessionContext::new(user, AuthPermission::Granted);
        Ok(self.reconciler.merge_in(&ctx, &mut self.cart).await)
    }

    /// Compute the calls a logout would issue, without issuing them.
    ///
    /// Yields `None` when no user is logged in, and the notice explaining the
    /// failure when no plan could be computed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if session state cannot be read.
    pub async fn plan(&self) -> Result<Option<Result<PlannedSync, Notice>>, StorageError> {
        let Some(ctx) = self.current_session()? else {
            return Ok(None);
        };
        Ok(Some(self.reconciler.plan(&ctx, self.cart.lines()).await))
    }

    /// Sync the local cart back to the remote cart, then clear the session.
    ///
    /// The sync-back always settles before anything is cleared. Identity and
    /// permission marker are always cleared. The local cart is cleared too,
    /// unless the sync-back never reached the remote cart (fetch failed or
    /// the cart was refused); then it stays on the device. Lines whose calls
    /// failed are listed in the report.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if session state cannot be read or cleared.
    #[instrument(skip(self))]
    pub async fn logout(&mut self) -> Result<LogoutReport, StorageError> {
        let ctx = self.current_session()?;

        let sync = match &ctx {
            Some(ctx) => {
                let snapshot = self.cart.lines().to_vec();
                Some(self.reconciler.sync_back(ctx, &snapshot).await)
            }
            None => {
                info!("No user logged in, clearing local state only");
                None
            }
        };

        self.storage.remove(keys::CURRENT_USER)?;
        self.storage.remove(keys::AUTH_PERMISSION)?;

        let cart_kept = sync.as_ref().is_some_and(|sync| !sync.reached_remote());
        if cart_kept {
            warn!(
                lines = self.cart.len(),
                "Cart sync did not reach the store, keeping the local cart"
            );
        } else {
            self.cart.clear()?;
        }

        clear_sentry_user();
        add_breadcrumb("auth", "Logged out", None);

        Ok(LogoutReport { sync, cart_kept })
    }
}
