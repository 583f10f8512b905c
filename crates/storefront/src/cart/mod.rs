//! Device-local cart store.
//!
//! The local cart is the authoritative cart for the current device regardless
//! of authentication state. Every mutation persists the whole collection to
//! client storage before returning.
//!
//! Mutations take `&mut self`, so two mutations can never interleave; callers
//! sharing a store across tasks must wrap it in a lock.

mod persisted;

use tracing::{debug, instrument, warn};

use cartwheel_core::{CartLine, LineIdentity, ProductId, ResolvedLine, VariantKey};

use crate::error::add_breadcrumb;
use crate::storage::{KeyValueStore, StorageError, keys};

pub use persisted::{decode, encode};

/// What merge-in does with the server linkage of remote lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Merged lines become local-origin lines without a server line id.
    #[default]
    DropServerIds,
    /// Merged lines keep the remote server line id; existing unlinked local
    /// lines adopt it.
    PreserveServerIds,
}

/// Counts from a single merge-in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Remote lines summed into an existing local line.
    pub merged: usize,
    /// Remote lines appended as new local lines.
    pub appended: usize,
}

/// The local cart, backed by a [`KeyValueStore`].
#[derive(Debug)]
pub struct LocalCartStore<S> {
    storage: S,
    lines: Vec<CartLine>,
}

impl<S: KeyValueStore> LocalCartStore<S> {
    /// Load the cart from storage.
    ///
    /// A missing, unreadable or malformed stored cart yields an empty cart;
    /// boot never fails because of bad local data.
    pub fn load(storage: S) -> Self {
        let lines = match storage.get(keys::CART) {
            Ok(Some(raw)) => decode(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "Stored cart is malformed, starting with an empty cart");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read stored cart, starting with an empty cart");
                Vec::new()
            }
        };

        debug!(lines = lines.len(), "Loaded local cart");
        Self { storage, lines }
    }

    /// All lines, in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Look up a line by identity.
    #[must_use]
    pub fn get(&self, identity: &LineIdentity) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.identity() == identity)
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Sum of all line quantities (the cart badge count).
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity())).sum()
    }

    /// Add `quantity` of a variant. Quantities accumulate on an existing line.
    ///
    /// Callers validate `quantity > 0`; a zero quantity is logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the cart cannot be persisted; the cart is
    /// left unchanged.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub fn add(
        &mut self,
        product_id: ProductId,
        variant: VariantKey,
        quantity: u32,
    ) -> Result<(), StorageError> {
        if quantity == 0 {
            warn!("Ignoring add with zero quantity");
            return Ok(());
        }

        let identity = LineIdentity::new(product_id, variant);
        let label = identity.to_string();
        let mut lines = self.lines.clone();
        match lines.iter_mut().find(|line| line.identity() == &identity) {
            Some(line) => line.add_quantity(quantity),
            None => lines.push(CartLine::new(identity, quantity)),
        }

        self.commit(lines)?;
        add_breadcrumb("cart", "Added to cart", Some(&[("line", label.as_str())]));
        Ok(())
    }

    /// Replace the quantity of an existing line.
    ///
    /// Returns `false` (and leaves the cart untouched) when `quantity` is zero
    /// or no line matches.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the cart cannot be persisted; the cart is
    /// left unchanged.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub fn set_quantity(
        &mut self,
        product_id: &ProductId,
        variant: &VariantKey,
        quantity: u32,
    ) -> Result<bool, StorageError> {
        if quantity == 0 {
            warn!("Ignoring quantity update to zero");
            return Ok(false);
        }

        let mut lines = self.lines.clone();
        let Some(line) = lines
            .iter_mut()
            .find(|line| is_variant(line, product_id, variant))
        else {
            warn!("Ignoring quantity update for a line not in the cart");
            return Ok(false);
        };

        line.set_quantity(quantity);
        self.commit(lines)?;
        Ok(true)
    }

    /// Remove a line. Returns whether a line was removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the cart cannot be persisted; the cart is
    /// left unchanged.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub fn remove(
        &mut self,
        product_id: &ProductId,
        variant: &VariantKey,
    ) -> Result<bool, StorageError> {
        let mut lines = self.lines.clone();
        lines.retain(|line| !is_variant(line, product_id, variant));

        if lines.len() == self.lines.len() {
            debug!("Nothing to remove");
            return Ok(false);
        }

        self.commit(lines)?;
        Ok(true)
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the cart cannot be persisted; the cart is
    /// left unchanged.
    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.commit(Vec::new())
    }

    /// Fold resolved remote lines into the cart.
    ///
    /// A remote line whose identity is already present adds its quantity to
    /// the local line; any other remote line is appended after the existing
    /// lines, in remote order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the cart cannot be persisted; the cart is
    /// left unchanged.
    #[instrument(skip(self, remote), fields(remote_lines = remote.len()))]
    pub fn merge_in(
        &mut self,
        remote: Vec<ResolvedLine>,
        policy: MergePolicy,
    ) -> Result<MergeSummary, StorageError> {
        let keep_ids = policy == MergePolicy::PreserveServerIds;
        let mut summary = MergeSummary::default();
        let mut lines = self.lines.clone();

        for line in remote {
            if line.quantity == 0 {
                debug!(identity = %line.identity, "Skipping empty remote line");
                continue;
            }

            match lines
                .iter_mut()
                .find(|local| local.identity() == &line.identity)
            {
                Some(local) => {
                    local.add_quantity(line.quantity);
                    if keep_ids && local.server_line_id().is_none() {
                        local.set_server_line_id(Some(line.server_line_id));
                    }
                    summary.merged += 1;
                }
                None => {
                    lines.push(line.into_cart_line(keep_ids));
                    summary.appended += 1;
                }
            }
        }

        self.commit(lines)?;
        debug!(
            merged = summary.merged,
            appended = summary.appended,
            "Merged remote cart into local cart"
        );
        Ok(summary)
    }

    /// Persist `lines`, then make them the current cart.
    fn commit(&mut self, lines: Vec<CartLine>) -> Result<(), StorageError> {
        let raw = encode(&lines).map_err(|source| StorageError::Serialize {
            key: keys::CART.to_owned(),
            source,
        })?;
        self.storage.set(keys::CART, &raw)?;
        self.lines = lines;
        Ok(())
    }
}

fn is_variant(line: &CartLine, product_id: &ProductId, variant: &VariantKey) -> bool {
    line.identity().product_id() == product_id && line.identity().variant() == variant
}
