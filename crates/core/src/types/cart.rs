//! Cart line model and line identity.
//!
//! A cart line is identified by the triple `(product_id, color, size)`. No two
//! lines in one cart share an identity; quantities of lines with the same
//! identity are combined instead.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::id::ServerLineId;
use super::product::ProductId;

/// The variant half of a line identity: color and size.
///
/// `color` is optional (some products come in a single color). Empty or
/// whitespace-only colors are normalized to `None` so that value equality
/// never depends on how the color was spelled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariantKey {
    color: Option<String>,
    size: String,
}

impl VariantKey {
    /// Create a variant key, trimming both fields.
    #[must_use]
    pub fn new(color: Option<&str>, size: &str) -> Self {
        let color = color
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(ToOwned::to_owned);

        Self {
            color,
            size: size.trim().to_owned(),
        }
    }

    /// The variant color, if the product has one.
    #[must_use]
    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    /// The variant size.
    #[must_use]
    pub fn size(&self) -> &str {
        &self.size
    }
}

/// The identity of a cart line: `(product_id, color, size)`.
///
/// Reconciliation compares identities by value, never by reference or by the
/// server's opaque variant id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineIdentity {
    product_id: ProductId,
    variant: VariantKey,
}

impl LineIdentity {
    /// Create a line identity.
    #[must_use]
    pub const fn new(product_id: ProductId, variant: VariantKey) -> Self {
        Self {
            product_id,
            variant,
        }
    }

    /// The product this line refers to.
    #[must_use]
    pub const fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    /// The color/size key of this line.
    #[must_use]
    pub const fn variant(&self) -> &VariantKey {
        &self.variant
    }

    /// Shortcut for `variant().color()`.
    #[must_use]
    pub fn color(&self) -> Option<&str> {
        self.variant.color()
    }

    /// Shortcut for `variant().size()`.
    #[must_use]
    pub fn size(&self) -> &str {
        self.variant.size()
    }
}

impl fmt::Display for LineIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.color() {
            Some(color) => write!(f, "{}/{}/{}", self.product_id, color, self.size()),
            None => write!(f, "{}/-/{}", self.product_id, self.size()),
        }
    }
}

/// A single cart line: identity plus quantity.
///
/// `server_line_id` is only present on lines known to be persisted in the
/// remote cart. It is assigned by the server and carried by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    identity: LineIdentity,
    quantity: u32,
    server_line_id: Option<ServerLineId>,
}

impl CartLine {
    /// Create a local-origin line (no server linkage).
    #[must_use]
    pub const fn new(identity: LineIdentity, quantity: u32) -> Self {
        Self {
            identity,
            quantity,
            server_line_id: None,
        }
    }

    /// Attach (or clear) the server line id.
    #[must_use]
    pub const fn with_server_line_id(mut self, id: Option<ServerLineId>) -> Self {
        self.server_line_id = id;
        self
    }

    /// The identity of this line.
    #[must_use]
    pub const fn identity(&self) -> &LineIdentity {
        &self.identity
    }

    /// Current quantity. Zero only appears transiently and is treated as
    /// absence by reconciliation.
    #[must_use]
    pub const fn quantity(&self) -> u32 {
        self.quantity
    }

    /// The server-assigned id, if this line is linked to a remote line.
    #[must_use]
    pub const fn server_line_id(&self) -> Option<ServerLineId> {
        self.server_line_id
    }

    /// Replace the quantity.
    pub const fn set_quantity(&mut self, quantity: u32) {
        self.quantity = quantity;
    }

    /// Add to the quantity, saturating at `u32::MAX`.
    pub const fn add_quantity(&mut self, quantity: u32) {
        self.quantity = self.quantity.saturating_add(quantity);
    }

    /// Set the server linkage.
    pub const fn set_server_line_id(&mut self, id: Option<ServerLineId>) {
        self.server_line_id = id;
    }
}
