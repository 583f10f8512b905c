//! Remote cart line shapes.
//!
//! The remote cart API sometimes embeds the variant attributes of a line and
//! sometimes returns only the variant's id. Both shapes are modeled by
//! [`RemoteLine`]; a single resolution step turns every line into a
//! [`ResolvedLine`] before any merge or diff logic looks at it.

use super::cart::{CartLine, LineIdentity};
use super::id::{ServerLineId, VariantId};

/// A reference to a product variant as accepted by the remote API.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VariantRef {
    /// A persisted variant, by id.
    Id(VariantId),
    /// A variant described by its attributes; the server looks it up.
    Attributes(LineIdentity),
}

/// A remote line whose identity is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLine {
    /// Server-assigned line id.
    pub server_line_id: ServerLineId,
    /// `(product_id, color, size)` of the line.
    pub identity: LineIdentity,
    /// Quantity stored remotely.
    pub quantity: u32,
}

impl ResolvedLine {
    /// Convert to a cart line, optionally keeping the server linkage.
    #[must_use]
    pub fn into_cart_line(self, keep_server_id: bool) -> CartLine {
        let id = keep_server_id.then_some(self.server_line_id);
        CartLine::new(self.identity, self.quantity).with_server_line_id(id)
    }
}

/// A remote line that only carries a variant id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnresolvedLine {
    /// Server-assigned line id.
    pub server_line_id: ServerLineId,
    /// Variant to resolve into `(product_id, color, size)`.
    pub variant: VariantId,
    /// Quantity stored remotely.
    pub quantity: u32,
}

impl UnresolvedLine {
    /// Attach the resolved identity.
    #[must_use]
    pub const fn resolve(self, identity: LineIdentity) -> ResolvedLine {
        ResolvedLine {
            server_line_id: self.server_line_id,
            identity,
            quantity: self.quantity,
        }
    }
}

/// A line as returned by the remote cart API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteLine {
    /// Variant attributes were embedded in the response.
    Resolved(ResolvedLine),
    /// Only the variant id was returned.
    Unresolved(UnresolvedLine),
}

impl RemoteLine {
    /// Server-assigned line id, available in both shapes.
    #[must_use]
    pub const fn server_line_id(&self) -> ServerLineId {
        match self {
            Self::Resolved(line) => line.server_line_id,
            Self::Unresolved(line) => line.server_line_id,
        }
    }

    /// Quantity, available in both shapes.
    #[must_use]
    pub const fn quantity(&self) -> u32 {
        match self {
            Self::Resolved(line) => line.quantity,
            Self::Unresolved(line) => line.quantity,
        }
    }
}

impl From<ResolvedLine> for RemoteLine {
    fn from(line: ResolvedLine) -> Self {
        Self::Resolved(line)
    }
}

impl From<UnresolvedLine> for RemoteLine {
    fn from(line: UnresolvedLine) -> Self {
        Self::Unresolved(line)
    }
}
