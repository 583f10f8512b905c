//! Core types for Cartwheel.
//!
//! This module provides type-safe wrappers for cart domain concepts.

pub mod cart;
pub mod id;
pub mod product;
pub mod remote;

pub use cart::{CartLine, LineIdentity, VariantKey};
pub use id::*;
pub use product::{ProductId, ProductIdError};
pub use remote::{RemoteLine, ResolvedLine, UnresolvedLine, VariantRef};
