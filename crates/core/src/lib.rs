//! Cartwheel Core - Shared cart types.
//!
//! This crate provides the types shared by every Cartwheel component:
//! - `storefront` - Local cart store, remote cart gateway and reconciliation engine
//! - `cli` - Command-line storefront client
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no storage access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, product identifiers, cart lines and remote line shapes

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
