//! Cartwheel Storefront library.
//!
//! The storefront client keeps a device-local cart usable before the user
//! authenticates and reconciles it with the user's server-side cart:
//!
//! - [`cart`] - Local cart store, persisted on every mutation
//! - [`gateway`] - Remote cart API contract and its HTTP adapter
//! - [`reconcile`] - Merge-in (login) and sync-back (logout)
//! - [`session`] - Session context and the login/logout flows that drive the engine

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod config;
pub mod error;
pub mod gateway;
pub mod reconcile;
pub mod session;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;
