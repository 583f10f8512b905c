//! Command implementations.

pub mod auth;
pub mod cart;
pub mod plan;

use cartwheel_storefront::cart::LocalCartStore;
use cartwheel_storefront::config::ClientConfig;
use cartwheel_storefront::error::Result;
use cartwheel_storefront::gateway::HttpCartGateway;
use cartwheel_storefront::reconcile::{Notice, Reconciler};
use cartwheel_storefront::session::StorefrontSession;
use cartwheel_storefront::storage::FileStore;

/// The session the login, logout and plan commands work on.
pub type Session = StorefrontSession<FileStore, HttpCartGateway>;

/// The device-local cart the `cart` commands edit.
pub type LocalCart = LocalCartStore<FileStore>;

/// Open the local cart stored under the configured data directory.
pub fn open_cart(config: &ClientConfig) -> LocalCart {
    LocalCartStore::load(FileStore::new(&config.data_dir))
}

/// Open the session stored under the configured data directory.
///
/// # Errors
///
/// Returns an error if no API URL is configured or the HTTP client cannot be
/// built.
pub fn open_session(config: &ClientConfig) -> Result<Session> {
    let gateway = HttpCartGateway::new(config)?;
    let reconciler = Reconciler::new(gateway).with_policy(config.merge_policy);
    let storage = FileStore::new(&config.data_dir);

    tracing::debug!(data_dir = %storage.dir().display(), "Opening session");
    Ok(StorefrontSession::open(storage, reconciler))
}

/// Print user-facing notices.
#[allow(clippy::print_stdout)]
pub fn print_notices(notices: &[Notice]) {
    for notice in notices {
        println!("! {notice}");
    }
}
