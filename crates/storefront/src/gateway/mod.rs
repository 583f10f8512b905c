//! Remote cart API gateway.
//!
//! # Architecture
//!
//! - [`CartGateway`] is the contract the reconciliation engine depends on:
//!   stateless request functions against the authenticated user's server cart
//! - [`HttpCartGateway`] implements it over the REST cart API with `reqwest`
//! - Calls never retry; every failure surfaces to the caller, which decides
//!   whether it is fatal (it never is for merge-in or sync-back)
//!
//! # Example
//!
//! ```rust,ignore
//! use cartwheel_storefront::gateway::{CartGateway, HttpCartGateway};
//!
//! let gateway = HttpCartGateway::new(&config)?;
//!
//! let lines = gateway.fetch_all(&ctx).await?;
//! let created = gateway
//!     .create(&ctx, &VariantRef::Attributes(identity), 2)
//!     .await?;
//! gateway.delete(&ctx, created.server_line_id()).await?;
//! ```

mod http;
pub(crate) mod wire;

use std::future::Future;

use reqwest::StatusCode;
use thiserror::Error;

use cartwheel_core::{LineIdentity, RemoteLine, ServerLineId, VariantId, VariantRef};

use crate::session::SessionContext;

pub use http::HttpCartGateway;

/// Errors that can occur when calling the remote cart API.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed (connection, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Response status.
        status: StatusCode,
        /// Truncated response body.
        body: String,
    },

    /// The access token was rejected.
    #[error("Unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the API.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A request URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// The remote cart contract.
///
/// Every call acts on the cart of the user identified by `ctx`. The trait is
/// used generically (no boxing); implementations typically write `async fn`.
pub trait CartGateway {
    /// Fetch every line of the user's remote cart, in server order.
    fn fetch_all(
        &self,
        ctx: &SessionContext,
    ) -> impl Future<Output = Result<Vec<RemoteLine>, GatewayError>> + Send;

    /// Create a remote line.
    fn create(
        &self,
        ctx: &SessionContext,
        variant: &VariantRef,
        quantity: u32,
    ) -> impl Future<Output = Result<RemoteLine, GatewayError>> + Send;

    /// Replace the quantity of a remote line.
    fn update_quantity(
        &self,
        ctx: &SessionContext,
        id: ServerLineId,
        quantity: u32,
    ) -> impl Future<Output = Result<RemoteLine, GatewayError>> + Send;

    /// Delete a remote line.
    fn delete(
        &self,
        ctx: &SessionContext,
        id: ServerLineId,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Look up `(product_id, color, size)` for a persisted variant.
    fn resolve_variant(
        &self,
        ctx: &SessionContext,
        variant: VariantId,
    ) -> impl Future<Output = Result<LineIdentity, GatewayError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_display() {
        let err = GatewayError::NotFound("cart line 10".to_string());
        assert_eq!(err.to_string(), "Not found: cart line 10");

        let err = GatewayError::Status {
            status: StatusCode::BAD_GATEWAY,
            body: "upstream down".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 502 Bad Gateway: upstream down");
    }

    #[test]
    fn test_rate_limited_error() {
        let err = GatewayError::RateLimited(60);
        assert_eq!(err.to_string(), "Rate limited, retry after 60 seconds");
    }
}
