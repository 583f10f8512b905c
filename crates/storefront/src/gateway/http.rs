//! REST cart API client.
//!
//! Uses `reqwest` with bearer-token auth taken from the session context.
//! Status codes are mapped to [`GatewayError`] variants before any body is
//! parsed, so callers can tell auth failures from transient ones.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use cartwheel_core::{LineIdentity, RemoteLine, ServerLineId, VariantId, VariantRef};

use super::wire::{CreateLineRequest, LineResponse, UpdateQuantityRequest, VariantAttributes};
use super::{CartGateway, GatewayError};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::session::SessionContext;

/// Maximum number of response body characters kept in errors and logs.
const BODY_PREVIEW_CHARS: usize = 200;

// =============================================================================
// HttpCartGateway
// =============================================================================

/// Client for the remote cart REST API.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct HttpCartGateway {
    inner: Arc<HttpCartGatewayInner>,
}

struct HttpCartGatewayInner {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpCartGateway {
    /// Create a gateway from client configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no API URL is configured or the HTTP client cannot
    /// be built.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let api_url = config.require_api_url()?.clone();
        Ok(Self::with_base_url(api_url, config.request_timeout)?)
    }

    /// Create a gateway for an explicit API root.
    ///
    /// `base_url` should end with `/`; one is appended otherwise so that
    /// relative paths join below it.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_base_url(mut base_url: Url, timeout: Duration) -> Result<Self, GatewayError> {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            inner: Arc::new(HttpCartGatewayInner { client, base_url }),
        })
    }

    /// The API root requests are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    fn url(&self, path: &str) -> Result<Url, GatewayError> {
        Ok(self.inner.base_url.join(path)?)
    }

    fn authorized(&self, request: RequestBuilder, ctx: &SessionContext) -> RequestBuilder {
        request.bearer_auth(ctx.user().access_token().expose_secret())
    }

    /// Send a request and check its status, returning the body text.
    async fn send(&self, request: RequestBuilder) -> Result<String, GatewayError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(GatewayError::RateLimited(retry_after));
        }

        let url = response.url().path().to_owned();
        let body = response.text().await?;

        match status {
            s if s.is_success() => Ok(body),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(GatewayError::Unauthorized),
            StatusCode::NOT_FOUND => Err(GatewayError::NotFound(url)),
            _ => {
                tracing::error!(
                    status = %status,
                    body = %preview(&body),
                    "Cart API returned non-success status"
                );
                Err(GatewayError::Status {
                    status,
                    body: preview(&body),
                })
            }
        }
    }

    /// Send a request and decode its JSON body.
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, GatewayError> {
        let body = self.send(request).await?;

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %preview(&body),
                "Failed to parse cart API response"
            );
            GatewayError::Parse(e)
        })
    }
}

impl CartGateway for HttpCartGateway {
    #[instrument(skip(self, ctx), fields(user_id = %ctx.user().id()))]
    async fn fetch_all(&self, ctx: &SessionContext) -> Result<Vec<RemoteLine>, GatewayError> {
        let request = self.authorized(self.inner.client.get(self.url("cart/")?), ctx);
        let lines: Vec<LineResponse> = self.send_json(request).await?;

        debug!(lines = lines.len(), "Fetched remote cart");
        Ok(lines.into_iter().map(RemoteLine::from).collect())
    }

    #[instrument(skip(self, ctx), fields(user_id = %ctx.user().id()))]
    async fn create(
        &self,
        ctx: &SessionContext,
        variant: &VariantRef,
        quantity: u32,
    ) -> Result<RemoteLine, GatewayError> {
        let body = CreateLineRequest::new(variant, quantity);
        let request = self.authorized(self.inner.client.post(self.url("cart/")?), ctx).json(&body);
        let line: LineResponse = self.send_json(request).await?;
        Ok(line.into())
    }

    #[instrument(skip(self, ctx), fields(user_id = %ctx.user().id()))]
    async fn update_quantity(
        &self,
        ctx: &SessionContext,
        id: ServerLineId,
        quantity: u32,
    ) -> Result<RemoteLine, GatewayError> {
        let url = self.url(&format!("cart/{id}/"))?;
        let request = self
            .authorized(self.inner.client.patch(url), ctx)
            .json(&UpdateQuantityRequest { quantity });
        let line: LineResponse = self.send_json(request).await?;
        Ok(line.into())
    }

    #[instrument(skip(self, ctx), fields(user_id = %ctx.user().id()))]
    async fn delete(&self, ctx: &SessionContext, id: ServerLineId) -> Result<(), GatewayError> {
        let url = self.url(&format!("cart/{id}/"))?;
        let request = self.authorized(self.inner.client.delete(url), ctx);
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self, ctx), fields(user_id = %ctx.user().id()))]
    async fn resolve_variant(
        &self,
        ctx: &SessionContext,
        variant: VariantId,
    ) -> Result<LineIdentity, GatewayError> {
        let url = self.url(&format!("variants/{variant}/"))?;
        let request = self.authorized(self.inner.client.get(url), ctx);
        let attrs: VariantAttributes = self.send_json(request).await?;
        Ok(attrs.into())
    }
}

fn preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}
