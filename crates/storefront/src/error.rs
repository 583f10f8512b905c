//! Unified error handling with Sentry integration.
//!
//! Provides a unified `ClientError` type for callers of the storefront
//! library (the CLI returns it from every command), plus helpers that attach
//! user context and breadcrumbs to Sentry reports.
//!
//! Remote cart failures never surface here from login or logout: the
//! reconciliation engine turns them into [`Notice`](crate::reconcile::Notice)s.

use thiserror::Error;

use crate::config::ConfigError;
use crate::gateway::GatewayError;
use crate::storage::StorageError;

/// Application-level error type for the storefront client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Local storage operation failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Remote cart API operation failed.
    #[error("Cart API error: {0}")]
    Gateway(#[from] GatewayError),

    /// An operation needs an authenticated session.
    #[error("Not logged in")]
    NotLoggedIn,

    /// Bad input from the user.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl ClientError {
    /// Capture the error to Sentry when it indicates a client-side defect
    /// rather than bad input.
    pub fn report(&self) {
        if matches!(self, Self::Storage(_) | Self::Gateway(_)) {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Command error"
            );
        }
    }
}

/// Result type alias for `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of cart
/// actions leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("line", "17/red/M")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_display() {
        let err = ClientError::BadRequest("quantity must be positive".to_string());
        assert_eq!(err.to_string(), "Bad request: quantity must be positive");

        assert_eq!(ClientError::NotLoggedIn.to_string(), "Not logged in");
    }

    #[test]
    fn test_client_error_from_gateway() {
        let err = ClientError::from(GatewayError::Unauthorized);
        assert!(matches!(err, ClientError::Gateway(GatewayError::Unauthorized)));
        assert_eq!(err.to_string(), "Cart API error: Unauthorized");
    }

    #[test]
    fn test_breadcrumb_without_client_is_noop() {
        // No Sentry client is bound in tests; these must not panic.
        add_breadcrumb("cart", "Cleared cart", None);
        set_sentry_user(&42);
        clear_sentry_user();
    }
}
