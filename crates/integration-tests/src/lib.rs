//! Integration tests for Cartwheel.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cartwheel-integration-tests
//! ```
//!
//! No external services are needed: [`FakeCartApi`] serves the REST cart API
//! in-process on an ephemeral port, and the storefront client talks to it
//! over real HTTP.
//!
//! # Fake API
//!
//! - `GET /cart/`, `POST /cart/`, `PATCH /cart/{id}/`, `DELETE /cart/{id}/`
//! - `GET /variants/{id}/`
//! - Bearer auth against a single accepted token
//! - Lines seeded by variant id are returned with a bare `variant` id; all
//!   other lines embed `{product, color, size}`

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use url::Url;

/// Token the fake API accepts.
pub const TEST_TOKEN: &str = "integration-token";

/// A remote cart line as the fake API stores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiLine {
    pub id: i32,
    pub product: String,
    pub color: Option<String>,
    pub size: String,
    /// Set when the line was created by variant id.
    pub variant_id: Option<i32>,
    pub quantity: u32,
}

impl ApiLine {
    fn to_json(&self) -> Value {
        let variant = self.variant_id.map_or_else(
            || variant_json(&self.product, self.color.as_deref(), &self.size),
            |id| json!(id),
        );
        json!({ "id": self.id, "variant": variant, "quantity": self.quantity })
    }
}

fn variant_json(product: &str, color: Option<&str>, size: &str) -> Value {
    let mut value = json!({ "product": product, "size": size });
    if let (Some(color), Some(map)) = (color, value.as_object_mut()) {
        map.insert("color".to_string(), json!(color));
    }
    value
}

#[derive(Debug, Clone)]
struct Variant {
    product: String,
    color: Option<String>,
    size: String,
}

#[derive(Default)]
struct ApiState {
    lines: Vec<ApiLine>,
    variants: HashMap<i32, Variant>,
    next_id: i32,
    failing_products: HashSet<String>,
    unavailable: bool,
    mutations: usize,
}

type SharedState = Arc<Mutex<ApiState>>;

/// In-process fake of the remote cart API.
pub struct FakeCartApi {
    state: SharedState,
    addr: SocketAddr,
    server: JoinHandle<()>,
}

impl FakeCartApi {
    /// Start the fake API on `127.0.0.1` with an ephemeral port.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn spawn() -> Self {
        let state = SharedState::default();
        lock(&state).next_id = 1000;

        let app = Router::new()
            .route("/cart/", get(list_lines).post(create_line))
            .route("/cart/{id}/", axum::routing::patch(update_line).delete(delete_line))
            .route("/variants/{id}/", get(get_variant))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake cart API");
        let addr = listener.local_addr().expect("Failed to read local address");

        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            state,
            addr,
            server,
        }
    }

    /// Root URL of the API.
    ///
    /// # Panics
    ///
    /// Never in practice; the address always forms a valid URL.
    #[must_use]
    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}/", self.addr)).expect("valid URL")
    }

    /// Add a line that embeds its variant attributes. Returns its id.
    pub fn seed_line(&self, product: &str, color: Option<&str>, size: &str, quantity: u32) -> i32 {
        let mut state = lock(&self.state);
        state.next_id += 1;
        let id = state.next_id;
        state.lines.push(ApiLine {
            id,
            product: product.to_string(),
            color: color.map(str::to_string),
            size: size.to_string(),
            variant_id: None,
            quantity,
        });
        id
    }

    /// Register a variant that lines can reference by id.
    pub fn register_variant(&self, id: i32, product: &str, color: Option<&str>, size: &str) {
        lock(&self.state).variants.insert(
            id,
            Variant {
                product: product.to_string(),
                color: color.map(str::to_string),
                size: size.to_string(),
            },
        );
    }

    /// Add a line that only references a registered variant. Returns its id.
    ///
    /// # Panics
    ///
    /// Panics if the variant has not been registered.
    pub fn seed_variant_line(&self, variant_id: i32, quantity: u32) -> i32 {
        let mut state = lock(&self.state);
        let variant = state
            .variants
            .get(&variant_id)
            .cloned()
            .expect("variant must be registered first");
        state.next_id += 1;
        let id = state.next_id;
        state.lines.push(ApiLine {
            id,
            product: variant.product,
            color: variant.color,
            size: variant.size,
            variant_id: Some(variant_id),
            quantity,
        });
        id
    }

    /// Drop a registered variant so lookups 404.
    pub fn forget_variant(&self, id: i32) {
        lock(&self.state).variants.remove(&id);
    }

    /// Make every mutation touching `product` answer 500.
    pub fn fail_product(&self, product: &str) {
        lock(&self.state).failing_products.insert(product.to_string());
    }

    /// Make every request answer 503.
    pub fn set_unavailable(&self, unavailable: bool) {
        lock(&self.state).unavailable = unavailable;
    }

    /// Snapshot of the remote cart.
    #[must_use]
    pub fn lines(&self) -> Vec<ApiLine> {
        lock(&self.state).lines.clone()
    }

    /// Quantity of the line matching `(product, color, size)`.
    #[must_use]
    pub fn quantity_of(&self, product: &str, color: Option<&str>, size: &str) -> Option<u32> {
        lock(&self.state)
            .lines
            .iter()
            .find(|l| l.product == product && l.color.as_deref() == color && l.size == size)
            .map(|l| l.quantity)
    }

    /// Number of create/update/delete requests received.
    #[must_use]
    pub fn mutations(&self) -> usize {
        lock(&self.state).mutations
    }
}

impl Drop for FakeCartApi {
    fn drop(&mut self) {
        self.server.abort();
    }
}

fn lock(state: &SharedState) -> MutexGuard<'_, ApiState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Handlers
// =============================================================================

fn check(headers: &HeaderMap, state: &ApiState) -> Result<(), Response> {
    if state.unavailable {
        return Err((StatusCode::SERVICE_UNAVAILABLE, "maintenance").into_response());
    }
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TEST_TOKEN}"));
    if authorized {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED.into_response())
    }
}

fn injected_failure(state: &ApiState, product: &str) -> Result<(), Response> {
    if state.failing_products.contains(product) {
        Err((StatusCode::INTERNAL_SERVER_ERROR, "injected failure").into_response())
    } else {
        Ok(())
    }
}

async fn list_lines(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let state = lock(&state);
    if let Err(response) = check(&headers, &state) {
        return response;
    }
    Json(state.lines.iter().map(ApiLine::to_json).collect::<Vec<_>>()).into_response()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CreateBody {
    ByVariant {
        variant: i32,
        quantity: u32,
    },
    ByAttributes {
        product: String,
        color: Option<String>,
        size: String,
        quantity: u32,
    },
}

async fn create_line(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<CreateBody>,
) -> Response {
    let mut state = lock(&state);
    if let Err(response) = check(&headers, &state) {
        return response;
    }
    state.mutations += 1;

    let (variant, variant_id, quantity) = match body {
        CreateBody::ByVariant { variant, quantity } => match state.variants.get(&variant) {
            Some(found) => (found.clone(), Some(variant), quantity),
            None => return StatusCode::NOT_FOUND.into_response(),
        },
        CreateBody::ByAttributes {
            product,
            color,
            size,
            quantity,
        } => (
            Variant {
                product,
                color,
                size,
            },
            None,
            quantity,
        ),
    };
    if let Err(response) = injected_failure(&state, &variant.product) {
        return response;
    }

    state.next_id += 1;
    let line = ApiLine {
        id: state.next_id,
        product: variant.product,
        color: variant.color,
        size: variant.size,
        variant_id,
        quantity,
    };
    let body = line.to_json();
    state.lines.push(line);
    (StatusCode::CREATED, Json(body)).into_response()
}

#[derive(Deserialize)]
struct UpdateBody {
    quantity: u32,
}

async fn update_line(
    State(state): State<SharedState>,
    Path(id): Path<i32>,
    headers: HeaderMap,
    Json(body): Json<UpdateBody>,
) -> Response {
    let mut state = lock(&state);
    if let Err(response) = check(&headers, &state) {
        return response;
    }
    state.mutations += 1;

    let Some(index) = state.lines.iter().position(|l| l.id == id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let product = state.lines.get(index).map(|l| l.product.clone()).unwrap_or_default();
    if let Err(response) = injected_failure(&state, &product) {
        return response;
    }

    match state.lines.get_mut(index) {
        Some(line) => {
            line.quantity = body.quantity;
            Json(line.to_json()).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn delete_line(
    State(state): State<SharedState>,
    Path(id): Path<i32>,
    headers: HeaderMap,
) -> Response {
    let mut state = lock(&state);
    if let Err(response) = check(&headers, &state) {
        return response;
    }
    state.mutations += 1;

    let Some(index) = state.lines.iter().position(|l| l.id == id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let product = state.lines.get(index).map(|l| l.product.clone()).unwrap_or_default();
    if let Err(response) = injected_failure(&state, &product) {
        return response;
    }

    state.lines.remove(index);
    StatusCode::NO_CONTENT.into_response()
}

async fn get_variant(
    State(state): State<SharedState>,
    Path(id): Path<i32>,
    headers: HeaderMap,
) -> Response {
    let state = lock(&state);
    if let Err(response) = check(&headers, &state) {
        return response;
    }
    match state.variants.get(&id) {
        Some(v) => Json(variant_json(&v.product, v.color.as_deref(), &v.size)).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
