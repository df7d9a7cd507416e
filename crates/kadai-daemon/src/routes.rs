//! Axum router and all HTTP handlers for kadai-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Handlers are `pub(crate)` so the scenario tests in
//! `tests/` can compose the router directly.

use std::{collections::HashMap, convert::Infallible, sync::Arc};

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post, put},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use kadai_lifecycle::AdminAction;
use kadai_schemas::{prices, GeoPoint, Product};
use kadai_shop::{
    checkout::SUCCESS_MESSAGE, CustomerDetails, ImageUpload, ProductForm, TrackingView,
    ValidationErrors,
};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tower_http::services::ServeDir;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    api_types::{
        ActionsResponse, AddCartItemRequest, AdminOrderView, ApplyActionRequest, CartView,
        CheckoutResponse, CustomerOrderView, DeletedResponse, HealthResponse, LocationAck,
        LocationUpdate, LoginRequest, LoginResponse, LogoutResponse, OrdersQuery,
        SessionResponse, SetQuantityRequest,
    },
    auth::{AdminSession, CustomerId},
    error::ApiError,
    state::{uptime_secs, AppState, BusMsg, LoginError},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Oversized images must still reach validation to get a field error.
    let body_limit = state
        .images
        .max_bytes
        .saturating_mul(2)
        .saturating_add(1 << 20);

    let mut router = Router::new()
        .route("/v1/health", get(health))
        .route("/v1/session", post(new_session))
        .route("/v1/products", get(list_products))
        .route("/v1/products/:id", get(get_product))
        .route("/v1/cart", get(get_cart).delete(clear_cart))
        .route("/v1/cart/items", post(add_cart_item))
        .route(
            "/v1/cart/items/:product_id",
            put(set_cart_quantity).delete(remove_cart_item),
        )
        .route("/v1/checkout", post(checkout))
        .route("/v1/orders", get(my_orders))
        .route("/v1/orders/:id", get(my_order))
        .route("/v1/orders/:id/tracking", get(tracking))
        .route("/v1/orders/:id/stream", get(tracking_stream))
        .route("/v1/delivery/:id/location", put(delivery_location))
        .route("/v1/admin/login", post(admin_login))
        .route("/v1/admin/logout", post(admin_logout))
        .route("/v1/admin/orders", get(admin_orders))
        .route(
            "/v1/admin/orders/:id/actions",
            get(admin_actions).post(admin_apply_action),
        )
        .route("/v1/admin/products", post(admin_create_product))
        .route(
            "/v1/admin/products/:id",
            put(admin_update_product).delete(admin_delete_product),
        )
        .route("/v1/stream", get(stream))
        .layer(DefaultBodyLimit::max(body_limit));

    if let Some(root) = &state.objects_root {
        router = router.nest_service("/objects", ServeDir::new(root));
    }

    router.with_state(state)
}

// ---------------------------------------------------------------------------
// GET /v1/health, POST /v1/session
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
            uptime_secs: uptime_secs(),
            store: st.store.backend_name().to_string(),
            objects: st.objects.backend_name().to_string(),
        }),
    )
}

pub(crate) async fn new_session() -> impl IntoResponse {
    (
        StatusCode::CREATED,
        Json(SessionResponse {
            user_id: Uuid::new_v4().to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// Catalog reader
// ---------------------------------------------------------------------------

pub(crate) async fn list_products(
    State(st): State<Arc<AppState>>,
) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(st.catalog.list_products().await?))
}

pub(crate) async fn get_product(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(st.catalog.get_product(&id).await?))
}

// ---------------------------------------------------------------------------
// Cart
// ---------------------------------------------------------------------------

pub(crate) async fn get_cart(
    State(st): State<Arc<AppState>>,
    CustomerId(owner): CustomerId,
) -> Json<CartView> {
    Json(CartView::from(&st.carts.get(&owner).await))
}

pub(crate) async fn clear_cart(
    State(st): State<Arc<AppState>>,
    CustomerId(owner): CustomerId,
) -> Json<CartView> {
    st.carts.clear(&owner).await;
    Json(CartView::from(&kadai_shop::Cart::new()))
}

pub(crate) async fn add_cart_item(
    State(st): State<Arc<AppState>>,
    CustomerId(owner): CustomerId,
    Json(req): Json<AddCartItemRequest>,
) -> Result<Json<CartView>, ApiError> {
    if req.quantity == 0 {
        return Err(ApiError::field("quantity", "Quantity must be at least 1."));
    }
    let product = st.catalog.get_product(&req.product_id).await?;
    let (cart, ()) = st
        .carts
        .update(&owner, |c| c.add(&product, req.quantity))
        .await;
    Ok(Json(CartView::from(&cart)))
}

pub(crate) async fn set_cart_quantity(
    State(st): State<Arc<AppState>>,
    CustomerId(owner): CustomerId,
    Path(product_id): Path<String>,
    Json(req): Json<SetQuantityRequest>,
) -> Result<Json<CartView>, ApiError> {
    let (cart, found) = st
        .carts
        .update(&owner, |c| c.update_quantity(&product_id, req.quantity))
        .await;
    if !found {
        return Err(ApiError::NotFound(format!("product not in cart: {product_id}")));
    }
    Ok(Json(CartView::from(&cart)))
}

pub(crate) async fn remove_cart_item(
    State(st): State<Arc<AppState>>,
    CustomerId(owner): CustomerId,
    Path(product_id): Path<String>,
) -> Result<Json<CartView>, ApiError> {
    let (cart, found) = st.carts.update(&owner, |c| c.remove(&product_id)).await;
    if !found {
        return Err(ApiError::NotFound(format!("product not in cart: {product_id}")));
    }
    Ok(Json(CartView::from(&cart)))
}

// ---------------------------------------------------------------------------
// POST /v1/checkout (multipart)
// ---------------------------------------------------------------------------

pub(crate) async fn checkout(
    State(st): State<Arc<AppState>>,
    CustomerId(owner): CustomerId,
    multipart: Multipart,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError> {
    let mut form = FormParts::read(multipart).await?;
    let mut errors = ValidationErrors::new();
    let location = form.location(&mut errors);
    let customer = CustomerDetails {
        name: form.take_text("name"),
        phone: form.take_text("phone"),
        address: form.take_text("address"),
        location,
    };
    let screenshot = form.files.remove("paymentScreenshot");
    if !errors.is_empty() {
        if let Err(more) = st
            .checkout
            .validate(&st.carts, &owner, &customer, screenshot.as_ref())
            .await
        {
            errors.merge(more);
        }
        return Err(errors.into());
    }

    let order = st
        .checkout
        .place_order(&st.carts, &owner, customer, screenshot)
        .await?;

    st.log_line(
        "info",
        format!("order {} placed ({})", order.id, order.status),
    );
    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            order,
            message: SUCCESS_MESSAGE.to_string(),
        }),
    ))
}

// ---------------------------------------------------------------------------
// Customer orders and tracking
// ---------------------------------------------------------------------------

pub(crate) async fn my_orders(
    State(st): State<Arc<AppState>>,
    CustomerId(owner): CustomerId,
) -> Result<Json<Vec<CustomerOrderView>>, ApiError> {
    let orders = st.orders.customer_orders(&owner).await?;
    Ok(Json(orders.into_iter().map(CustomerOrderView::from).collect()))
}

pub(crate) async fn my_order(
    State(st): State<Arc<AppState>>,
    CustomerId(owner): CustomerId,
    Path(id): Path<String>,
) -> Result<Json<CustomerOrderView>, ApiError> {
    let order = st.orders.customer_order(&owner, &id).await?;
    Ok(Json(CustomerOrderView::from(order)))
}

pub(crate) async fn tracking(
    State(st): State<Arc<AppState>>,
    CustomerId(owner): CustomerId,
    Path(id): Path<String>,
) -> Result<Json<TrackingView>, ApiError> {
    Ok(Json(st.orders.tracking(&owner, &id).await?))
}

/// SSE: one `tracking` event now, then one per change to the order record,
/// until the client disconnects.
pub(crate) async fn tracking_stream(
    State(st): State<Arc<AppState>>,
    CustomerId(owner): CustomerId,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let views = st.orders.watch_tracking(&owner, &id).await?;
    let events = views.filter_map(|view| async move {
        let data = serde_json::to_string(&view).ok()?;
        Some(Ok::<_, Infallible>(Event::default().event("tracking").data(data)))
    });
    Ok((sse_headers(), Sse::new(events).keep_alive(KeepAlive::new())).into_response())
}

// ---------------------------------------------------------------------------
// PUT /v1/delivery/:id/location
// ---------------------------------------------------------------------------

/// One relay write. Accepted in any status; only the tracking view decides
/// whether the position is shown.
pub(crate) async fn delivery_location(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<LocationUpdate>,
) -> Result<Json<LocationAck>, ApiError> {
    let at = GeoPoint::new(req.lat, req.lng)
        .ok_or_else(|| ApiError::field("location", "Coordinates are out of range."))?;
    let order = st.store.set_delivery_location(&id, at).await?;
    Ok(Json(LocationAck {
        order_id: order.id,
        status: order.status,
        lat: at.lat,
        lng: at.lng,
    }))
}

// ---------------------------------------------------------------------------
// Admin session
// ---------------------------------------------------------------------------

pub(crate) async fn admin_login(
    State(st): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    match st.admin.login(&req.password).await {
        Ok(issued) => {
            info!(session_id = %issued.session_id, "admin login");
            st.log_line("info", format!("admin session {} opened", issued.session_id));
            Ok(Json(LoginResponse {
                token: issued.token,
                expires_in_secs: issued.expires_in.as_secs(),
            }))
        }
        Err(LoginError::WrongPassword) => {
            warn!("admin login refused");
            Err(ApiError::Unauthorized("Incorrect password.".to_string()))
        }
        Err(LoginError::NotConfigured) => Err(ApiError::Unauthorized(
            "Admin console is not configured.".to_string(),
        )),
    }
}

pub(crate) async fn admin_logout(
    State(st): State<Arc<AppState>>,
    admin: AdminSession,
) -> Json<LogoutResponse> {
    let revoked = st.admin.logout(&admin.token).await;
    info!(session_id = %admin.session_id, "admin logout");
    Json(LogoutResponse { revoked })
}

// ---------------------------------------------------------------------------
// Admin orders
// ---------------------------------------------------------------------------

pub(crate) async fn admin_orders(
    State(st): State<Arc<AppState>>,
    _admin: AdminSession,
    Query(q): Query<OrdersQuery>,
) -> Result<Json<Vec<AdminOrderView>>, ApiError> {
    let queue = q.parse_queue().map_err(ApiError::BadRequest)?;
    let orders = st.orders.list_queue(queue).await?;
    Ok(Json(orders.into_iter().map(AdminOrderView::from).collect()))
}

pub(crate) async fn admin_actions(
    State(st): State<Arc<AppState>>,
    _admin: AdminSession,
    Path(id): Path<String>,
) -> Result<Json<ActionsResponse>, ApiError> {
    let (order, allowed_actions) = st.orders.actions_for(&id).await?;
    Ok(Json(ActionsResponse {
        order_id: order.id,
        status: order.status,
        allowed_actions,
    }))
}

pub(crate) async fn admin_apply_action(
    State(st): State<Arc<AppState>>,
    admin: AdminSession,
    Path(id): Path<String>,
    Json(req): Json<ApplyActionRequest>,
) -> Result<Json<AdminOrderView>, ApiError> {
    let action: AdminAction = req.action.parse().map_err(ApiError::BadRequest)?;
    let order = st
        .orders
        .apply_action(&id, action, &admin.session_id)
        .await?;
    st.log_line(
        "info",
        format!("order {} {} -> {}", order.id, action, order.status),
    );
    Ok(Json(AdminOrderView::from(order)))
}

// ---------------------------------------------------------------------------
// Admin catalog writer (multipart)
// ---------------------------------------------------------------------------

pub(crate) async fn admin_create_product(
    State(st): State<Arc<AppState>>,
    _admin: AdminSession,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let form = FormParts::read(multipart).await?.into_product_form();
    let form = checked_product_form(&st, form, true)?;
    let product = st.catalog.create_product(form).await?;
    st.log_line("info", format!("product {} created", product.id));
    Ok((StatusCode::CREATED, Json(product)))
}

pub(crate) async fn admin_update_product(
    State(st): State<Arc<AppState>>,
    _admin: AdminSession,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Product>, ApiError> {
    let form = FormParts::read(multipart).await?.into_product_form();
    let form = checked_product_form(&st, form, false)?;
    Ok(Json(st.catalog.update_product(&id, form).await?))
}

/// A price that did not parse is reported together with every other field
/// problem the service would find.
fn checked_product_form(
    st: &AppState,
    (form, mut errors): (ProductForm, ValidationErrors),
    require_image: bool,
) -> Result<ProductForm, ApiError> {
    if errors.is_empty() {
        return Ok(form);
    }
    if let Err(more) = st.catalog.validate(&form, require_image) {
        errors.merge(more);
    }
    Err(errors.into())
}

pub(crate) async fn admin_delete_product(
    State(st): State<Arc<AppState>>,
    _admin: AdminSession,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, ApiError> {
    st.catalog.delete_product(&id).await?;
    st.log_line("info", format!("product {id} deleted"));
    Ok(Json(DeletedResponse { id, deleted: true }))
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>, _admin: AdminSession) -> Response {
    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);
    (sse_headers(), Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn sse_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));
    headers
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let event_name = match &m {
                    BusMsg::Heartbeat { .. } => "heartbeat",
                    BusMsg::OrderChanged(_) => "order",
                    BusMsg::LogLine { .. } => "log",
                };
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(event_name).data(data)))
            }
            Err(_) => None, // lagged
        }
    })
}

// ---------------------------------------------------------------------------
// Multipart forms
// ---------------------------------------------------------------------------

/// Text fields and file parts of one multipart body, keyed by field name.
struct FormParts {
    text: HashMap<String, String>,
    files: HashMap<String, ImageUpload>,
}

impl FormParts {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let malformed = |e: axum::extract::multipart::MultipartError| {
            ApiError::BadRequest(format!("malformed multipart body: {e}"))
        };
        let mut text = HashMap::new();
        let mut files = HashMap::new();

        while let Some(field) = multipart.next_field().await.map_err(malformed)? {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let bytes = field.bytes().await.map_err(malformed)?;
                    // Browsers send an empty part when no file was chosen.
                    if filename.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    files.insert(
                        name,
                        ImageUpload {
                            filename,
                            content_type,
                            bytes: bytes.to_vec(),
                        },
                    );
                }
                None => {
                    let value = field.text().await.map_err(malformed)?;
                    text.insert(name, value);
                }
            }
        }
        Ok(Self { text, files })
    }

    fn take_text(&mut self, name: &str) -> String {
        self.text.remove(name).unwrap_or_default()
    }

    /// Optional `lat`/`lng` pair. A half-filled or unparseable pair is
    /// recorded in `errors` and treated as absent.
    fn location(&self, errors: &mut ValidationErrors) -> Option<GeoPoint> {
        let lat = self.text.get("lat").map(|s| s.trim()).filter(|s| !s.is_empty());
        let lng = self.text.get("lng").map(|s| s.trim()).filter(|s| !s.is_empty());
        let parsed = match (lat, lng) {
            (None, None) => return None,
            (Some(lat), Some(lng)) => lat
                .parse::<f64>()
                .ok()
                .zip(lng.parse::<f64>().ok())
                .and_then(|(lat, lng)| GeoPoint::new(lat, lng)),
            _ => None,
        };
        if parsed.is_none() {
            errors.push("location", "Please pick a valid location.");
        }
        parsed
    }

    /// `price` arrives in rupees and is stored in minor units. An unparseable
    /// price is recorded in the returned errors and left at zero.
    fn into_product_form(mut self) -> (ProductForm, ValidationErrors) {
        let mut errors = ValidationErrors::new();
        let price = self
            .text
            .get("price")
            .and_then(|p| p.trim().parse::<f64>().ok())
            .and_then(|p| prices::price_to_minor(p).ok())
            .unwrap_or_else(|| {
                errors.push("price", "Price must be a positive number");
                0
            });
        let form = ProductForm {
            name: self.take_text("name"),
            description: self.take_text("description"),
            price,
            image: self.files.remove("image"),
        };
        (form, errors)
    }
}
