//! Shared runtime state for kadai-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The workflow services
//! are built once here over the configured store and object backend.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use kadai_audit::AuditWriter;
use kadai_config::{ImagesConfig, ShopConfig, StorageBackend};
use kadai_db::{ChangeFeed, DocumentStore};
use kadai_lifecycle::OrderStatus;
use kadai_shop::{CartStore, CatalogService, CheckoutService, OrderService};
use kadai_storage::ObjectStore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::{broadcast, RwLock};
use tracing::debug;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    OrderChanged(OrderEvent),
    LogLine { level: String, msg: String },
}

/// Enough for an admin list to know which row to refresh.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderEvent {
    pub order_id: String,
    pub status: OrderStatus,
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AdminSessions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginError {
    /// No admin password was resolved at boot; the console is closed.
    NotConfigured,
    WrongPassword,
}

/// A freshly issued bearer token.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub session_id: String,
    pub expires_in: Duration,
}

#[derive(Debug, Clone)]
struct SessionEntry {
    session_id: String,
    expires_at: Instant,
}

/// Server-side admin sessions. The password never leaves the daemon; only
/// its digest is held, and callers get opaque tokens with a TTL.
pub struct AdminSessions {
    password_digest: Option<[u8; 32]>,
    ttl: Duration,
    tokens: RwLock<HashMap<String, SessionEntry>>,
}

impl AdminSessions {
    pub fn new(password: Option<&str>, ttl: Duration) -> Self {
        Self {
            password_digest: password.map(digest),
            ttl,
            tokens: RwLock::new(HashMap::new()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.password_digest.is_some()
    }

    pub async fn login(&self, password: &str) -> Result<IssuedSession, LoginError> {
        let expected = self.password_digest.ok_or(LoginError::NotConfigured)?;
        if !digests_equal(&expected, &digest(password)) {
            return Err(LoginError::WrongPassword);
        }

        let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        let session_id = format!("admin-{}", &Uuid::new_v4().simple().to_string()[..12]);
        let entry = SessionEntry {
            session_id: session_id.clone(),
            expires_at: Instant::now() + self.ttl,
        };

        let mut tokens = self.tokens.write().await;
        let now = Instant::now();
        tokens.retain(|_, e| e.expires_at > now);
        tokens.insert(token.clone(), entry);

        Ok(IssuedSession {
            token,
            session_id,
            expires_in: self.ttl,
        })
    }

    /// Session id for a live token. Expired tokens are dropped on sight.
    pub async fn verify(&self, token: &str) -> Option<String> {
        let now = Instant::now();
        {
            let tokens = self.tokens.read().await;
            match tokens.get(token) {
                Some(e) if e.expires_at > now => return Some(e.session_id.clone()),
                None => return None,
                Some(_) => {}
            }
        }
        self.tokens.write().await.remove(token);
        debug!("expired admin token discarded");
        None
    }

    pub async fn logout(&self, token: &str) -> bool {
        self.tokens.write().await.remove(token).is_some()
    }
}

fn digest(s: &str) -> [u8; 32] {
    Sha256::digest(s.as_bytes()).into()
}

fn digests_equal(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    /// Static build metadata.
    pub build: BuildInfo,
    pub store: Arc<dyn DocumentStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub carts: CartStore,
    pub catalog: CatalogService,
    pub checkout: CheckoutService,
    pub orders: OrderService,
    pub admin: AdminSessions,
    pub images: ImagesConfig,
    /// Served under `/objects` when the local backend is active.
    pub objects_root: Option<PathBuf>,
}

impl AppState {
    pub fn new(
        cfg: &ShopConfig,
        store: Arc<dyn DocumentStore>,
        objects: Arc<dyn ObjectStore>,
        admin_password: Option<&str>,
        audit: Option<AuditWriter>,
    ) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        let audit = audit.map(|w| Arc::new(Mutex::new(w)));

        Self {
            bus,
            build: BuildInfo {
                service: "kadai-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            carts: CartStore::new(),
            catalog: CatalogService::new(
                store.clone(),
                objects.clone(),
                cfg.catalog.clone(),
                cfg.images.clone(),
            ),
            checkout: CheckoutService::new(
                store.clone(),
                objects.clone(),
                cfg.checkout.flow,
                cfg.images.clone(),
            ),
            orders: OrderService::new(store.clone(), audit),
            admin: AdminSessions::new(
                admin_password,
                Duration::from_secs(cfg.admin.session_ttl_secs),
            ),
            images: cfg.images.clone(),
            objects_root: match cfg.storage.backend {
                StorageBackend::Local => Some(PathBuf::from(&cfg.storage.local.root)),
                StorageBackend::Cdn => None,
            },
            store,
            objects,
        }
    }

    pub fn log_line(&self, level: &str, msg: impl Into<String>) {
        let _ = self.bus.send(BusMsg::LogLine {
            level: level.to_string(),
            msg: msg.into(),
        });
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}

/// Forward every order change from the store's feed onto the bus.
pub fn spawn_order_events(feed: &ChangeFeed, bus: broadcast::Sender<BusMsg>) {
    let mut rx = feed.subscribe_all();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(order) => {
                    let _ = bus.send(BusMsg::OrderChanged(OrderEvent {
                        order_id: order.id.clone(),
                        status: order.status,
                    }));
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "order event forwarder lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
