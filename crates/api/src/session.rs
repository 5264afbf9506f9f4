//! Cookie-keyed server-side sessions holding the shopping cart.
//!
//! Each session owns one cart behind its own lock. Handlers hold that lock
//! for the whole read-modify-write, so overlapping requests for the same
//! session run one after another. A session also remembers the orders it
//! started, so only it can cancel them. Expired sessions are dropped lazily
//! when they are next looked up or when a new session is created.

use std::collections::{HashMap, HashSet};
use std::convert::Infallible;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use common::OrderId;
use domain::Cart;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "session_id";

#[derive(Debug)]
struct Slot {
    cart: Arc<Mutex<Cart>>,
    orders: Arc<Mutex<HashSet<OrderId>>>,
    expires_at: Instant,
}

/// In-memory session store with sliding expiry.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Slot>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Resumes the live session named by the request cookie, or starts one.
    ///
    /// Unknown and expired ids are never reused; a fresh id is issued.
    pub async fn open(&self, headers: &HeaderMap) -> Session {
        let now = Instant::now();
        let requested = session_id_from_headers(headers);
        let mut sessions = self.sessions.write().await;

        if let Some(id) = requested.as_deref()
            && let Some(slot) = sessions.get_mut(id)
            && slot.expires_at > now
        {
            slot.expires_at = now + self.ttl;
            return Session {
                id: id.to_string(),
                is_new: false,
                ttl: self.ttl,
                cart: slot.cart.clone(),
                orders: slot.orders.clone(),
            };
        }

        sessions.retain(|_, slot| slot.expires_at > now);

        let id = Uuid::new_v4().simple().to_string();
        let cart = Arc::new(Mutex::new(Cart::new()));
        let orders = Arc::new(Mutex::new(HashSet::new()));
        sessions.insert(
            id.clone(),
            Slot {
                cart: cart.clone(),
                orders: orders.clone(),
                expires_at: now + self.ttl,
            },
        );
        metrics::counter!("sessions_created_total").increment(1);
        tracing::debug!(session_id = %id, "session started");

        Session {
            id,
            is_new: true,
            ttl: self.ttl,
            cart,
            orders,
        }
    }

    /// Number of sessions currently held, expired or not.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// A resolved session for the current request.
#[derive(Debug)]
pub struct Session {
    id: String,
    is_new: bool,
    ttl: Duration,
    cart: Arc<Mutex<Cart>>,
    orders: Arc<Mutex<HashSet<OrderId>>>,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// True if this request started the session.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Locks the session's cart for reading and writing.
    ///
    /// Other requests for the same session wait until the guard is dropped.
    pub async fn cart(&self) -> CartGuard {
        CartGuard(self.cart.clone().lock_owned().await)
    }

    /// Returns a copy of the cart.
    pub async fn load_cart(&self) -> Cart {
        self.cart.lock().await.clone()
    }

    /// Empties the cart.
    pub async fn clear_cart(&self) {
        self.cart.lock().await.clear();
    }

    /// Remembers an order whose checkout this session started.
    pub async fn record_order(&self, order_id: OrderId) {
        self.orders.lock().await.insert(order_id);
    }

    pub async fn owns_order(&self, order_id: OrderId) -> bool {
        self.orders.lock().await.contains(&order_id)
    }

    /// Adds the session cookie to `response` when the session is new.
    ///
    /// Error responses go through here too, so a session opened by a
    /// failing request is not left without its cookie.
    pub fn respond(&self, response: impl IntoResponse) -> Response {
        let mut response = response.into_response();
        if self.is_new {
            let cookie = format!(
                "{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
                self.id,
                self.ttl.as_secs()
            );
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                response.headers_mut().append(SET_COOKIE, value);
            }
        }
        response
    }
}

impl<S> FromRequestParts<S> for Session
where
    SessionStore: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let store = SessionStore::from_ref(state);
        Ok(store.open(&parts.headers).await)
    }
}

/// Exclusive access to a session's cart.
pub struct CartGuard(OwnedMutexGuard<Cart>);

impl Deref for CartGuard {
    type Target = Cart;

    fn deref(&self) -> &Cart {
        &self.0
    }
}

impl DerefMut for CartGuard {
    fn deref_mut(&mut self) -> &mut Cart {
        &mut self.0
    }
}

fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
