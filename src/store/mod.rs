//! Store collaborators: routes, exchange records and sessions.
//!
//! # Data Flow
//! ```text
//! Proxy request:
//!     → RouteStore::get (once per request, never cached)
//!     → SessionStore::get_session (session posture only)
//!     → ExchangeStore::append (detached task, after the response stream ends)
//!
//! Admin API:
//!     → RouteStore::{list, insert, set_active, delete}
//!     → ExchangeStore::list_for_route
//! ```
//!
//! # Design Decisions
//! - Each call is an independent, possibly failing remote operation
//! - Implementations serialize their own concurrent access
//! - `memory.rs` is the bundled implementation; others plug in via the traits

pub mod memory;
pub mod model;

use std::sync::Arc;

use async_trait::async_trait;

pub use memory::MemoryStore;
pub use model::{ExchangeOutcome, ExchangeRecord, Route, Session, SYSTEM_OWNER};

/// Failure at the store boundary.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[async_trait]
pub trait RouteStore: Send + Sync {
    /// Fetch a route by code, active or not.
    async fn get(&self, code: &str) -> Result<Option<Route>, StoreError>;

    /// All routes (optionally only those of `owner`), newest first.
    async fn list(&self, owner: Option<&str>) -> Result<Vec<Route>, StoreError>;

    /// Insert a new route. Fails with `Conflict` when the code is taken.
    async fn insert(&self, route: Route) -> Result<Route, StoreError>;

    /// Toggle a route. Returns the updated route, or `None` if absent.
    async fn set_active(&self, code: &str, active: bool) -> Result<Option<Route>, StoreError>;

    /// Remove a route. Returns whether it existed.
    async fn delete(&self, code: &str) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait ExchangeStore: Send + Sync {
    async fn append(&self, record: ExchangeRecord) -> Result<(), StoreError>;

    /// Records for one route, newest first.
    async fn list_for_route(
        &self,
        code: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ExchangeRecord>, StoreError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_session(&self, id: &str) -> Result<Option<Session>, StoreError>;
}

/// Handles to the three store collaborators.
#[derive(Clone)]
pub struct Stores {
    pub routes: Arc<dyn RouteStore>,
    pub exchanges: Arc<dyn ExchangeStore>,
    pub sessions: Arc<dyn SessionStore>,
}

impl Stores {
    /// Back all three collaborators with one in-memory store.
    pub fn in_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            routes: store.clone(),
            exchanges: store.clone(),
            sessions: store,
        }
    }
}
