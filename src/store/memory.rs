//! In-memory store with optional JSON snapshot persistence.

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::store::model::{ExchangeRecord, Route, Session};
use crate::store::{ExchangeStore, RouteStore, SessionStore, StoreError};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    routes: Vec<Route>,
    #[serde(default)]
    sessions: Vec<Session>,
}

/// A thread-safe store for routes, sessions and exchange records.
///
/// Exchange records are kept per route in a bounded ring; they are not part
/// of the snapshot.
pub struct MemoryStore {
    routes: DashMap<String, Route>,
    sessions: DashMap<String, Session>,
    exchanges: DashMap<String, VecDeque<ExchangeRecord>>,
    max_records_per_route: usize,
    snapshot_path: Option<String>,
}

impl MemoryStore {
    pub fn new(max_records_per_route: usize, snapshot_path: Option<String>) -> Self {
        Self {
            routes: DashMap::new(),
            sessions: DashMap::new(),
            exchanges: DashMap::new(),
            max_records_per_route: max_records_per_route.max(1),
            snapshot_path,
        }
    }

    /// Create a store and load the snapshot at `path` if it exists.
    pub fn load_from_file(path: &str, max_records_per_route: usize) -> Result<Self, StoreError> {
        let store = Self::new(max_records_per_route, Some(path.to_string()));
        if Path::new(path).exists() {
            let reader = BufReader::new(File::open(path)?);
            let snapshot: Snapshot = serde_json::from_reader(reader)?;
            for route in snapshot.routes {
                store.routes.insert(route.code.clone(), route);
            }
            for session in snapshot.sessions {
                store.sessions.insert(session.id.clone(), session);
            }
            tracing::info!(
                routes = store.routes.len(),
                sessions = store.sessions.len(),
                path,
                "Loaded store snapshot"
            );
        }
        Ok(store)
    }

    /// Write routes and sessions to the snapshot path, if configured.
    pub fn save_to_file(&self) -> Result<(), StoreError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let snapshot = Snapshot {
            routes: self.routes.iter().map(|r| r.value().clone()).collect(),
            sessions: self.sessions.iter().map(|s| s.value().clone()).collect(),
        };
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &snapshot)?;
        tracing::info!(routes = snapshot.routes.len(), path = %path, "Saved store snapshot");
        Ok(())
    }

    /// Register a session issued by the auth collaborator.
    pub fn insert_session(&self, session: Session) {
        self.sessions.insert(session.id.clone(), session);
    }

    /// Total exchange records held, across routes.
    pub fn exchange_count(&self) -> usize {
        self.exchanges.iter().map(|e| e.value().len()).sum()
    }

    /// Exchange records per route code.
    pub fn exchange_summary(&self) -> HashMap<String, usize> {
        self.exchanges
            .iter()
            .map(|e| (e.key().clone(), e.value().len()))
            .collect()
    }
}

#[async_trait]
impl RouteStore for MemoryStore {
    async fn get(&self, code: &str) -> Result<Option<Route>, StoreError> {
        Ok(self.routes.get(code).map(|r| r.value().clone()))
    }

    async fn list(&self, owner: Option<&str>) -> Result<Vec<Route>, StoreError> {
        let mut routes: Vec<Route> = self
            .routes
            .iter()
            .filter(|r| owner.map_or(true, |o| r.owner == o))
            .map(|r| r.value().clone())
            .collect();
        routes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(routes)
    }

    async fn insert(&self, route: Route) -> Result<Route, StoreError> {
        use dashmap::mapref::entry::Entry;

        match self.routes.entry(route.code.clone()) {
            Entry::Occupied(_) => Err(StoreError::Conflict(format!("code '{}' already exists", route.code))),
            Entry::Vacant(slot) => {
                slot.insert(route.clone());
                Ok(route)
            }
        }
    }

    async fn set_active(&self, code: &str, active: bool) -> Result<Option<Route>, StoreError> {
        Ok(self.routes.get_mut(code).map(|mut r| {
            r.active = active;
            r.value().clone()
        }))
    }

    async fn delete(&self, code: &str) -> Result<bool, StoreError> {
        self.exchanges.remove(code);
        Ok(self.routes.remove(code).is_some())
    }
}

#[async_trait]
impl ExchangeStore for MemoryStore {
    async fn append(&self, record: ExchangeRecord) -> Result<(), StoreError> {
        let mut ring = self.exchanges.entry(record.route_code.clone()).or_default();
        if ring.len() >= self.max_records_per_route {
            ring.pop_front();
        }
        ring.push_back(record);
        Ok(())
    }

    async fn list_for_route(
        &self,
        code: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ExchangeRecord>, StoreError> {
        let Some(ring) = self.exchanges.get(code) else {
            return Ok(Vec::new());
        };
        let mut records: Vec<ExchangeRecord> = ring.iter().cloned().collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records.into_iter().skip(offset).take(limit).collect())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get_session(&self, id: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.get(id).map(|s| s.value().clone()))
    }
}
