//! Exchange logger: builds one `ExchangeRecord` per proxied request and
//! persists it without involving the client response.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use crate::observability::metrics;
use crate::store::{ExchangeOutcome, ExchangeRecord, ExchangeStore};

/// Request-side facts, captured before the origin is contacted.
#[derive(Debug, Clone)]
pub struct ExchangeDraft {
    pub request_id: String,
    pub route_code: String,
    pub resolved_origin_url: String,
    pub original_request_path: String,
    pub method: String,
    pub request_headers: BTreeMap<String, String>,
    pub request_body: Option<String>,
    /// Arrival of the request at the proxy.
    pub started: Instant,
}

/// Response-side facts, known once the stream has ended.
#[derive(Debug, Clone)]
pub struct ExchangeResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub outcome: ExchangeOutcome,
    pub error: Option<String>,
}

impl ExchangeDraft {
    pub fn finish(self, response: ExchangeResponse) -> ExchangeRecord {
        ExchangeRecord {
            id: Uuid::new_v4(),
            request_id: self.request_id,
            route_code: self.route_code,
            resolved_origin_url: self.resolved_origin_url,
            original_request_path: self.original_request_path,
            method: self.method,
            sanitized_request_headers: self.request_headers,
            request_body: self.request_body,
            response_status: response.status,
            sanitized_response_headers: response.headers,
            response_body: response.body,
            timestamp: Utc::now(),
            duration_ms: self.started.elapsed().as_millis() as u64,
            outcome: response.outcome,
            error: response.error,
        }
    }
}

/// Emits exchange records to the log and the exchange store.
#[derive(Clone)]
pub struct ExchangeLogger {
    store: Arc<dyn ExchangeStore>,
}

impl ExchangeLogger {
    pub fn new(store: Arc<dyn ExchangeStore>) -> Self {
        Self { store }
    }

    /// Log `record` and persist it on a detached task.
    ///
    /// Persistence failures go to the error log and a counter only.
    pub fn emit(&self, record: ExchangeRecord) {
        tracing::info!(
            request_id = %record.request_id,
            route_code = %record.route_code,
            method = %record.method,
            url = %record.original_request_path,
            target = %record.resolved_origin_url,
            status = record.response_status,
            duration_ms = record.duration_ms,
            outcome = ?record.outcome,
            "Exchange"
        );

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(request_id = %record.request_id, "No runtime available, exchange record dropped");
            metrics::record_persist_failure();
            return;
        };

        let store = self.store.clone();
        handle.spawn(async move {
            let request_id = record.request_id.clone();
            if let Err(e) = store.append(record).await {
                tracing::error!(request_id = %request_id, error = %e, "Failed to persist exchange record");
                metrics::record_persist_failure();
            }
        });
    }
}
