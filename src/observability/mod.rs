//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events, pretty or JSON)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Proxy pipeline, once per exchange:
//!     → exchange.rs (assemble ExchangeRecord, emit log event,
//!                    persist on a detached task)
//!
//! Consumers:
//!     → stdout (log aggregation)
//!     → Metrics endpoint (Prometheus scrape)
//!     → ExchangeStore (audit records)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through log events, error bodies and exchange records
//! - Metrics are cheap and always recorded; the exporter is optional
//! - Exchange persistence never blocks or fails a client response

pub mod exchange;
pub mod logging;
pub mod metrics;

pub use exchange::{ExchangeDraft, ExchangeLogger, ExchangeResponse};
