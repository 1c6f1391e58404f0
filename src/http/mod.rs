//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack, shared state)
//!     → request.rs (request ID, client context)
//!     → response.rs (CORS preflight, hardening headers)
//!     → proxy.rs (the proxy hop)
//!         → forward.rs (origin call)
//!         → capture.rs (mirror response stream for the exchange record)
//!     → Send to client
//! ```

pub mod capture;
pub mod forward;
pub mod proxy;
pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestId, RequestIdExt, RequestIdLayer, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
