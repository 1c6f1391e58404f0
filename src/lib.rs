//! Intercepting reverse proxy library.
//!
//! Requests to `/{code}/...` are forwarded to the origin registered under
//! `code`, and every exchange is captured into an audit record.

pub mod admin;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;
pub mod store;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
