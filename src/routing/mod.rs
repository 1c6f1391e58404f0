//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → resolver.rs (split "/{code}/{rest}", skip reserved prefixes)
//!     → RouteStore::get(code)
//!     → Return: active Route or NotFound
//! ```
//!
//! # Design Decisions
//! - Routes are looked up on every request, never cached, so deactivation
//!   takes effect immediately
//! - Inactive and absent routes are indistinguishable to the caller
//! - Reserved prefixes are checked before any store access

pub mod resolver;

pub use resolver::{parse_routing_key, resolve, RoutingKey};
