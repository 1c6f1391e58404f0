//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming proxy request:
//!     → guardrail.rs (rate_limit.rs per-IP window, then limits.rs size and
//!                     content type)
//!     → [routing resolves the code]
//!     → access_control.rs (Authorizer: open or session-scoped)
//!     → headers.rs (allow-list forward headers, add X-Forwarded-*)
//!
//! Exchange logging:
//!     → headers.rs (strip sensitive headers before anything is recorded)
//! ```
//!
//! # Design Decisions
//! - Cheap header-only rejects run before any store access
//! - Fail closed: reject on any security check failure
//! - Inbound provenance headers are never trusted

pub mod access_control;
pub mod guardrail;
pub mod headers;
pub mod limits;
pub mod rate_limit;

pub use access_control::{AccessDecision, Authorizer, DenyReason, OpenAccess, Principal, SessionAccess};
pub use rate_limit::{RateDecision, RateLimiter};
