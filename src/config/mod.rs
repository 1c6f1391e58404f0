//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, apply PORT / ACCESS_MODE overrides)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → runtime policy shared via ArcSwap
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server swaps runtime policy (access mode stays fixed)
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Access posture is deployment-time only

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AccessConfig, AccessMode, AdminConfig, GuardrailConfig, ListenerConfig, ObservabilityConfig,
    ProxyConfig, RateLimitConfig, RoutingConfig, StoreConfig, TimeoutConfig,
};
pub use watcher::ConfigWatcher;
