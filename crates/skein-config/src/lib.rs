//! Skein Config
//!
//! Serializable configuration for the crawl engine, read from JSON files:
//! - engine settings (`--config=skein.json`): worker count, blueprints,
//!   rendering and retry behavior, fetch options
//! - route definitions (`--routes=routes.json`): declarative selector routes
//!
//! Every field has a default, so `{}` is a valid engine configuration.

mod engine;
mod error;
mod routes;

pub use engine::{BlueprintConfig, EngineConfig, FORCE_DYNAMIC_ENV, FetchConfig};
pub use error::ConfigError;
pub use routes::{RoutesFile, load_routes};
