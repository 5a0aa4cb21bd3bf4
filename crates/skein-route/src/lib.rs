//! Skein Route
//!
//! A route is one kind of crawl step for one provider: how to build the page
//! URL for a query and how to turn the fetched page into items, spawned
//! operations and a next-page flag.
//!
//! Routes are registered once in an immutable [`RouteRegistry`] keyed by
//! `(provider, name)`. Transforms return raw JSON; [`sanitize`] validates and
//! normalizes it into an [`Extraction`] before the engine acts on it.
//!
//! Two kinds of routes are provided:
//! - any type implementing [`Route`] (or a closure wrapped in [`FnRoute`])
//! - [`SelectorRoute`], compiled from a declarative [`RouteDef`] of CSS selectors

mod error;
mod registry;
mod route;
mod sanitize;
mod selector;
mod template;

pub use error::{RouteError, TransformOutputError};
pub use registry::{RouteRegistry, RouteRegistryBuilder};
pub use route::{FnRoute, Route, RouteDescriptor};
pub use sanitize::{Extraction, sanitize};
pub use selector::{FieldRule, FollowRule, ItemRule, NextPageRule, RouteDef, SelectorRoute};
pub use template::UrlTemplate;
