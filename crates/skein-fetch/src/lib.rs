//! Skein Fetch
//!
//! Page retrieval for crawl workers. A [`Fetcher`] opens a URL and returns a
//! [`Page`]; whether the page is fetched as-is or rendered first is decided
//! per call, by the route or by the global force-dynamic flag.
//!
//! ```text
//! StrategyFetcher::open(url, render_dynamically)
//! ├── static  → HttpFetcher           (plain GET)
//! └── dynamic → RenderServiceFetcher  (GET {endpoint}?url=..., rendered HTML)
//! ```

mod error;
mod http;
mod page;
mod render;
mod strategy;

pub use error::FetchError;
pub use http::{DEFAULT_USER_AGENT, HttpFetcher};
pub use page::Page;
pub use render::RenderServiceFetcher;
pub use strategy::{Fetcher, Retrieval, StrategyFetcher};
