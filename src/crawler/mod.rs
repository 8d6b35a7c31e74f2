//! Crawler module for directory harvesting
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching bound to the current egress route
//! - HTML parsing for entity links and website fields
//! - Per-target crawl state that survives egress rotation
//! - The quota-driven page loop with gap retry

mod controller;
mod fetcher;
mod parser;
mod state;
mod target;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{CrawlSettings, QuotaCrawler};
pub use fetcher::{
    build_http_client, FetchError, FetchedPage, FetcherFactory, HttpFetcher, HttpFetcherFactory,
    PageFetcher,
};
pub use parser::{HtmlParser, PageParser};
pub use state::{CrawlState, Phase, TargetCounters};
pub use target::Target;
