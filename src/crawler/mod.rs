//! Crawler module for fetching pages and orchestrating crawls
//!
//! This module contains the I/O side of the crate, including:
//! - HTTP fetching behind the [`Fetcher`] capability
//! - The [`BrowserDriver`] capability used by interactive pagination
//! - Link following into nested schemas
//! - Overall crawl coordination (single, sequential and concurrent modes)

mod coordinator;
mod driver;
mod fetcher;
mod follow;

pub use coordinator::{BrowserSession, CrawlOptions, CrawlOutcome, Crawler, Mode};
pub use driver::{BrowserDriver, WaitCondition};
pub use fetcher::{build_http_client, Fetcher, HttpFetcher};
pub use crate::pagination::StopReason;

pub(crate) use driver::navigate;
