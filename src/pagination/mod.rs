//! Pagination controllers
//!
//! Each strategy is a small state machine (see [`PaginationState`]) behind the
//! common [`Paginator`] interface:
//! - [`UrlTemplatePaginator`] walks a templated URL over a page range
//! - [`ButtonPaginator`] clicks a "load more" button until a stop condition
//! - [`ScrollPaginator`] scrolls until a stop condition or a stall
//!
//! Controllers parse every document exactly once: the item count that drives
//! the stall decision and the records handed back come from the same parse.
//! Interactive strategies always stop within [`HARD_CYCLE_CAP`] cycles,
//! whatever their retry budget says.

mod button;
mod scroll;
mod state;
mod url_template;

#[cfg(test)]
mod testing;

pub use button::ButtonPaginator;
pub use scroll::ScrollPaginator;
pub use state::{PaginationState, StopReason};
pub use url_template::{page_urls, UrlTemplatePaginator};

use crate::crawler::{navigate, BrowserDriver, Fetcher, WaitCondition};
use crate::extract::{Document, Page, PageExtraction, SchemaEvaluator};
use crate::schema::Schema;
use crate::{CrawlError, DriverError};
use async_trait::async_trait;
use url::Url;

/// Upper bound on interactive cycles (clicks, scrolls and retries) per run
pub const HARD_CYCLE_CAP: usize = 1000;

/// Effective cycle cap: a requested cap may lower the hard cap, never raise it
pub fn cycle_cap(requested: Option<usize>) -> usize {
    requested.map_or(HARD_CYCLE_CAP, |cap| cap.min(HARD_CYCLE_CAP))
}

/// What a controller hands back on each call to [`Paginator::next`]
#[derive(Debug)]
pub enum PageStep<'s> {
    /// Records of a newly loaded document, links not yet followed
    ///
    /// Interactive snapshots are cumulative; their extraction only holds the
    /// item nodes no earlier snapshot produced.
    Page {
        url: Url,
        index: usize,
        extraction: PageExtraction<'s>,
    },

    /// A page that could not be loaded and was skipped
    Skipped { index: usize, error: CrawlError },

    /// Traversal stopped on a non-recoverable error
    Failed(CrawlError),

    /// Traversal finished; repeated calls keep returning this
    Done(StopReason),
}

/// Common contract of every pagination strategy
#[async_trait]
pub trait Paginator<'s>: Send {
    /// Produces the next extracted document, or a stop signal
    async fn next(&mut self) -> PageStep<'s>;

    fn state(&self) -> PaginationState;
}

/// Loads a page by URL; used by the URL template strategy
#[async_trait]
pub trait PageLoader: Send {
    async fn load(&mut self, url: &Url) -> Result<Page, CrawlError>;
}

/// Loads pages through a [`Fetcher`]
pub struct FetchLoader<'a, F: Fetcher + ?Sized> {
    fetcher: &'a F,
    headers: &'a [(String, String)],
}

impl<'a, F: Fetcher + ?Sized> FetchLoader<'a, F> {
    pub fn new(fetcher: &'a F, headers: &'a [(String, String)]) -> Self {
        Self { fetcher, headers }
    }
}

#[async_trait]
impl<'a, F: Fetcher + ?Sized> PageLoader for FetchLoader<'a, F> {
    async fn load(&mut self, url: &Url) -> Result<Page, CrawlError> {
        Ok(self.fetcher.fetch(url, self.headers).await?)
    }
}

/// Loads pages by navigating a browser session
pub struct DriverLoader<'a, D: BrowserDriver + ?Sized> {
    driver: &'a mut D,
    wait_for: Option<&'a WaitCondition>,
}

impl<'a, D: BrowserDriver + ?Sized> DriverLoader<'a, D> {
    pub fn new(driver: &'a mut D, wait_for: Option<&'a WaitCondition>) -> Self {
        Self { driver, wait_for }
    }
}

#[async_trait]
impl<'a, D: BrowserDriver + ?Sized> PageLoader for DriverLoader<'a, D> {
    async fn load(&mut self, url: &Url) -> Result<Page, CrawlError> {
        navigate(&mut *self.driver, url, self.wait_for).await?;
        Ok(self.driver.snapshot().await?)
    }
}

/// Selectors an interactive controller watches for in each snapshot
#[derive(Debug, Clone, Copy, Default)]
struct Markers<'a> {
    button: Option<&'a str>,
    stop: Option<&'a str>,
}

/// What an interactive controller learns from one snapshot
#[derive(Debug)]
struct Snapshot<'s> {
    url: Url,

    /// Item nodes matching the schema's base selector
    items: usize,

    /// Whether the pagination button is present
    button: bool,

    /// Whether the stop element is present
    stop: bool,

    /// Records of the items past `seen`; `None` when nothing new appeared
    extraction: Option<PageExtraction<'s>>,
}

/// Parses a snapshot once, checks its markers and extracts the items it added
///
/// `seen` is `None` for the first snapshot, which is always extracted.
fn inspect<'s>(
    page: &Page,
    schema: &'s Schema,
    evaluator: SchemaEvaluator,
    markers: Markers<'_>,
    seen: Option<usize>,
) -> Result<Snapshot<'s>, CrawlError> {
    let document = Document::parse(page);
    let items = document.count(&schema.base_selector)?;
    let present = |selector: Option<&str>| -> Result<bool, CrawlError> {
        match selector {
            Some(selector) => Ok(document.count(selector)? > 0),
            None => Ok(false),
        }
    };
    let button = present(markers.button)?;
    let stop = present(markers.stop)?;

    let extraction = match seen {
        None => Some(evaluator.evaluate(&document, schema)?),
        Some(seen) if items > seen => Some(evaluator.evaluate_from(&document, schema, seen)?),
        Some(_) => None,
    };

    Ok(Snapshot {
        url: page.url.clone(),
        items,
        button,
        stop,
        extraction,
    })
}

/// Scrolls the window, or the container matching `container`
async fn scroll_by<D: BrowserDriver + ?Sized>(
    driver: &mut D,
    container: Option<&str>,
    distance: i64,
) -> Result<(), DriverError> {
    match container {
        Some(selector) => driver.scroll_within(selector, distance).await,
        None => driver.scroll(distance).await,
    }
}
