//! Crawl orchestration
//!
//! The [`Crawler`] drives repeated fetch → evaluate cycles:
//! - `Single`: one document, one evaluation pass
//! - `Sequential`: pages in traversal order through a pagination controller
//! - `Concurrent`: templated pages through a fixed-size permit pool, results
//!   reassembled by page index
//!
//! Interactive strategies need a live browser session and run through a
//! [`BrowserSession`], which owns the driver for the length of the run.

use crate::crawler::follow::LinkResolver;
use crate::crawler::{BrowserDriver, Fetcher, WaitCondition};
use crate::extract::SchemaEvaluator;
use crate::pagination::{
    page_urls, ButtonPaginator, DriverLoader, FetchLoader, PageStep, Paginator, ScrollPaginator,
    StopReason, UrlTemplatePaginator,
};
use crate::schema::{
    validate_schema, validate_start_url, FailurePolicy, FetchPolicy, PaginationSpec, Record, Schema,
};
use crate::{ConfigError, CrawlError};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, JoinSet};
use url::Url;

/// Execution mode of a crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Fetch and evaluate the start URL only; pagination is ignored
    Single,

    /// Follow the schema's pagination strictly in page order
    #[default]
    Sequential,

    /// Fetch templated pages in parallel, at most `max_parallel` at a time
    Concurrent { max_parallel: usize },
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Sequential => "sequential",
            Self::Concurrent { .. } => "concurrent",
        }
    }
}

/// Per-crawl policies
#[derive(Debug, Clone, Default)]
pub struct CrawlOptions {
    /// What happens to a field (or followed link) that fails to extract
    pub field_failure: FailurePolicy,

    /// What happens to a page that fails to load
    pub fetch_failure: FetchPolicy,

    /// Extra headers sent with every request
    pub headers: Vec<(String, String)>,

    /// Lowers the hard cycle cap of interactive pagination
    pub max_cycles: Option<usize>,

    /// Awaited after every browser navigation
    pub wait_for: Option<WaitCondition>,
}

/// Result of a crawl
#[derive(Debug)]
pub struct CrawlOutcome {
    /// Records in page order, then document order
    pub records: Vec<Record>,

    /// Pages (or snapshots) evaluated
    pub pages: usize,

    pub stop: StopReason,

    /// The error that ended the traversal when `stop` is `Failed`
    pub error: Option<CrawlError>,

    /// Pages skipped under [`FetchPolicy::Skip`], in page order
    pub errors: Vec<CrawlError>,
}

impl Default for CrawlOutcome {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            pages: 0,
            stop: StopReason::Completed,
            error: None,
            errors: Vec::new(),
        }
    }
}

impl CrawlOutcome {
    /// Returns true if the traversal ended gracefully
    pub fn is_success(&self) -> bool {
        self.stop.is_graceful()
    }

    fn fail(&mut self, error: CrawlError) {
        self.stop = StopReason::Failed;
        self.error = Some(error);
    }
}

/// Orchestrates fetch → evaluate cycles over a [`Fetcher`]
pub struct Crawler<F: Fetcher> {
    fetcher: Arc<F>,
    options: CrawlOptions,
}

impl<F: Fetcher + 'static> Crawler<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            options: CrawlOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CrawlOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &CrawlOptions {
        &self.options
    }

    fn evaluator(&self) -> SchemaEvaluator {
        SchemaEvaluator::new(self.options.field_failure)
    }

    /// Crawls `url` with `schema`
    ///
    /// The schema is validated before anything is fetched. In paginated
    /// modes every failure after that (a page that cannot be loaded, a field
    /// or followed link failing under [`FailurePolicy::Raise`]) is reported in
    /// the outcome (`stop`, `error`, `errors`) and keeps the records of the
    /// pages before it. Only configuration errors and a failed `Single` page
    /// are returned as `Err`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use schema_crawler::config::HttpConfig;
    /// use schema_crawler::crawler::{Crawler, HttpFetcher, Mode};
    /// use schema_crawler::schema::{FieldSpec, Schema};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let fetcher = HttpFetcher::from_config(&HttpConfig::default())?;
    /// let schema = Schema::new("div.product", vec![FieldSpec::text("name", "h3 > a")]);
    /// let outcome = Crawler::new(fetcher)
    ///     .fetch("https://example.com/products", &schema, Mode::Single)
    ///     .await?;
    /// println!("{} records", outcome.records.len());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn fetch(&self, url: &str, schema: &Schema, mode: Mode) -> Result<CrawlOutcome, CrawlError> {
        validate_schema(schema)?;
        tracing::info!("Crawling {} ({} mode)", url, mode.as_str());

        let outcome = match mode {
            Mode::Single => self.fetch_single(url, schema).await?,
            Mode::Sequential => self.fetch_sequential(url, schema).await?,
            Mode::Concurrent { max_parallel } => self.fetch_concurrent(url, schema, max_parallel).await?,
        };

        tracing::info!(
            "Crawl finished: {} records from {} pages ({})",
            outcome.records.len(),
            outcome.pages,
            outcome.stop
        );
        Ok(outcome)
    }

    /// Opens a browser session for interactive pagination
    ///
    /// The session borrows the driver exclusively, so a driver can never be
    /// used by two runs at once.
    pub fn session<'c, 'd, D: BrowserDriver + ?Sized>(&'c self, driver: &'d mut D) -> BrowserSession<'c, 'd, F, D> {
        BrowserSession { crawler: self, driver }
    }

    async fn fetch_single(&self, url: &str, schema: &Schema) -> Result<CrawlOutcome, CrawlError> {
        let url = Url::parse(url)?;
        let page = self.fetcher.fetch(&url, &self.options.headers).await?;
        let evaluator = self.evaluator();
        let extraction = evaluator.evaluate_page(&page, schema)?;
        let records = LinkResolver::new(self.fetcher.as_ref(), &self.options.headers, evaluator)
            .resolve(extraction)
            .await?;

        Ok(CrawlOutcome {
            records,
            pages: 1,
            ..CrawlOutcome::default()
        })
    }

    async fn fetch_sequential(&self, url: &str, schema: &Schema) -> Result<CrawlOutcome, CrawlError> {
        let urls = match &schema.pagination {
            None => vec![Url::parse(url)?],
            Some(PaginationSpec::UrlTemplate(spec)) => {
                validate_start_url(url, schema)?;
                page_urls(url, spec)?
            }
            Some(interactive) => {
                return Err(ConfigError::Unsupported(format!(
                    "{} pagination needs a browser session",
                    interactive.name()
                ))
                .into())
            }
        };

        let loader = FetchLoader::new(self.fetcher.as_ref(), &self.options.headers);
        let mut paginator = UrlTemplatePaginator::new(loader, schema, urls, self.options.fetch_failure)
            .with_evaluator(self.evaluator());
        Ok(self.drive(&mut paginator).await)
    }

    async fn fetch_concurrent(
        &self,
        url: &str,
        schema: &Schema,
        max_parallel: usize,
    ) -> Result<CrawlOutcome, CrawlError> {
        let Some(PaginationSpec::UrlTemplate(spec)) = &schema.pagination else {
            return Err(ConfigError::Unsupported(
                "concurrent mode requires url pagination".to_string(),
            )
            .into());
        };
        if max_parallel == 0 {
            return Err(ConfigError::Validation("max-parallel must be at least 1".to_string()).into());
        }
        validate_start_url(url, schema)?;
        let urls = page_urls(url, spec)?;
        let total = urls.len();

        let schema = Arc::new(schema.clone());
        let headers: Arc<[(String, String)]> = self.options.headers.clone().into();
        let permits = max_parallel.min(total.max(1)).min(Semaphore::MAX_PERMITS);
        let semaphore = Arc::new(Semaphore::new(permits));
        let evaluator = self.evaluator();
        let skip_failed_fetches = matches!(self.options.fetch_failure, FetchPolicy::Skip);

        let mut pending = urls.into_iter().enumerate();
        let mut tasks = JoinSet::new();
        let mut handles: Vec<(usize, AbortHandle)> = Vec::with_capacity(total);
        let mut results: Vec<Option<Result<Vec<Record>, CrawlError>>> = (0..total).map(|_| None).collect();
        // Lowest page index whose failure ends the crawl
        let mut stop_at: Option<usize> = None;

        loop {
            while stop_at.is_none() {
                let Ok(permit) = Arc::clone(&semaphore).try_acquire_owned() else {
                    break;
                };
                let Some((index, url)) = pending.next() else {
                    break;
                };
                let fetcher = Arc::clone(&self.fetcher);
                let schema = Arc::clone(&schema);
                let headers = Arc::clone(&headers);

                let handle = tasks.spawn(async move {
                    let _permit = permit;
                    tracing::debug!("Fetching page {}/{}: {}", index + 1, total, url);
                    let result = crawl_page(fetcher.as_ref(), &url, &schema, &headers, evaluator).await;
                    (index, result)
                });
                handles.push((index, handle));
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            match joined {
                Ok((index, result)) => {
                    let ends_crawl = match &result {
                        Ok(_) => false,
                        Err(CrawlError::Fetch(_)) => !skip_failed_fetches,
                        Err(_) => true,
                    };
                    if ends_crawl {
                        let cut = stop_at.map_or(index, |at| at.min(index));
                        stop_at = Some(cut);
                        let mut aborted = 0;
                        for (_, handle) in handles.iter().filter(|(i, _)| *i > cut) {
                            handle.abort();
                            aborted += 1;
                        }
                        tracing::debug!("Page {} ends the crawl, cancelling {} later pages", index + 1, aborted);
                    }
                    results[index] = Some(result);
                }
                Err(error) if error.is_panic() => std::panic::resume_unwind(error.into_panic()),
                Err(error) => tracing::debug!("Page task cancelled: {}", error),
            }
        }

        let mut outcome = CrawlOutcome::default();
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Some(Ok(records)) => {
                    outcome.pages += 1;
                    outcome.records.extend(records);
                }
                Some(Err(CrawlError::Fetch(error))) if skip_failed_fetches => {
                    tracing::warn!("Skipping page {}: {}", index + 1, error);
                    outcome.errors.push(error.into());
                }
                Some(Err(error)) => {
                    tracing::warn!("Page {} failed, stopping: {}", index + 1, error);
                    outcome.fail(error);
                    break;
                }
                None => break,
            }
        }
        Ok(outcome)
    }

    /// Resolves the links of every page a controller produces until it stops
    ///
    /// A failure ends the traversal; records of earlier pages are kept.
    async fn drive<'s, P: Paginator<'s> + ?Sized>(&self, paginator: &mut P) -> CrawlOutcome {
        let resolver = LinkResolver::new(self.fetcher.as_ref(), &self.options.headers, self.evaluator());
        let mut outcome = CrawlOutcome::default();
        loop {
            match paginator.next().await {
                PageStep::Page {
                    url,
                    index,
                    extraction,
                } => {
                    tracing::debug!(
                        "Evaluated {}: {} records, {} links to follow",
                        url,
                        extraction.len(),
                        extraction.pending_follows()
                    );
                    match resolver.resolve(extraction).await {
                        Ok(records) => {
                            tracing::debug!("Page {} produced {} records", index + 1, records.len());
                            outcome.pages += 1;
                            outcome.records.extend(records);
                        }
                        Err(error) => {
                            tracing::warn!("Page {} ({}) failed, stopping: {}", index + 1, url, error);
                            outcome.fail(error);
                            break;
                        }
                    }
                }
                PageStep::Skipped { error, .. } => outcome.errors.push(error),
                PageStep::Failed(error) => {
                    outcome.fail(error);
                    break;
                }
                PageStep::Done(reason) => {
                    outcome.stop = reason;
                    break;
                }
            }
        }
        outcome
    }
}

/// Fetches, evaluates and resolves one independent page
async fn crawl_page<F: Fetcher + ?Sized>(
    fetcher: &F,
    url: &Url,
    schema: &Schema,
    headers: &[(String, String)],
    evaluator: SchemaEvaluator,
) -> Result<Vec<Record>, CrawlError> {
    let page = fetcher.fetch(url, headers).await?;
    let extraction = evaluator.evaluate_page(&page, schema)?;
    LinkResolver::new(fetcher, headers, evaluator)
        .resolve(extraction)
        .await
}

/// A crawler bound to one browser session
///
/// Pages are loaded through the driver; followed links still go through the
/// crawler's [`Fetcher`].
pub struct BrowserSession<'c, 'd, F: Fetcher, D: BrowserDriver + ?Sized> {
    crawler: &'c Crawler<F>,
    driver: &'d mut D,
}

impl<'c, 'd, F: Fetcher + 'static, D: BrowserDriver + ?Sized> BrowserSession<'c, 'd, F, D> {
    /// Crawls `url` through the browser, following the schema's pagination
    pub async fn crawl(&mut self, url: &str, schema: &Schema) -> Result<CrawlOutcome, CrawlError> {
        validate_schema(schema)?;
        validate_start_url(url, schema)?;

        let crawler = self.crawler;
        let options = &crawler.options;
        let evaluator = crawler.evaluator();
        let wait_for = options.wait_for.clone();
        tracing::info!("Crawling {} in a browser session", url);

        let outcome = match &schema.pagination {
            Some(PaginationSpec::ButtonClick(spec)) => {
                let mut paginator = ButtonPaginator::new(&mut *self.driver, Url::parse(url)?, schema, spec.clone())
                    .with_evaluator(evaluator)
                    .with_wait(wait_for)
                    .with_cycle_cap(options.max_cycles);
                crawler.drive(&mut paginator).await
            }
            Some(PaginationSpec::InfiniteScroll(spec)) => {
                let mut paginator = ScrollPaginator::new(&mut *self.driver, Url::parse(url)?, schema, spec.clone())
                    .with_evaluator(evaluator)
                    .with_wait(wait_for)
                    .with_cycle_cap(options.max_cycles);
                crawler.drive(&mut paginator).await
            }
            Some(PaginationSpec::UrlTemplate(spec)) => {
                let urls = page_urls(url, spec)?;
                let loader = DriverLoader::new(&mut *self.driver, wait_for.as_ref());
                let mut paginator = UrlTemplatePaginator::new(loader, schema, urls, options.fetch_failure)
                    .with_evaluator(evaluator);
                crawler.drive(&mut paginator).await
            }
            None => {
                let loader = DriverLoader::new(&mut *self.driver, wait_for.as_ref());
                let mut paginator =
                    UrlTemplatePaginator::new(loader, schema, vec![Url::parse(url)?], options.fetch_failure)
                        .with_evaluator(evaluator);
                crawler.drive(&mut paginator).await
            }
        };

        tracing::info!(
            "Session crawl finished: {} records from {} pages ({})",
            outcome.records.len(),
            outcome.pages,
            outcome.stop
        );
        Ok(outcome)
    }
}
