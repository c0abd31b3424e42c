use crate::extract::SchemaEvaluator;
use crate::pagination::{PageLoader, PageStep, PaginationState, Paginator, StopReason};
use crate::schema::{FetchPolicy, Schema, UrlPagination, MAX_URL_PAGES};
use crate::{ConfigError, CrawlError};
use async_trait::async_trait;
use url::Url;

/// Generates the URL of every page in `[start_page, end_page]`
///
/// Pure and deterministic: each page number is substituted for every
/// occurrence of the placeholder, in ascending page order. Ranges wider than
/// [`MAX_URL_PAGES`] are rejected before anything is allocated.
///
/// # Example
///
/// ```
/// use schema_crawler::pagination::page_urls;
/// use schema_crawler::schema::UrlPagination;
///
/// let spec = UrlPagination { page_placeholder: "{page}".into(), start_page: 1, end_page: 3 };
/// let urls = page_urls("https://example.com/p?x={page}", &spec).unwrap();
/// assert_eq!(urls[2].as_str(), "https://example.com/p?x=3");
/// ```
pub fn page_urls(template: &str, spec: &UrlPagination) -> Result<Vec<Url>, CrawlError> {
    if !template.contains(&spec.page_placeholder) {
        return Err(ConfigError::InvalidUrl(format!(
            "'{}' does not contain the page placeholder '{}'",
            template, spec.page_placeholder
        ))
        .into());
    }
    if spec.page_count() > u64::from(MAX_URL_PAGES) {
        return Err(ConfigError::Validation(format!(
            "url pagination spans {} pages, more than the limit of {}",
            spec.page_count(),
            MAX_URL_PAGES
        ))
        .into());
    }

    (spec.start_page..=spec.end_page)
        .map(|page| {
            let url = template.replace(&spec.page_placeholder, &page.to_string());
            Url::parse(&url).map_err(CrawlError::from)
        })
        .collect()
}

/// Stateless templated-URL traversal
///
/// No retries happen here; a page that cannot be loaded is either skipped or
/// ends the traversal, depending on the [`FetchPolicy`]. A page that fails
/// evaluation always ends it.
pub struct UrlTemplatePaginator<'s, L: PageLoader> {
    loader: L,
    schema: &'s Schema,
    evaluator: SchemaEvaluator,
    urls: Vec<Url>,
    position: usize,
    policy: FetchPolicy,
    state: PaginationState,
    stop: StopReason,
}

impl<'s, L: PageLoader> UrlTemplatePaginator<'s, L> {
    pub fn new(loader: L, schema: &'s Schema, urls: Vec<Url>, policy: FetchPolicy) -> Self {
        Self {
            loader,
            schema,
            evaluator: SchemaEvaluator::default(),
            urls,
            position: 0,
            policy,
            state: PaginationState::Init,
            stop: StopReason::Completed,
        }
    }

    pub fn with_evaluator(mut self, evaluator: SchemaEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Number of pages the traversal will visit
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

impl<'s, L: PageLoader> UrlTemplatePaginator<'s, L> {
    fn fail(&mut self, error: CrawlError) -> PageStep<'s> {
        self.state = PaginationState::Failed;
        self.stop = StopReason::Failed;
        PageStep::Failed(error)
    }
}

#[async_trait]
impl<'s, L: PageLoader> Paginator<'s> for UrlTemplatePaginator<'s, L> {
    async fn next(&mut self) -> PageStep<'s> {
        if self.state.is_terminal() {
            return PageStep::Done(self.stop);
        }

        let Some(url) = self.urls.get(self.position).cloned() else {
            self.state = PaginationState::Done;
            self.stop = StopReason::Completed;
            return PageStep::Done(self.stop);
        };

        let index = self.position;
        self.position += 1;
        self.state = PaginationState::Fetching;
        tracing::debug!("Fetching page {}/{}: {}", index + 1, self.urls.len(), url);

        match self.loader.load(&url).await {
            Ok(page) => {
                self.state = PaginationState::Evaluating;
                match self.evaluator.evaluate_page(&page, self.schema) {
                    Ok(extraction) => PageStep::Page {
                        url: page.url,
                        index,
                        extraction,
                    },
                    Err(error) => {
                        tracing::warn!("Page {} ({}) failed evaluation: {}", index + 1, url, error);
                        self.fail(error)
                    }
                }
            }
            Err(error) => match self.policy {
                FetchPolicy::Skip => {
                    tracing::warn!("Skipping page {} ({}): {}", index + 1, url, error);
                    self.state = PaginationState::Deciding;
                    PageStep::Skipped { index, error }
                }
                FetchPolicy::Abort => {
                    tracing::warn!("Page {} ({}) failed, stopping: {}", index + 1, url, error);
                    self.fail(error)
                }
            },
        }
    }

    fn state(&self) -> PaginationState {
        self.state
    }
}
