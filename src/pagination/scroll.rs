use crate::crawler::{navigate, BrowserDriver, WaitCondition};
use crate::extract::SchemaEvaluator;
use crate::pagination::{
    cycle_cap, inspect, scroll_by, Markers, PageStep, PaginationState, Paginator, Snapshot,
    StopReason,
};
use crate::schema::{Schema, ScrollPagination, ScrollStop};
use crate::CrawlError;
use async_trait::async_trait;
use url::Url;

/// Infinite-scroll traversal over a live browser session
///
/// Each cycle scrolls, waits and compares the number of item nodes with the
/// previous snapshot. Growth hands back the records of the new items; no
/// growth is a stall. Stalling past the retry budget ends the run under every
/// stop condition.
pub struct ScrollPaginator<'d, 's, D: BrowserDriver + ?Sized> {
    driver: &'d mut D,
    schema: &'s Schema,
    spec: ScrollPagination,
    evaluator: SchemaEvaluator,
    start_url: Url,
    wait_for: Option<WaitCondition>,
    cap: usize,
    cycles: usize,
    retries: u32,
    seen: usize,
    pages: usize,
    stop_visible: bool,
    state: PaginationState,
    stop: StopReason,
}

impl<'d, 's, D: BrowserDriver + ?Sized> ScrollPaginator<'d, 's, D> {
    pub fn new(driver: &'d mut D, start_url: Url, schema: &'s Schema, spec: ScrollPagination) -> Self {
        Self {
            driver,
            schema,
            spec,
            evaluator: SchemaEvaluator::default(),
            start_url,
            wait_for: None,
            cap: cycle_cap(None),
            cycles: 0,
            retries: 0,
            seen: 0,
            pages: 0,
            stop_visible: false,
            state: PaginationState::Init,
            stop: StopReason::Completed,
        }
    }

    pub fn with_evaluator(mut self, evaluator: SchemaEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_wait(mut self, condition: Option<WaitCondition>) -> Self {
        self.wait_for = condition;
        self
    }

    /// Lowers the cycle cap; the hard cap still applies
    pub fn with_cycle_cap(mut self, cap: Option<usize>) -> Self {
        self.cap = cycle_cap(cap);
        self
    }

    /// Scroll cycles made so far
    pub fn cycles(&self) -> usize {
        self.cycles
    }

    fn finish(&mut self, reason: StopReason) -> PageStep<'s> {
        tracing::info!(
            "Scroll pagination finished after {} cycles: {}",
            self.cycles,
            reason
        );
        self.state = PaginationState::Done;
        self.stop = reason;
        PageStep::Done(reason)
    }

    fn fail(&mut self, error: CrawlError) -> PageStep<'s> {
        tracing::warn!("Scroll pagination failed: {}", error);
        self.state = PaginationState::Failed;
        self.stop = StopReason::Failed;
        PageStep::Failed(error)
    }

    fn stop_condition_met(&self) -> Option<StopReason> {
        match &self.spec.stop_condition {
            ScrollStop::NoNewElements => None,
            ScrollStop::Count(scrolls) if self.cycles >= *scrolls as usize => {
                Some(StopReason::CountReached)
            }
            ScrollStop::Element(_) if self.stop_visible => Some(StopReason::StopElement),
            _ => None,
        }
    }

    /// Records a snapshot; returns the page step if the item count grew
    fn accept(&mut self, snapshot: Snapshot<'s>) -> Option<PageStep<'s>> {
        self.stop_visible = snapshot.stop;
        let extraction = snapshot.extraction?;

        let index = self.pages;
        self.seen = snapshot.items;
        self.pages += 1;
        self.retries = 0;
        self.state = PaginationState::Evaluating;
        Some(PageStep::Page {
            url: snapshot.url,
            index,
            extraction,
        })
    }

    async fn capture(&mut self) -> Result<Snapshot<'s>, CrawlError> {
        let page = self.driver.snapshot().await?;
        let markers = Markers {
            button: None,
            stop: match &self.spec.stop_condition {
                ScrollStop::Element(selector) => Some(selector.as_str()),
                _ => None,
            },
        };
        let seen = (self.pages > 0).then_some(self.seen);
        inspect(&page, self.schema, self.evaluator, markers, seen)
    }

    async fn load_first(&mut self) -> Result<Snapshot<'s>, CrawlError> {
        navigate(&mut *self.driver, &self.start_url, self.wait_for.as_ref()).await?;
        self.capture().await
    }

    async fn scroll_cycle(&mut self) -> Result<Snapshot<'s>, CrawlError> {
        let container = self.spec.scroll_selector.as_deref();
        scroll_by(&mut *self.driver, container, self.spec.scroll_distance).await?;
        self.driver.wait(self.spec.scroll_delay).await;
        self.capture().await
    }
}

#[async_trait]
impl<'d, 's, D: BrowserDriver + ?Sized> Paginator<'s> for ScrollPaginator<'d, 's, D> {
    async fn next(&mut self) -> PageStep<'s> {
        if self.state.is_terminal() {
            return PageStep::Done(self.stop);
        }

        if self.state == PaginationState::Init {
            self.state = PaginationState::Fetching;
            tracing::info!("Starting scroll pagination at {}", self.start_url);
            return match self.load_first().await {
                Ok(snapshot) => match self.accept(snapshot) {
                    Some(step) => step,
                    None => self.finish(StopReason::Completed),
                },
                Err(error) => self.fail(error),
            };
        }

        loop {
            self.state = PaginationState::Deciding;
            if let Some(reason) = self.stop_condition_met() {
                return self.finish(reason);
            }
            if self.cycles >= self.cap {
                return self.finish(StopReason::CycleCap);
            }

            self.cycles += 1;
            self.state = PaginationState::Fetching;
            match self.scroll_cycle().await {
                Ok(snapshot) => {
                    if let Some(step) = self.accept(snapshot) {
                        tracing::debug!("Scroll {} loaded {} items", self.cycles, self.seen);
                        return step;
                    }
                    if let Some(reason) = self.stop_condition_met() {
                        return self.finish(reason);
                    }
                    tracing::debug!("Scroll {} added no items", self.cycles);
                }
                Err(CrawlError::Driver(error)) if error.is_transient() => {
                    tracing::warn!("Scroll {} failed transiently: {}", self.cycles, error);
                }
                Err(error) => return self.fail(error),
            }

            if self.retries >= self.spec.retry_limit {
                return self.finish(StopReason::Stalled);
            }
            self.retries += 1;
            self.state = PaginationState::Retrying;
            tracing::info!(
                "Retrying scroll pagination ({}/{})",
                self.retries,
                self.spec.retry_limit
            );

            if self.spec.retry_scroll_distance != 0 {
                let container = self.spec.scroll_selector.as_deref();
                match scroll_by(&mut *self.driver, container, self.spec.retry_scroll_distance).await {
                    Ok(()) => {}
                    Err(error) if error.is_transient() => {
                        tracing::warn!("Retry scroll failed transiently: {}", error);
                    }
                    Err(error) => return self.fail(error.into()),
                }
            }
        }
    }

    fn state(&self) -> PaginationState {
        self.state
    }
}
