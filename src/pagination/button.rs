use crate::crawler::{navigate, BrowserDriver, WaitCondition};
use crate::extract::SchemaEvaluator;
use crate::pagination::{
    cycle_cap, inspect, scroll_by, Markers, PageStep, PaginationState, Paginator, Snapshot,
    StopReason,
};
use crate::schema::{ButtonPagination, ButtonStop, Schema};
use crate::CrawlError;
use async_trait::async_trait;
use url::Url;

/// "Load more" traversal over a live browser session
///
/// The first snapshot is taken right after navigation. Every following cycle
/// clicks the button and hands back the records of the items it added; a cycle
/// that adds no items (or fails transiently) is a stall and goes through the
/// retry policy. The button disappearing always ends the run, whatever the
/// configured stop condition.
pub struct ButtonPaginator<'d, 's, D: BrowserDriver + ?Sized> {
    driver: &'d mut D,
    schema: &'s Schema,
    spec: ButtonPagination,
    evaluator: SchemaEvaluator,
    start_url: Url,
    wait_for: Option<WaitCondition>,
    cap: usize,
    cycles: usize,
    retries: u32,
    seen: usize,
    pages: usize,
    button_visible: bool,
    stop_visible: bool,
    state: PaginationState,
    stop: StopReason,
}

impl<'d, 's, D: BrowserDriver + ?Sized> ButtonPaginator<'d, 's, D> {
    pub fn new(driver: &'d mut D, start_url: Url, schema: &'s Schema, spec: ButtonPagination) -> Self {
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
            button_visible: false,
            stop_visible: false,
            state: PaginationState::Init,
            stop: StopReason::Completed,
        }
    }

    /// Evaluates snapshots with `evaluator` (and its field failure policy)
    pub fn with_evaluator(mut self, evaluator: SchemaEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Waits for `condition` after navigating to the start URL
    pub fn with_wait(mut self, condition: Option<WaitCondition>) -> Self {
        self.wait_for = condition;
        self
    }

    /// Lowers the cycle cap; the hard cap still applies
    pub fn with_cycle_cap(mut self, cap: Option<usize>) -> Self {
        self.cap = cycle_cap(cap);
        self
    }

    /// Click attempts made so far
    pub fn cycles(&self) -> usize {
        self.cycles
    }

    fn finish(&mut self, reason: StopReason) -> PageStep<'s> {
        tracing::info!(
            "Button pagination finished after {} cycles: {}",
            self.cycles,
            reason
        );
        self.state = PaginationState::Done;
        self.stop = reason;
        PageStep::Done(reason)
    }

    fn fail(&mut self, error: CrawlError) -> PageStep<'s> {
        tracing::warn!("Button pagination failed: {}", error);
        self.state = PaginationState::Failed;
        self.stop = StopReason::Failed;
        PageStep::Failed(error)
    }

    /// The configured stop condition, if it holds for the latest snapshot
    fn stop_condition_met(&self) -> Option<StopReason> {
        match &self.spec.stop_condition {
            ButtonStop::NoButton => None,
            ButtonStop::Count(clicks) if self.cycles >= *clicks as usize => {
                Some(StopReason::CountReached)
            }
            ButtonStop::Element(_) if self.stop_visible => Some(StopReason::StopElement),
            _ => None,
        }
    }

    /// Records a snapshot; returns the page step if the item count grew
    fn accept(&mut self, snapshot: Snapshot<'s>) -> Option<PageStep<'s>> {
        self.button_visible = snapshot.button;
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
            button: Some(self.spec.button_selector.as_str()),
            stop: match &self.spec.stop_condition {
                ButtonStop::Element(selector) => Some(selector.as_str()),
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

    async fn click_cycle(&mut self) -> Result<Snapshot<'s>, CrawlError> {
        let container = self.spec.scroll_selector.as_deref();
        if self.spec.scroll_distance != 0 {
            scroll_by(&mut *self.driver, container, self.spec.scroll_distance).await?;
        }
        self.driver.click(&self.spec.button_selector).await?;
        self.driver.wait(self.spec.cycle_delay).await;
        self.capture().await
    }

    async fn retry(&mut self) -> Result<Snapshot<'s>, CrawlError> {
        let container = self.spec.scroll_selector.as_deref();
        if self.spec.retry_scroll_distance != 0 {
            scroll_by(&mut *self.driver, container, self.spec.retry_scroll_distance).await?;
        }
        self.driver.wait(self.spec.retry_delay).await;
        self.capture().await
    }
}

#[async_trait]
impl<'d, 's, D: BrowserDriver + ?Sized> Paginator<'s> for ButtonPaginator<'d, 's, D> {
    async fn next(&mut self) -> PageStep<'s> {
        if self.state.is_terminal() {
            return PageStep::Done(self.stop);
        }

        if self.state == PaginationState::Init {
            self.state = PaginationState::Fetching;
            tracing::info!("Starting button pagination at {}", self.start_url);
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
            if !self.button_visible {
                return self.finish(StopReason::NoButton);
            }
            if self.cycles >= self.cap {
                return self.finish(StopReason::CycleCap);
            }

            self.cycles += 1;
            self.state = PaginationState::Fetching;
            match self.click_cycle().await {
                Ok(snapshot) => {
                    if let Some(step) = self.accept(snapshot) {
                        tracing::debug!("Cycle {} loaded {} items", self.cycles, self.seen);
                        return step;
                    }
                    if !self.button_visible {
                        return self.finish(StopReason::NoButton);
                    }
                    if let Some(reason) = self.stop_condition_met() {
                        return self.finish(reason);
                    }
                    tracing::debug!("Cycle {} added no items", self.cycles);
                }
                Err(CrawlError::Driver(error)) if error.is_transient() => {
                    tracing::warn!("Cycle {} failed transiently: {}", self.cycles, error);
                }
                Err(error) => return self.fail(error),
            }

            if self.retries >= self.spec.retry_limit {
                return self.finish(StopReason::Stalled);
            }
            self.retries += 1;
            self.state = PaginationState::Retrying;
            tracing::info!(
                "Retrying button pagination ({}/{})",
                self.retries,
                self.spec.retry_limit
            );

            match self.retry().await {
                Ok(snapshot) => {
                    if let Some(step) = self.accept(snapshot) {
                        return step;
                    }
                }
                Err(CrawlError::Driver(error)) if error.is_transient() => {
                    tracing::warn!("Retry failed transiently: {}", error);
                }
                Err(error) => return self.fail(error),
            }
        }
    }

    fn state(&self) -> PaginationState {
        self.state
    }
}
