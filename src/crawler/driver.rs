//! Interactive browser capability
//!
//! Button and scroll pagination mutate the state of a live page, so they are
//! driven through a [`BrowserDriver`] that is owned by exactly one pagination
//! run at a time. No driver implementation ships with this crate; callers plug
//! in their own (CDP, WebDriver, a test double, ...).

use crate::extract::{Document, Page};
use crate::DriverError;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use url::Url;

/// Interval between snapshots while waiting for a selector
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[async_trait]
pub trait BrowserDriver: Send {
    /// Navigates the session to `url`
    async fn goto(&mut self, url: &Url) -> Result<(), DriverError>;

    /// Clicks the first element matching `selector`
    async fn click(&mut self, selector: &str) -> Result<(), DriverError>;

    /// Scrolls the viewport vertically; negative distances scroll up
    async fn scroll(&mut self, distance: i64) -> Result<(), DriverError>;

    /// Scrolls inside the first element matching `selector`
    ///
    /// Drivers that cannot scroll a container keep this default, which fails.
    async fn scroll_within(&mut self, selector: &str, distance: i64) -> Result<(), DriverError> {
        let _ = distance;
        Err(DriverError::Fatal(format!(
            "scrolling inside '{}' is not supported by this driver",
            selector
        )))
    }

    /// Current rendered document
    async fn snapshot(&mut self) -> Result<Page, DriverError>;

    /// Suspends for `duration`
    async fn wait(&mut self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }

    /// Waits until `selector` matches at least one element or `timeout` passes
    ///
    /// The default implementation polls [`snapshot`](Self::snapshot).
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), DriverError> {
        let started = Instant::now();
        loop {
            let page = self.snapshot().await?;
            let found = Document::parse(&page)
                .count(selector)
                .map_err(|e| DriverError::Fatal(e.to_string()))?
                > 0;

            if found {
                return Ok(());
            }
            if started.elapsed() >= timeout {
                return Err(DriverError::Transient(format!(
                    "'{}' did not appear within {:?}",
                    selector, timeout
                )));
            }
            self.wait(WAIT_POLL_INTERVAL).await;
        }
    }
}

/// Condition awaited after every navigation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitCondition {
    pub selector: String,
    pub timeout: Duration,
}

impl WaitCondition {
    pub fn new(selector: impl Into<String>, timeout: Duration) -> Self {
        Self {
            selector: selector.into(),
            timeout,
        }
    }
}

/// Navigates and waits for the optional condition
pub(crate) async fn navigate<D: BrowserDriver + ?Sized>(
    driver: &mut D,
    url: &Url,
    wait_for: Option<&WaitCondition>,
) -> Result<(), DriverError> {
    driver.goto(url).await?;
    if let Some(condition) = wait_for {
        driver
            .wait_for(&condition.selector, condition.timeout)
            .await?;
    }
    Ok(())
}
