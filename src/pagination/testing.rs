//! Scripted browser session for controller tests

use crate::crawler::BrowserDriver;
use crate::extract::Page;
use crate::DriverError;
use async_trait::async_trait;
use std::collections::VecDeque;
use url::Url;

/// Which interaction moves the session to its next frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Advance {
    Click,
    Scroll,
}

/// Replays a fixed sequence of rendered frames
///
/// Interactions move forward through `frames` and stick at the last one.
pub(crate) struct ScriptedDriver {
    frames: Vec<String>,
    current: usize,
    advance: Advance,
    pub(crate) click_errors: VecDeque<DriverError>,
    pub(crate) clicks: usize,
    pub(crate) scrolls: Vec<i64>,
    pub(crate) container_scrolls: Vec<(String, i64)>,
    pub(crate) visited: Vec<String>,
}

impl ScriptedDriver {
    pub(crate) fn new(advance: Advance, frames: Vec<String>) -> Self {
        Self {
            frames,
            current: 0,
            advance,
            click_errors: VecDeque::new(),
            clicks: 0,
            scrolls: Vec::new(),
            container_scrolls: Vec::new(),
            visited: Vec::new(),
        }
    }

    fn step(&mut self) {
        if self.current + 1 < self.frames.len() {
            self.current += 1;
        }
    }
}

/// A frame with `count` items, optionally followed by a "load more" button
pub(crate) fn frame(count: usize, button: bool) -> String {
    let mut html = String::from("<html><body><ul>");
    for i in 1..=count {
        html.push_str(&format!(r#"<li class="item">Item {}</li>"#, i));
    }
    html.push_str("</ul>");
    if button {
        html.push_str(r#"<button id="more">Load more</button>"#);
    }
    html.push_str("</body></html>");
    html
}

/// Marks a frame as the end of the feed
pub(crate) fn with_footer(frame: String) -> String {
    frame.replace("</body>", r#"<footer class="end">That's all</footer></body>"#)
}

#[async_trait]
impl BrowserDriver for ScriptedDriver {
    async fn goto(&mut self, url: &Url) -> Result<(), DriverError> {
        self.visited.push(url.to_string());
        self.current = 0;
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<(), DriverError> {
        if let Some(error) = self.click_errors.pop_front() {
            return Err(error);
        }
        if !self.frames[self.current].contains("<button") {
            return Err(DriverError::Transient(format!("no element matches '{}'", selector)));
        }
        self.clicks += 1;
        if self.advance == Advance::Click {
            self.step();
        }
        Ok(())
    }

    async fn scroll(&mut self, distance: i64) -> Result<(), DriverError> {
        self.scrolls.push(distance);
        if self.advance == Advance::Scroll && distance > 0 {
            self.step();
        }
        Ok(())
    }

    async fn scroll_within(&mut self, selector: &str, distance: i64) -> Result<(), DriverError> {
        self.container_scrolls.push((selector.to_string(), distance));
        if self.advance == Advance::Scroll && distance > 0 {
            self.step();
        }
        Ok(())
    }

    async fn snapshot(&mut self) -> Result<Page, DriverError> {
        let url = Url::parse("https://example.com/feed").map_err(|e| DriverError::Fatal(e.to_string()))?;
        Ok(Page::new(url, self.frames[self.current].clone()))
    }
}
