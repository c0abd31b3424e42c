//! Thin adapter over `scraper`
//!
//! Everything the evaluators need from the DOM engine goes through here:
//! selecting nodes, reading rendered text and attributes, and resolving links.

use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use url::Url;

/// Raw page content handed over by a fetcher or a browser snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Final URL of the page (after redirects)
    pub url: Url,

    /// HTML source
    pub html: String,
}

impl Page {
    pub fn new(url: Url, html: impl Into<String>) -> Self {
        Self {
            url,
            html: html.into(),
        }
    }
}

/// A parsed HTML document together with the URLs needed to resolve links
pub struct Document {
    html: Html,
    url: Url,
    base_url: Url,
}

impl Document {
    /// Parses a page; parsing is lenient and never fails
    pub fn parse(page: &Page) -> Self {
        Self::from_html(&page.html, page.url.clone())
    }

    pub fn from_html(source: &str, url: Url) -> Self {
        let html = Html::parse_document(source);
        let base_url = extract_base_href(&html, &url).unwrap_or_else(|| url.clone());

        Self {
            html,
            url,
            base_url,
        }
    }

    /// URL the document was loaded from
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// URL relative links are resolved against (`<base href>` if present)
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// All nodes in the document matching `selector`, in document order
    pub fn select_all(&self, selector: &Selector) -> Vec<ElementRef<'_>> {
        self.html.select(selector).collect()
    }

    /// Number of nodes in the document matching `selector`
    pub fn count(&self, selector: &str) -> Result<usize, ConfigError> {
        let selector = compile_selector(selector)?;
        Ok(self.html.select(&selector).count())
    }

    /// Resolves a possibly relative link against the base URL
    ///
    /// Returns `None` for empty, fragment-only and non-HTTP(S) links.
    pub fn resolve(&self, href: &str) -> Option<Url> {
        resolve_link(href, &self.base_url)
    }
}

/// Parses a CSS selector, reporting malformed syntax as a configuration error
pub fn compile_selector(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

/// Selectors compiled during one evaluation pass
#[derive(Default)]
pub struct SelectorCache {
    compiled: HashMap<String, Selector>,
}

impl SelectorCache {
    pub fn get(&mut self, selector: &str) -> Result<&Selector, ConfigError> {
        match self.compiled.entry(selector.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => Ok(entry.insert(compile_selector(selector)?)),
        }
    }
}

/// Descendants of `node` matching `selector`, in document order
pub fn select<'a>(node: ElementRef<'a>, selector: &Selector) -> Vec<ElementRef<'a>> {
    node.select(selector).collect()
}

/// Rendered text of a node, trimmed
pub fn text(node: ElementRef<'_>) -> String {
    node.text().collect::<String>().trim().to_string()
}

/// Value of an attribute of a node
pub fn attribute(node: ElementRef<'_>, name: &str) -> Option<String> {
    node.value().attr(name).map(str::to_string)
}

fn extract_base_href(html: &Html, url: &Url) -> Option<Url> {
    let selector = Selector::parse("base[href]").ok()?;
    let href = html.select(&selector).next()?.value().attr("href")?;
    url.join(href.trim()).ok()
}

fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    match absolute.scheme() {
        "http" | "https" => Some(absolute),
        _ => None,
    }
}
