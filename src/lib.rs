//! Schema-Crawler: declarative record extraction from web pages
//!
//! This crate evaluates data-only extraction schemas against HTML documents,
//! follows links into nested schemas, and traverses multi-page sources
//! (templated URLs, "load more" buttons, infinite scroll) with bounded retries.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod pagination;
pub mod schema;

use thiserror::Error;

/// Main error type for Schema-Crawler operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Browser driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),
}

impl CrawlError {
    /// Short machine-friendly name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "configuration",
            Self::Fetch(_) => "fetch",
            Self::Extraction(_) => "extraction",
            Self::Driver(_) => "driver",
            Self::UrlParse(_) => "url",
        }
    }
}

/// Configuration-specific errors
///
/// These are always detected before the first request is sent.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Duplicate field name '{0}' in schema")]
    DuplicateField(String),

    #[error("List field '{0}' must set exactly one of list_subfields or list_formatter")]
    ListShape(String),

    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Unknown transform '{0}'")]
    UnknownTransform(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),
}

/// Transport failures reported by a [`crawler::Fetcher`]
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Connection failed for {url}: {message}")]
    Connect { url: String, message: String },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// Field-level extraction failures
///
/// These are recovered according to the configured
/// [`schema::FailurePolicy`] and never abort other records.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Field '{field}': selector '{selector}' matched nothing")]
    NoMatch { field: String, selector: String },

    #[error("Field '{field}': attribute '{attribute}' not present")]
    MissingAttribute { field: String, attribute: String },

    #[error("Field '{field}': cannot coerce {value} to {expected}")]
    Coercion {
        field: String,
        expected: &'static str,
        value: String,
    },

    #[error("Field '{field}': transform failed: {message}")]
    Transform { field: String, message: String },

    #[error("Field '{field}': '{value}' is not a followable link")]
    InvalidLink { field: String, value: String },

    #[error("Field '{field}': following {url} failed: {source}")]
    Follow {
        field: String,
        url: String,
        source: Box<CrawlError>,
    },
}

impl ExtractionError {
    /// Name of the field the error belongs to
    pub fn field(&self) -> &str {
        match self {
            Self::NoMatch { field, .. }
            | Self::MissingAttribute { field, .. }
            | Self::Coercion { field, .. }
            | Self::Transform { field, .. }
            | Self::InvalidLink { field, .. }
            | Self::Follow { field, .. } => field,
        }
    }
}

/// Failures reported by a [`crawler::BrowserDriver`]
#[derive(Debug, Error)]
pub enum DriverError {
    /// The action may succeed if retried (element detached, not clickable yet, ...)
    #[error("transient driver failure: {0}")]
    Transient(String),

    /// The session or the request itself is broken
    #[error("fatal driver failure: {0}")]
    Fatal(String),
}

impl DriverError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Result type alias for Schema-Crawler operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use crawler::{BrowserDriver, CrawlOutcome, Crawler, Fetcher, HttpFetcher, Mode, StopReason};
pub use extract::{Document, Page, SchemaEvaluator};
pub use schema::{FailurePolicy, FieldSpec, FieldType, PaginationSpec, Record, Schema};
