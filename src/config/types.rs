use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

/// A crawl job: where to start, how to fetch and what to extract
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub http: HttpConfig,
    pub schema: SchemaConfig,
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    /// Start URL; with url pagination it must contain the page placeholder
    pub url: String,

    /// Execution mode: single, sequential or concurrent
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Maximum number of pages fetched at once in concurrent mode
    #[serde(rename = "max-parallel", default = "default_max_parallel")]
    pub max_parallel: u32,

    /// Field failure policy: raise, null, skip-field or skip-record
    #[serde(rename = "field-failure", default = "default_field_failure")]
    pub field_failure: String,

    /// Page failure policy: abort or skip
    #[serde(rename = "fetch-failure", default = "default_fetch_failure")]
    pub fetch_failure: String,

    /// Lowers the cycle cap of interactive pagination
    #[serde(rename = "max-cycles", default)]
    pub max_cycles: Option<usize>,
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Total request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connection timeout (seconds)
    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Headers sent with every request
    #[serde(default, deserialize_with = "header_table")]
    pub headers: Vec<(String, String)>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            headers: Vec::new(),
        }
    }
}

/// Extraction schema as written in a job file
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaConfig {
    #[serde(rename = "base-selector")]
    pub base_selector: String,

    #[serde(default)]
    pub fields: Vec<FieldConfig>,

    #[serde(rename = "url-pagination", default)]
    pub url_pagination: Option<UrlPaginationConfig>,

    #[serde(rename = "button-pagination", default)]
    pub button_pagination: Option<ButtonPaginationConfig>,

    #[serde(rename = "scroll-pagination", default)]
    pub scroll_pagination: Option<ScrollPaginationConfig>,
}

/// One field of a schema
#[derive(Debug, Clone, Deserialize)]
pub struct FieldConfig {
    pub name: String,

    #[serde(default)]
    pub selector: Option<String>,

    #[serde(default)]
    pub attribute: Option<String>,

    /// text, number, json, list or undefined
    #[serde(rename = "type", default = "default_field_type")]
    pub field_type: String,

    #[serde(default)]
    pub preformatter: Option<TransformNames>,

    #[serde(default)]
    pub postformatter: Option<TransformNames>,

    #[serde(default)]
    pub default: Option<serde_json::Value>,

    #[serde(rename = "list-subfields", default)]
    pub list_subfields: Option<Vec<FieldConfig>>,

    #[serde(rename = "list-formatter", default)]
    pub list_formatter: Option<String>,

    #[serde(rename = "follow-schema", default)]
    pub follow_schema: Option<Box<SchemaConfig>>,

    /// attach or merge
    #[serde(rename = "follow-mode", default)]
    pub follow_mode: Option<String>,

    /// Normalise an undefined field to true/false
    #[serde(default)]
    pub boolean: bool,
}

/// A built-in transform name, or a chain of them applied in order
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TransformNames {
    One(String),
    Chain(Vec<String>),
}

impl TransformNames {
    pub fn names(&self) -> &[String] {
        match self {
            Self::One(name) => std::slice::from_ref(name),
            Self::Chain(names) => names,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UrlPaginationConfig {
    #[serde(rename = "page-placeholder", default = "default_page_placeholder")]
    pub page_placeholder: String,

    #[serde(rename = "start-page", default = "default_first_page")]
    pub start_page: u32,

    #[serde(rename = "end-page", default = "default_first_page")]
    pub end_page: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ButtonPaginationConfig {
    #[serde(rename = "button-selector")]
    pub button_selector: String,

    /// `no-button`, `count` or `element`
    #[serde(rename = "stop-condition", default = "default_button_stop")]
    pub stop_condition: String,

    /// Clicks before stopping when `stop-condition = "count"`
    #[serde(rename = "click-count", default = "default_stop_count")]
    pub click_count: u32,

    /// Element ending the run when `stop-condition = "element"`
    #[serde(rename = "stop-selector")]
    pub stop_selector: Option<String>,

    /// Scrollable container; the window when absent
    #[serde(rename = "scroll-selector")]
    pub scroll_selector: Option<String>,

    #[serde(rename = "retry-limit", default = "default_retry_limit")]
    pub retry_limit: u32,

    #[serde(rename = "retry-scroll-distance", default)]
    pub retry_scroll_distance: i64,

    /// Seconds
    #[serde(rename = "retry-delay", default = "default_button_delay")]
    pub retry_delay: f64,

    /// Seconds
    #[serde(rename = "cycle-delay", default = "default_button_delay")]
    pub cycle_delay: f64,

    #[serde(rename = "scroll-distance", default)]
    pub scroll_distance: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScrollPaginationConfig {
    /// `no-new-elements`, `count` or `element`
    #[serde(rename = "stop-condition", default = "default_scroll_stop")]
    pub stop_condition: String,

    #[serde(rename = "scroll-count", default = "default_stop_count")]
    pub scroll_count: u32,

    #[serde(rename = "stop-selector")]
    pub stop_selector: Option<String>,

    #[serde(rename = "scroll-selector")]
    pub scroll_selector: Option<String>,

    #[serde(rename = "scroll-distance", default = "default_scroll_distance")]
    pub scroll_distance: i64,

    #[serde(rename = "retry-limit", default = "default_retry_limit")]
    pub retry_limit: u32,

    /// Seconds
    #[serde(rename = "scroll-delay", default = "default_scroll_delay")]
    pub scroll_delay: f64,

    #[serde(rename = "retry-scroll-distance", default)]
    pub retry_scroll_distance: i64,
}

fn header_table<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    let table = BTreeMap::<String, String>::deserialize(deserializer)?;
    Ok(table.into_iter().collect())
}

fn default_mode() -> String {
    "sequential".to_string()
}

fn default_max_parallel() -> u32 {
    4
}

fn default_field_failure() -> String {
    "null".to_string()
}

fn default_fetch_failure() -> String {
    "abort".to_string()
}

fn default_user_agent() -> String {
    format!("schema-crawler/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_field_type() -> String {
    "text".to_string()
}

fn default_page_placeholder() -> String {
    "{page}".to_string()
}

fn default_first_page() -> u32 {
    1
}

fn default_button_stop() -> String {
    "no-button".to_string()
}

fn default_scroll_stop() -> String {
    "no-new-elements".to_string()
}

fn default_stop_count() -> u32 {
    5
}

fn default_retry_limit() -> u32 {
    3
}

fn default_button_delay() -> f64 {
    1.0
}

fn default_scroll_distance() -> i64 {
    1000
}

fn default_scroll_delay() -> f64 {
    1.5
}
