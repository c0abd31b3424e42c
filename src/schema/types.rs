use crate::schema::transform::{ListFormatter, Transform};
use serde_json::Value;
use std::time::Duration;

/// One extracted item: field name to value, in field declaration order
pub type Record = serde_json::Map<String, Value>;

/// Declarative description of what to extract and how to traverse
#[derive(Debug, Clone)]
pub struct Schema {
    /// Selector identifying the repeated item nodes of a page
    pub base_selector: String,

    /// Extraction rules, evaluated in order for every item node
    pub fields: Vec<FieldSpec>,

    /// How to reach further pages, if any
    pub pagination: Option<PaginationSpec>,
}

impl Schema {
    pub fn new(base_selector: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            base_selector: base_selector.into(),
            fields,
            pagination: None,
        }
    }

    pub fn with_pagination(mut self, pagination: PaginationSpec) -> Self {
        self.pagination = Some(pagination);
        self
    }

    /// Checks the schema for configuration errors (see [`crate::schema::validate_schema`])
    pub fn validate(&self) -> crate::ConfigResult<()> {
        crate::schema::validate_schema(self)
    }
}

/// Value type a field is coerced to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldType {
    #[default]
    Text,
    Number,
    Json,
    List,
    Undefined,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Json => "json",
            Self::List => "list",
            Self::Undefined => "undefined",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "text" => Some(Self::Text),
            "number" => Some(Self::Number),
            "json" => Some(Self::Json),
            "list" => Some(Self::List),
            "undefined" => Some(Self::Undefined),
            _ => None,
        }
    }
}

/// What happens to a link field once its target has been evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FollowMode {
    /// The field's value becomes the list of nested records
    #[default]
    Attach,

    /// The nested records' fields are merged into the enclosing record and
    /// the link field itself is dropped
    Merge,
}

/// One named extraction rule
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,

    /// Selector relative to the item node; `None` uses the item node itself
    pub selector: Option<String>,

    /// Attribute to read instead of the rendered text
    pub attribute: Option<String>,

    pub field_type: FieldType,

    /// Applied to the raw extracted string before coercion
    pub preformatter: Option<Transform>,

    /// Applied to the coerced value
    pub postformatter: Option<Transform>,

    /// Used verbatim when the selector matches nothing
    pub default: Option<Value>,

    /// Nested fields evaluated against every node matched by a list field
    pub list_subfields: Option<Vec<FieldSpec>>,

    /// Aggregates every node matched by a list field into a single value
    pub list_formatter: Option<ListFormatter>,

    /// Schema evaluated against the document the field's URL points to
    pub follow_schema: Option<Box<Schema>>,

    pub follow_mode: FollowMode,

    /// Normalise an `undefined` value to a boolean by truthiness
    pub boolean: bool,
}

impl FieldSpec {
    /// Creates a field with no selector (reads the item node itself)
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            selector: None,
            attribute: None,
            field_type,
            preformatter: None,
            postformatter: None,
            default: None,
            list_subfields: None,
            list_formatter: None,
            follow_schema: None,
            follow_mode: FollowMode::default(),
            boolean: false,
        }
    }

    pub fn text(name: impl Into<String>, selector: impl Into<String>) -> Self {
        Self::new(name, FieldType::Text).with_selector(selector)
    }

    pub fn number(name: impl Into<String>, selector: impl Into<String>) -> Self {
        Self::new(name, FieldType::Number).with_selector(selector)
    }

    pub fn json(name: impl Into<String>, selector: impl Into<String>) -> Self {
        Self::new(name, FieldType::Json).with_selector(selector)
    }

    pub fn list(name: impl Into<String>, selector: impl Into<String>) -> Self {
        Self::new(name, FieldType::List).with_selector(selector)
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_preformatter(mut self, transform: Transform) -> Self {
        self.preformatter = Some(transform);
        self
    }

    pub fn with_postformatter(mut self, transform: Transform) -> Self {
        self.postformatter = Some(transform);
        self
    }

    pub fn with_subfields(mut self, subfields: Vec<FieldSpec>) -> Self {
        self.list_subfields = Some(subfields);
        self
    }

    pub fn with_list_formatter(mut self, formatter: ListFormatter) -> Self {
        self.list_formatter = Some(formatter);
        self
    }

    pub fn follow(mut self, schema: Schema) -> Self {
        self.follow_schema = Some(Box::new(schema));
        self
    }

    pub fn with_follow_mode(mut self, mode: FollowMode) -> Self {
        self.follow_mode = mode;
        self
    }

    pub fn as_boolean(mut self) -> Self {
        self.boolean = true;
        self
    }
}

/// How a field-level extraction failure is recovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Abort the page evaluation with the error
    Raise,

    /// Store `null` for the failing field
    #[default]
    Null,

    /// Leave the failing field out of the record
    SkipField,

    /// Drop the record that contains the failing field
    SkipRecord,
}

impl FailurePolicy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "raise" => Some(Self::Raise),
            "null" => Some(Self::Null),
            "skip-field" => Some(Self::SkipField),
            "skip-record" => Some(Self::SkipRecord),
            _ => None,
        }
    }
}

/// How a page that cannot be fetched affects a paginated run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchPolicy {
    /// Stop traversal and return what was accumulated so far
    #[default]
    Abort,

    /// Record the error and continue with the next page
    Skip,
}

impl FetchPolicy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "abort" => Some(Self::Abort),
            "skip" => Some(Self::Skip),
            _ => None,
        }
    }
}

/// The single pagination slot of a schema
#[derive(Debug, Clone, PartialEq)]
pub enum PaginationSpec {
    UrlTemplate(UrlPagination),
    ButtonClick(ButtonPagination),
    InfiniteScroll(ScrollPagination),
}

impl PaginationSpec {
    /// Interactive strategies need a browser session and run single-flight
    pub fn is_interactive(&self) -> bool {
        !matches!(self, Self::UrlTemplate(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::UrlTemplate(_) => "url_pagination",
            Self::ButtonClick(_) => "button_pagination",
            Self::InfiniteScroll(_) => "scroll_pagination",
        }
    }
}

/// Largest page range a URL template may span
pub const MAX_URL_PAGES: u32 = 10_000;

/// Templated-URL pagination over `[start_page, end_page]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPagination {
    pub page_placeholder: String,
    pub start_page: u32,
    pub end_page: u32,
}

impl UrlPagination {
    /// Number of pages in the range (0 when the range is inverted)
    pub fn page_count(&self) -> u64 {
        if self.start_page > self.end_page {
            0
        } else {
            u64::from(self.end_page - self.start_page) + 1
        }
    }
}

impl Default for UrlPagination {
    fn default() -> Self {
        Self {
            page_placeholder: "{page}".to_string(),
            start_page: 1,
            end_page: 1,
        }
    }
}

/// When "load more" pagination stops
///
/// The button disappearing always ends the run, whatever the condition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ButtonStop {
    /// Stop once the button can no longer be found
    #[default]
    NoButton,

    /// Stop after this many clicks
    Count(u32),

    /// Stop once an element matching this selector is present
    Element(String),
}

/// "Load more" button pagination
#[derive(Debug, Clone, PartialEq)]
pub struct ButtonPagination {
    pub button_selector: String,
    pub stop_condition: ButtonStop,
    pub retry_limit: u32,
    pub retry_scroll_distance: i64,
    pub retry_delay: Duration,
    pub cycle_delay: Duration,
    /// Scrolled before every click to bring the button into view (0 disables)
    pub scroll_distance: i64,
    /// Scrollable container; `None` scrolls the window
    pub scroll_selector: Option<String>,
}

impl ButtonPagination {
    pub fn new(button_selector: impl Into<String>) -> Self {
        Self {
            button_selector: button_selector.into(),
            stop_condition: ButtonStop::NoButton,
            retry_limit: 3,
            retry_scroll_distance: 0,
            retry_delay: Duration::from_secs(1),
            cycle_delay: Duration::from_secs(1),
            scroll_distance: 0,
            scroll_selector: None,
        }
    }
}

/// When infinite-scroll pagination stops
///
/// Running out of retries without new items always ends the run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScrollStop {
    /// Stop once scrolling no longer produces new item nodes
    #[default]
    NoNewElements,

    /// Stop after this many scroll cycles
    Count(u32),

    /// Stop once an element matching this selector is present
    Element(String),
}

/// Infinite-scroll pagination
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollPagination {
    pub stop_condition: ScrollStop,
    pub scroll_distance: i64,
    pub retry_limit: u32,
    pub scroll_delay: Duration,
    pub retry_scroll_distance: i64,
    /// Scrollable container; `None` scrolls the window
    pub scroll_selector: Option<String>,
}

impl Default for ScrollPagination {
    fn default() -> Self {
        Self {
            stop_condition: ScrollStop::NoNewElements,
            scroll_distance: 1000,
            retry_limit: 3,
            scroll_delay: Duration::from_millis(1500),
            retry_scroll_distance: 0,
            scroll_selector: None,
        }
    }
}
