//! Turns a job file into the library's schema and crawl options
//!
//! Transform names are resolved here, once, into the typed closures the
//! evaluator runs.

use crate::config::types::{
    ButtonPaginationConfig, FieldConfig, JobConfig, ScrollPaginationConfig, SchemaConfig,
    TransformNames, UrlPaginationConfig,
};
use crate::crawler::{CrawlOptions, Mode};
use crate::schema::{
    builtin, builtin_list_formatter, ButtonPagination, ButtonStop, FailurePolicy, FetchPolicy,
    FieldSpec, FieldType, FollowMode, PaginationSpec, Schema, ScrollPagination, ScrollStop,
    Transform, UrlPagination,
};
use crate::ConfigError;
use std::time::Duration;

impl JobConfig {
    /// Builds the extraction schema
    pub fn to_schema(&self) -> Result<Schema, ConfigError> {
        self.schema.to_schema()
    }

    /// Execution mode
    pub fn mode(&self) -> Result<Mode, ConfigError> {
        parse_mode(&self.crawl.mode, self.crawl.max_parallel)
    }

    /// Crawl policies, with the `[http]` headers already applied by the client
    pub fn crawl_options(&self) -> Result<CrawlOptions, ConfigError> {
        let field_failure = FailurePolicy::from_name(&self.crawl.field_failure).ok_or_else(|| {
            ConfigError::Validation(format!(
                "field-failure must be raise, null, skip-field or skip-record, got '{}'",
                self.crawl.field_failure
            ))
        })?;
        let fetch_failure = FetchPolicy::from_name(&self.crawl.fetch_failure).ok_or_else(|| {
            ConfigError::Validation(format!(
                "fetch-failure must be abort or skip, got '{}'",
                self.crawl.fetch_failure
            ))
        })?;

        Ok(CrawlOptions {
            field_failure,
            fetch_failure,
            max_cycles: self.crawl.max_cycles,
            ..CrawlOptions::default()
        })
    }
}

/// Parses a mode name; `max_parallel` only matters for `concurrent`
pub fn parse_mode(name: &str, max_parallel: u32) -> Result<Mode, ConfigError> {
    match name {
        "single" => Ok(Mode::Single),
        "sequential" => Ok(Mode::Sequential),
        "concurrent" => Ok(Mode::Concurrent {
            max_parallel: max_parallel as usize,
        }),
        other => Err(ConfigError::Validation(format!(
            "mode must be single, sequential or concurrent, got '{}'",
            other
        ))),
    }
}

impl SchemaConfig {
    pub fn to_schema(&self) -> Result<Schema, ConfigError> {
        let fields = self
            .fields
            .iter()
            .map(FieldConfig::to_field)
            .collect::<Result<Vec<_>, _>>()?;
        let mut schema = Schema::new(self.base_selector.clone(), fields);

        let tables = [
            self.url_pagination.is_some(),
            self.button_pagination.is_some(),
            self.scroll_pagination.is_some(),
        ];
        if tables.iter().filter(|set| **set).count() > 1 {
            return Err(ConfigError::Validation(
                "at most one of url-pagination, button-pagination and scroll-pagination may be set"
                    .to_string(),
            ));
        }

        if let Some(pagination) = &self.url_pagination {
            schema = schema.with_pagination(PaginationSpec::UrlTemplate(pagination.to_spec()));
        } else if let Some(pagination) = &self.button_pagination {
            schema = schema.with_pagination(PaginationSpec::ButtonClick(pagination.to_spec()?));
        } else if let Some(pagination) = &self.scroll_pagination {
            schema = schema.with_pagination(PaginationSpec::InfiniteScroll(pagination.to_spec()?));
        }

        Ok(schema)
    }
}

impl FieldConfig {
    pub fn to_field(&self) -> Result<FieldSpec, ConfigError> {
        let field_type = FieldType::from_name(&self.field_type).ok_or_else(|| {
            ConfigError::Validation(format!(
                "field '{}': unknown type '{}'",
                self.name, self.field_type
            ))
        })?;

        let mut field = FieldSpec::new(self.name.clone(), field_type);
        field.selector = self.selector.clone();
        field.attribute = self.attribute.clone();
        field.default = self.default.clone();
        field.boolean = self.boolean;

        if let Some(names) = &self.preformatter {
            field.preformatter = Some(chain(names)?);
        }
        if let Some(names) = &self.postformatter {
            field.postformatter = Some(chain(names)?);
        }
        if let Some(subfields) = &self.list_subfields {
            field.list_subfields = Some(
                subfields
                    .iter()
                    .map(FieldConfig::to_field)
                    .collect::<Result<Vec<_>, _>>()?,
            );
        }
        if let Some(name) = &self.list_formatter {
            field.list_formatter = Some(
                builtin_list_formatter(name)
                    .ok_or_else(|| ConfigError::UnknownTransform(name.clone()))?,
            );
        }
        if let Some(schema) = &self.follow_schema {
            field.follow_schema = Some(Box::new(schema.to_schema()?));
        }
        if let Some(mode) = &self.follow_mode {
            field.follow_mode = match mode.as_str() {
                "attach" => FollowMode::Attach,
                "merge" => FollowMode::Merge,
                other => {
                    return Err(ConfigError::Validation(format!(
                        "field '{}': follow-mode must be attach or merge, got '{}'",
                        self.name, other
                    )))
                }
            };
        }

        Ok(field)
    }
}

/// Resolves transform names into one transform applied left to right
fn chain(names: &TransformNames) -> Result<Transform, ConfigError> {
    let mut resolved = names
        .names()
        .iter()
        .map(|name| builtin(name).ok_or_else(|| ConfigError::UnknownTransform(name.clone())));
    let first = resolved
        .next()
        .ok_or_else(|| ConfigError::Validation("empty transform list".to_string()))??;
    resolved.try_fold(first, |chained, next| Ok(chained.then(next?)))
}

impl UrlPaginationConfig {
    pub fn to_spec(&self) -> UrlPagination {
        UrlPagination {
            page_placeholder: self.page_placeholder.clone(),
            start_page: self.start_page,
            end_page: self.end_page,
        }
    }
}

impl ButtonPaginationConfig {
    pub fn to_spec(&self) -> Result<ButtonPagination, ConfigError> {
        let stop_condition = match self.stop_condition.as_str() {
            "no-button" => ButtonStop::NoButton,
            "count" => ButtonStop::Count(self.click_count),
            "element" => ButtonStop::Element(stop_selector("button-pagination", self.stop_selector.as_deref())?),
            other => {
                return Err(ConfigError::Validation(format!(
                    "button-pagination stop-condition must be no-button, count or element, got '{}'",
                    other
                )))
            }
        };

        Ok(ButtonPagination {
            button_selector: self.button_selector.clone(),
            stop_condition,
            retry_limit: self.retry_limit,
            retry_scroll_distance: self.retry_scroll_distance,
            retry_delay: seconds("retry-delay", self.retry_delay)?,
            cycle_delay: seconds("cycle-delay", self.cycle_delay)?,
            scroll_distance: self.scroll_distance,
            scroll_selector: self.scroll_selector.clone(),
        })
    }
}

impl ScrollPaginationConfig {
    pub fn to_spec(&self) -> Result<ScrollPagination, ConfigError> {
        let stop_condition = match self.stop_condition.as_str() {
            "no-new-elements" => ScrollStop::NoNewElements,
            "count" => ScrollStop::Count(self.scroll_count),
            "element" => ScrollStop::Element(stop_selector("scroll-pagination", self.stop_selector.as_deref())?),
            other => {
                return Err(ConfigError::Validation(format!(
                    "scroll-pagination stop-condition must be no-new-elements, count or element, got '{}'",
                    other
                )))
            }
        };

        Ok(ScrollPagination {
            stop_condition,
            scroll_distance: self.scroll_distance,
            retry_limit: self.retry_limit,
            scroll_delay: seconds("scroll-delay", self.scroll_delay)?,
            retry_scroll_distance: self.retry_scroll_distance,
            scroll_selector: self.scroll_selector.clone(),
        })
    }
}

fn stop_selector(table: &str, selector: Option<&str>) -> Result<String, ConfigError> {
    selector.map(str::to_string).ok_or_else(|| {
        ConfigError::Validation(format!(
            "{} stop-condition = \"element\" needs a stop-selector",
            table
        ))
    })
}

fn seconds(key: &str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|_| {
        ConfigError::Validation(format!(
            "{} must be a non-negative number of seconds, got {}",
            key, value
        ))
    })
}
