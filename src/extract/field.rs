//! Field-level extraction
//!
//! A field is evaluated in fixed steps: resolve the node(s), read the raw
//! string, run the preformatter, coerce, run the postformatter and finally
//! schedule a link follow when the field carries a nested schema.
//!
//! Link follows are not performed here. Evaluation is synchronous and pure; a
//! followed field keeps its resolved URL as value and is reported as a
//! [`Follow`] so the crawler can fetch the target and patch the record.

use crate::extract::coerce::coerce;
use crate::extract::dom::{self, Document, SelectorCache};
use crate::schema::{FailurePolicy, FieldSpec, FieldType, FollowMode, Record, Schema};
use crate::{CrawlError, ExtractionError};
use scraper::ElementRef;
use serde_json::Value;
use url::Url;

/// One step of a path from a record to a value inside it
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// A link whose target still has to be fetched and evaluated
#[derive(Debug, Clone)]
pub struct Follow<'s> {
    /// Location of the link field inside its record
    pub path: Vec<Segment>,

    /// Absolute URL of the target
    pub url: Url,

    /// Schema evaluated against the root of the target document
    pub schema: &'s Schema,

    pub mode: FollowMode,

    /// Name of the link field
    pub field: String,
}

impl<'s> Follow<'s> {
    fn under(mut self, segment: Segment) -> Self {
        self.path.insert(0, segment);
        self
    }
}

/// A field's value plus the follows found inside it
#[derive(Debug)]
pub struct FieldValue<'s> {
    pub value: Value,
    pub follows: Vec<Follow<'s>>,
}

impl<'s> FieldValue<'s> {
    fn plain(value: Value) -> Self {
        Self {
            value,
            follows: Vec::new(),
        }
    }
}

/// A record plus the follows found inside it
#[derive(Debug)]
pub struct Extracted<'s> {
    pub record: Record,
    pub follows: Vec<Follow<'s>>,
}

/// Evaluates field specifications against context nodes
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldEvaluator {
    policy: FailurePolicy,
}

impl FieldEvaluator {
    pub fn new(policy: FailurePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Evaluates one field against one context node
    ///
    /// Extraction problems are returned as [`CrawlError::Extraction`] and
    /// left to the caller's failure policy. Configuration problems (a
    /// selector that does not compile) are returned as
    /// [`CrawlError::Config`].
    pub fn evaluate<'s>(
        &self,
        context: ElementRef<'_>,
        field: &'s FieldSpec,
        document: &Document,
        cache: &mut SelectorCache,
    ) -> Result<FieldValue<'s>, CrawlError> {
        let nodes = match &field.selector {
            Some(selector) => dom::select(context, cache.get(selector)?),
            None => vec![context],
        };

        if field.field_type == FieldType::List {
            return self.evaluate_list(&nodes, field, document, cache);
        }

        let Some(node) = nodes.first().copied() else {
            return match &field.default {
                Some(default) => Ok(FieldValue::plain(default.clone())),
                None => Err(no_match(field).into()),
            };
        };

        let raw = match read_raw(node, field) {
            Some(raw) => raw,
            None => {
                return match &field.default {
                    Some(default) => Ok(FieldValue::plain(default.clone())),
                    None => Err(missing_attribute(field).into()),
                }
            }
        };

        let value = preformat(Value::String(raw), field)?;
        let value = coerce(value, field)?;
        let value = postformat(value, field)?;

        let mut follows = Vec::new();
        if let Some(schema) = &field.follow_schema {
            follows.push(Follow {
                path: Vec::new(),
                url: link_target(&value, field, document)?,
                schema,
                mode: field.follow_mode,
                field: field.name.clone(),
            });
        }

        Ok(FieldValue { value, follows })
    }

    /// Evaluates `fields` against `node` and assembles a record
    ///
    /// Returns `Ok(None)` when the record is dropped under
    /// [`FailurePolicy::SkipRecord`].
    pub fn evaluate_fields<'s>(
        &self,
        node: ElementRef<'_>,
        fields: &'s [FieldSpec],
        document: &Document,
        cache: &mut SelectorCache,
    ) -> Result<Option<Extracted<'s>>, CrawlError> {
        let mut record = Record::new();
        let mut follows = Vec::new();

        for field in fields {
            match self.evaluate(node, field, document, cache) {
                Ok(value) => {
                    follows.extend(
                        value
                            .follows
                            .into_iter()
                            .map(|f| f.under(Segment::Key(field.name.clone()))),
                    );
                    record.insert(field.name.clone(), value.value);
                }
                Err(CrawlError::Extraction(error)) => match self.policy {
                    FailurePolicy::Raise => return Err(error.into()),
                    FailurePolicy::Null => {
                        tracing::debug!("{}; storing null", error);
                        record.insert(field.name.clone(), Value::Null);
                    }
                    FailurePolicy::SkipField => {
                        tracing::debug!("{}; skipping field", error);
                    }
                    FailurePolicy::SkipRecord => {
                        tracing::debug!("{}; skipping record", error);
                        return Ok(None);
                    }
                },
                Err(other) => return Err(other),
            }
        }

        Ok(Some(Extracted { record, follows }))
    }

    fn evaluate_list<'s>(
        &self,
        nodes: &[ElementRef<'_>],
        field: &'s FieldSpec,
        document: &Document,
        cache: &mut SelectorCache,
    ) -> Result<FieldValue<'s>, CrawlError> {
        if nodes.is_empty() {
            if let Some(default) = &field.default {
                return Ok(FieldValue::plain(default.clone()));
            }
        }

        let mut result = if let Some(subfields) = &field.list_subfields {
            let mut items = Vec::with_capacity(nodes.len());
            let mut follows = Vec::new();

            for node in nodes {
                // Sub-records dropped by SkipRecord leave no gap
                if let Some(extracted) = self.evaluate_fields(*node, subfields, document, cache)? {
                    let index = items.len();
                    follows.extend(
                        extracted
                            .follows
                            .into_iter()
                            .map(|f| f.under(Segment::Index(index))),
                    );
                    items.push(Value::Object(extracted.record));
                }
            }

            FieldValue {
                value: Value::Array(items),
                follows,
            }
        } else if let Some(formatter) = &field.list_formatter {
            let mut values = Vec::with_capacity(nodes.len());
            for node in nodes {
                match read_raw(*node, field) {
                    Some(raw) => values.push(preformat(Value::String(raw), field)?),
                    None => {
                        if let Some(default) = &field.default {
                            values.push(default.clone());
                        }
                    }
                }
            }
            FieldValue::plain(formatter.apply(&values))
        } else {
            return Err(crate::ConfigError::ListShape(field.name.clone()).into());
        };

        result.value = postformat(result.value, field)?;
        Ok(result)
    }
}

fn read_raw(node: ElementRef<'_>, field: &FieldSpec) -> Option<String> {
    match &field.attribute {
        Some(attribute) => dom::attribute(node, attribute),
        None => Some(dom::text(node)),
    }
}

fn preformat(value: Value, field: &FieldSpec) -> Result<Value, ExtractionError> {
    match &field.preformatter {
        Some(transform) => transform.apply(value).map_err(|message| transform_error(field, message)),
        None => Ok(value),
    }
}

fn postformat(value: Value, field: &FieldSpec) -> Result<Value, ExtractionError> {
    match &field.postformatter {
        Some(transform) => transform.apply(value).map_err(|message| transform_error(field, message)),
        None => Ok(value),
    }
}

fn link_target(value: &Value, field: &FieldSpec, document: &Document) -> Result<Url, ExtractionError> {
    value
        .as_str()
        .and_then(|href| document.resolve(href))
        .ok_or_else(|| ExtractionError::InvalidLink {
            field: field.name.clone(),
            value: value.to_string(),
        })
}

fn no_match(field: &FieldSpec) -> ExtractionError {
    ExtractionError::NoMatch {
        field: field.name.clone(),
        selector: field.selector.clone().unwrap_or_default(),
    }
}

fn missing_attribute(field: &FieldSpec) -> ExtractionError {
    ExtractionError::MissingAttribute {
        field: field.name.clone(),
        attribute: field.attribute.clone().unwrap_or_default(),
    }
}

fn transform_error(field: &FieldSpec, message: String) -> ExtractionError {
    ExtractionError::Transform {
        field: field.name.clone(),
        message,
    }
}
