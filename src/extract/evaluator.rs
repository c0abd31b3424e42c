use crate::extract::dom::{Document, Page, SelectorCache};
use crate::extract::field::{Extracted, FieldEvaluator};
use crate::schema::{FailurePolicy, Record, Schema};
use crate::CrawlError;
use serde_json::Value;

/// Records extracted from one document, with their pending link follows
#[derive(Debug, Default)]
pub struct PageExtraction<'s> {
    pub records: Vec<Extracted<'s>>,
}

impl<'s> PageExtraction<'s> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of links that still have to be followed
    pub fn pending_follows(&self) -> usize {
        self.records.iter().map(|r| r.follows.len()).sum()
    }

    /// Drops pending follows; followed fields keep their resolved URL
    pub fn into_records(self) -> Vec<Record> {
        self.records.into_iter().map(|r| r.record).collect()
    }

    /// Records as JSON values (handy for comparisons and display)
    pub fn to_values(&self) -> Vec<Value> {
        self.records
            .iter()
            .map(|r| Value::Object(r.record.clone()))
            .collect()
    }
}

/// Evaluates a schema against a document, one record per item node
///
/// Evaluation never touches the network and is deterministic: the same
/// document and schema always produce the same extraction.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaEvaluator {
    fields: FieldEvaluator,
}

impl SchemaEvaluator {
    pub fn new(policy: FailurePolicy) -> Self {
        Self {
            fields: FieldEvaluator::new(policy),
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.fields.policy()
    }

    /// Parses a fetched page and evaluates it
    pub fn evaluate_page<'s>(
        &self,
        page: &Page,
        schema: &'s Schema,
    ) -> Result<PageExtraction<'s>, CrawlError> {
        self.evaluate(&Document::parse(page), schema)
    }

    /// Evaluates every node matching the schema's base selector
    pub fn evaluate<'s>(
        &self,
        document: &Document,
        schema: &'s Schema,
    ) -> Result<PageExtraction<'s>, CrawlError> {
        self.evaluate_from(document, schema, 0)
    }

    /// Like [`evaluate`](Self::evaluate), ignoring the first `skip` item nodes
    ///
    /// Used for cumulative snapshots (infinite scroll, "load more") where the
    /// leading items were already emitted by an earlier snapshot.
    pub fn evaluate_from<'s>(
        &self,
        document: &Document,
        schema: &'s Schema,
        skip: usize,
    ) -> Result<PageExtraction<'s>, CrawlError> {
        let mut cache = SelectorCache::default();
        let base = cache.get(&schema.base_selector)?.clone();
        let items = document.select_all(&base);

        tracing::debug!(
            "{} item nodes match '{}' on {} ({} already emitted)",
            items.len(),
            schema.base_selector,
            document.url(),
            skip.min(items.len())
        );

        let mut extraction = PageExtraction::default();
        for (index, item) in items.into_iter().enumerate().skip(skip) {
            match self
                .fields
                .evaluate_fields(item, &schema.fields, document, &mut cache)?
            {
                Some(extracted) => extraction.records.push(extracted),
                None => tracing::debug!("Dropped record for item node {}", index),
            }
        }

        Ok(extraction)
    }
}
