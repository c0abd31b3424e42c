//! Link following
//!
//! Evaluation leaves followed fields holding their resolved URL and reports
//! each one as a [`Follow`]. This module fetches the targets, evaluates the
//! nested schemas (recursively) and patches the results back into the
//! records, applying the field failure policy to follows that fail.

use crate::crawler::Fetcher;
use crate::extract::{Document, Extracted, Follow, PageExtraction, SchemaEvaluator, Segment};
use crate::schema::{FailurePolicy, FollowMode, Record};
use crate::{CrawlError, ExtractionError};
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;

pub(crate) struct LinkResolver<'a, F: Fetcher + ?Sized> {
    fetcher: &'a F,
    headers: &'a [(String, String)],
    evaluator: SchemaEvaluator,
}

impl<'a, F: Fetcher + ?Sized> LinkResolver<'a, F> {
    pub(crate) fn new(fetcher: &'a F, headers: &'a [(String, String)], evaluator: SchemaEvaluator) -> Self {
        Self {
            fetcher,
            headers,
            evaluator,
        }
    }

    /// Resolves every pending follow of a page, returning its final records
    pub(crate) async fn resolve<'r>(&'r self, extraction: PageExtraction<'r>) -> Result<Vec<Record>, CrawlError> {
        let mut records = Vec::with_capacity(extraction.len());
        for extracted in extraction.records {
            if let Some(record) = self.resolve_record(extracted).await? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Resolves the follows of one record; `None` means the record was dropped
    async fn resolve_record<'r>(&'r self, extracted: Extracted<'r>) -> Result<Option<Record>, CrawlError> {
        let Extracted { mut record, follows } = extracted;
        let mut dropped: Vec<Vec<Segment>> = Vec::new();

        for follow in follows {
            match self.follow(&follow).await {
                Ok(nested) => patch(&mut record, &follow.path, follow.mode, nested),
                Err(error) => {
                    tracing::debug!("Following '{}' ({}) failed: {}", follow.field, follow.url, error);
                    match self.evaluator.policy() {
                        FailurePolicy::Raise => {
                            return Err(ExtractionError::Follow {
                                field: follow.field.clone(),
                                url: follow.url.to_string(),
                                source: Box::new(error),
                            }
                            .into())
                        }
                        FailurePolicy::Null => set(&mut record, &follow.path, Value::Null),
                        FailurePolicy::SkipField => remove(&mut record, &follow.path),
                        FailurePolicy::SkipRecord => {
                            let owner = &follow.path[..follow.path.len().saturating_sub(1)];
                            dropped.push(owner.to_vec());
                        }
                    }
                }
            }
        }

        if dropped.iter().any(Vec::is_empty) {
            return Ok(None);
        }

        // Highest indices first so earlier removals never shift later ones
        dropped.sort();
        dropped.dedup();
        for owner in dropped.iter().rev() {
            drop_item(&mut record, owner);
        }
        Ok(Some(record))
    }

    /// Fetches a link target and evaluates its schema, following nested links
    fn follow<'f>(&'f self, follow: &'f Follow<'_>) -> BoxFuture<'f, Result<Vec<Record>, CrawlError>> {
        async move {
            let page = self.fetcher.fetch(&follow.url, self.headers).await?;
            let extraction = {
                let document = Document::parse(&page);
                self.evaluator.evaluate(&document, follow.schema)?
            };
            tracing::debug!(
                "Followed '{}' to {}: {} records",
                follow.field,
                follow.url,
                extraction.len()
            );
            self.resolve(extraction).await
        }
        .boxed()
    }
}

/// Object owning the last key of `path`
fn owner_mut<'v, 'p>(record: &'v mut Record, path: &'p [Segment]) -> Option<(&'v mut Record, &'p str)> {
    match path {
        [Segment::Key(key)] => Some((record, key.as_str())),
        [Segment::Key(key), Segment::Index(index), rest @ ..] => {
            let item = record
                .get_mut(key)?
                .as_array_mut()?
                .get_mut(*index)?
                .as_object_mut()?;
            owner_mut(item, rest)
        }
        _ => None,
    }
}

fn object_mut<'v>(record: &'v mut Record, path: &[Segment]) -> Option<&'v mut Record> {
    match path {
        [] => Some(record),
        [Segment::Key(key), Segment::Index(index), rest @ ..] => {
            let item = record
                .get_mut(key)?
                .as_array_mut()?
                .get_mut(*index)?
                .as_object_mut()?;
            object_mut(item, rest)
        }
        _ => None,
    }
}

fn patch(record: &mut Record, path: &[Segment], mode: FollowMode, nested: Vec<Record>) {
    match mode {
        FollowMode::Attach => {
            let value = Value::Array(nested.into_iter().map(Value::Object).collect());
            set(record, path, value);
        }
        FollowMode::Merge => {
            if let Some((owner, key)) = owner_mut(record, path) {
                remove_key(owner, key);
                for fields in nested {
                    for (name, value) in fields {
                        owner.insert(name, value);
                    }
                }
            }
        }
    }
}

fn set(record: &mut Record, path: &[Segment], value: Value) {
    if let Some((owner, key)) = owner_mut(record, path) {
        owner.insert(key.to_string(), value);
    }
}

fn remove(record: &mut Record, path: &[Segment]) {
    if let Some((owner, key)) = owner_mut(record, path) {
        remove_key(owner, key);
    }
}

/// Removes `key` keeping the order of the remaining fields
fn remove_key(object: &mut Record, key: &str) {
    *object = std::mem::take(object)
        .into_iter()
        .filter(|(name, _)| name != key)
        .collect();
}

/// Removes the list item addressed by `path` (`.., Key(list), Index(i)`)
fn drop_item(record: &mut Record, path: &[Segment]) {
    let [parent @ .., Segment::Key(list), Segment::Index(index)] = path else {
        return;
    };
    if let Some(items) = object_mut(record, parent)
        .and_then(|owner| owner.get_mut(list))
        .and_then(Value::as_array_mut)
    {
        if *index < items.len() {
            items.remove(*index);
        }
    }
}
