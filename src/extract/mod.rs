//! Schema evaluation
//!
//! This module turns a parsed document and a [`Schema`](crate::schema::Schema)
//! into records:
//! - `dom` wraps the DOM engine (selection, text, attributes, link resolution)
//! - `field` evaluates single fields, including list and link fields
//! - `evaluator` walks the item nodes of a page
//! - `coerce` converts raw strings to the declared field types

mod coerce;
mod dom;
mod evaluator;
mod field;

pub use coerce::parse_number;
pub use dom::{attribute, compile_selector, select, text, Document, Page, SelectorCache};
pub use evaluator::{PageExtraction, SchemaEvaluator};
pub use field::{Extracted, FieldEvaluator, FieldValue, Follow, Segment};
