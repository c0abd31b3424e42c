//! Extraction schema model
//!
//! Schemas are immutable data created once by the caller and shared read-only
//! by every evaluation, including concurrent ones.

mod transform;
mod types;
mod validation;

pub use transform::{builtin, builtin_list_formatter, truthy, ListFormatter, Transform};
pub use types::{
    ButtonPagination, ButtonStop, FailurePolicy, FetchPolicy, FieldSpec, FieldType, FollowMode,
    PaginationSpec, Record, Schema, ScrollPagination, ScrollStop, UrlPagination, MAX_URL_PAGES,
};
pub use validation::{validate_schema, validate_start_url};
