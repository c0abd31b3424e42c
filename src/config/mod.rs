//! Job file configuration for Schema-Crawler
//!
//! This module handles loading, parsing, and validating TOML job files and
//! turning them into a [`Schema`](crate::schema::Schema) plus crawl options.
//!
//! # Example
//!
//! ```no_run
//! use schema_crawler::config::load_config;
//! use std::path::Path;
//!
//! let job = load_config(Path::new("job.toml")).unwrap();
//! let schema = job.to_schema().unwrap();
//! println!("Extracting {} fields per item", schema.fields.len());
//! ```

mod convert;
mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ButtonPaginationConfig, CrawlConfig, FieldConfig, HttpConfig, JobConfig, SchemaConfig,
    ScrollPaginationConfig, TransformNames, UrlPaginationConfig,
};

// Re-export parser functions
pub use convert::parse_mode;
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
