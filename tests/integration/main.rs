//! Integration tests for Schema-Crawler
//!
//! HTTP paths run against wiremock servers; interactive pagination runs
//! against a scripted in-memory browser session.

mod config_tests;
mod crawl_tests;
mod session_tests;
