//! Interactive pagination through a browser session

use crate::support::{http_fetcher, FeedBrowser};
use schema_crawler::crawler::{CrawlOptions, Crawler, StopReason};
use schema_crawler::schema::{
    ButtonPagination, ButtonStop, FieldSpec, PaginationSpec, Record, Schema, ScrollPagination,
    ScrollStop,
};
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn review_schema(pagination: PaginationSpec) -> Schema {
    Schema::new("div.review", vec![FieldSpec::text("body", "p")]).with_pagination(pagination)
}

fn load_more() -> PaginationSpec {
    PaginationSpec::ButtonClick(ButtonPagination {
        retry_limit: 2,
        retry_delay: Duration::ZERO,
        cycle_delay: Duration::ZERO,
        ..ButtonPagination::new("button#load-more")
    })
}

fn bodies(records: &[Record]) -> Vec<Value> {
    records.iter().map(|r| r["body"].clone()).collect()
}

fn reviews(count: usize) -> Vec<Value> {
    (1..=count).map(|i| json!(format!("Review {}", i))).collect()
}

fn feed_url() -> Url {
    Url::parse("https://reviews.example.com/feed").unwrap()
}

#[tokio::test]
async fn test_missing_button_yields_first_page_only() {
    let mut browser = FeedBrowser::new(feed_url(), vec![3], 0);
    let crawler = Crawler::new(http_fetcher());

    let outcome = crawler
        .session(&mut browser)
        .crawl(feed_url().as_str(), &review_schema(load_more()))
        .await
        .unwrap();

    assert_eq!(bodies(&outcome.records), reviews(3));
    assert_eq!(outcome.stop, StopReason::NoButton);
    assert_eq!(browser.clicks, 0);
}

#[tokio::test]
async fn test_load_more_emits_each_item_once() {
    let mut browser = FeedBrowser::new(feed_url(), vec![2, 4, 6], 2);
    let crawler = Crawler::new(http_fetcher());

    let outcome = crawler
        .session(&mut browser)
        .crawl(feed_url().as_str(), &review_schema(load_more()))
        .await
        .unwrap();

    assert_eq!(bodies(&outcome.records), reviews(6));
    assert_eq!(outcome.pages, 3);
    assert_eq!(outcome.stop, StopReason::NoButton);
    assert!(outcome.is_success());
    assert_eq!(browser.clicks, 2);
}

#[tokio::test]
async fn test_infinite_scroll_stops_after_stall() {
    let mut browser = FeedBrowser::new(feed_url(), vec![2, 4], 0);
    let schema = review_schema(PaginationSpec::InfiniteScroll(ScrollPagination {
        scroll_distance: 500,
        retry_limit: 1,
        scroll_delay: Duration::ZERO,
        retry_scroll_distance: -200,
        ..ScrollPagination::default()
    }));
    let crawler = Crawler::new(http_fetcher());

    let outcome = crawler
        .session(&mut browser)
        .crawl(feed_url().as_str(), &schema)
        .await
        .unwrap();

    assert_eq!(bodies(&outcome.records), reviews(4));
    assert_eq!(outcome.stop, StopReason::Stalled);
    assert_eq!(browser.scrolls, vec![500, 500, -200, 500]);
}

fn scroll(stop_condition: ScrollStop, scroll_selector: Option<&str>) -> PaginationSpec {
    PaginationSpec::InfiniteScroll(ScrollPagination {
        stop_condition,
        scroll_distance: 500,
        retry_limit: 1,
        scroll_delay: Duration::ZERO,
        scroll_selector: scroll_selector.map(str::to_string),
        ..ScrollPagination::default()
    })
}

#[tokio::test]
async fn test_button_click_count_stops_with_button_still_present() {
    let mut browser = FeedBrowser::new(feed_url(), vec![1, 2, 3, 4, 5], 4);
    let pagination = PaginationSpec::ButtonClick(ButtonPagination {
        stop_condition: ButtonStop::Count(2),
        retry_limit: 2,
        retry_delay: Duration::ZERO,
        cycle_delay: Duration::ZERO,
        ..ButtonPagination::new("button#load-more")
    });
    let crawler = Crawler::new(http_fetcher());

    let outcome = crawler
        .session(&mut browser)
        .crawl(feed_url().as_str(), &review_schema(pagination))
        .await
        .unwrap();

    assert_eq!(bodies(&outcome.records), reviews(3));
    assert_eq!(outcome.stop, StopReason::CountReached);
    assert!(outcome.is_success());
    assert_eq!(browser.clicks, 2);
}

#[tokio::test]
async fn test_button_stop_element_ends_session() {
    let mut browser = FeedBrowser::new(feed_url(), vec![2, 4, 6], 2).with_end_notice(1);
    let pagination = PaginationSpec::ButtonClick(ButtonPagination {
        stop_condition: ButtonStop::Element("p.end-of-feed".to_string()),
        retry_limit: 2,
        retry_delay: Duration::ZERO,
        cycle_delay: Duration::ZERO,
        ..ButtonPagination::new("button#load-more")
    });
    let crawler = Crawler::new(http_fetcher());

    let outcome = crawler
        .session(&mut browser)
        .crawl(feed_url().as_str(), &review_schema(pagination))
        .await
        .unwrap();

    assert_eq!(bodies(&outcome.records), reviews(4));
    assert_eq!(outcome.stop, StopReason::StopElement);
    assert_eq!(browser.clicks, 1);
}

#[tokio::test]
async fn test_scroll_count_limits_scrolls() {
    let mut browser = FeedBrowser::new(feed_url(), vec![1, 2, 3, 4, 5], 0);
    let schema = review_schema(scroll(ScrollStop::Count(2), None));
    let crawler = Crawler::new(http_fetcher());

    let outcome = crawler
        .session(&mut browser)
        .crawl(feed_url().as_str(), &schema)
        .await
        .unwrap();

    assert_eq!(bodies(&outcome.records), reviews(3));
    assert_eq!(outcome.stop, StopReason::CountReached);
    assert_eq!(browser.scrolls, vec![500, 500]);
}

#[tokio::test]
async fn test_scroll_inside_container_until_stop_element() {
    let mut browser = FeedBrowser::new(feed_url(), vec![2, 4, 6], 0).with_end_notice(1);
    let schema = review_schema(scroll(
        ScrollStop::Element("p.end-of-feed".to_string()),
        Some("div.feed"),
    ));
    let crawler = Crawler::new(http_fetcher());

    let outcome = crawler
        .session(&mut browser)
        .crawl(feed_url().as_str(), &schema)
        .await
        .unwrap();

    assert_eq!(bodies(&outcome.records), reviews(4));
    assert_eq!(outcome.stop, StopReason::StopElement);
    assert!(browser.scrolls.is_empty());
    assert_eq!(browser.container_scrolls, vec![("div.feed".to_string(), 500)]);
}

#[tokio::test]
async fn test_cycle_cap_from_options() {
    let mut browser = FeedBrowser::new(feed_url(), vec![1, 2, 3, 4, 5, 6], 5);
    let options = CrawlOptions {
        max_cycles: Some(2),
        ..CrawlOptions::default()
    };
    let crawler = Crawler::new(http_fetcher()).with_options(options);

    let outcome = crawler
        .session(&mut browser)
        .crawl(feed_url().as_str(), &review_schema(load_more()))
        .await
        .unwrap();

    assert_eq!(bodies(&outcome.records), reviews(3));
    assert_eq!(outcome.stop, StopReason::CycleCap);
    assert_eq!(browser.clicks, 2);
}

#[tokio::test]
async fn test_session_follows_links_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/authors/\d+$"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<html><body><h1>Ann</h1></body></html>"),
        )
        .expect(2)
        .mount(&server)
        .await;

    let start = Url::parse(&format!("{}/feed", server.uri())).unwrap();
    let mut browser = FeedBrowser::new(start.clone(), vec![1, 2], 1);
    let schema = Schema::new(
        "div.review",
        vec![
            FieldSpec::text("body", "p"),
            FieldSpec::text("author", "a.author")
                .with_attribute("href")
                .follow(Schema::new("body", vec![FieldSpec::text("name", "h1")])),
        ],
    )
    .with_pagination(load_more());
    let crawler = Crawler::new(http_fetcher());

    let outcome = crawler
        .session(&mut browser)
        .crawl(start.as_str(), &schema)
        .await
        .unwrap();

    let records: Vec<Value> = outcome
        .records
        .iter()
        .map(|r| Value::Object(r.clone()))
        .collect();
    assert_eq!(
        records,
        vec![
            json!({"body": "Review 1", "author": [{"name": "Ann"}]}),
            json!({"body": "Review 2", "author": [{"name": "Ann"}]}),
        ]
    );
}
