//! HTTP crawls against wiremock servers

use crate::support::{http_fetcher, product_listing};
use schema_crawler::crawler::{CrawlOptions, Crawler, Mode, StopReason};
use schema_crawler::schema::{
    FailurePolicy, FetchPolicy, FieldSpec, FieldType, FollowMode, PaginationSpec, Record, Schema,
    UrlPagination,
};
use schema_crawler::{CrawlError, ExtractionError, FetchError};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn product_schema() -> Schema {
    Schema::new(
        "div.product",
        vec![
            FieldSpec::text("name", "h3 > a"),
            FieldSpec::number("price", ".price"),
        ],
    )
}

fn paged(schema: Schema, end_page: u32) -> Schema {
    schema.with_pagination(PaginationSpec::UrlTemplate(UrlPagination {
        page_placeholder: "{page}".to_string(),
        start_page: 1,
        end_page,
    }))
}

fn values(records: &[Record]) -> Vec<Value> {
    records.iter().map(|r| Value::Object(r.clone())).collect()
}

fn names(records: &[Record]) -> Vec<Value> {
    records.iter().map(|r| r["name"].clone()).collect()
}

async fn mount_page(server: &MockServer, page: &str, body: String, delay: Duration) {
    Mock::given(method("GET"))
        .and(path("/p"))
        .and(query_param("x", page))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html")
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

/// Pages 1..=3 with two products each; page 1 answers slowest
async fn three_page_server() -> MockServer {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "1",
        product_listing(&[("p1-a", "1", "/"), ("p1-b", "2", "/")]),
        Duration::from_millis(300),
    )
    .await;
    mount_page(
        &server,
        "2",
        product_listing(&[("p2-a", "3", "/"), ("p2-b", "4", "/")]),
        Duration::from_millis(100),
    )
    .await;
    mount_page(
        &server,
        "3",
        product_listing(&[("p3-a", "5", "/"), ("p3-b", "6", "/")]),
        Duration::ZERO,
    )
    .await;
    server
}

fn expected_page_order() -> Vec<Value> {
    ["p1-a", "p1-b", "p2-a", "p2-b", "p3-a", "p3-b"]
        .iter()
        .map(|name| json!(name))
        .collect()
}

#[tokio::test]
async fn test_single_page_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(200).set_body_string(product_listing(&[
            ("Widget A", "9.99", "/a"),
            ("Widget B", "19.5", "/b"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let crawler = Crawler::new(http_fetcher());
    let outcome = crawler
        .fetch(&format!("{}/products", server.uri()), &product_schema(), Mode::Single)
        .await
        .expect("Crawl failed");

    assert_eq!(
        values(&outcome.records),
        vec![
            json!({"name": "Widget A", "price": 9.99}),
            json!({"name": "Widget B", "price": 19.5})
        ]
    );
    assert_eq!(outcome.pages, 1);
    assert_eq!(outcome.stop, StopReason::Completed);
}

#[tokio::test]
async fn test_follow_relative_link() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/shop/list"))
        .respond_with(ResponseTemplate::new(200).set_body_string(product_listing(&[(
            "Widget A",
            "9.99",
            "items/1",
        )])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/shop/items/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body><p class="sku"> W-1 </p><p class="stock">12</p></body></html>"#,
        ))
        .expect(2)
        .mount(&server)
        .await;

    let detail = Schema::new(
        "body",
        vec![
            FieldSpec::text("sku", "p.sku"),
            FieldSpec::number("stock", "p.stock"),
        ],
    );
    let attach = Schema::new(
        "div.product",
        vec![
            FieldSpec::text("name", "h3 > a"),
            FieldSpec::text("detail", "h3 > a")
                .with_attribute("href")
                .follow(detail.clone()),
        ],
    );
    let merge = Schema::new(
        "div.product",
        vec![
            FieldSpec::text("name", "h3 > a"),
            FieldSpec::text("detail", "h3 > a")
                .with_attribute("href")
                .follow(detail)
                .with_follow_mode(FollowMode::Merge),
        ],
    );

    let crawler = Crawler::new(http_fetcher());
    let url = format!("{}/shop/list", server.uri());

    let outcome = crawler.fetch(&url, &attach, Mode::Single).await.unwrap();
    assert_eq!(
        values(&outcome.records),
        vec![json!({"name": "Widget A", "detail": [{"sku": "W-1", "stock": 12}]})]
    );

    let outcome = crawler.fetch(&url, &merge, Mode::Single).await.unwrap();
    assert_eq!(
        values(&outcome.records),
        vec![json!({"name": "Widget A", "sku": "W-1", "stock": 12})]
    );
}

#[tokio::test]
async fn test_base_href_is_honoured() {
    let server = MockServer::start().await;
    let listing = r#"<html><head><base href="/catalog/"></head><body>
        <div class="product"><h3><a href="w-1">Widget A</a></h3></div>
        </body></html>"#;
    Mock::given(method("GET"))
        .and(path("/index"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/catalog/w-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"<p class="sku">W-1</p>"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let detail = Schema::new("p.sku", vec![FieldSpec::new("sku", FieldType::Text)]);
    let schema = Schema::new(
        "div.product",
        vec![FieldSpec::text("detail", "h3 > a")
            .with_attribute("href")
            .follow(detail)],
    );

    let outcome = Crawler::new(http_fetcher())
        .fetch(&format!("{}/index", server.uri()), &schema, Mode::Single)
        .await
        .unwrap();
    assert_eq!(
        values(&outcome.records),
        vec![json!({"detail": [{"sku": "W-1"}]})]
    );
}

#[tokio::test]
async fn test_url_pagination_sequential_order() {
    let server = three_page_server().await;
    let crawler = Crawler::new(http_fetcher());
    let outcome = crawler
        .fetch(
            &format!("{}/p?x={{page}}", server.uri()),
            &paged(product_schema(), 3),
            Mode::Sequential,
        )
        .await
        .unwrap();

    assert_eq!(names(&outcome.records), expected_page_order());
    assert_eq!(outcome.pages, 3);

    let requested: Vec<String> = server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| request.url.query().unwrap_or_default().to_string())
        .collect();
    assert_eq!(requested, vec!["x=1", "x=2", "x=3"]);
}

#[tokio::test]
async fn test_url_pagination_concurrent_keeps_page_order() {
    let server = three_page_server().await;
    let crawler = Crawler::new(http_fetcher());
    let outcome = crawler
        .fetch(
            &format!("{}/p?x={{page}}", server.uri()),
            &paged(product_schema(), 3),
            Mode::Concurrent { max_parallel: 3 },
        )
        .await
        .unwrap();

    assert_eq!(names(&outcome.records), expected_page_order());
    assert_eq!(outcome.pages, 3);
    assert_eq!(outcome.stop, StopReason::Completed);
}

#[tokio::test]
async fn test_concurrent_with_single_permit() {
    let server = three_page_server().await;
    let crawler = Crawler::new(http_fetcher());
    let outcome = crawler
        .fetch(
            &format!("{}/p?x={{page}}", server.uri()),
            &paged(product_schema(), 3),
            Mode::Concurrent { max_parallel: 1 },
        )
        .await
        .unwrap();
    assert_eq!(names(&outcome.records), expected_page_order());
}

#[tokio::test]
async fn test_fetch_failure_policies() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "1",
        product_listing(&[("one", "1", "/")]),
        Duration::ZERO,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/p"))
        .and(query_param("x", "2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_page(
        &server,
        "3",
        product_listing(&[("three", "3", "/")]),
        Duration::ZERO,
    )
    .await;

    let url = format!("{}/p?x={{page}}", server.uri());
    let schema = paged(product_schema(), 3);

    // Abort keeps what was gathered before the failing page
    let outcome = Crawler::new(http_fetcher())
        .fetch(&url, &schema, Mode::Sequential)
        .await
        .unwrap();
    assert_eq!(names(&outcome.records), vec![json!("one")]);
    assert_eq!(outcome.stop, StopReason::Failed);
    assert!(matches!(
        outcome.error,
        Some(CrawlError::Fetch(FetchError::Status { status: 500, .. }))
    ));

    // Skip records the failure and carries on
    let options = CrawlOptions {
        fetch_failure: FetchPolicy::Skip,
        ..CrawlOptions::default()
    };
    let crawler = Crawler::new(http_fetcher()).with_options(options);
    for mode in [Mode::Sequential, Mode::Concurrent { max_parallel: 2 }] {
        let outcome = crawler.fetch(&url, &schema, mode).await.unwrap();
        assert_eq!(names(&outcome.records), vec![json!("one"), json!("three")]);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.stop, StopReason::Completed);
    }
}

#[tokio::test]
async fn test_single_fetch_error_kind() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let result = Crawler::new(http_fetcher())
        .fetch(&format!("{}/gone", server.uri()), &product_schema(), Mode::Single)
        .await;
    let error = result.unwrap_err();
    assert_eq!(error.kind(), "fetch");
    assert!(matches!(error, CrawlError::Fetch(FetchError::Status { status: 404, .. })));
}

#[tokio::test]
async fn test_request_headers_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .and(header("x-api-key", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_string(product_listing(&[(
            "Widget A", "1", "/",
        )])))
        .expect(1)
        .mount(&server)
        .await;

    let options = CrawlOptions {
        headers: vec![("X-Api-Key".to_string(), "secret".to_string())],
        ..CrawlOptions::default()
    };
    let outcome = Crawler::new(http_fetcher())
        .with_options(options)
        .fetch(&format!("{}/products", server.uri()), &product_schema(), Mode::Single)
        .await
        .unwrap();
    assert_eq!(outcome.records.len(), 1);
}

#[tokio::test]
async fn test_field_failure_policy_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(200).set_body_string(product_listing(&[
            ("Widget A", "9.99", "/"),
            ("Widget B", "call us", "/"),
        ])))
        .mount(&server)
        .await;
    let url = format!("{}/products", server.uri());

    let run = |policy: FailurePolicy| {
        let url = url.clone();
        async move {
            let options = CrawlOptions {
                field_failure: policy,
                ..CrawlOptions::default()
            };
            Crawler::new(http_fetcher())
                .with_options(options)
                .fetch(&url, &product_schema(), Mode::Single)
                .await
        }
    };

    let outcome = run(FailurePolicy::Null).await.unwrap();
    assert_eq!(outcome.records[1]["price"], Value::Null);

    let outcome = run(FailurePolicy::SkipField).await.unwrap();
    assert!(!outcome.records[1].contains_key("price"));

    let outcome = run(FailurePolicy::SkipRecord).await.unwrap();
    assert_eq!(names(&outcome.records), vec![json!("Widget A")]);

    assert!(matches!(
        run(FailurePolicy::Raise).await,
        Err(CrawlError::Extraction(_))
    ));
}

fn paginated_modes() -> [Mode; 2] {
    [Mode::Sequential, Mode::Concurrent { max_parallel: 3 }]
}

fn raising() -> CrawlOptions {
    CrawlOptions {
        field_failure: FailurePolicy::Raise,
        ..CrawlOptions::default()
    }
}

#[tokio::test]
async fn test_raise_mid_run_keeps_earlier_pages() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "1",
        product_listing(&[("p1-a", "1", "/"), ("p1-b", "2", "/")]),
        Duration::from_millis(300),
    )
    .await;
    mount_page(
        &server,
        "2",
        product_listing(&[("p2-a", "3", "/"), ("p2-b", "call us", "/")]),
        Duration::ZERO,
    )
    .await;
    mount_page(
        &server,
        "3",
        product_listing(&[("p3-a", "5", "/")]),
        Duration::ZERO,
    )
    .await;
    let url = format!("{}/p?x={{page}}", server.uri());
    let crawler = Crawler::new(http_fetcher()).with_options(raising());

    for mode in paginated_modes() {
        let outcome = crawler
            .fetch(&url, &paged(product_schema(), 3), mode)
            .await
            .expect("a raise after the first page is reported in the outcome");

        assert_eq!(names(&outcome.records), vec![json!("p1-a"), json!("p1-b")], "{:?}", mode);
        assert_eq!(outcome.pages, 1);
        assert_eq!(outcome.stop, StopReason::Failed);
        match &outcome.error {
            Some(CrawlError::Extraction(error)) => assert_eq!(error.field(), "price"),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_follow_failure_mid_run_keeps_earlier_pages() {
    let server = MockServer::start().await;
    mount_page(&server, "1", product_listing(&[("p1", "1", "/detail/ok")]), Duration::ZERO).await;
    mount_page(&server, "2", product_listing(&[("p2", "2", "/detail/gone")]), Duration::ZERO).await;
    mount_page(&server, "3", product_listing(&[("p3", "3", "/detail/ok")]), Duration::ZERO).await;
    Mock::given(method("GET"))
        .and(path("/detail/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body><h1>In stock</h1></body></html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/detail/gone"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;

    let schema = paged(
        Schema::new(
            "div.product",
            vec![
                FieldSpec::text("name", "h3 > a"),
                FieldSpec::text("detail", "h3 > a")
                    .with_attribute("href")
                    .follow(Schema::new("body", vec![FieldSpec::text("status", "h1")])),
            ],
        ),
        3,
    );
    let url = format!("{}/p?x={{page}}", server.uri());
    let crawler = Crawler::new(http_fetcher()).with_options(raising());

    for mode in paginated_modes() {
        let outcome = crawler.fetch(&url, &schema, mode).await.unwrap();

        assert_eq!(
            values(&outcome.records),
            vec![json!({"name": "p1", "detail": [{"status": "In stock"}]})],
            "{:?}",
            mode
        );
        assert_eq!(outcome.stop, StopReason::Failed);
        assert!(matches!(
            outcome.error,
            Some(CrawlError::Extraction(ExtractionError::Follow { .. }))
        ));
    }
}
