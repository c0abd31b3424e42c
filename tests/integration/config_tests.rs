//! Job files driving real crawls

use schema_crawler::config::{load_config, load_config_with_hash};
use schema_crawler::crawler::{Crawler, HttpFetcher, Mode};
use schema_crawler::schema::FailurePolicy;
use schema_crawler::ConfigError;
use serde_json::{json, Value};
use std::io::Write;
use tempfile::NamedTempFile;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn job_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn catalog_page(items: &[(&str, &str, &[&str])]) -> String {
    let body: String = items
        .iter()
        .map(|(name, price, tags)| {
            let tags: String = tags
                .iter()
                .map(|tag| format!(r#"<span class="tag">{}</span>"#, tag))
                .collect();
            format!(
                r#"<li class="item"><b>{}</b><i class="price">{}</i>{}</li>"#,
                name, price, tags
            )
        })
        .collect();
    format!("<html><body><ul>{}</ul></body></html>", body)
}

#[tokio::test]
async fn test_job_file_end_to_end() {
    let server = MockServer::start().await;
    for (page, body) in [
        ("1", catalog_page(&[("Lamp", "$1,299.00", &["home", "light"])])),
        ("2", catalog_page(&[("Desk", "$45", &[])])),
    ] {
        Mock::given(method("GET"))
            .and(path("/catalog"))
            .and(query_param("page", page))
            .and(header("accept-language", "en"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;
    }

    let file = job_file(&format!(
        r#"
[crawl]
url = "{}/catalog?page={{page}}"
mode = "concurrent"
max-parallel = 2
field-failure = "skip-field"

[http]
user-agent = "JobTest/1.0"
timeout-secs = 5
connect-timeout-secs = 2

[http.headers]
Accept-Language = "en"

[schema]
base-selector = "li.item"

[[schema.fields]]
name = "name"
selector = "b"

[[schema.fields]]
name = "price"
selector = ".price"
type = "number"
preformatter = "digits"

[[schema.fields]]
name = "tags"
selector = ".tag"
type = "list"
list-formatter = "join"

[schema.url-pagination]
start-page = 1
end-page = 2
"#,
        server.uri()
    ));

    let (job, hash) = load_config_with_hash(file.path()).unwrap();
    assert_eq!(hash.len(), 64);

    let schema = job.to_schema().unwrap();
    let mode = job.mode().unwrap();
    let options = job.crawl_options().unwrap();
    assert_eq!(mode, Mode::Concurrent { max_parallel: 2 });
    assert_eq!(options.field_failure, FailurePolicy::SkipField);

    let crawler = Crawler::new(HttpFetcher::from_config(&job.http).unwrap()).with_options(options);
    let outcome = crawler.fetch(&job.crawl.url, &schema, mode).await.unwrap();

    let records: Vec<Value> = outcome
        .records
        .iter()
        .map(|r| Value::Object(r.clone()))
        .collect();
    assert_eq!(
        records,
        vec![
            json!({"name": "Lamp", "price": 1299, "tags": "home, light"}),
            json!({"name": "Desk", "price": 45, "tags": ""}),
        ]
    );
}

#[test]
fn test_invalid_jobs_are_rejected_before_crawling() {
    let missing_placeholder = job_file(
        r#"
[crawl]
url = "https://example.com/catalog"

[schema]
base-selector = "li"

[[schema.fields]]
name = "name"

[schema.url-pagination]
end-page = 3
"#,
    );
    assert!(matches!(
        load_config(missing_placeholder.path()),
        Err(ConfigError::InvalidUrl(_))
    ));

    let duplicate_field = job_file(
        r#"
[crawl]
url = "https://example.com/"

[schema]
base-selector = "li"

[[schema.fields]]
name = "name"

[[schema.fields]]
name = "name"
selector = "b"
"#,
    );
    assert!(matches!(
        load_config(duplicate_field.path()),
        Err(ConfigError::DuplicateField(name)) if name == "name"
    ));

    let bad_policy = job_file(
        r#"
[crawl]
url = "https://example.com/"
fetch-failure = "retry"

[schema]
base-selector = "li"
"#,
    );
    assert!(matches!(
        load_config(bad_policy.path()),
        Err(ConfigError::Validation(_))
    ));
}
