// End-to-end crawling against a mock news site
use std::sync::Arc;

use newsdesk::crawl_engine::{CrawlRequest, Crawler, FailureReason, SourceAnnotations, SourceEntry};
use newsdesk::search::{IndexKey, MultiIndexStore, SearchQuery};
use newsdesk::storage::MemoryStore;
use newsdesk::{PipelineConfig, canonicalize_url, document_id};

const ARTICLE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <title>Fintech lenders expand across the Gulf</title>
  <meta name="description" content="Digital lenders grow in the UAE.">
  <meta name="keywords" content="lending, gulf">
  <meta property="article:published_time" content="2024-03-05T08:00:00Z">
</head>
<body>
  <nav>Home | Markets | Contact</nav>
  <h1>Fintech lenders expand across the Gulf</h1>
  <p>Fintech lenders are expanding quickly. Fintech adoption in Dubai keeps rising.</p>
  <p>Regulators in Dubai welcome fintech competition among lenders.</p>
  <footer>Copyright newsroom</footer>
</body>
</html>"#;

fn crawler() -> Crawler {
    let config = PipelineConfig::builder()
        .retry_delays(0, 0)
        .default_calls_per_minute(0)
        .build()
        .expect("valid config");
    let index = Arc::new(MultiIndexStore::new(Arc::new(MemoryStore::new())));
    Crawler::from_config(config, index).expect("crawler")
}

fn annotations() -> SourceAnnotations {
    SourceAnnotations {
        tags: vec!["Lending".into()],
        regions: vec!["UAE".into()],
        industries: vec!["Fintech".into()],
        clients: vec!["Acme Bank".into()],
        ..SourceAnnotations::default()
    }
}

#[tokio::test]
async fn test_crawl_indexes_article_under_every_facet() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/gulf")
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body(ARTICLE)
        .create_async()
        .await;

    let crawler = crawler();
    let url = format!("{}/gulf", server.url());
    let outcome = crawler
        .crawl(CrawlRequest::new(&url).with_annotations(annotations()))
        .await;

    assert!(outcome.success, "crawl failed: {:?}", outcome.reason);
    let doc = &outcome.document;
    assert_eq!(doc.title, "Fintech lenders expand across the Gulf");
    assert!(!doc.body_text.contains("Contact"));
    assert_eq!(doc.keywords.first().map(String::as_str), Some("fintech"));
    assert!(doc.keywords.iter().any(|k| k == "gulf"));
    assert_eq!(
        doc.published_at.map(|ts| ts.to_rfc3339()),
        Some("2024-03-05T08:00:00+00:00".to_string())
    );

    let index = crawler.index();
    for key in [
        IndexKey::Recent,
        IndexKey::keyword("fintech"),
        IndexKey::region("uae"),
        IndexKey::industry("fintech"),
        IndexKey::tag("lending"),
    ] {
        assert_eq!(
            index.get_index(&key).await.expect("index"),
            vec![doc.id.clone()],
            "missing from {key:?}"
        );
    }

    let hits = crawler
        .search_engine()
        .search(&SearchQuery::new().keyword("fintech").client("acme bank"))
        .await
        .expect("search");
    assert_eq!(hits.len(), 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_fresh_document_is_not_refetched() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/gulf")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(ARTICLE)
        .expect(1)
        .create_async()
        .await;

    let crawler = crawler();
    let url = format!("{}/gulf", server.url());
    let first = crawler.crawl(CrawlRequest::new(&url)).await;
    // Tracking parameters do not change the document identity
    let second = crawler
        .crawl(CrawlRequest::new(format!("{url}?utm=1&utm_source=mail")))
        .await;

    assert!(first.success && second.success);
    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(first.document.id, second.document.id);
    assert_eq!(
        first.document.id,
        document_id(&canonicalize_url(&url).expect("canonical"))
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn test_force_update_refetches() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/gulf")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(ARTICLE)
        .expect(2)
        .create_async()
        .await;

    let crawler = crawler();
    let url = format!("{}/gulf", server.url());
    crawler.crawl(CrawlRequest::new(&url)).await;
    let refreshed = crawler
        .crawl(CrawlRequest::new(&url).force_update(true))
        .await;

    assert!(refreshed.success);
    assert!(!refreshed.from_cache);
    assert_eq!(crawler.index().document_count().await.expect("count"), 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_version() {
    let mut server = mockito::Server::new_async().await;
    let healthy = server
        .mock("GET", "/gulf")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(ARTICLE)
        .create_async()
        .await;

    let crawler = crawler();
    let url = format!("{}/gulf", server.url());
    let first = crawler.crawl(CrawlRequest::new(&url)).await;
    assert!(first.success);

    healthy.remove_async().await;
    let broken = server
        .mock("GET", "/gulf")
        .with_status(500)
        .expect(3)
        .create_async()
        .await;

    let refresh = crawler
        .crawl(CrawlRequest::new(&url).force_update(true))
        .await;
    assert!(!refresh.success);
    assert!(matches!(
        refresh.reason,
        Some(FailureReason::RetriesExhausted { attempts: 3, .. })
    ));

    let stored = crawler
        .index()
        .get_document(&first.document.id)
        .await
        .expect("read")
        .expect("still indexed");
    assert!(stored.success);
    assert_eq!(stored.title, first.document.title);
    assert!(crawler.index().get_index(&IndexKey::Errors).await.expect("errors").is_empty());
    broken.assert_async().await;
}

#[tokio::test]
async fn test_missing_page_is_recorded_as_error() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/gone")
        .with_status(404)
        .expect(1)
        .create_async()
        .await;

    let crawler = crawler();
    let outcome = crawler
        .crawl(CrawlRequest::new(format!("{}/gone", server.url())))
        .await;

    assert!(!outcome.success);
    assert!(matches!(
        outcome.reason,
        Some(FailureReason::ClientError { status: 404, .. })
    ));
    let index = crawler.index();
    assert_eq!(
        index.get_index(&IndexKey::Errors).await.expect("errors"),
        vec![outcome.document.id.clone()]
    );
    assert!(index.get_index(&IndexKey::Recent).await.expect("recent").is_empty());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_batch_crawl_reports_each_source() {
    let mut server = mockito::Server::new_async().await;
    let _article = server
        .mock("GET", "/gulf")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(ARTICLE)
        .create_async()
        .await;
    let _notes = server
        .mock("GET", "/notes.txt")
        .with_status(200)
        .with_header("content-type", "text/plain")
        .with_body("Quarterly remittance volumes grew across Gulf corridors.")
        .create_async()
        .await;
    let _gone = server
        .mock("GET", "/gone")
        .with_status(404)
        .create_async()
        .await;

    let sources: Vec<SourceEntry> = serde_json::from_value(serde_json::json!([
        { "url": format!("{}/gulf", server.url()), "regions": ["uae"] },
        { "url": format!("{}/notes.txt", server.url()) },
        { "url": format!("{}/gone", server.url()) },
        { "url": "not a url" }
    ]))
    .expect("sources");

    let report = crawler().crawl_batch(sources, Some(2), false).await;

    assert_eq!(report.summary.total, 4);
    assert_eq!(report.summary.succeeded, 2);
    assert_eq!(report.summary.failed, 2);
    assert_eq!(report.outcomes.len(), 4);
    let invalid = report
        .outcomes
        .iter()
        .find(|(url, _)| url == "not a url")
        .map(|(_, outcome)| outcome)
        .expect("invalid source reported");
    assert!(matches!(invalid.reason, Some(FailureReason::InvalidUrl { .. })));
}
