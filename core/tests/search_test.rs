//! Web search gateway over a mocked provider.

use std::sync::Arc;

use async_trait::async_trait;
use fusion_core::search::{
    format_web_context, SearchHit, SearchProvider, WebDocument, WebSearchConfig,
    WebSearchGateway, MAX_PROVIDER_RESULTS,
};
use fusion_core::{FusionError, Result};
use mockall::mock;

mock! {
    pub Provider {}

    #[async_trait]
    impl SearchProvider for Provider {
        async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>>;
    }
}

fn offline_config() -> WebSearchConfig {
    WebSearchConfig {
        fetch_pages: false,
        timeout_ms: 2_000,
        ..WebSearchConfig::default()
    }
}

fn hits(n: usize) -> Vec<SearchHit> {
    (0..n)
        .map(|i| SearchHit {
            title: format!("Result {i}"),
            url: format!("https://example.org/{i}"),
            snippet: format!("snippet {i}"),
        })
        .collect()
}

#[tokio::test]
async fn test_requested_count_is_clamped_to_provider_limit() {
    let mut provider = MockProvider::new();
    provider
        .expect_search()
        .withf(|query, n| query == "rust" && *n == MAX_PROVIDER_RESULTS)
        .times(1)
        .returning(|_, n| Ok(hits(n + 5)));

    let gateway = WebSearchGateway::new(Arc::new(provider), offline_config()).unwrap();
    let docs = gateway.search("rust", 50).await;

    assert_eq!(docs.len(), MAX_PROVIDER_RESULTS);
}

#[tokio::test]
async fn test_zero_results_requested_still_asks_for_one() {
    let mut provider = MockProvider::new();
    provider
        .expect_search()
        .withf(|query, n| query == "rust" && *n == 1)
        .times(1)
        .returning(|_, n| Ok(hits(n)));

    let gateway = WebSearchGateway::new(Arc::new(provider), offline_config()).unwrap();
    assert_eq!(gateway.search("rust", 0).await.len(), 1);
}

#[tokio::test]
async fn test_provider_failure_degrades_to_no_documents() {
    let mut provider = MockProvider::new();
    provider
        .expect_search()
        .returning(|_, _| Err(FusionError::Search("quota exceeded".into())));

    let gateway = WebSearchGateway::new(Arc::new(provider), offline_config()).unwrap();

    assert!(gateway.search("anything", 5).await.is_empty());
    let err = gateway.try_search("anything", 5).await.unwrap_err();
    assert!(matches!(err, FusionError::Search(_)));
}

#[tokio::test]
async fn test_snippets_stand_in_for_pages_when_fetching_is_off() {
    let mut provider = MockProvider::new();
    provider.expect_search().returning(|_, _| Ok(hits(2)));

    let gateway = WebSearchGateway::new(Arc::new(provider), offline_config()).unwrap();
    let docs = gateway.search("q", 2).await;

    assert_eq!(docs[0].content, "snippet 0");
    assert_eq!(docs[1].url, "https://example.org/1");
}

#[tokio::test]
async fn test_missing_credentials_fail_the_search_call() {
    let config = WebSearchConfig {
        api_key: None,
        engine_id: None,
        ..offline_config()
    };
    let gateway = WebSearchGateway::from_config(config).unwrap();

    assert!(gateway.try_search("q", 3).await.is_err());
    assert!(gateway.search("q", 3).await.is_empty());
}

#[test]
fn test_web_context_layout() {
    let docs = vec![WebDocument {
        title: "Rain".into(),
        url: "https://example.org/rain".into(),
        snippet: "s".into(),
        content: "It rained.".into(),
    }];
    let block = format_web_context(&docs);

    assert!(block.starts_with("Web Search Results:\n"));
    assert!(block.contains("From Rain (https://example.org/rain):\nIt rained."));
}

#[tokio::test]
async fn test_oversized_page_is_cut_at_byte_cap() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let body = format!("<html><body><p>START {}END_MARKER</p></body></html>", "word ".repeat(40_000));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 1024];
        let _ = socket.read(&mut request).await;
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        let _ = socket.write_all(head.as_bytes()).await;
        let _ = socket.write_all(body.as_bytes()).await;
    });

    let mut provider = MockProvider::new();
    provider.expect_search().returning(move |_, _| {
        Ok(vec![SearchHit {
            title: "Big".into(),
            url: format!("http://{addr}/"),
            snippet: "big page".into(),
        }])
    });
    let config = WebSearchConfig {
        fetch_pages: true,
        max_page_bytes: 4_096,
        max_content_chars: 1_000_000,
        page_timeout_ms: 5_000,
        ..offline_config()
    };
    let gateway = WebSearchGateway::new(Arc::new(provider), config).unwrap();

    let docs = gateway.try_search("big", 1).await.unwrap();

    assert_eq!(docs.len(), 1);
    assert!(docs[0].content.contains("START"));
    assert!(!docs[0].content.contains("END_MARKER"));
    assert!(docs[0].content.len() <= 4_096);
}
