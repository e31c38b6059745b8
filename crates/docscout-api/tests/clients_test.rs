use docscout_api::{
    ApiError, ArxivClient, ArxivQuery, DatasetClient, FeedClient, HttpSettings, InferenceClient,
    RetryConfig, RowsRequest, SummaryParams,
};
use mockito::Matcher;

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 2,
        initial_delay_ms: 5,
        max_delay_ms: 20,
        backoff_multiplier: 2.0,
    }
}

const ATOM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>ArXiv Query</title>
  <id>http://arxiv.org/api/x</id>
  <updated>2024-01-01T00:00:00Z</updated>
  <entry>
    <id>http://arxiv.org/abs/1706.03762v7</id>
    <updated>2023-08-02T00:00:00Z</updated>
    <published>2017-06-12T00:00:00Z</published>
    <title>Attention Is All You Need</title>
    <summary>The dominant sequence transduction models are based on recurrent networks.</summary>
    <author><name>Ashish Vaswani</name></author>
    <link href="http://arxiv.org/abs/1706.03762v7" rel="alternate" type="text/html"/>
    <category term="cs.CL"/>
  </entry>
</feed>"#;

#[tokio::test]
async fn test_arxiv_search_with_mock() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/query")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("search_query".into(), "all:attention AND all:transformer".into()),
            Matcher::UrlEncoded("max_results".into(), "5".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/atom+xml")
        .with_body(ATOM)
        .create_async()
        .await;

    let client = ArxivClient::with_base_url(&HttpSettings::default(), server.url())
        .unwrap()
        .with_retry_config(fast_retry());

    let entries = client
        .search(&ArxivQuery::new("attention transformer").max_results(5))
        .await
        .unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].arxiv_id, "1706.03762v7");
    assert_eq!(entries[0].title, "Attention Is All You Need");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_feed_not_found_is_not_retried() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/missing.xml")
        .with_status(404)
        .expect(1)
        .create_async()
        .await;

    let client = FeedClient::new(&HttpSettings::default())
        .unwrap()
        .with_retry_config(fast_retry());

    let result = client.fetch(&format!("{}/missing.xml", server.url())).await;
    assert!(matches!(result, Err(ApiError::NotFound(_))));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_feed_server_error_is_retried() {
    let mut server = mockito::Server::new_async().await;

    // Initial attempt + 2 retries
    let mock = server
        .mock("GET", "/flaky.xml")
        .with_status(502)
        .expect(3)
        .create_async()
        .await;

    let client = FeedClient::new(&HttpSettings::default())
        .unwrap()
        .with_retry_config(fast_retry());

    let result = client.fetch(&format!("{}/flaky.xml", server.url())).await;
    assert!(matches!(result, Err(ApiError::ServerError { status: 502, .. })));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_classify_pair_flat_and_batched() {
    let mut server = mockito::Server::new_async().await;

    let flat = server
        .mock("POST", "/flat-model")
        .match_header("authorization", "Bearer secret")
        .with_status(200)
        .with_body(r#"[{"label":"ENTAILMENT","score":0.9},{"label":"NEUTRAL","score":0.07},{"label":"CONTRADICTION","score":0.03}]"#)
        .create_async()
        .await;

    let batched = server
        .mock("POST", "/batched-model")
        .with_status(200)
        .with_body(r#"[[{"label":"contradiction","score":0.8},{"label":"entailment","score":0.2}]]"#)
        .create_async()
        .await;

    let client = InferenceClient::with_base_url(
        &HttpSettings::default(),
        Some("secret".into()),
        server.url(),
    )
    .unwrap()
    .with_retry_config(RetryConfig::none());

    let scores = client
        .classify_pair("flat-model", "A man sleeps.", "A person rests.")
        .await
        .unwrap();
    assert_eq!(scores.len(), 3);
    assert_eq!(scores[0].label, "ENTAILMENT");

    let scores = client
        .classify_pair("batched-model", "A man sleeps.", "A man runs.")
        .await
        .unwrap();
    assert_eq!(scores.len(), 2);
    assert_eq!(scores[0].label, "contradiction");

    flat.assert_async().await;
    batched.assert_async().await;
}

#[tokio::test]
async fn test_summarize_with_mock() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/sum-model")
        .match_body(Matcher::PartialJsonString(
            r#"{"parameters":{"min_length":10,"max_length":60}}"#.into(),
        ))
        .with_status(200)
        .with_body(r#"[{"summary_text":"  Rates went up.  "}]"#)
        .create_async()
        .await;

    let client = InferenceClient::with_base_url(&HttpSettings::default(), None, server.url())
        .unwrap()
        .with_retry_config(RetryConfig::none());

    let params = SummaryParams {
        min_length: 10,
        max_length: 60,
    };
    let summary = client
        .summarize("sum-model", "The central bank raised rates today.", &params)
        .await
        .unwrap();
    assert_eq!(summary, "Rates went up.");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_model_loading_is_retryable() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("POST", "/cold-model")
        .with_status(503)
        .with_body(r#"{"error":"Model cold-model is currently loading"}"#)
        .create_async()
        .await;

    let client = InferenceClient::with_base_url(&HttpSettings::default(), None, server.url())
        .unwrap()
        .with_retry_config(RetryConfig::none());

    let err = client
        .classify_pair("cold-model", "a", "b")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::ModelLoading));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_dataset_rows_paging() {
    let mut server = mockito::Server::new_async().await;

    let rows: Vec<String> = (0..100)
        .map(|i| {
            format!(
                r#"{{"row_idx":{i},"row":{{"premise":"p{i}","hypothesis":"h{i}","label":{}}},"truncated_cells":[]}}"#,
                i % 3
            )
        })
        .collect();
    let first_page = format!(r#"{{"rows":[{}],"num_rows_total":130}}"#, rows.join(","));

    let page_one = server
        .mock("GET", "/rows")
        .match_query(Matcher::UrlEncoded("offset".into(), "0".into()))
        .with_status(200)
        .with_body(first_page)
        .create_async()
        .await;

    let page_two = server
        .mock("GET", "/rows")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("offset".into(), "100".into()),
            Matcher::UrlEncoded("length".into(), "20".into()),
        ]))
        .with_status(200)
        .with_body(
            r#"{"rows":[{"row_idx":100,"row":{"premise":"p","hypothesis":"h","label":-1}},
                        {"row_idx":101,"row":{"text":"not an nli row"}}],"num_rows_total":130}"#,
        )
        .create_async()
        .await;

    let client = DatasetClient::with_base_url(&HttpSettings::default(), None, server.url())
        .unwrap()
        .with_retry_config(RetryConfig::none());

    let request = RowsRequest::new("snli", "plain_text", "validation").length(120);
    let rows = client.nli_rows(&request).await.unwrap();

    // Second page came back short, so paging stops; the malformed row is dropped
    assert_eq!(rows.len(), 101);
    assert_eq!(rows[0].premise, "p0");
    assert_eq!(rows[100].label, -1);

    page_one.assert_async().await;
    page_two.assert_async().await;
}
