use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use xsd_check::{AsyncHttpClient, HttpClientConfig, ValidationError};

/// Serve `responses` in order, one per connection, then keep repeating the last one
async fn serve(responses: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let index = counter.fetch_add(1, Ordering::SeqCst);
            let (status, body) = responses[index.min(responses.len() - 1)];

            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            let reason = if status == 200 { "OK" } else { "Error" };
            let response = format!(
                "HTTP/1.1 {status} {reason}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    (format!("http://{address}"), hits)
}

fn config(retry_attempts: u32) -> HttpClientConfig {
    HttpClientConfig {
        timeout_seconds: 5,
        retry_attempts,
        retry_delay_ms: 10,
        max_retry_delay_ms: 50,
        user_agent: "xsd-check-test".to_string(),
    }
}

#[tokio::test]
async fn test_successful_schema_download() {
    let (base, hits) = serve(vec![(200, "<xs:schema/>")]).await;
    let client = AsyncHttpClient::new(config(0)).unwrap();

    let body = client
        .download_schema(&format!("{base}/schema.xsd"))
        .await
        .unwrap();
    assert_eq!(body, b"<xs:schema/>".to_vec());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let (base, hits) = serve(vec![(503, "busy"), (200, "<xs:schema/>")]).await;
    let client = AsyncHttpClient::new(config(2)).unwrap();

    let body = client
        .download_schema(&format!("{base}/schema.xsd"))
        .await
        .unwrap();
    assert_eq!(body, b"<xs:schema/>".to_vec());
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_not_found_is_reported_without_retry() {
    let (base, hits) = serve(vec![(404, "missing")]).await;
    let client = AsyncHttpClient::new(config(3)).unwrap();

    let result = client.download_schema(&format!("{base}/absent.xsd")).await;
    match result {
        Err(ValidationError::HttpStatus { status, .. }) => assert_eq!(status, 404),
        other => panic!("Expected HttpStatus error, got {:?}", other),
    }
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let client = AsyncHttpClient::new(config(0)).unwrap();
    let result = client
        .download_schema(&format!("http://{address}/schema.xsd"))
        .await;
    assert!(result.is_err());
}
