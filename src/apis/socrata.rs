use crate::config::SourceConfig;
use crate::error::Result;
use crate::types::{PageSource, RawRecord};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

/// Reader for a Socrata (SODA) JSON resource, paged with `$limit`/`$offset`
/// and ordered by a stable identifier so consecutive pages do not overlap.
pub struct SocrataClient {
    client: reqwest::Client,
    endpoint: String,
    order_field: String,
}

impl SocrataClient {
    pub fn new(endpoint: impl Into<String>, order_field: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("permit_pipeline/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            order_field: order_field.into(),
        })
    }

    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        Self::new(&config.endpoint, &config.order_field, config.timeout())
    }

    fn page_query(&self, limit: usize, offset: usize) -> [(&'static str, String); 3] {
        [
            ("$limit", limit.to_string()),
            ("$offset", offset.to_string()),
            ("$order", self.order_field.clone()),
        ]
    }
}

#[async_trait]
impl PageSource for SocrataClient {
    fn source_name(&self) -> &str {
        &self.endpoint
    }

    /// Non-2xx statuses, timeouts and bodies that are not an array of objects all surface as errors
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn fetch_page(&self, limit: usize, offset: usize) -> Result<Vec<RawRecord>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&self.page_query(limit, offset))
            .send()
            .await?
            .error_for_status()?;

        let records: Vec<RawRecord> = response.json().await?;
        debug!("Received {} records", records.len());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response and hand back the request line that was received
    async fn serve_once(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = stream.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
            request.lines().next().unwrap_or_default().to_string()
        });
        (format!("http://{}/resource/permits.json", addr), handle)
    }

    #[tokio::test]
    async fn test_fetch_page_sends_paging_parameters() {
        let (url, server) = serve_once("200 OK", r#"[{"permit_": "100"}, {"permit_": "101"}]"#).await;
        let client = SocrataClient::new(url, "permit_", Duration::from_secs(5)).unwrap();

        let records = client.fetch_page(2, 4).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["permit_"], "100");

        let request_line = server.await.unwrap();
        assert!(request_line.starts_with("GET /resource/permits.json?"));
        assert!(request_line.contains("limit=2"));
        assert!(request_line.contains("offset=4"));
        assert!(request_line.contains("order=permit_"));
    }

    #[tokio::test]
    async fn test_fetch_page_rejects_error_status() {
        let (url, server) = serve_once("500 Internal Server Error", r#"{"error": true}"#).await;
        let client = SocrataClient::new(url, "permit_", Duration::from_secs(5)).unwrap();

        let err = client.fetch_page(10, 0).await.unwrap_err();
        assert!(matches!(err, PipelineError::Http(_)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_page_rejects_non_array_body() {
        let (url, server) = serve_once("200 OK", r#"{"message": "not a page"}"#).await;
        let client = SocrataClient::new(url, "permit_", Duration::from_secs(5)).unwrap();

        assert!(client.fetch_page(10, 0).await.is_err());
        server.await.unwrap();
    }
}
