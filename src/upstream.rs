use axum::body::Bytes;
use log::{debug, warn};
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;

use crate::error::GatewayError;
use crate::model::Upload;

/// Raw answer from an upstream service. The body is not assumed to be JSON.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client shared by every forwarding route.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: Client,
    timeout: Duration,
    connect_timeout: Duration,
}

impl UpstreamClient {
    pub fn new(timeout: Duration, connect_timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .user_agent(concat!("recipe-capture/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GatewayError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            timeout,
            connect_timeout,
        })
    }

    pub async fn post_json(
        &self,
        base_url: &str,
        path: &str,
        body: &Value,
    ) -> Result<UpstreamResponse, GatewayError> {
        let request = self.client.post(format!("{base_url}{path}")).json(body);
        self.send(base_url, request).await
    }

    /// Re-encode `upload` as a fresh multipart body under `field`.
    ///
    /// reqwest generates the boundary and the content type header.
    pub async fn post_file(
        &self,
        base_url: &str,
        path: &str,
        field: &str,
        upload: Upload,
    ) -> Result<UpstreamResponse, GatewayError> {
        let length = upload.size();
        let mut part = Part::stream_with_length(upload.data, length).file_name(upload.file_name);
        if let Some(content_type) = upload.content_type.as_deref() {
            part = part.mime_str(content_type).map_err(|_| {
                GatewayError::Validation(format!(
                    "Invalid content type '{content_type}' on field '{field}'."
                ))
            })?;
        }

        let form = Form::new().part(field.to_string(), part);
        let request = self.client.post(format!("{base_url}{path}")).multipart(form);
        self.send(base_url, request).await
    }

    pub async fn get(&self, base_url: &str, path: &str) -> Result<UpstreamResponse, GatewayError> {
        let request = self.client.get(format!("{base_url}{path}"));
        self.send(base_url, request).await
    }

    async fn send(
        &self,
        base_url: &str,
        request: RequestBuilder,
    ) -> Result<UpstreamResponse, GatewayError> {
        let response = request
            .send()
            .await
            .map_err(|e| self.network_error(base_url, e))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| self.network_error(base_url, e))?;

        debug!(
            "Upstream {} answered {} ({:?}, {} bytes)",
            base_url,
            status,
            content_type,
            body.len()
        );

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }

    /// Timeout that fired; connect timeouts report both is_connect and is_timeout.
    fn elapsed_limit(&self, during_connect: bool) -> Duration {
        if during_connect {
            self.connect_timeout
        } else {
            self.timeout
        }
    }

    fn network_error(&self, base_url: &str, error: reqwest::Error) -> GatewayError {
        warn!("Upstream request to {} failed: {}", base_url, error);
        if error.is_builder() {
            GatewayError::Internal(format!("Invalid upstream request: {error}"))
        } else if error.is_timeout() {
            GatewayError::UpstreamTimeout {
                url: base_url.to_string(),
                secs: self.elapsed_limit(error.is_connect()).as_secs(),
            }
        } else {
            GatewayError::UpstreamUnreachable {
                url: base_url.to_string(),
                cause: root_cause(&error),
            }
        }
    }
}

fn root_cause(error: &(dyn std::error::Error + 'static)) -> String {
    let mut current = error;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn client() -> UpstreamClient {
        UpstreamClient::new(Duration::from_secs(5), Duration::from_secs(1)).unwrap()
    }

    #[tokio::test]
    async fn test_post_json_relays_status_and_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/extract")
            .match_body(Matcher::Json(json!({"url": "https://example.com"})))
            .with_status(418)
            .with_header("content-type", "application/json")
            .with_body(r#"{"detail":"teapot"}"#)
            .create_async()
            .await;

        let response = client()
            .post_json(&server.url(), "/extract", &json!({"url": "https://example.com"}))
            .await
            .unwrap();

        assert_eq!(response.status, 418);
        assert!(!response.is_success());
        assert_eq!(response.content_type.as_deref(), Some("application/json"));
        assert_eq!(&response.body[..], br#"{"detail":"teapot"}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_post_file_sends_fresh_multipart() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/transcribe")
            .match_header(
                "content-type",
                Matcher::Regex("^multipart/form-data; boundary=.+".to_string()),
            )
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#"name="file"; filename="clip.mp4""#.to_string()),
                Matcher::Regex("fake video bytes".to_string()),
            ]))
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;

        let upload = Upload {
            file_name: "clip.mp4".to_string(),
            content_type: Some("video/mp4".to_string()),
            data: Bytes::from_static(b"fake video bytes"),
        };
        let response = client()
            .post_file(&server.url(), "/transcribe", "file", upload)
            .await
            .unwrap();

        assert!(response.is_success());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_connection_refused_is_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let err = client().get(&url, "/health").await.unwrap_err();
        match err {
            GatewayError::UpstreamUnreachable { url: reported, .. } => assert_eq!(reported, url),
            other => panic!("expected unreachable, got {other:?}"),
        }
    }

    #[test]
    fn test_elapsed_limit_distinguishes_connect_timeout() {
        let client = UpstreamClient::new(Duration::from_secs(300), Duration::from_secs(10)).unwrap();
        assert_eq!(client.elapsed_limit(true), Duration::from_secs(10));
        assert_eq!(client.elapsed_limit(false), Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_silent_upstream_reports_request_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = UpstreamClient::new(Duration::from_secs(1), Duration::from_secs(5)).unwrap();
        let err = client.get(&url, "/health").await.unwrap_err();
        match err {
            GatewayError::UpstreamTimeout { url: reported, secs } => {
                assert_eq!(reported, url);
                assert_eq!(secs, 1);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn test_is_success_range() {
        let response = |status| UpstreamResponse {
            status,
            content_type: None,
            body: Bytes::new(),
        };
        assert!(response(200).is_success());
        assert!(response(204).is_success());
        assert!(!response(302).is_success());
        assert!(!response(500).is_success());
    }
}
