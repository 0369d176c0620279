use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{HttpRequest, HttpResponse, Transport};
use crate::error::ApiError;

/// Production transport backed by a shared `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::unknown(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let path = request.path();
        let method = request.method.to_string();
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(request.headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            let error = if e.is_timeout() {
                ApiError::timeout(format!("Request timed out: {}", e))
            } else {
                ApiError::network(format!("Request failed: {}", e))
            };
            error.with_request(&method, &path)
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| {
                ApiError::network(format!("Failed to read response: {}", e))
                    .with_request(&method, &path)
            })?
            .to_vec();

        tracing::debug!(%method, %path, status = status.as_u16(), "HTTP response received");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
