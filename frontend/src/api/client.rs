use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{de::DeserializeOwned, Serialize};

use super::types::ApiEnvelope;
use crate::{
    error::{ApiError, ErrorCode},
    http::{HttpRequest, HttpResponse, Pipeline},
};

const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encodes one path segment or query value.
pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Appends the present parameters as a query string.
pub fn with_query(path: &str, params: &[(&str, Option<String>)]) -> String {
    let query: Vec<String> = params
        .iter()
        .filter_map(|(key, value)| {
            value
                .as_deref()
                .map(|value| format!("{}={}", key, encode_component(value)))
        })
        .collect();
    if query.is_empty() {
        path.to_string()
    } else {
        format!("{}?{}", path, query.join("&"))
    }
}

#[derive(Clone)]
pub struct ApiClient {
    pipeline: Pipeline,
    base_url: String,
}

impl ApiClient {
    pub fn new(pipeline: Pipeline, base_url: impl Into<String>) -> Self {
        Self {
            pipeline,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let method = request.method.to_string();
        let path = request.path();
        let response = self.pipeline.send(request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(ApiError::from_response(response.status, &response.body)
                .with_request(&method, &path))
        }
    }

    fn encode<B: Serialize>(body: &B) -> Result<serde_json::Value, ApiError> {
        serde_json::to_value(body)
            .map_err(|e| ApiError::unknown(format!("Failed to encode request: {}", e)))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(HttpRequest::get(self.url(path)))
            .await?
            .json()
    }

    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let request = HttpRequest::post(self.url(path)).json(Self::encode(body)?);
        self.execute(request).await?.json()
    }

    pub async fn put_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let request = HttpRequest::put(self.url(path)).json(Self::encode(body)?);
        self.execute(request).await?.json()
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.execute(HttpRequest::delete(self.url(path))).await?;
        Ok(())
    }

    /// Posts to an endpoint answering `{success, message, data}`. A
    /// `success: false` body is a business-rule violation carrying the
    /// server's message as is.
    pub async fn post_envelope<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiEnvelope<T>, ApiError> {
        let envelope: ApiEnvelope<T> = self.post_json(path, body).await?;
        if envelope.success {
            return Ok(envelope);
        }
        let request_path = HttpRequest::post(self.url(path)).path();
        let mut error = ApiError::new(
            ErrorCode::BusinessRuleViolation,
            ErrorCode::BusinessRuleViolation.messages().0,
        )
        .with_request("POST", &request_path);
        if let Some(message) = envelope.message.filter(|m| !m.trim().is_empty()) {
            error.message = message.clone();
            error.message_th = message;
        }
        tracing::info!(
            path = %request_path,
            message = %error.message,
            "Request rejected by business rule"
        );
        Err(error)
    }
}
