//! Request pipeline: an ordered chain of middleware in front of a transport.
//!
//! ```text
//!   ApiClient ──▶ Loading ──▶ Auth ──▶ Error ──▶ Transport ──▶ network
//!             ◀──         ◀──      ◀──       ◀──
//! ```
//!
//! Each stage receives the request and a [`Next`] handle for the rest of the
//! chain. `Next` is `Copy`, so a stage may run the remainder more than once
//! (the error stage retries, the auth stage replays after a token refresh).

pub mod auth;
pub mod error;
pub mod loading;
pub mod transport;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION},
    Method, StatusCode, Url,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ApiError;

pub use auth::AuthInterceptor;
pub use error::ErrorInterceptor;
pub use loading::{LoadingInterceptor, LoadingTracker, SKIP_LOADING_HEADER};
pub use transport::ReqwestTransport;

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Path component of the URL; relative URLs are returned unchanged
    /// minus any query string.
    pub fn path(&self) -> String {
        match Url::parse(&self.url) {
            Ok(url) => url.path().to_string(),
            Err(_) => self
                .url
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .to_string(),
        }
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
    }

    pub fn set_bearer(&mut self, token: &str) -> Result<(), ApiError> {
        let value = format!("Bearer {}", token)
            .parse::<HeaderValue>()
            .map_err(|_| ApiError::unknown("Invalid token format"))?;
        self.headers.insert(AUTHORIZATION, value);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| ApiError::unknown(format!("Failed to parse response: {}", e)))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Sends a request over the wire. Every HTTP status is an `Ok`; only
/// failures to get a response at all are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;
}

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, request: HttpRequest, next: Next<'_>)
        -> Result<HttpResponse, ApiError>;
}

/// The remainder of the pipeline after the current stage.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    middleware: &'a [Arc<dyn Middleware>],
    transport: &'a dyn Transport,
}

impl<'a> Next<'a> {
    pub async fn run(self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        match self.middleware.split_first() {
            Some((current, rest)) => {
                let next = Next {
                    middleware: rest,
                    transport: self.transport,
                };
                current.handle(request, next).await
            }
            None => self.transport.send(request).await,
        }
    }
}

#[derive(Clone)]
pub struct Pipeline {
    middleware: Arc<[Arc<dyn Middleware>]>,
    transport: Arc<dyn Transport>,
}

impl Pipeline {
    pub fn builder(transport: Arc<dyn Transport>) -> PipelineBuilder {
        PipelineBuilder {
            middleware: Vec::new(),
            transport,
        }
    }

    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let next = Next {
            middleware: &self.middleware,
            transport: self.transport.as_ref(),
        };
        next.run(request).await
    }
}

pub struct PipelineBuilder {
    middleware: Vec<Arc<dyn Middleware>>,
    transport: Arc<dyn Transport>,
}

impl PipelineBuilder {
    /// Appends a stage. Stages registered first see requests first.
    pub fn layer(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            middleware: self.middleware.into(),
            transport: self.transport,
        }
    }
}

/// Auth endpoints never carry a bearer token, never trigger a refresh and
/// are never retried.
pub fn is_auth_endpoint(path: &str) -> bool {
    const AUTH_ENDPOINTS: &[&str] = &[
        "/auth/login",
        "/auth/register",
        "/auth/refresh-token",
        "/auth/forgot-password",
        "/auth/reset-password",
        "/auth/verify-email",
        "/auth/resend-verification",
    ];
    let path = path.trim_end_matches('/');
    AUTH_ENDPOINTS.iter().any(|endpoint| path.ends_with(endpoint))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Echo;

    #[async_trait]
    impl Transport for Echo {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
            let tags = request
                .headers
                .get("x-trace")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            Ok(HttpResponse::new(StatusCode::OK, tags))
        }
    }

    struct Tag {
        name: &'static str,
        seen: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Middleware for Tag {
        async fn handle(
            &self,
            mut request: HttpRequest,
            next: Next<'_>,
        ) -> Result<HttpResponse, ApiError> {
            let existing = request
                .headers
                .get("x-trace")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let value = format!("{}{}", existing, self.name);
            request.headers.insert(
                "x-trace",
                HeaderValue::from_str(&value).expect("ascii header"),
            );
            let response = next.run(request).await;
            self.seen.lock().unwrap().push(self.name);
            response
        }
    }

    #[tokio::test]
    async fn stages_run_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder(Arc::new(Echo))
            .layer(Tag {
                name: "a",
                seen: seen.clone(),
            })
            .layer(Tag {
                name: "b",
                seen: seen.clone(),
            })
            .build();

        let response = pipeline
            .send(HttpRequest::get("http://portal.test/api/policies"))
            .await
            .unwrap();
        assert_eq!(response.text(), "ab");
        assert_eq!(*seen.lock().unwrap(), vec!["b", "a"]);
    }

    #[test]
    fn request_path_handles_absolute_and_relative_urls() {
        let absolute = HttpRequest::get("http://portal.test/api/policies/12?page=2");
        assert_eq!(absolute.path(), "/api/policies/12");
        let relative = HttpRequest::get("/api/claims?status=OPEN");
        assert_eq!(relative.path(), "/api/claims");
    }

    #[test]
    fn bearer_token_round_trips_through_headers() {
        let mut request = HttpRequest::get("/api/policies");
        assert!(request.bearer_token().is_none());
        request.set_bearer("abc.def").unwrap();
        assert_eq!(request.bearer_token(), Some("abc.def"));
        assert!(request.set_bearer("bad\ntoken").is_err());
    }

    #[test]
    fn auth_endpoints_are_recognised() {
        assert!(is_auth_endpoint("/api/auth/login"));
        assert!(is_auth_endpoint("/api/auth/refresh-token"));
        assert!(is_auth_endpoint("/api/auth/verify-email/"));
        assert!(!is_auth_endpoint("/api/auth/change-password"));
        assert!(!is_auth_endpoint("/api/policies"));
    }
}
