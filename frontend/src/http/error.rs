//! Classifies failed responses, retries transient failures of idempotent
//! requests and raises the matching user notification.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::Method;

use super::{is_auth_endpoint, HttpRequest, HttpResponse, Middleware, Next};
use crate::{
    components::toast::{self, Notification, Notifier, ToastLevel},
    error::{ApiError, ErrorCode},
};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            base_delay: Duration::from_millis(1000),
        }
    }
}

pub struct ErrorInterceptor {
    policy: RetryPolicy,
    notifier: Option<Arc<dyn Notifier>>,
}

impl ErrorInterceptor {
    pub fn new(policy: RetryPolicy, notifier: Option<Arc<dyn Notifier>>) -> Self {
        Self { policy, notifier }
    }

    fn may_retry(request: &HttpRequest) -> bool {
        let idempotent = matches!(
            request.method,
            Method::GET | Method::HEAD | Method::OPTIONS
        );
        idempotent && !is_auth_endpoint(&request.path())
    }

    fn notify(&self, error: &ApiError) {
        if let Some(notification) = notification_for(error) {
            toast::dispatch(self.notifier.as_deref(), notification);
        }
    }
}

/// The toast shown for a classified error, if any.
pub fn notification_for(error: &ApiError) -> Option<Notification> {
    let (level, retryable) = match error.code {
        // The auth stage already redirects on 401.
        ErrorCode::Unauthorized => return None,
        ErrorCode::NetworkError | ErrorCode::TimeoutError => (ToastLevel::Error, true),
        ErrorCode::ValidationError => (ToastLevel::Warning, false),
        ErrorCode::Forbidden | ErrorCode::NotFound => (ToastLevel::Info, false),
        _ => (ToastLevel::Error, false),
    };
    Some(Notification {
        level,
        message_en: error.message.clone(),
        message_th: error.message_th.clone(),
        retryable,
    })
}

#[async_trait]
impl Middleware for ErrorInterceptor {
    async fn handle(&self, request: HttpRequest, next: Next<'_>) -> Result<HttpResponse, ApiError> {
        let method = request.method.to_string();
        let path = request.path();
        let max_retries = if Self::may_retry(&request) {
            self.policy.retries
        } else {
            0
        };

        let mut attempt = 0;
        loop {
            let error = match next.run(request.clone()).await {
                Ok(response) if response.is_success() => return Ok(response),
                Ok(response) => ApiError::from_response(response.status, &response.body),
                Err(error) => error,
            }
            .with_request(&method, &path);

            if attempt < max_retries && error.is_retryable() {
                attempt += 1;
                let delay = self.policy.delay_for(attempt);
                tracing::debug!(
                    %method,
                    %path,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    code = %error.code,
                    "Retrying request"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            tracing::warn!(
                %method,
                %path,
                status = error.status,
                code = %error.code,
                message = %error.message,
                "Request failed"
            );
            self.notify(&error);
            return Err(error);
        }
    }
}
