//! Attaches the bearer token and recovers from expired tokens.
//!
//! A 401 on a request that carried a token triggers one shared refresh
//! through [`AuthService::refresh_session`]; the original request is then
//! replayed with the new token. Auth endpoints pass through untouched so a
//! failed login never looks like an expired session.

use async_trait::async_trait;
use reqwest::StatusCode;

use super::{is_auth_endpoint, HttpRequest, HttpResponse, Middleware, Next};
use crate::{error::ApiError, state::auth::AuthService};

pub struct AuthInterceptor {
    auth: AuthService,
}

impl AuthInterceptor {
    pub fn new(auth: AuthService) -> Self {
        Self { auth }
    }
}

fn is_unauthorized(result: &Result<HttpResponse, ApiError>) -> bool {
    match result {
        Ok(response) => response.status == StatusCode::UNAUTHORIZED,
        Err(error) => error.status == StatusCode::UNAUTHORIZED.as_u16(),
    }
}

#[async_trait]
impl Middleware for AuthInterceptor {
    async fn handle(
        &self,
        mut request: HttpRequest,
        next: Next<'_>,
    ) -> Result<HttpResponse, ApiError> {
        let path = request.path();
        if is_auth_endpoint(&path) {
            return next.run(request).await;
        }

        let token = self.auth.access_token();
        if let Some(token) = token.as_deref() {
            request.set_bearer(token)?;
        }

        let result = next.run(request.clone()).await;
        if token.is_none() || !is_unauthorized(&result) {
            return result;
        }

        // A refresh that finished while this request was in flight already
        // rotated the tokens; replay with those instead of refreshing again.
        let current = self.auth.access_token();
        let fresh = match current {
            Some(current) if Some(&current) != token.as_ref() => {
                tracing::debug!(method = %request.method, %path, "Replaying with rotated token");
                current
            }
            _ => {
                tracing::debug!(
                    method = %request.method,
                    %path,
                    "Access token rejected; refreshing"
                );
                match self.auth.refresh_session().await {
                    Ok(fresh) => fresh,
                    Err(err) => {
                        tracing::warn!(
                            method = %request.method,
                            %path,
                            error = %err,
                            "Request abandoned after failed refresh"
                        );
                        return Err(err.with_request(request.method.as_str(), &path));
                    }
                }
            }
        };

        request.set_bearer(&fresh)?;
        next.run(request).await
    }
}
