//! Account flows. Login and token refresh live on `AuthService`, which owns
//! the session; these endpoints only answer with a status envelope.

use serde::Serialize;
use serde_json::Value;
use validator::Validate;

use super::{
    client::ApiClient,
    types::{
        ChangePasswordRequest, ForgotPasswordRequest, RegisterRequest, ResendVerificationRequest,
        ResetPasswordRequest, User, VerifyEmailRequest,
    },
};
use crate::error::ApiError;

impl ApiClient {
    async fn account_action<B: Serialize + Validate>(
        &self,
        path: &str,
        request: &B,
        done: &str,
    ) -> Result<String, ApiError> {
        request.validate()?;
        let envelope = self.post_envelope::<_, Value>(path, request).await?;
        Ok(envelope.message.unwrap_or_else(|| done.to_string()))
    }

    /// Creates a customer account. The server may return the new user
    /// before the email is verified.
    pub async fn register(&self, request: &RegisterRequest) -> Result<Option<User>, ApiError> {
        request.validate()?;
        let envelope = self.post_envelope::<_, User>("/auth/register", request).await?;
        tracing::info!(email = %request.email, "Registration submitted");
        Ok(envelope.data)
    }

    pub async fn forgot_password(
        &self,
        request: &ForgotPasswordRequest,
    ) -> Result<String, ApiError> {
        self.account_action(
            "/auth/forgot-password",
            request,
            "Password reset instructions sent",
        )
        .await
    }

    pub async fn reset_password(&self, request: &ResetPasswordRequest) -> Result<String, ApiError> {
        self.account_action("/auth/reset-password", request, "Password reset")
            .await
    }

    pub async fn change_password(
        &self,
        request: &ChangePasswordRequest,
    ) -> Result<String, ApiError> {
        self.account_action("/auth/change-password", request, "Password changed")
            .await
    }

    pub async fn verify_email(&self, request: &VerifyEmailRequest) -> Result<String, ApiError> {
        self.account_action("/auth/verify-email", request, "Email verified")
            .await
    }

    pub async fn resend_verification(
        &self,
        request: &ResendVerificationRequest,
    ) -> Result<String, ApiError> {
        self.account_action(
            "/auth/resend-verification",
            request,
            "Verification email sent",
        )
        .await
    }
}
