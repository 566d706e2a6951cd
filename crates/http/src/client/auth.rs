//! Authentication API client methods

use super::{AdminClient, ApiRequest, AuthEvent, ClientError};
use crate::types::{
    ForgotPasswordRequest, LoginRequest, LoginResponse, RegisterRequest, ResetPasswordRequest,
    VerifyEmailRequest,
};
use fepa_core::UserSnapshot;
use serde_json::json;

impl AdminClient {
    /// Log in and persist the issued credentials.
    ///
    /// With `remember` the email is kept in local storage for the next login;
    /// without it any previously remembered email is forgotten.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        remember: bool,
    ) -> Result<UserSnapshot, ClientError> {
        let request = ApiRequest::post("/auth/login").json(&LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        })?;
        let response: LoginResponse = self.send_enveloped(request).await?;

        let session = self.session();
        session.store_tokens(&response.tokens()).await?;
        session.set_user(&response.user).await?;
        session.remember_email(remember.then_some(email)).await?;

        info!(user_id = %response.user.id, role = ?response.user.role, "Logged in");
        self.emit(AuthEvent::LoggedIn {
            user_id: response.user.id.clone(),
        });
        Ok(response.user)
    }

    /// Register a new account
    pub async fn register(&self, request: RegisterRequest) -> Result<UserSnapshot, ClientError> {
        let request = ApiRequest::post("/auth/register").json(&request)?;
        self.send_enveloped(request).await
    }

    /// Ask the server to email a password reset link
    pub async fn forgot_password(&self, email: &str) -> Result<(), ClientError> {
        let request = ApiRequest::post("/auth/forgot-password").json(&ForgotPasswordRequest {
            email: email.to_string(),
        })?;
        self.send_empty(request).await
    }

    /// Set a new password with a reset token
    pub async fn reset_password(&self, token: &str, password: &str) -> Result<(), ClientError> {
        let request = ApiRequest::post("/auth/reset-password").json(&ResetPasswordRequest {
            token: token.to_string(),
            password: password.to_string(),
        })?;
        self.send_empty(request).await
    }

    /// Confirm an email address with a verification token
    pub async fn verify_email(&self, token: &str) -> Result<(), ClientError> {
        let request = ApiRequest::post("/auth/verify-email").json(&VerifyEmailRequest {
            token: token.to_string(),
        })?;
        self.send_empty(request).await
    }

    /// Fetch the current user and refresh the stored snapshot
    pub async fn me(&self) -> Result<UserSnapshot, ClientError> {
        let user: UserSnapshot = self.send_enveloped(ApiRequest::get("/auth/me")).await?;
        self.session().set_user(&user).await?;
        Ok(user)
    }

    /// End the session.
    ///
    /// The server call is best effort; local credentials are always cleared.
    pub async fn logout(&self) -> Result<(), ClientError> {
        if let Some(refresh_token) = self.session().refresh_token().await? {
            let request = ApiRequest::post("/auth/logout")
                .body(json!({ "refreshToken": refresh_token }));
            if let Err(err) = self.send_empty(request).await {
                warn!(error = %err, "Server logout failed, clearing local session anyway");
            }
        }

        self.session().clear_credentials().await?;
        info!("Logged out");
        self.emit(AuthEvent::LoggedOut);
        Ok(())
    }
}
