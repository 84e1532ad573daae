//! Contract of the authentication API called by the site's browser client.
//!
//! The service itself lives elsewhere. These types pin down the endpoint
//! paths, request bodies and response shape, and decide where the client goes
//! after each response.

use serde::{Deserialize, Serialize};

/// Host the browser client talks to by default.
pub const DEFAULT_API_HOST: &str = "http://127.0.0.1:3000";

/// Page shown when a password reset token has expired.
pub const TOKEN_EXPIRED_PAGE: &str = "/reset_password_token_expired/index.html";

/// Authentication endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Sign in with name or email and password.
    Signin,
    /// Create an account.
    Signup,
    /// Email a password reset token.
    SendPasswordResetToken,
    /// Change the password using a reset token.
    ResetPassword,
}

impl Endpoint {
    /// Path of the endpoint on the API host.
    pub fn path(self) -> &'static str {
        match self {
            Self::Signin => "/api/signin/",
            Self::Signup => "/api/signup/",
            Self::SendPasswordResetToken => "/api/send/passwordToken",
            Self::ResetPassword => "/api/reset_password/",
        }
    }

    /// Full URL of the endpoint.
    pub fn url(self, host: &str) -> String {
        format!("{}{}", host.trim_end_matches('/'), self.path())
    }

    /// Page the client navigates to after a successful call.
    pub fn success_page(self) -> &'static str {
        match self {
            Self::Signin => "/signin_success/index.html",
            Self::Signup => "/confirm_email/index.html",
            Self::SendPasswordResetToken => "/reset_email/index.html",
            // Path spelling matches the deployed page.
            Self::ResetPassword => "/rest_password_success/index.html",
        }
    }
}

/// Body of a `signin` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigninRequest {
    pub username: String,
    pub password: String,
}

/// Body of a `signup` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Body of a `send-password-reset-token` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordTokenRequest {
    pub username: String,
}

/// Body of a `reset-password` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_password: Option<String>,
    pub new_password: String,
    pub token: String,
}

/// Response code reported by the service.
///
/// Only the token-expired code carries meaning for the client; every other
/// value is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResponseCode {
    /// The password reset token is no longer valid.
    TokenExpired,
    /// Any other code, passed through untouched.
    Other(String),
}

impl ResponseCode {
    const TOKEN_EXPIRED: &'static str = "9";
}

impl From<String> for ResponseCode {
    fn from(code: String) -> Self {
        if code == Self::TOKEN_EXPIRED {
            Self::TokenExpired
        } else {
            Self::Other(code)
        }
    }
}

impl From<ResponseCode> for String {
    fn from(code: ResponseCode) -> Self {
        match code {
            ResponseCode::TokenExpired => ResponseCode::TOKEN_EXPIRED.to_string(),
            ResponseCode::Other(code) => code,
        }
    }
}

/// Response body shared by all endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ResponseCode>,
}

/// What the client does with a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Navigate to a page.
    Redirect(&'static str),
    /// Show an error message and stay.
    Error(String),
}

impl ApiResponse {
    /// Decide the client outcome for a response from `endpoint`.
    ///
    /// An expired reset token wins over any error message; an empty error
    /// string counts as success.
    pub fn outcome(&self, endpoint: Endpoint) -> Outcome {
        if endpoint == Endpoint::ResetPassword && self.code == Some(ResponseCode::TokenExpired) {
            return Outcome::Redirect(TOKEN_EXPIRED_PAGE);
        }

        match self.error.as_deref() {
            Some(error) if !error.is_empty() => Outcome::Error(error.to_string()),
            _ => Outcome::Redirect(endpoint.success_page()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url() {
        assert_eq!(
            Endpoint::Signin.url(DEFAULT_API_HOST),
            "http://127.0.0.1:3000/api/signin/"
        );
        assert_eq!(
            Endpoint::SendPasswordResetToken.url("https://hub.example.com/"),
            "https://hub.example.com/api/send/passwordToken"
        );
    }

    #[test]
    fn test_token_expired_redirect() {
        let rsp: ApiResponse =
            serde_json::from_str(r#"{"error": "token expired", "code": "9"}"#).unwrap();
        assert_eq!(rsp.code, Some(ResponseCode::TokenExpired));
        assert_eq!(
            rsp.outcome(Endpoint::ResetPassword),
            Outcome::Redirect(TOKEN_EXPIRED_PAGE)
        );
    }

    #[test]
    fn test_token_expired_only_for_reset() {
        let rsp: ApiResponse = serde_json::from_str(r#"{"error": "nope", "code": "9"}"#).unwrap();
        assert_eq!(
            rsp.outcome(Endpoint::Signin),
            Outcome::Error("nope".to_string())
        );
    }

    #[test]
    fn test_other_codes_pass_through() {
        let rsp: ApiResponse = serde_json::from_str(r#"{"code": "17"}"#).unwrap();
        assert_eq!(rsp.code, Some(ResponseCode::Other("17".to_string())));
        assert_eq!(serde_json::to_string(&rsp).unwrap(), r#"{"code":"17"}"#);
    }

    #[test]
    fn test_success_redirects() {
        let rsp = ApiResponse::default();
        assert_eq!(
            rsp.outcome(Endpoint::Signup),
            Outcome::Redirect("/confirm_email/index.html")
        );
        let rsp: ApiResponse = serde_json::from_str(r#"{"error": ""}"#).unwrap();
        assert_eq!(
            rsp.outcome(Endpoint::ResetPassword),
            Outcome::Redirect("/rest_password_success/index.html")
        );
    }

    #[test]
    fn test_reset_request_omits_missing_old_password() {
        let req = ResetPasswordRequest {
            old_password: None,
            new_password: "s3cret".to_string(),
            token: "abc".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&req).unwrap(),
            r#"{"new_password":"s3cret","token":"abc"}"#
        );
    }
}
