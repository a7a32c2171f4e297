//! HTTP client for the Studyhall platform API.
//!
//! All endpoints answer with a common envelope `{code, message, result}` on
//! success and `{message}` with an error status on failure. The client keeps
//! a cookie store so the server-set refresh cookie rides along on
//! `/auth/refresh` without the rest of the application ever seeing it.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use tracing::debug;

use crate::models::{ChangePasswordPayload, UpdateProfilePayload, UserProfile};

use super::ApiError;

/// HTTP request timeout in seconds.
/// 30s allows for slow responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Access token grant returned by the login and refresh endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Common success envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    code: Option<i32>,
    #[serde(default)]
    message: Option<String>,
    result: Option<T>,
}

/// API client for the learning platform.
/// Clone is cheap - reqwest::Client uses Arc internally for connection
/// pooling, and clones share the cookie store.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client rooted at the given server URL
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and map non-2xx statuses onto the error taxonomy
    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ApiError> {
        let response = request.send().await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Unwrap the success envelope, failing when `result` is absent
    async fn parse_result<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        debug!(code = ?envelope.code, message = ?envelope.message, "response envelope");
        envelope
            .result
            .ok_or_else(|| ApiError::InvalidResponse("envelope has no result".to_string()))
    }

    /// Sign in with email and password.
    /// The response also sets the refresh cookie on the shared cookie store.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenGrant, ApiError> {
        let url = self.url("/auth/login");
        let response = self
            .execute(
                self.client
                    .post(&url)
                    .json(&json!({ "email": email, "password": password })),
            )
            .await?;
        Self::parse_result(response).await
    }

    /// Exchange the refresh cookie for a fresh access token.
    /// Fails with `Unauthorized` when no valid refresh cookie is held,
    /// which is the expected state for a first visit.
    pub async fn refresh(&self) -> Result<TokenGrant, ApiError> {
        let url = self.url("/auth/refresh");
        let response = self.execute(self.client.post(&url).json(&json!({}))).await?;
        Self::parse_result(response).await
    }

    /// Fetch the signed-in user's profile
    pub async fn fetch_profile(&self, token: &str) -> Result<UserProfile, ApiError> {
        let url = self.url("/users/profile");
        let response = self
            .execute(self.client.get(&url).bearer_auth(token))
            .await?;
        Self::parse_result(response).await
    }

    /// Ask the server to email a one-time passcode
    pub async fn request_otp(&self, email: &str) -> Result<(), ApiError> {
        let url = self.url("/auth/forgot-password");
        self.execute(self.client.post(&url).json(&json!({ "email": email })))
            .await?;
        debug!(email = %email, "passcode requested");
        Ok(())
    }

    /// Submit a one-time passcode for verification
    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<(), ApiError> {
        let url = self.url("/auth/verify-otp");
        self.execute(
            self.client
                .post(&url)
                .json(&json!({ "email": email, "otp": code })),
        )
        .await?;
        debug!(email = %email, "passcode verified");
        Ok(())
    }

    /// Replace the signed-in user's profile
    pub async fn update_profile(
        &self,
        token: &str,
        payload: &UpdateProfilePayload,
    ) -> Result<UserProfile, ApiError> {
        let url = self.url("/users/profile/update");
        let response = self
            .execute(self.client.post(&url).bearer_auth(token).json(payload))
            .await?;
        Self::parse_result(response).await
    }

    /// Change the signed-in user's password
    pub async fn change_password(
        &self,
        token: &str,
        payload: &ChangePasswordPayload,
    ) -> Result<(), ApiError> {
        let url = self.url("/users/change-password");
        self.execute(self.client.put(&url).bearer_auth(token).json(payload))
            .await?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::new(server.uri()).expect("build client")
    }

    #[tokio::test]
    async fn test_refresh_parses_token_grant() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 1000,
                "message": "ok",
                "result": {
                    "accessToken": "tok-123",
                    "expiresAt": "2026-08-07T12:00:00Z"
                }
            })))
            .mount(&server)
            .await;

        let grant = client_for(&server).await.refresh().await.expect("refresh");
        assert_eq!(grant.access_token, "tok-123");
        assert!(grant.expires_at.is_some());
    }

    #[tokio::test]
    async fn test_refresh_without_result_is_invalid_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "code": 1000, "message": "ok" })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).await.refresh().await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_refresh_without_cookie_is_unauthorized() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({ "message": "no session" })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).await.refresh().await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[tokio::test]
    async fn test_fetch_profile_sends_bearer_token() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/users/profile"))
            .and(header("authorization", "Bearer tok-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 1000,
                "message": "ok",
                "result": {
                    "id": "u-1",
                    "email": "mai@example.edu",
                    "role": "STUDENT",
                    "firstName": "Mai",
                    "lastName": "Tran",
                    "status": 3
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let profile = client_for(&server)
            .await
            .fetch_profile("tok-123")
            .await
            .expect("profile");
        assert_eq!(profile.email, "mai@example.edu");
    }

    #[tokio::test]
    async fn test_request_otp_posts_email() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/forgot-password"))
            .and(body_json(json!({ "email": "a@b.com" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 1000 })))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .await
            .request_otp("a@b.com")
            .await
            .expect("request otp");
    }

    #[tokio::test]
    async fn test_verify_otp_rejection_surfaces_server_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/verify-otp"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({ "message": "The code has expired" })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .verify_otp("a@b.com", "123456")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "The code has expired");
    }
}
