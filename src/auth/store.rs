//! Process-wide session store.
//!
//! `AuthStore` is the single writer of the access credential and the cached
//! identity; every other component reads through its accessors or invokes
//! its operations. Handles are cheap clones over shared state, so spawned
//! tasks and concurrently mounted views all observe one session.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::api::{ApiClient, ApiError};
use crate::models::{ChangePasswordPayload, UpdateProfilePayload, UserProfile};

/// The client-held access credential. Never persisted; the durable half of
/// the session is the server-set refresh cookie inside the HTTP client.
#[derive(Debug, Clone)]
pub struct Credential {
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct SessionState {
    credential: Option<Credential>,
    identity: Option<UserProfile>,
}

struct StoreInner {
    api: ApiClient,
    session: RwLock<SessionState>,
    /// Count of operations currently talking to the server
    in_flight: AtomicUsize,
    /// Serializes concurrent refresh attempts so simultaneous callers
    /// converge on a single exchange
    refresh_gate: Mutex<()>,
    /// Serializes concurrent identity fetches; the second caller gets the
    /// cached profile
    identity_gate: Mutex<()>,
}

/// Decrements the in-flight counter when an operation completes or is
/// cancelled mid-await
struct LoadGuard<'a>(&'a AtomicUsize);

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub struct AuthStore {
    inner: Arc<StoreInner>,
}

impl AuthStore {
    pub fn new(api: ApiClient) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                api,
                session: RwLock::new(SessionState::default()),
                in_flight: AtomicUsize::new(0),
                refresh_gate: Mutex::new(()),
                identity_gate: Mutex::new(()),
            }),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn is_authenticated(&self) -> bool {
        self.inner.session.read().unwrap().credential.is_some()
    }

    pub fn identity(&self) -> Option<UserProfile> {
        self.inner.session.read().unwrap().identity.clone()
    }

    pub fn credential(&self) -> Option<Credential> {
        self.inner.session.read().unwrap().credential.clone()
    }

    /// True while any store operation is talking to the server
    pub fn is_loading(&self) -> bool {
        self.inner.in_flight.load(Ordering::SeqCst) > 0
    }

    fn access_token(&self) -> Option<String> {
        self.inner
            .session
            .read()
            .unwrap()
            .credential
            .as_ref()
            .map(|c| c.access_token.clone())
    }

    fn begin_load(&self) -> LoadGuard<'_> {
        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
        LoadGuard(&self.inner.in_flight)
    }

    fn set_credential(&self, credential: Credential) {
        let mut session = self.inner.session.write().unwrap();
        session.credential = Some(credential);
    }

    fn clear_session(&self) {
        let mut session = self.inner.session.write().unwrap();
        session.credential = None;
        session.identity = None;
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Exchange the server-held refresh cookie for a new access credential.
    ///
    /// Safe to call with no prior session: that is the expected first-visit
    /// path, and it simply leaves the credential absent. Callers are free to
    /// ignore the returned error and observe `is_authenticated()` instead.
    /// On any failure the credential and identity are both cleared.
    pub async fn refresh(&self) -> Result<(), ApiError> {
        let _load = self.begin_load();
        let token_before = self.access_token();
        let _gate = self.inner.refresh_gate.lock().await;

        // A concurrent caller finished the exchange while this one waited on
        // the gate; its outcome is this one's outcome.
        if self.access_token() != token_before {
            debug!("refresh coalesced with a concurrent caller");
            return Ok(());
        }

        match self.inner.api.refresh().await {
            Ok(grant) => {
                debug!(expires_at = ?grant.expires_at, "access credential refreshed");
                self.set_credential(Credential {
                    access_token: grant.access_token,
                    expires_at: grant.expires_at,
                });
                Ok(())
            }
            Err(e) => {
                debug!(error = %e, "refresh failed, session cleared");
                self.clear_session();
                Err(e)
            }
        }
    }

    /// Fetch and cache the signed-in user's profile.
    ///
    /// Requires a credential; without one this fails with `Unauthorized`
    /// before touching the network. A 401 from the server is treated as an
    /// implicit logout: credential and identity are cleared together.
    /// Other failures leave the session untouched.
    pub async fn fetch_me(&self) -> Result<UserProfile, ApiError> {
        if self.access_token().is_none() {
            return Err(ApiError::Unauthorized);
        }

        let _load = self.begin_load();
        let _gate = self.inner.identity_gate.lock().await;

        // A concurrent caller may have populated the cache while this one
        // waited; identity is idempotent per credential.
        if let Some(profile) = self.identity() {
            return Ok(profile);
        }

        // Re-read the token: an implicit logout may have landed meanwhile
        let token = self.access_token().ok_or(ApiError::Unauthorized)?;

        match self.inner.api.fetch_profile(&token).await {
            Ok(profile) => {
                debug!(email = %profile.email, "identity cached");
                let mut session = self.inner.session.write().unwrap();
                session.identity = Some(profile.clone());
                Ok(profile)
            }
            Err(ApiError::Unauthorized) => {
                info!("profile fetch unauthorized, session cleared");
                self.clear_session();
                Err(ApiError::Unauthorized)
            }
            Err(e) => Err(e),
        }
    }

    /// Sign in with email and password. The response also plants the refresh
    /// cookie on the shared HTTP client.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), ApiError> {
        let _load = self.begin_load();
        let grant = self.inner.api.login(email, password).await?;
        self.set_credential(Credential {
            access_token: grant.access_token,
            expires_at: grant.expires_at,
        });
        info!("signed in");
        Ok(())
    }

    /// Drop the credential and identity. Synchronous, unconditional,
    /// idempotent.
    pub fn logout(&self) {
        self.clear_session();
        info!("signed out");
    }

    /// Replace the profile on the server and refresh the cached identity
    /// from the response
    pub async fn update_profile(
        &self,
        payload: &UpdateProfilePayload,
    ) -> Result<UserProfile, ApiError> {
        let token = self.access_token().ok_or(ApiError::Unauthorized)?;
        let _load = self.begin_load();
        let profile = self.inner.api.update_profile(&token, payload).await?;
        let mut session = self.inner.session.write().unwrap();
        session.identity = Some(profile.clone());
        Ok(profile)
    }

    /// Change the account password. The confirmation mismatch is caught
    /// here, before any network traffic.
    pub async fn change_password(
        &self,
        current: &str,
        new: &str,
        confirm: &str,
    ) -> Result<(), ApiError> {
        if new != confirm {
            return Err(ApiError::Validation(
                "New passwords do not match.".to_string(),
            ));
        }
        let token = self.access_token().ok_or(ApiError::Unauthorized)?;
        let _load = self.begin_load();
        let payload = ChangePasswordPayload {
            current_password: current.to_string(),
            new_password: new.to_string(),
        };
        self.inner.api.change_password(&token, &payload).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(server: &MockServer) -> AuthStore {
        AuthStore::new(ApiClient::new(server.uri()).expect("build client"))
    }

    fn grant_body(token: &str) -> serde_json::Value {
        json!({ "code": 1000, "message": "ok", "result": { "accessToken": token } })
    }

    fn profile_body(first_name: &str) -> serde_json::Value {
        json!({
            "code": 1000,
            "message": "ok",
            "result": {
                "id": "u-1",
                "email": "mai@example.edu",
                "role": "STUDENT",
                "firstName": first_name,
                "lastName": "Tran",
                "status": 3
            }
        })
    }

    async fn mock_login(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(grant_body("tok-login")))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_refresh_success_sets_authenticated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(grant_body("tok-1")))
            .mount(&server)
            .await;

        let store = store_for(&server);
        assert!(!store.is_authenticated());

        store.refresh().await.expect("refresh");
        assert!(store.is_authenticated());
        assert!(!store.is_loading());

        let credential = store.credential().expect("credential");
        assert_eq!(credential.access_token, "tok-1");
        assert!(credential.expires_at.is_none());
    }

    #[tokio::test]
    async fn test_refresh_failure_clears_session() {
        let server = MockServer::start().await;
        mock_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/users/profile"))
            .respond_with(ResponseTemplate::new(200).set_body_json(profile_body("Mai")))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({ "message": "expired" })),
            )
            .mount(&server)
            .await;

        let store = store_for(&server);
        store.login("mai@example.edu", "pw").await.expect("login");
        store.fetch_me().await.expect("fetch identity");
        assert!(store.identity().is_some());

        let err = store.refresh().await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
        assert!(!store.is_authenticated());
        assert!(store.identity().is_none());
    }

    #[tokio::test]
    async fn test_refresh_with_no_prior_session_is_expected_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "none" })))
            .mount(&server)
            .await;

        let store = store_for(&server);
        let _ = store.refresh().await;
        assert!(!store.is_authenticated());
        assert!(store.identity().is_none());
    }

    #[tokio::test]
    async fn test_logout_then_fetch_me_is_unauthorized_without_network() {
        let server = MockServer::start().await;
        mock_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/users/profile"))
            .respond_with(ResponseTemplate::new(200).set_body_json(profile_body("Mai")))
            .expect(0)
            .mount(&server)
            .await;

        let store = store_for(&server);
        store.login("mai@example.edu", "pw").await.expect("login");
        store.logout();
        store.logout(); // idempotent

        let err = store.fetch_me().await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
        assert!(store.identity().is_none());
    }

    #[tokio::test]
    async fn test_fetch_me_unauthorized_is_implicit_logout() {
        let server = MockServer::start().await;
        mock_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/users/profile"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "nope" })))
            .mount(&server)
            .await;

        let store = store_for(&server);
        store.login("mai@example.edu", "pw").await.expect("login");
        assert!(store.is_authenticated());

        let err = store.fetch_me().await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
        assert!(!store.is_authenticated());
        assert!(store.identity().is_none());
    }

    #[tokio::test]
    async fn test_fetch_me_transient_failure_leaves_session() {
        let server = MockServer::start().await;
        mock_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/users/profile"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "boom" })))
            .mount(&server)
            .await;

        let store = store_for(&server);
        store.login("mai@example.edu", "pw").await.expect("login");

        let err = store.fetch_me().await.unwrap_err();
        assert!(matches!(err, ApiError::Rejected(_)));
        assert!(store.is_authenticated());
        assert!(store.identity().is_none());
    }

    #[tokio::test]
    async fn test_fetch_me_short_circuits_on_cached_identity() {
        let server = MockServer::start().await;
        mock_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/users/profile"))
            .respond_with(ResponseTemplate::new(200).set_body_json(profile_body("Mai")))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server);
        store.login("mai@example.edu", "pw").await.expect("login");

        let first = store.fetch_me().await.expect("first fetch");
        let second = store.fetch_me().await.expect("second fetch");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_concurrent_refresh_converges_on_one_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(grant_body("tok-1")))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server);
        let (a, b) = tokio::join!(store.refresh(), store.refresh());
        assert!(a.is_ok());
        assert!(b.is_ok());
        assert!(store.is_authenticated());
    }

    #[tokio::test]
    async fn test_update_profile_replaces_cached_identity() {
        let server = MockServer::start().await;
        mock_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/users/profile"))
            .respond_with(ResponseTemplate::new(200).set_body_json(profile_body("Mai")))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/users/profile/update"))
            .respond_with(ResponseTemplate::new(200).set_body_json(profile_body("Linh")))
            .mount(&server)
            .await;

        let store = store_for(&server);
        store.login("mai@example.edu", "pw").await.expect("login");
        let before = store.fetch_me().await.expect("fetch identity");

        let payload = UpdateProfilePayload {
            first_name: "Linh".into(),
            ..UpdateProfilePayload::from_profile(&before)
        };
        store.update_profile(&payload).await.expect("update");
        assert_eq!(store.identity().expect("identity").first_name, "Linh");
    }

    #[tokio::test]
    async fn test_mutations_require_credential() {
        let server = MockServer::start().await;
        let store = store_for(&server);

        let err = store.change_password("old", "new", "new").await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[tokio::test]
    async fn test_password_mismatch_never_reaches_the_network() {
        let server = MockServer::start().await;
        mock_login(&server).await;
        Mock::given(method("PUT"))
            .and(path("/users/change-password"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 1000 })))
            .expect(0)
            .mount(&server)
            .await;

        let store = store_for(&server);
        store.login("mai@example.edu", "pw").await.expect("login");

        let err = store
            .change_password("old", "new-1", "new-2")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
