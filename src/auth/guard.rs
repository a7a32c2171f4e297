//! Per-mount session bootstrap for protected views.
//!
//! A `RouteGuard` is created fresh each time a protected view mounts. It
//! reconciles the in-memory credential with the server-held refresh cookie
//! exactly once, then settles into one of three render outcomes. Several
//! guards may be live at once; they all converge on the shared store's
//! state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use super::AuthStore;

/// What the gate should render right now. Exactly one of these holds at any
/// instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardView {
    /// Bootstrap (or a store operation) is still in flight; show neither the
    /// protected content nor the redirect
    Loading,
    /// Credential present; render the protected subtree. Identity may still
    /// be absent momentarily - authentication gates access, not profile
    /// completeness.
    Protected,
    /// Bootstrap settled with no credential; leave for the sign-in entry
    /// point, replacing history so back-navigation cannot land on a dead
    /// protected view
    RedirectToLogin,
}

#[derive(Clone)]
pub struct RouteGuard {
    store: AuthStore,
    /// True from mount until the bootstrap sequence completes; drops to
    /// false exactly once and never rises again on this guard
    starting: Arc<AtomicBool>,
    /// Liveness of the hosting view; checked before every post-await
    /// mutation so teardown makes the bootstrap a no-op
    mounted: Arc<AtomicBool>,
}

impl RouteGuard {
    /// Construct without spawning; the caller drives `bootstrap` itself
    pub fn new(store: AuthStore) -> Self {
        Self {
            store,
            starting: Arc::new(AtomicBool::new(true)),
            mounted: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Construct and run the bootstrap sequence in the background
    pub fn mount(store: AuthStore) -> Self {
        let guard = Self::new(store);
        let task = guard.clone();
        tokio::spawn(async move {
            task.bootstrap().await;
        });
        guard
    }

    /// The one-time reconciliation sequence.
    ///
    /// Refresh is awaited before the identity fetch is considered, so the
    /// fetch can never observe an absent credential as a race. Failures are
    /// deliberately swallowed here: an unauthenticated visitor is an
    /// expected state and resolves to a silent redirect, not an error.
    pub async fn bootstrap(&self) {
        if !self.store.is_authenticated() {
            let _ = self.store.refresh().await;
        }

        if self.store.is_authenticated() && self.store.identity().is_none() {
            let _ = self.store.fetch_me().await;
        }

        if self.mounted.load(Ordering::SeqCst) {
            self.starting.store(false, Ordering::SeqCst);
            debug!(authenticated = self.store.is_authenticated(), "bootstrap complete");
        } else {
            debug!("bootstrap finished after teardown, discarded");
        }
    }

    /// Mark the hosting view as torn down. Any still-running bootstrap step
    /// becomes a no-op.
    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::SeqCst);
    }

    pub fn view(&self) -> GuardView {
        if self.starting.load(Ordering::SeqCst) || self.store.is_loading() {
            GuardView::Loading
        } else if !self.store.is_authenticated() {
            GuardView::RedirectToLogin
        } else {
            GuardView::Protected
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiClient;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(server: &MockServer) -> AuthStore {
        AuthStore::new(ApiClient::new(server.uri()).expect("build client"))
    }

    async fn mock_refresh_ok(server: &MockServer, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 1000, "result": { "accessToken": "tok-1" }
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    async fn mock_refresh_denied(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "none" })))
            .mount(server)
            .await;
    }

    async fn mock_profile(server: &MockServer, status: u16, expected_calls: u64) {
        let template = if status == 200 {
            ResponseTemplate::new(200).set_body_json(json!({
                "code": 1000,
                "result": {
                    "id": "u-1",
                    "email": "mai@example.edu",
                    "role": "STUDENT",
                    "firstName": "Mai",
                    "lastName": "Tran",
                    "status": 3
                }
            }))
        } else {
            ResponseTemplate::new(status).set_body_json(json!({ "message": "failed" }))
        };
        Mock::given(method("GET"))
            .and(path("/users/profile"))
            .respond_with(template)
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_no_session_redirects_without_identity_fetch() {
        let server = MockServer::start().await;
        mock_refresh_denied(&server).await;
        mock_profile(&server, 200, 0).await;

        let guard = RouteGuard::new(store_for(&server));
        assert_eq!(guard.view(), GuardView::Loading);

        guard.bootstrap().await;
        assert_eq!(guard.view(), GuardView::RedirectToLogin);
    }

    #[tokio::test]
    async fn test_valid_session_renders_protected_with_identity() {
        let server = MockServer::start().await;
        mock_refresh_ok(&server, 1).await;
        mock_profile(&server, 200, 1).await;

        let store = store_for(&server);
        let guard = RouteGuard::new(store.clone());
        guard.bootstrap().await;

        assert_eq!(guard.view(), GuardView::Protected);
        assert_eq!(store.identity().expect("identity").first_name, "Mai");
    }

    #[tokio::test]
    async fn test_identity_fetch_failure_still_grants_access() {
        let server = MockServer::start().await;
        mock_refresh_ok(&server, 1).await;
        mock_profile(&server, 500, 1).await;

        let store = store_for(&server);
        let guard = RouteGuard::new(store.clone());
        guard.bootstrap().await;

        assert_eq!(guard.view(), GuardView::Protected);
        assert!(store.identity().is_none());
    }

    #[tokio::test]
    async fn test_loading_holds_until_bootstrap_completes() {
        let server = MockServer::start().await;
        mock_refresh_ok(&server, 0).await;
        mock_profile(&server, 200, 1).await;

        let store = store_for(&server);
        // Seed a credential so the guard skips the refresh step entirely
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 1000, "result": { "accessToken": "tok-login" }
            })))
            .mount(&server)
            .await;
        store.login("mai@example.edu", "pw").await.expect("login");

        let guard = RouteGuard::new(store);
        // Authenticated, but the bootstrap has not settled yet
        assert_eq!(guard.view(), GuardView::Loading);

        guard.bootstrap().await;
        assert_eq!(guard.view(), GuardView::Protected);
    }

    #[tokio::test]
    async fn test_teardown_before_completion_discards_the_result() {
        let server = MockServer::start().await;
        mock_refresh_denied(&server).await;

        let guard = RouteGuard::new(store_for(&server));
        guard.unmount();
        guard.bootstrap().await;

        // The completion mutation was a no-op; the guard never settled
        assert_eq!(guard.view(), GuardView::Loading);
    }

    #[tokio::test]
    async fn test_two_guards_converge_on_one_session() {
        let server = MockServer::start().await;
        mock_refresh_ok(&server, 1).await;
        mock_profile(&server, 200, 1).await;

        let store = store_for(&server);
        let first = RouteGuard::new(store.clone());
        let second = RouteGuard::new(store.clone());

        tokio::join!(first.bootstrap(), second.bootstrap());

        assert_eq!(first.view(), GuardView::Protected);
        assert_eq!(second.view(), GuardView::Protected);
        assert!(store.is_authenticated());
    }

    #[tokio::test]
    async fn test_two_guards_redirect_consistently_without_session() {
        let server = MockServer::start().await;
        mock_refresh_denied(&server).await;

        let store = store_for(&server);
        let first = RouteGuard::new(store.clone());
        let second = RouteGuard::new(store.clone());

        tokio::join!(first.bootstrap(), second.bootstrap());

        assert_eq!(first.view(), GuardView::RedirectToLogin);
        assert_eq!(second.view(), GuardView::RedirectToLogin);
        assert!(!store.is_authenticated());
    }
}
