//! Application state management for Studyhall.
//!
//! This module contains the core `App` struct that manages navigation,
//! per-view form state, and coordination between the UI loop and the
//! background authentication tasks.

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::api::{ApiClient, ApiError};
use crate::auth::{
    AuthStore, CooldownTimer, GuardView, HandoffSlot, OtpFlow, OtpPhase, PasswordStore, RouteGuard,
};
use crate::config::Config;
use crate::models::UpdateProfilePayload;
use crate::notify::{Notice, Notifier};

// ============================================================================
// Constants
// ============================================================================

/// Maximum length for email input.
/// Covers institutional addresses with room to spare.
const MAX_EMAIL_LENGTH: usize = 64;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Maximum length for free-text profile fields
const MAX_FIELD_LENGTH: usize = 120;

// ============================================================================
// Navigation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    ForgotPassword,
    VerifyOtp,
    Home,
    Profile,
}

impl Route {
    /// Protected routes sit behind a `RouteGuard`
    pub fn is_protected(&self) -> bool {
        matches!(self, Route::Home | Route::Profile)
    }

    pub fn title(&self) -> &'static str {
        match self {
            Route::Login => "Sign in",
            Route::ForgotPassword => "Forgot password",
            Route::VerifyOtp => "Verify your email",
            Route::Home => "Home",
            Route::Profile => "Profile",
        }
    }
}

/// Navigation history with browser-style push/replace semantics.
/// `replace` (and `reset`) leave no dead entry to back-navigate into.
#[derive(Debug)]
pub struct RouteStack {
    stack: Vec<Route>,
}

impl RouteStack {
    pub fn new(initial: Route) -> Self {
        Self {
            stack: vec![initial],
        }
    }

    pub fn current(&self) -> Route {
        *self.stack.last().expect("route stack is never empty")
    }

    pub fn push(&mut self, route: Route) {
        self.stack.push(route);
    }

    /// Swap the current entry without growing history
    pub fn replace(&mut self, route: Route) {
        *self.stack.last_mut().expect("route stack is never empty") = route;
    }

    /// Drop all history and start over at the given route
    pub fn reset(&mut self, route: Route) {
        self.stack.clear();
        self.stack.push(route);
    }

    /// Pop back one entry; stays put at the root
    pub fn back(&mut self) -> bool {
        if self.stack.len() > 1 {
            self.stack.pop();
            true
        } else {
            false
        }
    }
}

// ============================================================================
// Form focus states
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFocus {
    Email,
    Password,
    Submit,
    Forgot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileMode {
    View,
    EditProfile,
    ChangePassword,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditFocus {
    FirstName,
    LastName,
    Expertise,
    Bio,
    Save,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordFocus {
    Current,
    New,
    Confirm,
    Save,
}

// ============================================================================
// Background task results
// ============================================================================

/// Completion messages sent back from spawned network tasks.
/// Errors arrive pre-rendered as user-facing text.
pub enum AppEvent {
    LoginFinished(Result<(), String>),
    ProfileSaved(Result<(), String>),
    PasswordChanged(Result<(), String>),
}

// ============================================================================
// Main application struct
// ============================================================================

pub struct App {
    pub config: Config,
    pub auth: AuthStore,
    pub otp: OtpFlow,

    routes: RouteStack,
    guard: Option<RouteGuard>,
    cooldown_timer: Option<CooldownTimer>,

    notifier: Notifier,
    notices_rx: mpsc::UnboundedReceiver<Notice>,
    events_tx: mpsc::UnboundedSender<AppEvent>,
    events_rx: mpsc::UnboundedReceiver<AppEvent>,

    /// Latest notice, shown in the status bar until the next keypress
    pub notice: Option<Notice>,

    // Login form state
    pub login_email: String,
    pub login_password: String,
    pub login_focus: LoginFocus,
    pub login_in_flight: bool,

    // Forgot-password form state
    pub forgot_email: String,
    forgot_request_pending: bool,

    // Profile view state
    pub profile_mode: ProfileMode,
    pub edit_focus: EditFocus,
    pub edit_first_name: String,
    pub edit_last_name: String,
    pub edit_expertise: String,
    pub edit_bio: String,
    pub password_focus: PasswordFocus,
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
    pub profile_in_flight: bool,

    pub quitting: bool,
}

impl App {
    /// Create a new application instance.
    /// Starts on the protected home route; the guard's bootstrap decides
    /// whether the session carries over or the sign-in screen appears.
    pub fn new(config: Config) -> Result<Self> {
        let api = ApiClient::new(config.server_url())?;
        let (notifier, notices_rx) = Notifier::channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let slot = HandoffSlot::new(config.data_dir()?);
        let auth = AuthStore::new(api.clone());
        let otp = OtpFlow::new(api, notifier.clone(), slot);

        let login_email = config.last_email.clone().unwrap_or_default();
        let login_password = if !login_email.is_empty() && PasswordStore::has(&login_email) {
            PasswordStore::get(&login_email).unwrap_or_default()
        } else {
            String::new()
        };

        let guard = Some(RouteGuard::mount(auth.clone()));

        Ok(Self {
            config,
            auth,
            otp,

            routes: RouteStack::new(Route::Home),
            guard,
            cooldown_timer: None,

            notifier,
            notices_rx,
            events_tx,
            events_rx,

            notice: None,

            login_email,
            login_password,
            login_focus: LoginFocus::Email,
            login_in_flight: false,

            forgot_email: String::new(),
            forgot_request_pending: false,

            profile_mode: ProfileMode::View,
            edit_focus: EditFocus::FirstName,
            edit_first_name: String::new(),
            edit_last_name: String::new(),
            edit_expertise: String::new(),
            edit_bio: String::new(),
            password_focus: PasswordFocus::Current,
            current_password: String::new(),
            new_password: String::new(),
            confirm_password: String::new(),
            profile_in_flight: false,

            quitting: false,
        })
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    pub fn current_route(&self) -> Route {
        self.routes.current()
    }

    /// The guard gating the current route, when it is a protected one
    pub fn guard_view(&self) -> Option<GuardView> {
        self.guard.as_ref().map(|g| g.view())
    }

    pub fn navigate_push(&mut self, route: Route) {
        let prev = self.current_route();
        self.routes.push(route);
        self.route_changed(prev);
    }

    pub fn navigate_replace(&mut self, route: Route) {
        let prev = self.current_route();
        self.routes.replace(route);
        self.route_changed(prev);
    }

    /// Navigate with history wiped, e.g. the post-bootstrap redirect
    pub fn navigate_reset(&mut self, route: Route) {
        let prev = self.current_route();
        self.routes.reset(route);
        self.route_changed(prev);
    }

    pub fn navigate_back(&mut self) {
        let prev = self.current_route();
        if self.routes.back() {
            self.route_changed(prev);
        }
    }

    /// Mount and unmount route-owned machinery on transitions
    fn route_changed(&mut self, prev: Route) {
        let current = self.current_route();
        if prev == current {
            return;
        }
        debug!(from = ?prev, to = ?current, "route changed");

        // Tear down whatever the previous route owned. Unmounting makes any
        // still-running bootstrap a no-op; dropping the timer cancels its
        // pending ticks.
        if let Some(guard) = self.guard.take() {
            guard.unmount();
        }
        self.cooldown_timer = None;

        match current {
            route if route.is_protected() => {
                self.guard = Some(RouteGuard::mount(self.auth.clone()));
                self.profile_mode = ProfileMode::View;
            }
            Route::VerifyOtp => {
                // A code is already out for the pending email; arm the wait
                self.otp.begin_awaiting();
            }
            _ => {}
        }
    }

    // =========================================================================
    // Per-frame update
    // =========================================================================

    /// Advance app state between frames: drain completion channels and react
    /// to settled background state
    pub fn on_tick(&mut self) {
        self.drain_events();
        self.drain_notices();
        self.sync_guard();
        self.sync_otp();
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                AppEvent::LoginFinished(result) => self.finish_login(result),
                AppEvent::ProfileSaved(result) => {
                    self.profile_in_flight = false;
                    match result {
                        Ok(()) => {
                            self.notifier.success("Profile", "Profile updated.");
                            self.profile_mode = ProfileMode::View;
                        }
                        Err(message) => self.notifier.error("Profile", message),
                    }
                }
                AppEvent::PasswordChanged(result) => {
                    self.profile_in_flight = false;
                    match result {
                        Ok(()) => {
                            self.notifier.success("Change password", "Password changed.");
                            self.current_password.clear();
                            self.new_password.clear();
                            self.confirm_password.clear();
                            self.profile_mode = ProfileMode::View;
                        }
                        Err(message) => self.notifier.error("Change password", message),
                    }
                }
            }
        }
    }

    fn drain_notices(&mut self) {
        while let Ok(notice) = self.notices_rx.try_recv() {
            self.notice = Some(notice);
        }
    }

    fn sync_guard(&mut self) {
        if !self.current_route().is_protected() {
            return;
        }
        if self.guard_view() == Some(GuardView::RedirectToLogin) {
            debug!("bootstrap settled unauthenticated, redirecting to sign-in");
            self.navigate_replace(Route::Login);
        }
    }

    fn sync_otp(&mut self) {
        match self.current_route() {
            Route::ForgotPassword => {
                // The request the user just submitted came through; move on
                // to code entry
                if self.forgot_request_pending
                    && self.otp.snapshot().phase == OtpPhase::AwaitingCode
                {
                    self.forgot_request_pending = false;
                    self.navigate_push(Route::VerifyOtp);
                }
            }
            Route::VerifyOtp => {
                let snapshot = self.otp.snapshot();
                if snapshot.phase == OtpPhase::Succeeded {
                    self.otp.reset();
                    self.navigate_reset(Route::Login);
                } else if snapshot.cooldown_remaining > 0
                    && self.cooldown_timer.as_ref().map_or(true, |t| t.is_finished())
                {
                    self.cooldown_timer = Some(CooldownTimer::start(self.otp.clone()));
                }
            }
            _ => {}
        }
    }

    // =========================================================================
    // Authentication actions
    // =========================================================================

    pub fn submit_login(&mut self) {
        if self.login_in_flight {
            return;
        }
        let email = self.login_email.trim().to_string();
        let password = self.login_password.clone();
        if email.is_empty() || password.is_empty() {
            self.notifier
                .error("Sign in", "Email and password are required.");
            return;
        }

        self.login_in_flight = true;
        let auth = self.auth.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = auth.login(&email, &password).await.map_err(|e| match e {
                ApiError::Unauthorized => "Invalid email or password.".to_string(),
                other => other.to_string(),
            });
            let _ = tx.send(AppEvent::LoginFinished(result));
        });
    }

    fn finish_login(&mut self, result: Result<(), String>) {
        self.login_in_flight = false;
        match result {
            Ok(()) => {
                let email = self.login_email.trim().to_string();
                self.config.last_email = Some(email.clone());
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }
                if let Err(e) = PasswordStore::store(&email, &self.login_password) {
                    warn!(error = %e, "Failed to store password");
                }
                self.login_password.clear();
                self.notice = None;
                self.navigate_reset(Route::Home);
            }
            Err(message) => self.notifier.error("Sign in", message),
        }
    }

    pub fn sign_out(&mut self) {
        self.auth.logout();
        self.navigate_reset(Route::Login);
    }

    pub fn submit_forgot(&mut self) {
        self.forgot_request_pending = true;
        let otp = self.otp.clone();
        let email = self.forgot_email.clone();
        tokio::spawn(async move {
            otp.request_code(&email).await;
        });
    }

    pub fn submit_otp_code(&mut self) {
        let otp = self.otp.clone();
        tokio::spawn(async move {
            otp.submit().await;
        });
    }

    pub fn resend_otp_code(&mut self) {
        let otp = self.otp.clone();
        let email = self.otp.snapshot().email;
        tokio::spawn(async move {
            otp.request_code(&email).await;
        });
    }

    // =========================================================================
    // Profile actions
    // =========================================================================

    pub fn open_profile_editor(&mut self) {
        let Some(identity) = self.auth.identity() else {
            self.notifier.info("Profile", "Profile is still loading.");
            return;
        };
        self.edit_first_name = identity.first_name;
        self.edit_last_name = identity.last_name;
        self.edit_expertise = identity.expertise.unwrap_or_default();
        self.edit_bio = identity.bio.unwrap_or_default();
        self.edit_focus = EditFocus::FirstName;
        self.profile_mode = ProfileMode::EditProfile;
    }

    pub fn open_password_editor(&mut self) {
        self.current_password.clear();
        self.new_password.clear();
        self.confirm_password.clear();
        self.password_focus = PasswordFocus::Current;
        self.profile_mode = ProfileMode::ChangePassword;
    }

    pub fn submit_profile_edit(&mut self) {
        if self.profile_in_flight {
            return;
        }
        let Some(identity) = self.auth.identity() else {
            return;
        };
        if self.edit_first_name.trim().is_empty() || self.edit_last_name.trim().is_empty() {
            self.notifier
                .error("Profile", "First and last name are required.");
            return;
        }

        let payload = UpdateProfilePayload {
            first_name: self.edit_first_name.trim().to_string(),
            last_name: self.edit_last_name.trim().to_string(),
            expertise: none_if_empty(&self.edit_expertise),
            bio: none_if_empty(&self.edit_bio),
            ..UpdateProfilePayload::from_profile(&identity)
        };

        self.profile_in_flight = true;
        let auth = self.auth.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = auth
                .update_profile(&payload)
                .await
                .map(|_| ())
                .map_err(|e| e.to_string());
            let _ = tx.send(AppEvent::ProfileSaved(result));
        });
    }

    pub fn submit_password_change(&mut self) {
        if self.profile_in_flight {
            return;
        }
        if self.current_password.is_empty() || self.new_password.is_empty() {
            self.notifier
                .error("Change password", "Fill in every field.");
            return;
        }

        self.profile_in_flight = true;
        let auth = self.auth.clone();
        let tx = self.events_tx.clone();
        let current = self.current_password.clone();
        let new = self.new_password.clone();
        let confirm = self.confirm_password.clone();
        tokio::spawn(async move {
            let result = auth
                .change_password(&current, &new, &confirm)
                .await
                .map_err(|e| e.to_string());
            let _ = tx.send(AppEvent::PasswordChanged(result));
        });
    }
}

// ============================================================================
// Input validation helpers
// ============================================================================

fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

/// Check if an email character should be accepted
pub fn can_add_email_char(current_len: usize, c: char) -> bool {
    current_len < MAX_EMAIL_LENGTH && is_valid_input_char(c)
}

/// Check if a password character should be accepted
pub fn can_add_password_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PASSWORD_LENGTH && is_valid_input_char(c)
}

/// Check if a free-text profile field character should be accepted
pub fn can_add_field_char(current_len: usize, c: char) -> bool {
    current_len < MAX_FIELD_LENGTH && is_valid_input_char(c)
}

fn none_if_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Route stack tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_route_stack_push_and_back() {
        let mut routes = RouteStack::new(Route::Login);
        routes.push(Route::ForgotPassword);
        routes.push(Route::VerifyOtp);
        assert_eq!(routes.current(), Route::VerifyOtp);

        assert!(routes.back());
        assert_eq!(routes.current(), Route::ForgotPassword);
    }

    #[test]
    fn test_route_stack_back_stops_at_root() {
        let mut routes = RouteStack::new(Route::Login);
        assert!(!routes.back());
        assert_eq!(routes.current(), Route::Login);
    }

    #[test]
    fn test_route_stack_replace_leaves_no_dead_entry() {
        let mut routes = RouteStack::new(Route::Home);
        routes.replace(Route::Login);
        assert_eq!(routes.current(), Route::Login);
        // The replaced protected view is not reachable by going back
        assert!(!routes.back());
        assert_eq!(routes.current(), Route::Login);
    }

    #[test]
    fn test_route_stack_reset_clears_history() {
        let mut routes = RouteStack::new(Route::Login);
        routes.push(Route::ForgotPassword);
        routes.push(Route::VerifyOtp);
        routes.reset(Route::Login);
        assert!(!routes.back());
        assert_eq!(routes.current(), Route::Login);
    }

    #[test]
    fn test_protected_routes() {
        assert!(Route::Home.is_protected());
        assert!(Route::Profile.is_protected());
        assert!(!Route::Login.is_protected());
        assert!(!Route::ForgotPassword.is_protected());
        assert!(!Route::VerifyOtp.is_protected());
    }

    // -------------------------------------------------------------------------
    // Input validation tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_can_add_email_char() {
        assert!(can_add_email_char(0, 'a'));
        assert!(can_add_email_char(63, '@'));
        assert!(!can_add_email_char(64, 'a'));
        assert!(!can_add_email_char(0, '\n'));
        assert!(!can_add_email_char(0, '\x00'));
    }

    #[test]
    fn test_can_add_password_char() {
        assert!(can_add_password_char(0, 'a'));
        assert!(can_add_password_char(127, '!'));
        assert!(!can_add_password_char(128, 'a'));
        assert!(!can_add_password_char(0, '\t'));
    }

    #[test]
    fn test_none_if_empty() {
        assert_eq!(none_if_empty(""), None);
        assert_eq!(none_if_empty("   "), None);
        assert_eq!(none_if_empty(" N2 "), Some("N2".to_string()));
    }
}
