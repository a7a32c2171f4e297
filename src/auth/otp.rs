//! One-time passcode verification flow.
//!
//! A short-lived state machine coordinating passcode entry, resend cooldown,
//! and success/failure transitions. The flow owns its outcome reporting:
//! every attempt ends in exactly one notification or a silent no-op, so the
//! UI layer never reports the same failure twice.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::api::{ApiClient, ApiError};
use crate::notify::Notifier;

use super::HandoffSlot;

/// Cooldown armed by the first send of a passcode, in seconds
const INITIAL_COOLDOWN_SECS: u32 = 15;

/// Shorter cooldown armed by a resend
const RESEND_COOLDOWN_SECS: u32 = 10;

/// A passcode is exactly this many digits
const OTP_CODE_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpPhase {
    /// No code has been sent yet
    Idle,
    /// A code is out; waiting for the user to type it
    AwaitingCode,
    /// Submission in flight
    Verifying,
    /// Verified; the pending email has been consumed
    Succeeded,
}

/// Point-in-time copy of the flow state for rendering
#[derive(Debug, Clone)]
pub struct OtpSnapshot {
    pub email: String,
    pub code: String,
    pub phase: OtpPhase,
    pub cooldown_remaining: u32,
    pub send_in_flight: bool,
}

struct OtpState {
    email: String,
    code: String,
    phase: OtpPhase,
    cooldown_remaining: u32,
    send_in_flight: bool,
}

#[derive(Clone)]
pub struct OtpFlow {
    api: ApiClient,
    notifier: Notifier,
    slot: HandoffSlot,
    state: Arc<Mutex<OtpState>>,
}

impl OtpFlow {
    /// Create the flow, picking up a pending email left by a previous
    /// request (possibly from an earlier run of the program)
    pub fn new(api: ApiClient, notifier: Notifier, slot: HandoffSlot) -> Self {
        let email = slot.read().map(|p| p.email).unwrap_or_default();
        Self {
            api,
            notifier,
            slot,
            state: Arc::new(Mutex::new(OtpState {
                email,
                code: String::new(),
                phase: OtpPhase::Idle,
                cooldown_remaining: 0,
                send_in_flight: false,
            })),
        }
    }

    pub fn snapshot(&self) -> OtpSnapshot {
        let state = self.state.lock().unwrap();
        OtpSnapshot {
            email: state.email.clone(),
            code: state.code.clone(),
            phase: state.phase,
            cooldown_remaining: state.cooldown_remaining,
            send_in_flight: state.send_in_flight,
        }
    }

    /// A code was already sent by a previous step (or a previous run); enter
    /// the waiting phase with the initial cooldown armed
    pub fn begin_awaiting(&self) {
        let mut state = self.state.lock().unwrap();
        if state.phase == OtpPhase::Idle && !state.email.is_empty() {
            state.phase = OtpPhase::AwaitingCode;
            state.cooldown_remaining = INITIAL_COOLDOWN_SECS;
        }
    }

    /// Ask the server to send (or resend) a passcode.
    ///
    /// Ignored - not an error - while a send is already in flight or the
    /// cooldown has not run out. On success the pending email is recorded in
    /// the handoff slot and the cooldown is armed: the full duration for a
    /// first send, the shorter one for a resend. Every attempt ends in
    /// exactly one notification, or none for a gated no-op.
    pub async fn request_code(&self, email: &str) {
        match self.try_request_code(email).await {
            Ok(Some(sent_to)) => {
                self.notifier
                    .success("Verification", format!("A code was sent to {}.", sent_to));
            }
            Ok(None) => {}
            Err(e) => {
                self.notifier.error(
                    "Verification",
                    surface(e, "Could not send the code. Try again later."),
                );
            }
        }
    }

    /// Returns the email a code was sent to, or `None` for a gated no-op
    async fn try_request_code(&self, email: &str) -> Result<Option<String>, ApiError> {
        let email = email.trim().to_string();
        if email.is_empty() {
            return Err(ApiError::Validation(
                "Enter your email address first.".to_string(),
            ));
        }

        let resend = {
            let mut state = self.state.lock().unwrap();
            if state.send_in_flight || state.cooldown_remaining > 0 {
                debug!("code request ignored, cooling down or already sending");
                return Ok(None);
            }
            state.send_in_flight = true;
            state.phase == OtpPhase::AwaitingCode
        };

        let result = self.api.request_otp(&email).await;

        {
            let mut state = self.state.lock().unwrap();
            state.send_in_flight = false;
            result?;
            state.email = email.clone();
            state.phase = OtpPhase::AwaitingCode;
            state.cooldown_remaining = if resend {
                RESEND_COOLDOWN_SECS
            } else {
                INITIAL_COOLDOWN_SECS
            };
        }

        if let Err(e) = self.slot.write(&email) {
            warn!(error = %e, "Failed to record pending verification email");
        }
        Ok(Some(email))
    }

    /// Submit the typed code for verification.
    ///
    /// A code that is not exactly six digits is rejected before any network
    /// call. A server rejection clears the input - a wrong code is never
    /// resubmitted silently - and returns the flow to the waiting phase.
    pub async fn submit(&self) {
        match self.try_submit().await {
            Ok(true) => {
                self.notifier
                    .success("Verification", "Email verified. Sign in to continue.");
            }
            Ok(false) => {}
            Err(e) => {
                self.notifier.error(
                    "Verification",
                    surface(e, "The code is incorrect or has expired."),
                );
            }
        }
    }

    /// Returns whether verification succeeded; `Ok(false)` is a duplicate
    /// submission folded into the one already in flight
    async fn try_submit(&self) -> Result<bool, ApiError> {
        let (email, code) = {
            let mut state = self.state.lock().unwrap();
            if state.phase == OtpPhase::Verifying {
                return Ok(false);
            }
            if state.code.len() != OTP_CODE_LEN {
                return Err(ApiError::Validation(
                    "Enter the full 6-digit code.".to_string(),
                ));
            }
            state.phase = OtpPhase::Verifying;
            (state.email.clone(), state.code.clone())
        };

        match self.api.verify_otp(&email, &code).await {
            Ok(()) => {
                if let Err(e) = self.slot.clear() {
                    warn!(error = %e, "Failed to clear pending verification email");
                }
                let mut state = self.state.lock().unwrap();
                state.phase = OtpPhase::Succeeded;
                state.code.clear();
                Ok(true)
            }
            Err(e) => {
                let mut state = self.state.lock().unwrap();
                state.phase = OtpPhase::AwaitingCode;
                state.code.clear();
                Err(e)
            }
        }
    }

    /// Advance the cooldown by one elapsed second; never goes below zero.
    /// Returns the remaining seconds so the driving timer knows when to
    /// stop.
    pub fn tick_cooldown(&self) -> u32 {
        let mut state = self.state.lock().unwrap();
        if state.cooldown_remaining > 0 {
            state.cooldown_remaining -= 1;
        }
        state.cooldown_remaining
    }

    /// Append a digit to the code input; non-digits and overflow are ignored
    pub fn push_digit(&self, c: char) {
        let mut state = self.state.lock().unwrap();
        if c.is_ascii_digit() && state.code.len() < OTP_CODE_LEN {
            state.code.push(c);
        }
    }

    pub fn pop_digit(&self) {
        self.state.lock().unwrap().code.pop();
    }

    /// Return to a blank machine, e.g. after leaving the verification view
    /// for the sign-in screen
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        state.email.clear();
        state.code.clear();
        state.phase = OtpPhase::Idle;
        state.cooldown_remaining = 0;
        state.send_in_flight = false;
    }
}

/// Pick the user-facing message for a failed attempt: the server's own
/// words (or the pre-flight check's) when there are any, the given fallback
/// otherwise
fn surface(error: ApiError, fallback: &str) -> String {
    match error {
        ApiError::Rejected(message) | ApiError::Validation(message) => message,
        _ => fallback.to_string(),
    }
}

/// Repeating one-second tick driving a flow's cooldown, bound to the
/// lifetime of the hosting view. The task stops on its own when the
/// cooldown runs out; dropping the timer cancels it early.
pub struct CooldownTimer {
    handle: JoinHandle<()>,
}

impl CooldownTimer {
    pub fn start(flow: OtpFlow) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick completes immediately; the countdown starts one
            // second from now
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if flow.tick_cooldown() == 0 {
                    break;
                }
            }
        });
        Self { handle }
    }

    /// Whether the countdown has already run to completion
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for CooldownTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// ============================================================================
// Tests
// ============================================================================
