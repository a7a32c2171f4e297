//! Authentication module: the client-side session lifecycle.
//!
//! This module provides:
//! - `AuthStore`: process-wide credential and identity state, single writer
//! - `RouteGuard`: the bootstrap-on-mount gate for protected views
//! - `OtpFlow` / `CooldownTimer`: passcode verification with resend cooldown
//! - `HandoffSlot`: the durable pending-verification-email slot
//! - `PasswordStore`: OS-keychain storage for the remembered password
//!
//! The access credential lives only in memory; session continuity across
//! restarts is carried by the server's refresh cookie.

pub mod guard;
pub mod handoff;
pub mod keys;
pub mod otp;
pub mod store;

pub use guard::{GuardView, RouteGuard};
pub use handoff::HandoffSlot;
pub use keys::PasswordStore;
pub use otp::{CooldownTimer, OtpFlow, OtpPhase};
pub use store::AuthStore;
