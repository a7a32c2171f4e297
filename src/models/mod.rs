//! Data models for platform entities.
//!
//! Currently this covers the authenticated user: `UserProfile` with its
//! `UserStatus` lifecycle code, plus the payload types for profile
//! mutation endpoints.

pub mod user;

pub use user::{ChangePasswordPayload, UpdateProfilePayload, UserProfile, UserStatus};
