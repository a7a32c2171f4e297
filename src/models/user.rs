//! User profile and account types.

use serde::{Deserialize, Serialize};

/// Account lifecycle status as reported by the server.
///
/// The wire format is a small integer code, not a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum UserStatus {
    Rejected,
    UnverifiedEmail,
    VerifiedInactive,
    PendingApproval,
    Active,
}

impl UserStatus {
    /// Numeric code used on the wire
    pub fn code(self) -> i8 {
        match self {
            UserStatus::Rejected => -1,
            UserStatus::UnverifiedEmail => 0,
            UserStatus::VerifiedInactive => 1,
            UserStatus::PendingApproval => 2,
            UserStatus::Active => 3,
        }
    }

    /// Human-readable label for display
    pub fn label(self) -> &'static str {
        match self {
            UserStatus::Rejected => "Rejected",
            UserStatus::UnverifiedEmail => "Email not verified",
            UserStatus::VerifiedInactive => "Verified (inactive)",
            UserStatus::PendingApproval => "Pending approval",
            UserStatus::Active => "Active",
        }
    }
}

impl TryFrom<i8> for UserStatus {
    type Error = String;

    fn try_from(code: i8) -> Result<Self, Self::Error> {
        match code {
            -1 => Ok(UserStatus::Rejected),
            0 => Ok(UserStatus::UnverifiedEmail),
            1 => Ok(UserStatus::VerifiedInactive),
            2 => Ok(UserStatus::PendingApproval),
            3 => Ok(UserStatus::Active),
            other => Err(format!("unknown user status code {}", other)),
        }
    }
}

impl From<UserStatus> for i8 {
    fn from(status: UserStatus) -> i8 {
        status.code()
    }
}

/// The authenticated user's profile, as returned by the profile endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub role: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub campus: Option<String>,
    #[serde(default)]
    pub expertise: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    pub status: UserStatus,
}

impl UserProfile {
    /// Full display name, trimmed in case either part is empty
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Payload for the profile update endpoint.
/// The server expects the full profile back, not a delta.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfilePayload {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campus: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expertise: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl UpdateProfilePayload {
    /// Build a payload from the current profile, to be edited before submission
    pub fn from_profile(profile: &UserProfile) -> Self {
        Self {
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            email: profile.email.clone(),
            role: profile.role.clone(),
            campus: profile.campus.clone(),
            expertise: profile.expertise.clone(),
            bio: profile.bio.clone(),
            date_of_birth: profile.date_of_birth.clone(),
            avatar_url: profile.avatar_url.clone(),
        }
    }
}

/// Payload for the password change endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordPayload {
    pub current_password: String,
    pub new_password: String,
}

// ============================================================================
// Tests
// ============================================================================
