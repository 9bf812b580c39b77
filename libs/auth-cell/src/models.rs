use serde::{Deserialize, Serialize};

use shared_models::auth::{AppUser, Role};

/// Row of the `profiles` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub full_name: Option<String>,
    pub role: Option<String>,
    pub therapist_id: Option<i64>,
}

/// Outcome of looking up the profile row for a session user.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileLookup {
    Found(Profile),
    NotFound,
    Error(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LandingPage {
    Profile,
    TherapistDashboard,
    Admin,
}

impl LandingPage {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Patient => LandingPage::Profile,
            Role::Therapist => LandingPage::TherapistDashboard,
            Role::Admin => LandingPage::Admin,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub user: AppUser,
    pub landing_page: LandingPage,
}

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum ProfileError {
    #[error("Profile lookup failed: {0}")]
    LookupFailed(String),

    #[error("Profile creation failed: {0}")]
    CreationFailed(String),
}
