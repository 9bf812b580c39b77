use anyhow::{Result, anyhow};
use reqwest::Method;
use serde_json::json;
use tracing::{debug, error, warn};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{AppUser, Role, User};

use crate::models::{Profile, ProfileError, ProfileLookup};

const PROFILE_COLUMNS: &str = "full_name,role,therapist_id";

pub struct ProfileService {
    supabase: SupabaseClient,
}

impl ProfileService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn lookup(&self, user_id: &str, auth_token: &str) -> ProfileLookup {
        let path = format!("/rest/v1/profiles?id=eq.{}&select={}", user_id, PROFILE_COLUMNS);

        match self.supabase.request::<Vec<Profile>>(Method::GET, &path, Some(auth_token), None).await {
            Ok(mut rows) if !rows.is_empty() => ProfileLookup::Found(rows.swap_remove(0)),
            Ok(_) => ProfileLookup::NotFound,
            Err(e) => ProfileLookup::Error(e.to_string()),
        }
    }

    /// Creates a patient profile for a session user that has none.
    pub async fn create_patient_profile(
        &self,
        session: &User,
        auth_token: &str,
    ) -> Result<Profile, ProfileError> {
        let full_name = display_name(session, None, "New User");
        let body = json!({
            "id": session.id,
            "full_name": full_name,
            "role": Role::Patient.to_string(),
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let path = format!("/rest/v1/profiles?select={}", PROFILE_COLUMNS);
        let created: Result<Vec<Profile>> = self.supabase
            .request_with_headers(Method::POST, &path, Some(auth_token), Some(body), Some(headers))
            .await;

        created
            .and_then(|mut rows| {
                if rows.is_empty() {
                    Err(anyhow!("insert returned no rows"))
                } else {
                    Ok(rows.swap_remove(0))
                }
            })
            .map_err(|e| ProfileError::CreationFailed(e.to_string()))
    }

    /// Looks up (or creates) the profile and joins it with the session identity.
    pub async fn resolve_user(&self, session: &User, auth_token: &str) -> AppUser {
        let lookup = match self.lookup(&session.id, auth_token).await {
            ProfileLookup::NotFound => {
                warn!("Profile not found for user {}. Attempting to create one.", session.id);
                match self.create_patient_profile(session, auth_token).await {
                    Ok(profile) => ProfileLookup::Found(profile),
                    Err(e) => {
                        error!("Failed to create profile on-the-fly: {}", e);
                        ProfileLookup::NotFound
                    }
                }
            }
            other => other,
        };

        user_from_lookup(session, &lookup)
    }
}

/// Display name chain: profile name, metadata name, email local part, phone, then `default`.
pub fn display_name(session: &User, profile_name: Option<&str>, default: &str) -> String {
    profile_name
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| session.metadata_full_name())
        .or_else(|| session.email_local_part())
        .or_else(|| session.phone.clone().filter(|p| !p.is_empty()))
        .unwrap_or_else(|| default.to_string())
}

/// One deterministic construction rule per lookup outcome. Anything that is not an
/// explicit, recognised role on a profile row resolves to `Role::Patient`.
pub fn user_from_lookup(session: &User, lookup: &ProfileLookup) -> AppUser {
    match lookup {
        ProfileLookup::Found(profile) => {
            let role = match profile.role.as_deref().map(Role::parse) {
                Some(Some(role)) => role,
                other => {
                    warn!(
                        "Profile for user {} has unrecognised role {:?}, treating as patient",
                        session.id, other
                    );
                    Role::Patient
                }
            };

            AppUser {
                id: session.id.clone(),
                name: display_name(session, profile.full_name.as_deref(), "New User"),
                email: session.email.clone(),
                role,
                therapist_id: if role == Role::Therapist { profile.therapist_id } else { None },
            }
        }
        ProfileLookup::NotFound => AppUser {
            id: session.id.clone(),
            name: display_name(session, None, "New User"),
            email: session.email.clone(),
            role: Role::Patient,
            therapist_id: None,
        },
        ProfileLookup::Error(reason) => {
            warn!("Error fetching profile (falling back to session data): {}", reason);
            debug!("Building fallback user for {}", session.id);
            AppUser {
                id: session.id.clone(),
                name: session
                    .metadata_full_name()
                    .or_else(|| session.email_local_part())
                    .unwrap_or_else(|| "User".to_string()),
                email: session.email.clone(),
                role: Role::Patient,
                therapist_id: None,
            }
        }
    }
}
