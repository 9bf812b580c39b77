use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ==============================================================================
// CATALOG MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: i64,
    pub patient_name: String,
    pub rating: f32,
    pub comment: String,
    pub date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClinicTimings {
    pub days: String,
    pub hours: Vec<String>,
}

fn lenient_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Bool(flag) => Ok(Some(flag)),
        _ => Ok(None),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Clinic {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub rating: f32,
    pub timings: ClinicTimings,
    /// Absent, null or non-boolean means the clinic takes payment at the visit.
    #[serde(default, deserialize_with = "lenient_flag")]
    pub is_online_payment_available: Option<bool>,
    #[serde(default)]
    pub is_prime: bool,
    /// Minutes.
    #[serde(default)]
    pub max_wait_time: u32,
    #[serde(default)]
    pub is_verified: bool,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Therapist {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub title: String,
    pub location: String,
    #[serde(default)]
    pub rating: f32,
    #[serde(default)]
    pub review_count: u32,
    pub specialties: Vec<String>,
    pub description: String,
    #[serde(default)]
    pub qualifications: Vec<String>,
    #[serde(default)]
    pub clinic_photos: Vec<String>,
    #[serde(default)]
    pub reviews: Vec<Review>,
    pub fee: f64,
    #[serde(default)]
    pub is_profile_claimed: bool,
    #[serde(default)]
    pub experience: u32,
    #[serde(default)]
    pub specialist_experience: u32,
    #[serde(default)]
    pub patient_satisfaction: u32,
    pub clinic: Clinic,
}

impl Therapist {
    /// Services offered on the booking form: specialties first, then a general slot.
    pub fn bookable_services(&self) -> Vec<String> {
        let mut services = self.specialties.clone();
        if !services.iter().any(|s| s == GENERAL_CONSULTATION) {
            services.push(GENERAL_CONSULTATION.to_string());
        }
        services
    }

    pub fn default_service(&self) -> String {
        self.specialties
            .first()
            .cloned()
            .unwrap_or_default()
    }

    fn matches_term(&self, lowercased_term: &str) -> bool {
        self.name.to_lowercase().contains(lowercased_term)
            || self.title.to_lowercase().contains(lowercased_term)
            || self.location.to_lowercase().contains(lowercased_term)
            || self.specialties.iter().any(|s| s.to_lowercase().contains(lowercased_term))
    }

    pub fn matches(&self, query: &TherapistSearchQuery) -> bool {
        let term_ok = match query.q.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => self.matches_term(&term.to_lowercase()),
            _ => true,
        };

        let specialty_ok = match query.specialty.as_deref() {
            Some(specialty) if !specialty.is_empty() => self.specialties.iter().any(|s| s == specialty),
            _ => true,
        };

        term_ok && specialty_ok
    }
}

pub const GENERAL_CONSULTATION: &str = "General Consultation";

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TherapistSearchQuery {
    pub q: Option<String>,
    pub specialty: Option<String>,
}

/// Registration / edit form for a therapist profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TherapistProfileRequest {
    #[serde(default)]
    pub name: String,
    pub email: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub description: String,
    /// Comma separated.
    #[serde(default)]
    pub qualifications: String,
    #[serde(default)]
    pub experience: String,
    #[serde(default)]
    pub clinic_name: String,
    #[serde(default)]
    pub clinic_address: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub specialties: Vec<String>,
    #[serde(default)]
    pub clinic_photos: Vec<String>,
}

impl TherapistProfileRequest {
    /// Presence checks only; returns the first missing field.
    pub fn validate(&self) -> Result<(), TherapistError> {
        let required = [
            ("name", &self.name),
            ("title", &self.title),
            ("location", &self.location),
            ("description", &self.description),
            ("qualifications", &self.qualifications),
            ("experience", &self.experience),
            ("clinicName", &self.clinic_name),
            ("clinicAddress", &self.clinic_address),
            ("phone", &self.phone),
        ];

        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(TherapistError::ValidationError(format!(
                "Please fill in all fields. Missing: {}",
                field
            )));
        }

        if self.specialties.is_empty() {
            return Err(TherapistError::ValidationError(
                "Please select at least one specialty.".to_string(),
            ));
        }

        Ok(())
    }

    pub fn parsed_qualifications(&self) -> Vec<String> {
        self.qualifications
            .split(',')
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect()
    }

    pub fn parsed_experience(&self) -> u32 {
        self.experience.trim().parse().unwrap_or(0)
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum TherapistError {
    #[error("Therapist not found")]
    NotFound,

    #[error("Not authorized to manage this therapist profile")]
    Unauthorized,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Catalog seed is invalid: {0}")]
    InvalidSeed(String),
}
