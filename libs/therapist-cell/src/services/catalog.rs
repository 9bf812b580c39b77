use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use shared_models::auth::AppUser;

use crate::models::{
    Clinic, ClinicTimings, Therapist, TherapistError, TherapistProfileRequest,
    TherapistSearchQuery,
};

const SEED_CATALOG: &str = include_str!("../../data/therapists.json");

/// Curated profiles shown on the landing page, in display order.
pub const FEATURED_THERAPIST_IDS: [i64; 3] = [2, 13, 11];

const NEW_PROFILE_FEE: f64 = 500.0;

/// In-memory therapist catalog shared by every request.
#[derive(Clone)]
pub struct TherapistCatalog {
    therapists: Arc<RwLock<Vec<Therapist>>>,
}

impl TherapistCatalog {
    pub fn new(therapists: Vec<Therapist>) -> Self {
        Self {
            therapists: Arc::new(RwLock::new(therapists)),
        }
    }

    pub fn seeded() -> Result<Self, TherapistError> {
        let therapists: Vec<Therapist> = serde_json::from_str(SEED_CATALOG)
            .map_err(|e| TherapistError::InvalidSeed(e.to_string()))?;
        info!("Loaded {} therapists into catalog", therapists.len());
        Ok(Self::new(therapists))
    }

    pub async fn list(&self) -> Vec<Therapist> {
        self.therapists.read().await.clone()
    }

    pub async fn search(&self, query: &TherapistSearchQuery) -> Vec<Therapist> {
        debug!("Searching therapists with query: {:?}", query);
        self.therapists
            .read()
            .await
            .iter()
            .filter(|t| t.matches(query))
            .cloned()
            .collect()
    }

    /// Featured profiles, in catalog order.
    pub async fn featured(&self) -> Vec<Therapist> {
        self.therapists
            .read()
            .await
            .iter()
            .filter(|t| FEATURED_THERAPIST_IDS.contains(&t.id))
            .cloned()
            .collect()
    }

    pub async fn get(&self, therapist_id: i64) -> Result<Therapist, TherapistError> {
        self.therapists
            .read()
            .await
            .iter()
            .find(|t| t.id == therapist_id)
            .cloned()
            .ok_or(TherapistError::NotFound)
    }

    /// Admins manage every profile; a therapist account manages only its own.
    pub fn ensure_can_manage(&self, user: &AppUser, therapist_id: i64) -> Result<(), TherapistError> {
        if user.is_admin() || user.managed_therapist() == Some(therapist_id) {
            Ok(())
        } else {
            warn!("User {} attempted to manage therapist {}", user.id, therapist_id);
            Err(TherapistError::Unauthorized)
        }
    }

    /// New profiles come from admins or from therapist accounts registering themselves.
    pub fn ensure_can_register(&self, user: &AppUser) -> Result<(), TherapistError> {
        if user.is_admin() || user.is_therapist() {
            Ok(())
        } else {
            warn!("User {} with role {} attempted to register a therapist", user.id, user.role);
            Err(TherapistError::Unauthorized)
        }
    }

    pub async fn create(&self, request: TherapistProfileRequest) -> Result<Therapist, TherapistError> {
        request.validate()?;

        let mut therapists = self.therapists.write().await;

        let mut id = Utc::now().timestamp_millis();
        while therapists.iter().any(|t| t.id == id) {
            id += 1;
        }

        let experience = request.parsed_experience();
        let therapist = Therapist {
            id,
            name: request.name.clone(),
            email: request.email.clone(),
            title: request.title.clone(),
            location: request.location.clone(),
            rating: 0.0,
            review_count: 0,
            specialties: request.specialties.clone(),
            description: request.description.clone(),
            qualifications: request.parsed_qualifications(),
            clinic_photos: request.clinic_photos.clone(),
            reviews: vec![],
            fee: NEW_PROFILE_FEE,
            is_profile_claimed: true,
            experience,
            specialist_experience: experience,
            patient_satisfaction: 0,
            clinic: Clinic {
                name: request.clinic_name.clone(),
                address: request.clinic_address.clone(),
                rating: 0.0,
                timings: ClinicTimings {
                    days: "Mon - Sat".to_string(),
                    hours: vec!["10:00 AM - 07:00 PM".to_string()],
                },
                is_online_payment_available: Some(false),
                is_prime: false,
                max_wait_time: 15,
                is_verified: false,
                phone: Some(request.phone.clone()),
            },
        };

        therapists.push(therapist.clone());
        info!("Therapist profile {} created for {}", therapist.id, therapist.name);
        Ok(therapist)
    }

    /// Replaces the edited fields; ratings, reviews, fee and clinic flags are kept.
    pub async fn update(
        &self,
        therapist_id: i64,
        request: TherapistProfileRequest,
    ) -> Result<Therapist, TherapistError> {
        request.validate()?;

        let mut therapists = self.therapists.write().await;
        let existing = therapists
            .iter_mut()
            .find(|t| t.id == therapist_id)
            .ok_or(TherapistError::NotFound)?;

        let experience = request.parsed_experience();
        existing.name = request.name.clone();
        if request.email.is_some() {
            existing.email = request.email.clone();
        }
        existing.title = request.title.clone();
        existing.location = request.location.clone();
        existing.specialties = request.specialties.clone();
        existing.description = request.description.clone();
        existing.qualifications = request.parsed_qualifications();
        existing.clinic_photos.extend(request.clinic_photos.iter().cloned());
        existing.is_profile_claimed = true;
        existing.experience = experience;
        existing.specialist_experience = experience;
        existing.clinic.name = request.clinic_name.clone();
        existing.clinic.address = request.clinic_address.clone();
        existing.clinic.phone = Some(request.phone.clone());

        info!("Therapist profile {} updated", therapist_id);
        Ok(existing.clone())
    }

    pub async fn delete(&self, therapist_id: i64) -> Result<(), TherapistError> {
        let mut therapists = self.therapists.write().await;
        let before = therapists.len();
        therapists.retain(|t| t.id != therapist_id);

        if therapists.len() == before {
            return Err(TherapistError::NotFound);
        }

        info!("Therapist profile {} deleted", therapist_id);
        Ok(())
    }
}
