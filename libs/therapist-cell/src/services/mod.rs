pub mod catalog;

pub use catalog::{TherapistCatalog, FEATURED_THERAPIST_IDS};
