use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use shared_config::AppConfig;

use crate::models::Booking;

/// Flat record appended to the external booking log for every new booking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookingLogRecord {
    pub booking_id: String,
    pub patient_name: String,
    pub patient_email: String,
    pub phone: String,
    pub therapist_name: String,
    pub date: String,
    pub time: String,
    pub service: String,
    pub status: String,
    pub is_paid: bool,
}

fn or_placeholder(value: Option<&str>, placeholder: &str) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(placeholder)
        .to_string()
}

impl From<&Booking> for BookingLogRecord {
    fn from(booking: &Booking) -> Self {
        Self {
            booking_id: booking.id.clone(),
            patient_name: booking.patient_name.clone(),
            patient_email: or_placeholder(booking.patient_email.as_deref(), "N/A"),
            phone: or_placeholder(Some(&booking.phone_no), "N/A"),
            therapist_name: booking.therapist.name.clone(),
            // e.g. "Mon Mar 10 2025"
            date: booking.date.format("%a %b %d %Y").to_string(),
            time: booking.time.to_string(),
            service: or_placeholder(Some(&booking.service), "General"),
            status: booking.status.to_string(),
            is_paid: booking.is_paid,
        }
    }
}

#[async_trait]
pub trait BookingLogSink: Send + Sync {
    async fn send(&self, record: &BookingLogRecord) -> Result<()>;
}

/// Posts records as JSON to `BOOKING_LOG_URL`.
pub struct HttpLogSink {
    http: reqwest::Client,
    url: String,
}

impl HttpLogSink {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: config.booking_log_url.clone(),
        }
    }
}

#[async_trait]
impl BookingLogSink for HttpLogSink {
    async fn send(&self, record: &BookingLogRecord) -> Result<()> {
        if self.url.is_empty() {
            warn!("Booking log URL is not configured; skipping booking {}", record.booking_id);
            return Ok(());
        }

        let response = self.http.post(&self.url).json(record).send().await?;
        if !response.status().is_success() {
            bail!("Booking log rejected record with status {}", response.status());
        }

        info!("Booking {} logged", record.booking_id);
        Ok(())
    }
}

/// Fire-and-forget: the caller never waits on the sink and failures are only logged.
pub fn notify(sink: Arc<dyn BookingLogSink>, booking: &Booking) {
    let record = BookingLogRecord::from(booking);
    tokio::spawn(async move {
        if let Err(e) = sink.send(&record).await {
            error!("Error logging booking {}: {}", record.booking_id, e);
        }
    });
}
