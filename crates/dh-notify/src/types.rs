use std::fmt;

use serde::{Deserialize, Serialize};

// ─── Booking ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleInfo {
    pub make: String,
    pub model: String,
    #[serde(default)]
    pub registration: String,
}

impl VehicleInfo {
    /// `Toyota Corolla (KA01AB1234)`, or without the bracket when there is
    /// no registration.
    pub fn describe(&self) -> String {
        let name = format!("{} {}", self.make, self.model).trim().to_string();
        if self.registration.trim().is_empty() {
            name
        } else {
            format!("{} ({})", name, self.registration)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLineItem {
    pub service_name: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    pub price: f64,
}

fn default_quantity() -> u32 {
    1
}

/// What the booking workflow hands over after a booking is committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingData {
    pub booking_id: String,
    pub customer_name: String,
    pub customer_email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub booking_date: String,
    pub booking_time: String,
    #[serde(default)]
    pub vehicle: VehicleInfo,
    #[serde(default)]
    pub services: Vec<ServiceLineItem>,
    pub total_amount: f64,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_status() -> String {
    "pending".into()
}

// ─── Status ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    Other(String),
}

impl BookingStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "pending" => Self::Pending,
            "confirmed" => Self::Confirmed,
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            "cancelled" | "canceled" => Self::Cancelled,
            _ => Self::Other(raw.trim().to_string()),
        }
    }

    /// Human label used in subjects and headings.
    pub fn label(&self) -> String {
        match self {
            Self::Pending => "Pending".into(),
            Self::Confirmed => "Confirmed".into(),
            Self::InProgress => "In Progress".into(),
            Self::Completed => "Completed".into(),
            Self::Cancelled => "Cancelled".into(),
            Self::Other(s) => s.clone(),
        }
    }

    /// Sentence shown to the customer for this status.
    pub fn customer_message(&self) -> String {
        match self {
            Self::Pending => "Your booking has been received and is awaiting confirmation.".into(),
            Self::Confirmed => "Your booking is confirmed. We look forward to seeing you.".into(),
            Self::InProgress => "Our team has started working on your vehicle.".into(),
            Self::Completed => {
                "Your vehicle is ready. Thank you for choosing us!".into()
            }
            Self::Cancelled => {
                "Your booking has been cancelled. Contact us if this was unexpected.".into()
            }
            Self::Other(s) => format!("Your booking status has been updated to: {}.", s),
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

// ─── Template data ──────────────────────────────────────────────────

/// Names of the templates a [`crate::templates::TemplateRenderer`] must know.
pub const BOOKING_CONFIRMATION_TEMPLATE: &str = "booking-confirmation";
pub const STATUS_UPDATE_TEMPLATE: &str = "status-update";

/// Data object passed to a template.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateData<'a> {
    pub business_name: &'a str,
    pub booking: &'a BookingData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<&'a str>,
}

impl<'a> TemplateData<'a> {
    pub fn for_booking(business_name: &'a str, booking: &'a BookingData) -> Self {
        Self {
            business_name,
            booking,
            status: None,
            status_message: None,
            notes: booking.notes.as_deref(),
        }
    }

    pub fn for_status(
        business_name: &'a str,
        booking: &'a BookingData,
        status: &BookingStatus,
        notes: Option<&'a str>,
    ) -> Self {
        Self {
            business_name,
            booking,
            status: Some(status.label()),
            status_message: Some(status.customer_message()),
            notes,
        }
    }
}
