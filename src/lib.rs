//! DetailHub booking notifications.
//!
//! Wires configuration and logging around the `dh-smtp` client and the
//! `dh-notify` booking mailer.

pub mod config;
pub mod logging;

pub use config::{AppConfig, LogConfig, LogFormat};
pub use dh_notify::{BookingData, BookingMailer, ServiceLineItem, VehicleInfo};
pub use dh_smtp::{SendOutcome, SmtpClient, SmtpClientConfig, SmtpCredentials, SmtpError};

/// A representative booking used by `detailhub-mailcheck`.
pub fn sample_booking(recipient: &str) -> BookingData {
    BookingData {
        booking_id: "TEST-0001".into(),
        customer_name: "DetailHub Test".into(),
        customer_email: recipient.into(),
        phone: None,
        booking_date: "2024-01-01".into(),
        booking_time: "10:00".into(),
        vehicle: VehicleInfo {
            make: "Test".into(),
            model: "Vehicle".into(),
            registration: "TEST123".into(),
        },
        services: vec![
            ServiceLineItem {
                service_name: "Exterior Wash".into(),
                quantity: 1,
                price: 500.0,
            },
            ServiceLineItem {
                service_name: "Tyre Shine".into(),
                quantity: 4,
                price: 50.0,
            },
        ],
        total_amount: 700.0,
        status: "confirmed".into(),
        notes: Some("This is a test message from detailhub-mailcheck.".into()),
    }
}

/// Send a sample booking confirmation through the configured SMTP settings.
pub async fn run_mailcheck(config: &AppConfig, recipient: &str) -> SendOutcome {
    let mailer = config.build_mailer();
    mailer
        .send_booking_confirmation(&sample_booking(recipient))
        .await
}
