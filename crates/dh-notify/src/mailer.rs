//! Caller-facing booking mailer.
//!
//! Every method resolves to a [`SendOutcome`]; no error escapes to the
//! booking workflow. The `notify_*` helpers spawn the send so the caller
//! never waits on SMTP.

use std::sync::Arc;

use dh_smtp::{is_valid_address, MailTransport, SendOutcome, SmtpResult};
use log::{error, info, warn};
use tokio::task::JoinHandle;

use crate::templates::{self, BuiltinTemplates, TemplateRenderer};
use crate::types::*;

pub struct BookingMailer {
    transport: Arc<dyn MailTransport>,
    templates: Arc<dyn TemplateRenderer>,
    business_name: String,
}

impl BookingMailer {
    pub fn new(transport: Arc<dyn MailTransport>, business_name: impl Into<String>) -> Self {
        Self {
            transport,
            templates: Arc::new(BuiltinTemplates),
            business_name: business_name.into(),
        }
    }

    pub fn with_templates(mut self, templates: Arc<dyn TemplateRenderer>) -> Self {
        self.templates = templates;
        self
    }

    pub fn business_name(&self) -> &str {
        &self.business_name
    }

    pub fn confirmation_subject(booking: &BookingData) -> String {
        format!("Booking Confirmation - #{}", booking.booking_id)
    }

    pub fn status_subject(booking: &BookingData, status: &BookingStatus) -> String {
        format!("Booking Update - #{}: {}", booking.booking_id, status.label())
    }

    /// Send the confirmation for a newly created booking.
    pub async fn send_booking_confirmation(&self, booking: &BookingData) -> SendOutcome {
        if let Some(outcome) = reject_recipient(booking) {
            return outcome;
        }
        let data = TemplateData::for_booking(&self.business_name, booking);
        let result = self
            .deliver(
                booking,
                &Self::confirmation_subject(booking),
                BOOKING_CONFIRMATION_TEMPLATE,
                &data,
                templates::confirmation_text(&data),
            )
            .await;
        log_result("Booking confirmation", booking, &result);
        SendOutcome::from_result(result, "Booking confirmation email sent successfully")
    }

    /// Tell the customer their booking moved to `new_status`.
    pub async fn send_status_update(
        &self,
        booking: &BookingData,
        new_status: &str,
        notes: Option<&str>,
    ) -> SendOutcome {
        if let Some(outcome) = reject_recipient(booking) {
            return outcome;
        }
        let status = BookingStatus::parse(new_status);
        let data = TemplateData::for_status(&self.business_name, booking, &status, notes);
        let result = self
            .deliver(
                booking,
                &Self::status_subject(booking, &status),
                STATUS_UPDATE_TEMPLATE,
                &data,
                templates::status_update_text(&data),
            )
            .await;
        log_result("Status update", booking, &result);
        let mut outcome =
            SendOutcome::from_result(result, "Status update email sent successfully");
        outcome.message_id = None;
        outcome
    }

    async fn deliver(
        &self,
        booking: &BookingData,
        subject: &str,
        template: &str,
        data: &TemplateData<'_>,
        text_body: String,
    ) -> SmtpResult<dh_smtp::SendReceipt> {
        let html_body = self.templates.render(template, data)?;
        self.transport
            .send_email(&booking.customer_email, subject, &html_body, &text_body)
            .await
    }

    /// Fire-and-forget confirmation. The handle is only for observing the
    /// outcome; dropping it does not cancel the send.
    pub fn notify_booking_created(self: &Arc<Self>, booking: BookingData) -> JoinHandle<SendOutcome> {
        let mailer = Arc::clone(self);
        tokio::spawn(async move { mailer.send_booking_confirmation(&booking).await })
    }

    /// Fire-and-forget status update.
    pub fn notify_status_changed(
        self: &Arc<Self>,
        booking: BookingData,
        new_status: String,
        notes: Option<String>,
    ) -> JoinHandle<SendOutcome> {
        let mailer = Arc::clone(self);
        tokio::spawn(async move {
            mailer
                .send_status_update(&booking, &new_status, notes.as_deref())
                .await
        })
    }
}

fn reject_recipient(booking: &BookingData) -> Option<SendOutcome> {
    if is_valid_address(&booking.customer_email) {
        return None;
    }
    warn!(
        "Not emailing booking #{}: invalid address '{}'",
        booking.booking_id, booking.customer_email
    );
    Some(SendOutcome::failed(format!(
        "Invalid recipient email address: {}",
        booking.customer_email
    )))
}

fn log_result(what: &str, booking: &BookingData, result: &SmtpResult<dh_smtp::SendReceipt>) {
    match result {
        Ok(receipt) => info!(
            "{} for booking #{} sent to {} ({})",
            what, booking.booking_id, booking.customer_email, receipt.message_id
        ),
        Err(e) => error!(
            "{} for booking #{} to {} failed: {}",
            what, booking.booking_id, booking.customer_email, e
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dh_smtp::{SendReceipt, SmtpError};
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    struct Sent {
        recipient: String,
        subject: String,
        html: String,
        text: String,
    }

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<Sent>>,
        fail_with: Option<SmtpError>,
    }

    #[async_trait]
    impl MailTransport for RecordingTransport {
        async fn send_email(
            &self,
            recipient: &str,
            subject: &str,
            html_body: &str,
            text_body: &str,
        ) -> SmtpResult<SendReceipt> {
            self.sent.lock().unwrap().push(Sent {
                recipient: recipient.into(),
                subject: subject.into(),
                html: html_body.into(),
                text: text_body.into(),
            });
            match self.fail_with {
                Some(ref e) => Err(e.clone()),
                None => Ok(SendReceipt {
                    message_id: "abc@example.com".into(),
                    server_reply: "250 ok".into(),
                    elapsed_ms: 1,
                }),
            }
        }
    }

    fn booking(email: &str) -> BookingData {
        BookingData {
            booking_id: "7".into(),
            customer_name: "Jane".into(),
            customer_email: email.into(),
            phone: None,
            booking_date: "2024-06-01".into(),
            booking_time: "09:00".into(),
            vehicle: VehicleInfo {
                make: "Maruti".into(),
                model: "Swift".into(),
                registration: String::new(),
            },
            services: vec![ServiceLineItem {
                service_name: "Ceramic Coating".into(),
                quantity: 1,
                price: 15000.0,
            }],
            total_amount: 15000.0,
            status: "pending".into(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn confirmation_success() {
        let transport = Arc::new(RecordingTransport::default());
        let mailer = BookingMailer::new(transport.clone(), "Shine Auto Spa");
        let outcome = mailer.send_booking_confirmation(&booking("jane@example.org")).await;
        assert!(outcome.success);
        assert_eq!(outcome.message_id.as_deref(), Some("abc@example.com"));

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "jane@example.org");
        assert_eq!(sent[0].subject, "Booking Confirmation - #7");
        assert!(sent[0].html.contains("Ceramic Coating"));
        assert!(sent[0].text.contains("- Ceramic Coating x 1 @ 15000"));
    }

    #[tokio::test]
    async fn malformed_recipients_never_reach_transport() {
        let transport = Arc::new(RecordingTransport::default());
        let mailer = BookingMailer::new(transport.clone(), "Shine Auto Spa");
        for bad in ["janeexample.org", "jane doe@example.org", "jane@", "jane@example"] {
            let outcome = mailer.send_booking_confirmation(&booking(bad)).await;
            assert!(!outcome.success, "{} should be rejected", bad);
            let outcome = mailer.send_status_update(&booking(bad), "confirmed", None).await;
            assert!(!outcome.success);
        }
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn status_update_has_no_message_id() {
        let transport = Arc::new(RecordingTransport::default());
        let mailer = BookingMailer::new(transport.clone(), "Shine Auto Spa");
        let outcome = mailer
            .send_status_update(&booking("jane@example.org"), "in_progress", Some("Bay 3"))
            .await;
        assert!(outcome.success);
        assert!(outcome.message_id.is_none());
        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].subject, "Booking Update - #7: In Progress");
        assert!(sent[0].text.contains("Notes: Bay 3"));
    }

    #[tokio::test]
    async fn transport_failure_becomes_outcome() {
        let transport = Arc::new(RecordingTransport {
            fail_with: Some(SmtpError::from_reply(
                535,
                "5.7.8 Authentication failed",
                dh_smtp::SmtpPhase::Authentication,
            )),
            ..Default::default()
        });
        let mailer = BookingMailer::new(transport, "Shine Auto Spa");
        let outcome = mailer.send_booking_confirmation(&booking("jane@example.org")).await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("Authentication failed"));
    }

    struct BrokenTemplates;

    impl TemplateRenderer for BrokenTemplates {
        fn render(&self, name: &str, _data: &TemplateData<'_>) -> SmtpResult<String> {
            Err(SmtpError::template(format!("{} missing", name)))
        }
    }

    #[tokio::test]
    async fn template_failure_skips_send() {
        let transport = Arc::new(RecordingTransport::default());
        let mailer = BookingMailer::new(transport.clone(), "Shine Auto Spa")
            .with_templates(Arc::new(BrokenTemplates));
        let outcome = mailer.send_booking_confirmation(&booking("jane@example.org")).await;
        assert!(!outcome.success);
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn fire_and_forget_helpers() {
        let transport = Arc::new(RecordingTransport::default());
        let mailer = Arc::new(BookingMailer::new(transport.clone(), "Shine Auto Spa"));
        let a = mailer.notify_booking_created(booking("jane@example.org"));
        let b = mailer.notify_status_changed(booking("jane@example.org"), "completed".into(), None);
        assert!(a.await.unwrap().success);
        assert!(b.await.unwrap().success);
        assert_eq!(transport.sent.lock().unwrap().len(), 2);
    }
}
