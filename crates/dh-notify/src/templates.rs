//! Built-in booking email templates.
//!
//! HTML comes from a [`TemplateRenderer`] so deployments can swap in their
//! own markup; the plain-text alternative is always produced here.

use std::fmt::Write;

use dh_smtp::{SmtpError, SmtpResult};

use crate::types::*;

/// Named template + data object → HTML.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, name: &str, data: &TemplateData<'_>) -> SmtpResult<String>;
}

/// The stock templates shipped with DetailHub.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTemplates;

impl TemplateRenderer for BuiltinTemplates {
    fn render(&self, name: &str, data: &TemplateData<'_>) -> SmtpResult<String> {
        match name {
            BOOKING_CONFIRMATION_TEMPLATE => Ok(confirmation_html(data)),
            STATUS_UPDATE_TEMPLATE => Ok(status_update_html(data)),
            other => Err(SmtpError::template(format!("Unknown template: {}", other))),
        }
    }
}

/// `1500` for whole amounts, `1499.50` otherwise.
pub fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{:.0}", amount)
    } else {
        format!("{:.2}", amount)
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  HTML
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn html_open(html: &mut String, title: &str) {
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("  <meta charset=\"utf-8\">\n");
    let _ = writeln!(html, "  <title>{}</title>", html_escape(title));
    html.push_str("</head>\n");
    html.push_str("<body style=\"font-family: Arial, Helvetica, sans-serif; color: #333; max-width: 640px; margin: 0 auto;\">\n");
}

fn html_close(html: &mut String, business_name: &str) {
    let _ = writeln!(
        html,
        "  <p style=\"color: #888; font-size: 0.85em;\">{}</p>",
        html_escape(business_name)
    );
    html.push_str("</body>\n</html>\n");
}

fn booking_details_html(html: &mut String, booking: &BookingData) {
    html.push_str("  <table style=\"border-collapse: collapse; width: 100%;\">\n");
    let mut row = |label: &str, value: &str| {
        let _ = writeln!(
            html,
            "    <tr><td style=\"padding: 4px 8px; color: #666;\">{}</td><td style=\"padding: 4px 8px;\">{}</td></tr>",
            label,
            html_escape(value)
        );
    };
    row("Booking ID", &format!("#{}", booking.booking_id));
    row("Date", &booking.booking_date);
    row("Time", &booking.booking_time);
    row("Vehicle", &booking.vehicle.describe());
    if let Some(ref phone) = booking.phone {
        row("Phone", phone);
    }
    html.push_str("  </table>\n");
}

fn services_html(html: &mut String, booking: &BookingData) {
    if booking.services.is_empty() {
        return;
    }
    html.push_str("  <h3>Services</h3>\n");
    html.push_str("  <table style=\"border-collapse: collapse; width: 100%;\">\n");
    html.push_str("    <tr><th align=\"left\">Service</th><th align=\"right\">Qty</th><th align=\"right\">Price</th></tr>\n");
    for item in &booking.services {
        let _ = writeln!(
            html,
            "    <tr><td>{}</td><td align=\"right\">{}</td><td align=\"right\">{}</td></tr>",
            html_escape(&item.service_name),
            item.quantity,
            format_amount(item.price)
        );
    }
    let _ = writeln!(
        html,
        "    <tr><td colspan=\"2\"><strong>Total</strong></td><td align=\"right\"><strong>{}</strong></td></tr>",
        format_amount(booking.total_amount)
    );
    html.push_str("  </table>\n");
}

fn confirmation_html(data: &TemplateData<'_>) -> String {
    let booking = data.booking;
    let mut html = String::new();
    html_open(&mut html, &format!("Booking Confirmation #{}", booking.booking_id));
    html.push_str("  <h2>Booking Confirmation</h2>\n");
    let _ = writeln!(
        html,
        "  <p>Hi {}, thank you for booking with {}. Here are your booking details.</p>",
        html_escape(&booking.customer_name),
        html_escape(data.business_name)
    );
    booking_details_html(&mut html, booking);
    services_html(&mut html, booking);
    if let Some(notes) = data.notes.filter(|n| !n.trim().is_empty()) {
        let _ = writeln!(html, "  <p><em>Notes:</em> {}</p>", html_escape(notes));
    }
    html_close(&mut html, data.business_name);
    html
}

fn status_update_html(data: &TemplateData<'_>) -> String {
    let booking = data.booking;
    let status = data.status.as_deref().unwrap_or("Updated");
    let mut html = String::new();
    html_open(&mut html, &format!("Booking #{} {}", booking.booking_id, status));
    let _ = writeln!(html, "  <h2>Booking Update: {}</h2>", html_escape(status));
    let _ = writeln!(html, "  <p>Hi {},</p>", html_escape(&booking.customer_name));
    if let Some(ref message) = data.status_message {
        let _ = writeln!(html, "  <p>{}</p>", html_escape(message));
    }
    booking_details_html(&mut html, booking);
    if let Some(notes) = data.notes.filter(|n| !n.trim().is_empty()) {
        let _ = writeln!(html, "  <p><em>Notes:</em> {}</p>", html_escape(notes));
    }
    html_close(&mut html, data.business_name);
    html
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Plain text
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn booking_details_text(out: &mut String, booking: &BookingData) {
    let _ = writeln!(out, "Booking ID: #{}", booking.booking_id);
    let _ = writeln!(out, "Date: {}", booking.booking_date);
    let _ = writeln!(out, "Time: {}", booking.booking_time);
    let _ = writeln!(out, "Vehicle: {}", booking.vehicle.describe());
    if let Some(ref phone) = booking.phone {
        let _ = writeln!(out, "Phone: {}", phone);
    }
}

/// Plain-text alternative of the confirmation. Every line item is listed
/// with its quantity and price.
pub fn confirmation_text(data: &TemplateData<'_>) -> String {
    let booking = data.booking;
    let mut out = String::new();
    let _ = writeln!(out, "Hi {},", booking.customer_name);
    out.push('\n');
    let _ = writeln!(
        out,
        "Thank you for booking with {}. Here are your booking details.",
        data.business_name
    );
    out.push('\n');
    booking_details_text(&mut out, booking);
    if !booking.services.is_empty() {
        out.push('\n');
        out.push_str("Services:\n");
        for item in &booking.services {
            let _ = writeln!(
                out,
                "- {} x {} @ {}",
                item.service_name,
                item.quantity,
                format_amount(item.price)
            );
        }
    }
    let _ = writeln!(out, "Total: {}", format_amount(booking.total_amount));
    if let Some(notes) = data.notes.filter(|n| !n.trim().is_empty()) {
        out.push('\n');
        let _ = writeln!(out, "Notes: {}", notes);
    }
    out.push('\n');
    out.push_str(data.business_name);
    out.push('\n');
    out
}

pub fn status_update_text(data: &TemplateData<'_>) -> String {
    let booking = data.booking;
    let mut out = String::new();
    let _ = writeln!(out, "Hi {},", booking.customer_name);
    out.push('\n');
    if let Some(ref status) = data.status {
        let _ = writeln!(out, "Status: {}", status);
    }
    if let Some(ref message) = data.status_message {
        let _ = writeln!(out, "{}", message);
    }
    out.push('\n');
    booking_details_text(&mut out, booking);
    if let Some(notes) = data.notes.filter(|n| !n.trim().is_empty()) {
        out.push('\n');
        let _ = writeln!(out, "Notes: {}", notes);
    }
    out.push('\n');
    out.push_str(data.business_name);
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking() -> BookingData {
        BookingData {
            booking_id: "42".into(),
            customer_name: "Jane <Doe>".into(),
            customer_email: "jane@example.org".into(),
            phone: Some("+91 98450 00000".into()),
            booking_date: "2024-06-01".into(),
            booking_time: "10:30".into(),
            vehicle: VehicleInfo {
                make: "Honda".into(),
                model: "City".into(),
                registration: "KA05MN4321".into(),
            },
            services: vec![
                ServiceLineItem {
                    service_name: "Foam Wash".into(),
                    quantity: 2,
                    price: 300.0,
                },
                ServiceLineItem {
                    service_name: "Interior Detailing".into(),
                    quantity: 1,
                    price: 1499.5,
                },
            ],
            total_amount: 2099.5,
            status: "pending".into(),
            notes: None,
        }
    }

    #[test]
    fn amounts() {
        assert_eq!(format_amount(300.0), "300");
        assert_eq!(format_amount(1499.5), "1499.50");
    }

    #[test]
    fn text_lists_every_line_item() {
        let b = booking();
        let text = confirmation_text(&TemplateData::for_booking("Shine Auto Spa", &b));
        assert!(text.contains("- Foam Wash x 2 @ 300\n"));
        assert!(text.contains("- Interior Detailing x 1 @ 1499.50\n"));
        assert!(text.contains("Total: 2099.50"));
        assert!(text.contains("Vehicle: Honda City (KA05MN4321)"));
    }

    #[test]
    fn html_escapes_customer_fields() {
        let b = booking();
        let html = BuiltinTemplates
            .render(
                BOOKING_CONFIRMATION_TEMPLATE,
                &TemplateData::for_booking("Shine Auto Spa", &b),
            )
            .unwrap();
        assert!(html.contains("Hi Jane &lt;Doe&gt;"));
        assert!(!html.contains("<Doe>"));
        assert!(html.contains("Foam Wash"));
    }

    #[test]
    fn status_update_includes_message_and_notes() {
        let b = booking();
        let status = BookingStatus::parse("completed");
        let data = TemplateData::for_status("Shine Auto Spa", &b, &status, Some("Keys at the front desk"));
        let html = BuiltinTemplates.render(STATUS_UPDATE_TEMPLATE, &data).unwrap();
        assert!(html.contains("Booking Update: Completed"));
        assert!(html.contains("Your vehicle is ready"));
        assert!(html.contains("Keys at the front desk"));
        let text = status_update_text(&data);
        assert!(text.contains("Status: Completed"));
        assert!(text.contains("Notes: Keys at the front desk"));
    }

    #[test]
    fn unknown_template_is_an_error() {
        let b = booking();
        let err = BuiltinTemplates
            .render("invoice", &TemplateData::for_booking("x", &b))
            .unwrap_err();
        assert_eq!(err.kind, dh_smtp::SmtpErrorKind::Template);
    }
}
