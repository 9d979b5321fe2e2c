//! **dh-notify**: booking notification emails.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |---|---|
//! | [`types`] | Booking data model, status vocabulary, template data |
//! | [`templates`] | Built-in HTML templates and plain-text renderers |
//! | [`mailer`] | `BookingMailer`: confirmation and status-update emails |

pub mod mailer;
pub mod templates;
pub mod types;

pub use mailer::BookingMailer;
pub use templates::{BuiltinTemplates, TemplateRenderer};
pub use types::*;
