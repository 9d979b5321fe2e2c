//! **dh-smtp**: raw SMTP client used for DetailHub booking notifications.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |---|---|
//! | [`types`] | Data types, error handling, configuration |
//! | [`reply`] | Reply-line parsing and CRLF re-assembly |
//! | [`auth`] | AUTH LOGIN prompt decoding and responses |
//! | [`message`] | `multipart/alternative` builder, dot-stuffing |
//! | [`session`] | Sans-IO dialogue state machine |
//! | [`transport`] | TCP / implicit TLS socket |
//! | [`settings`] | Settings stores and credential resolution |
//! | [`client`] | `SmtpClient`: settings, socket and session under one timeout |

pub mod auth;
pub mod client;
pub mod message;
pub mod reply;
pub mod session;
pub mod settings;
pub mod transport;
pub mod types;

pub use client::{MailTransport, SmtpClient};
pub use session::{SessionState, SmtpSession};
pub use settings::{JsonFileSettingsStore, MemorySettingsStore, SettingsStore};
pub use types::*;
