//! Data types, error handling and configuration for the SMTP crate.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

// ─── Error ──────────────────────────────────────────────────────────

/// Kinds of SMTP errors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SmtpErrorKind {
    /// Socket connect / read / write failure, TLS handshake included.
    Transport,
    /// The connect bound or the overall send bound was exceeded.
    Timeout,
    /// Server rejected the credentials (535).
    AuthenticationFailed,
    /// Server rejected the mailbox (550).
    MailboxRejected,
    /// Server is throttling us (452 "too many recipients").
    RateLimited,
    /// Any other 4xx / 5xx reply.
    Rejected,
    /// Server sent a line that is not a reply, or a reply out of sequence.
    UnexpectedReply,
    /// No usable SMTP settings.
    Configuration,
    /// Malformed input caught before any I/O.
    Validation,
    /// Template rendering failed.
    Template,
}

impl SmtpErrorKind {
    /// Whether the error came from a server reply (4xx / 5xx or out of sequence).
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed
                | Self::MailboxRejected
                | Self::RateLimited
                | Self::Rejected
                | Self::UnexpectedReply
        )
    }
}

impl fmt::Display for SmtpErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Which part of the dialogue an error happened in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SmtpPhase {
    /// Socket establishment, greeting and EHLO.
    Connection,
    /// AUTH LOGIN exchange.
    Authentication,
    /// MAIL FROM through QUIT.
    MailTransfer,
}

impl fmt::Display for SmtpPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection => write!(f, "connection"),
            Self::Authentication => write!(f, "authentication"),
            Self::MailTransfer => write!(f, "mail transfer"),
        }
    }
}

/// Top-level error type for the SMTP crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpError {
    pub kind: SmtpErrorKind,
    pub message: String,
    /// The SMTP reply code (e.g. 550) if available.
    pub code: Option<u16>,
    /// Dialogue phase the error was raised in, if known.
    pub phase: Option<SmtpPhase>,
}

impl SmtpError {
    pub fn new(kind: SmtpErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            code: None,
            phase: None,
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_phase(mut self, phase: SmtpPhase) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::new(SmtpErrorKind::Transport, msg)
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(SmtpErrorKind::Timeout, msg)
    }

    pub fn unexpected(msg: impl Into<String>) -> Self {
        Self::new(SmtpErrorKind::UnexpectedReply, msg)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(SmtpErrorKind::Configuration, msg)
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::new(SmtpErrorKind::Validation, msg)
    }

    pub fn template(msg: impl Into<String>) -> Self {
        Self::new(SmtpErrorKind::Template, msg)
    }

    /// Classify a 4xx / 5xx server reply.
    ///
    /// `text` is the full reply text (continuation lines joined), so a
    /// multi-line `452` still classifies as rate limiting.
    pub fn from_reply(code: u16, text: &str, phase: SmtpPhase) -> Self {
        let lower = text.to_lowercase();
        let (kind, message) = match code {
            535 => (
                SmtpErrorKind::AuthenticationFailed,
                format!("Authentication failed: {}", text),
            ),
            550 => (
                SmtpErrorKind::MailboxRejected,
                format!("Mailbox rejected by server: {}", text),
            ),
            452 if lower.contains("too many recipients") => (
                SmtpErrorKind::RateLimited,
                format!("Rate limited by server: {}", text),
            ),
            _ => {
                let what = match phase {
                    SmtpPhase::Connection => "Connection rejected",
                    SmtpPhase::Authentication => "Authentication exchange failed",
                    SmtpPhase::MailTransfer => "Mail transfer failed",
                };
                (SmtpErrorKind::Rejected, format!("{}: {} {}", what, code, text))
            }
        };
        Self::new(kind, message).with_code(code).with_phase(phase)
    }
}

impl fmt::Display for SmtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.code {
            write!(f, "[SMTP {}] {}: {}", code, self.kind, self.message)
        } else {
            write!(f, "[SMTP] {}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for SmtpError {}

impl From<std::io::Error> for SmtpError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::TimedOut {
            Self::timeout(format!("I/O timeout: {}", e))
        } else {
            Self::transport(e.to_string())
        }
    }
}

pub type SmtpResult<T> = Result<T, SmtpError>;

// ─── Credentials ────────────────────────────────────────────────────

/// Resolved SMTP credentials used for one client instance.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SmtpCredentials {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// TLS from the first byte (SMTPS). There is no STARTTLS upgrade.
    pub use_implicit_tls: bool,
    pub from_name: String,
    pub from_address: String,
}

impl SmtpCredentials {
    /// Adopt a stored settings record verbatim. `secure` overrides the
    /// port-465 rule when present.
    pub fn from_record(record: &SmtpSettingsRecord) -> Self {
        Self {
            host: record.host.clone(),
            port: record.port,
            username: record.username.clone(),
            password: record.password.clone(),
            use_implicit_tls: record.secure.unwrap_or(record.port == 465),
            from_name: record.from_name.clone(),
            from_address: record.from_address.clone(),
        }
    }

    /// Resolve fallback credentials from `SMTP_*` environment variables.
    /// Returns `None` unless at least a host and a sender address are set.
    pub fn from_environment() -> Option<Self> {
        let host = std::env::var("SMTP_HOST").ok().filter(|h| !h.trim().is_empty())?;
        let from_address = std::env::var("SMTP_FROM_EMAIL")
            .ok()
            .or_else(|| std::env::var("SMTP_USER").ok())
            .filter(|a| !a.trim().is_empty())?;
        let port = std::env::var("SMTP_PORT")
            .ok()
            .and_then(|p| p.trim().parse::<u16>().ok())
            .unwrap_or(587);
        let use_implicit_tls = match std::env::var("SMTP_SECURE").ok().as_deref() {
            Some("true") | Some("1") => true,
            Some("false") | Some("0") => false,
            _ => port == 465,
        };
        Some(Self {
            host,
            port,
            username: std::env::var("SMTP_USER").unwrap_or_default(),
            password: std::env::var("SMTP_PASS").unwrap_or_default(),
            use_implicit_tls,
            from_name: std::env::var("SMTP_FROM_NAME").unwrap_or_else(|_| "DetailHub".into()),
            from_address,
        })
    }

    /// Check the credentials are usable for a send.
    pub fn validate(&self) -> SmtpResult<()> {
        if self.host.trim().is_empty() {
            return Err(SmtpError::config("SMTP host is empty"));
        }
        if self.port == 0 {
            return Err(SmtpError::config("SMTP port must be between 1 and 65535"));
        }
        if !is_valid_address(&self.from_address) {
            return Err(SmtpError::config(format!(
                "Invalid sender address: {}",
                self.from_address
            )));
        }
        Ok(())
    }

    /// The `From` mailbox for the message headers.
    pub fn sender(&self) -> EmailAddress {
        if self.from_name.trim().is_empty() {
            EmailAddress::new(&self.from_address)
        } else {
            EmailAddress::with_name(&self.from_address, &self.from_name)
        }
    }
}

impl fmt::Debug for SmtpCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpCredentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("use_implicit_tls", &self.use_implicit_tls)
            .field("from_name", &self.from_name)
            .field("from_address", &self.from_address)
            .finish()
    }
}

/// A stored SMTP settings row as exposed by the settings store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmtpSettingsRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub from_name: String,
    pub from_address: String,
    /// Explicit implicit-TLS override; `None` means "port 465".
    #[serde(default)]
    pub secure: Option<bool>,
    #[serde(default)]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// ─── Configuration ──────────────────────────────────────────────────

/// Client-side configuration, independent of the resolved credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpClientConfig {
    /// Identifier sent with EHLO.
    pub ehlo_domain: String,
    /// Bound on raw socket establishment (TLS handshake included).
    pub connect_timeout: Duration,
    /// Bound on the whole connect-through-QUIT operation.
    pub send_timeout: Duration,
    /// How long a send waits for settings resolution to finish.
    pub settings_wait: Duration,
    /// Whether to verify the server's TLS certificate.
    pub verify_certificates: bool,
    /// Optional path to an extra CA certificate PEM file.
    pub ca_cert_path: Option<String>,
    /// Used when the settings store has no active record or is unreachable.
    pub fallback_credentials: Option<SmtpCredentials>,
}

impl Default for SmtpClientConfig {
    fn default() -> Self {
        Self {
            ehlo_domain: "localhost".into(),
            connect_timeout: Duration::from_secs(10),
            send_timeout: Duration::from_secs(30),
            settings_wait: Duration::from_secs(1),
            verify_certificates: true,
            ca_cert_path: None,
            fallback_credentials: None,
        }
    }
}

// ─── Email Address ──────────────────────────────────────────────────

lazy_static! {
    /// `local@domain.tld`, no whitespace anywhere.
    static ref ADDRESS_RE: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

/// Whether `address` looks like `local@domain` with no embedded whitespace.
pub fn is_valid_address(address: &str) -> bool {
    ADDRESS_RE.is_match(address)
}

/// An email address with an optional display name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailAddress {
    pub name: Option<String>,
    pub address: String,
}

impl EmailAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            name: None,
            address: address.into(),
        }
    }

    pub fn with_name(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            address: address.into(),
        }
    }

    /// Format as RFC 5322 mailbox (e.g. `"John Doe" <john@example.com>`).
    /// A non-ASCII name becomes a bare RFC 2047 encoded-word, which must
    /// not sit inside a quoted-string.
    pub fn to_mailbox(&self) -> String {
        match &self.name {
            Some(n) if n.is_ascii() => {
                format!("\"{}\" <{}>", n.replace('"', "\\\""), self.address)
            }
            Some(n) => format!(
                "{} <{}>",
                crate::message::encode_header_value(n),
                self.address
            ),
            None => self.address.clone(),
        }
    }

    /// `<address>` for the SMTP envelope.
    pub fn to_angle_addr(&self) -> String {
        format!("<{}>", self.address)
    }

    pub fn is_valid(&self) -> bool {
        is_valid_address(&self.address)
    }

    pub fn domain(&self) -> Option<&str> {
        self.address.rfind('@').map(|at| &self.address[at + 1..])
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_mailbox())
    }
}

// ─── Outgoing Mail ──────────────────────────────────────────────────

/// What the caller asked to send: one recipient, two alternative bodies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingMail {
    /// Value of the `Message-ID` header, without angle brackets.
    pub message_id: String,
    pub from: EmailAddress,
    pub to: EmailAddress,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
    pub date: DateTime<Utc>,
}

impl OutgoingMail {
    pub fn new(
        from: EmailAddress,
        recipient: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> SmtpResult<Self> {
        if !is_valid_address(recipient) {
            return Err(SmtpError::validation(format!(
                "Invalid recipient email address: {}",
                recipient
            )));
        }
        let domain = from.domain().unwrap_or("localhost").to_string();
        Ok(Self {
            message_id: format!("{}@{}", uuid::Uuid::new_v4().simple(), domain),
            from,
            to: EmailAddress::new(recipient),
            subject: subject.to_string(),
            html_body: html_body.to_string(),
            text_body: text_body.to_string(),
            date: Utc::now(),
        })
    }
}

// ─── Results ────────────────────────────────────────────────────────

/// Returned by a successful send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendReceipt {
    /// The `Message-ID` we stamped on the message.
    pub message_id: String,
    /// The server's reply to the end of DATA (e.g. `2.0.0 Ok: queued as 4F2A`).
    pub server_reply: String,
    pub elapsed_ms: u64,
}

/// Uniform caller-facing result; errors never escape past it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SendOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

impl SendOutcome {
    pub fn sent(message: impl Into<String>, message_id: Option<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            message_id,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            message_id: None,
        }
    }

    pub fn from_result(result: SmtpResult<SendReceipt>, success_message: &str) -> Self {
        match result {
            Ok(receipt) => Self::sent(success_message, Some(receipt.message_id)),
            Err(e) => Self::failed(e.message),
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
