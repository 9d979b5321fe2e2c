//! SMTP session state machine.
//!
//! [`SmtpSession`] is sans-IO: the driver in `client.rs` feeds it every
//! chunk read from the socket through [`SmtpSession::on_data`] and writes
//! back whatever it returns. All dispatch happens on the current
//! [`SessionState`], never on the reply code alone. `250` answers EHLO,
//! MAIL FROM, RCPT TO and the end of DATA, and only the state tells
//! them apart.

use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::auth::{self, LoginPrompt};
use crate::message;
use crate::reply::{LineBuffer, ReplyLine};
use crate::types::*;

/// Where the dialogue currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Socket open, waiting for the 220 greeting.
    Connecting,
    GreetingReceived,
    /// `EHLO` written, waiting for the final line of the 250 reply.
    EhloSent,
    /// EHLO done and `AUTH LOGIN` written.
    EhloAcknowledged,
    AuthUsernameSent,
    AuthPasswordSent,
    Authenticated,
    MailFromSent,
    RcptToSent,
    DataCommandSent,
    /// Message body and end-of-data marker written.
    BodySent,
    /// Message accepted, `QUIT` written.
    QuitSent,
    Completed,
    Failed(String),
}

impl SessionState {
    pub fn phase(&self) -> SmtpPhase {
        match self {
            Self::Connecting | Self::GreetingReceived | Self::EhloSent => SmtpPhase::Connection,
            Self::EhloAcknowledged | Self::AuthUsernameSent | Self::AuthPasswordSent => {
                SmtpPhase::Authentication
            }
            _ => SmtpPhase::MailTransfer,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(reason) => write!(f, "Failed({})", reason),
            other => write!(f, "{:?}", other),
        }
    }
}

/// One send attempt: envelope, body and protocol state.
pub struct SmtpSession {
    state: SessionState,
    lines: LineBuffer,
    /// Text of continuation lines of the reply being received.
    continued: Vec<String>,
    ehlo_domain: String,
    username: String,
    password: String,
    mail: OutgoingMail,
    server_reply: String,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl SmtpSession {
    pub fn new(credentials: &SmtpCredentials, ehlo_domain: &str, mail: OutgoingMail) -> Self {
        Self {
            state: SessionState::Connecting,
            lines: LineBuffer::new(),
            continued: Vec::new(),
            ehlo_domain: ehlo_domain.to_string(),
            username: credentials.username.clone(),
            password: credentials.password.clone(),
            mail,
            server_reply: String::new(),
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn mail(&self) -> &OutgoingMail {
        &self.mail
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn is_complete(&self) -> bool {
        self.state == SessionState::Completed
    }

    /// Feed raw bytes from the socket.
    ///
    /// Returns the bytes to write back, in order. On error the session is
    /// left in `Failed` and nothing further should be written.
    pub fn on_data(&mut self, chunk: &[u8]) -> SmtpResult<Vec<Vec<u8>>> {
        let mut outgoing = Vec::new();
        for raw in self.lines.push(chunk) {
            if self.state.is_terminal() {
                debug!("S (ignored after {}): {}", self.state, raw);
                continue;
            }
            debug!("S: {}", raw);
            let line = match ReplyLine::parse(&raw) {
                Ok(line) => line,
                Err(e) => return Err(self.fail(e.with_phase(self.state.phase()))),
            };
            if line.continuation {
                self.continued.push(line.message);
                continue;
            }
            let mut text_lines = std::mem::take(&mut self.continued);
            text_lines.push(line.message);
            let reply = ReplyLine {
                code: line.code,
                continuation: false,
                message: text_lines.join(" "),
            };
            if let Some(bytes) = self.dispatch(&reply)? {
                outgoing.push(bytes);
            }
        }
        Ok(outgoing)
    }

    /// The server closed the connection.
    ///
    /// Once the message has been accepted a missing `221` does not matter.
    pub fn on_close(&mut self) -> SmtpResult<()> {
        match self.state {
            SessionState::Completed => Ok(()),
            SessionState::QuitSent => {
                debug!("Server closed before answering QUIT; message already accepted");
                self.state = SessionState::Completed;
                Ok(())
            }
            SessionState::Failed(ref reason) => Err(SmtpError::transport(reason.clone())),
            _ => {
                let phase = self.state.phase();
                let err = SmtpError::transport(format!(
                    "Connection closed by server while in state {}",
                    self.state
                ))
                .with_phase(phase);
                Err(self.fail(err))
            }
        }
    }

    /// Mark the session failed from outside (timeout, socket error).
    pub fn abort(&mut self, err: SmtpError) -> SmtpError {
        if self.state.is_terminal() {
            return err;
        }
        let phase = self.state.phase();
        let err = if err.phase.is_none() { err.with_phase(phase) } else { err };
        self.fail(err)
    }

    pub fn receipt(&self) -> SendReceipt {
        SendReceipt {
            message_id: self.mail.message_id.clone(),
            server_reply: self.server_reply.clone(),
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        }
    }

    // ── Dispatch ────────────────────────────────────────────────

    /// Handle one complete (possibly joined multi-line) reply.
    fn dispatch(&mut self, reply: &ReplyLine) -> SmtpResult<Option<Vec<u8>>> {
        let (code, text) = (reply.code, reply.message.as_str());
        if self.state == SessionState::QuitSent {
            if code != 221 {
                warn!("Unexpected reply to QUIT ({} {}); message already accepted", code, text);
            }
            self.state = SessionState::Completed;
            info!("SMTP session completed for {}", self.mail.to.address);
            return Ok(None);
        }

        if reply.is_error() {
            let err = SmtpError::from_reply(code, text, self.state.phase());
            return Err(self.fail(err));
        }

        match (&self.state, code) {
            (SessionState::Connecting, 220) => {
                self.state = SessionState::GreetingReceived;
                debug!("Greeting: {}", text);
                let cmd = format!("EHLO {}", self.ehlo_domain);
                self.state = SessionState::EhloSent;
                Ok(Some(command(&cmd)))
            }
            (SessionState::EhloSent, 250) => {
                self.state = SessionState::EhloAcknowledged;
                Ok(Some(command("AUTH LOGIN")))
            }
            (SessionState::EhloAcknowledged, 334) | (SessionState::AuthUsernameSent, 334) => {
                self.answer_login_prompt(text)
            }
            (SessionState::AuthPasswordSent, 235) => {
                self.state = SessionState::Authenticated;
                info!("SMTP authenticated as {}", self.username);
                Ok(Some(self.begin_mail_transfer()))
            }
            (SessionState::MailFromSent, 250) => {
                self.state = SessionState::RcptToSent;
                Ok(Some(command(&format!("RCPT TO:{}", self.mail.to.to_angle_addr()))))
            }
            (SessionState::RcptToSent, 250) | (SessionState::RcptToSent, 251) => {
                self.state = SessionState::DataCommandSent;
                Ok(Some(command("DATA")))
            }
            (SessionState::DataCommandSent, 354) => {
                self.state = SessionState::BodySent;
                let document = message::build_message(&self.mail);
                debug!("C: <{} byte message body>", document.len());
                Ok(Some(message::to_data_payload(&document)))
            }
            (SessionState::BodySent, 250) => {
                self.server_reply = text.to_string();
                info!("Message {} accepted: {}", self.mail.message_id, text);
                self.state = SessionState::QuitSent;
                Ok(Some(command("QUIT")))
            }
            (state, code) => {
                let err = SmtpError::unexpected(format!(
                    "Unexpected reply {} {} in state {}",
                    code, text, state
                ))
                .with_code(code)
                .with_phase(state.phase());
                Err(self.fail(err))
            }
        }
    }

    fn answer_login_prompt(&mut self, challenge: &str) -> SmtpResult<Option<Vec<u8>>> {
        let prompt = match auth::decode_prompt(challenge) {
            LoginPrompt::Other(p) => {
                // Fall back on the step we are at when the prompt is non-standard.
                debug!("Non-standard LOGIN prompt '{}'", p);
                match self.state {
                    SessionState::EhloAcknowledged => LoginPrompt::Username,
                    _ => LoginPrompt::Password,
                }
            }
            p => p,
        };
        match prompt {
            LoginPrompt::Username => {
                debug!("C: <username>");
                self.state = SessionState::AuthUsernameSent;
                Ok(Some(auth::login_response(&self.username)))
            }
            LoginPrompt::Password if self.state == SessionState::AuthUsernameSent => {
                debug!("C: <password>");
                self.state = SessionState::AuthPasswordSent;
                Ok(Some(auth::login_response(&self.password)))
            }
            _ => {
                let err = SmtpError::unexpected("Server asked for a password before the username")
                    .with_code(334)
                    .with_phase(SmtpPhase::Authentication);
                Err(self.fail(err))
            }
        }
    }

    fn begin_mail_transfer(&mut self) -> Vec<u8> {
        self.state = SessionState::MailFromSent;
        command(&format!("MAIL FROM:{}", self.mail.from.to_angle_addr()))
    }

    fn fail(&mut self, err: SmtpError) -> SmtpError {
        warn!("SMTP session failed in state {}: {}", self.state, err);
        self.state = SessionState::Failed(err.message.clone());
        err
    }
}

fn command(cmd: &str) -> Vec<u8> {
    debug!("C: {}", cmd);
    format!("{}\r\n", cmd).into_bytes()
}

// ─── Tests ──────────────────────────────────────────────────────────
