//! The SMTP client.
//!
//! One [`SmtpClient`] per process is typical. It owns the resolved
//! credentials and the client configuration; every `send_email` call opens
//! its own socket and runs its own [`SmtpSession`], so concurrent sends
//! never share connection state.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use tokio::sync::watch;

use crate::session::{SessionState, SmtpSession};
use crate::settings::{resolve_credentials, SettingsStore};
use crate::transport::{self, SmtpStream};
use crate::types::*;

type SettingsSlot = Option<SmtpResult<SmtpCredentials>>;

/// Anything that can deliver one HTML + text message to one recipient.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send_email(
        &self,
        recipient: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> SmtpResult<SendReceipt>;
}

pub struct SmtpClient {
    store: Option<Arc<dyn SettingsStore>>,
    config: SmtpClientConfig,
    /// `None` until the first resolution finishes.
    settings: Arc<watch::Sender<SettingsSlot>>,
    /// Whether a background resolution was started at construction.
    resolving: bool,
}

impl SmtpClient {
    /// Create a client and start resolving settings in the background.
    ///
    /// Outside a Tokio runtime nothing is spawned; the first send resolves
    /// settings inline instead.
    pub fn new(store: Option<Arc<dyn SettingsStore>>, config: SmtpClientConfig) -> Self {
        let (tx, _) = watch::channel(None);
        let settings = Arc::new(tx);
        let resolving = match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let store = store.clone();
                let fallback = config.fallback_credentials.clone();
                let slot = settings.clone();
                handle.spawn(async move {
                    let resolved = resolve_credentials(store.as_deref(), fallback.as_ref()).await;
                    if let Err(ref e) = resolved {
                        warn!("SMTP settings unavailable: {}", e);
                    }
                    slot.send_replace(Some(resolved));
                });
                true
            }
            Err(_) => {
                debug!("No runtime at client construction; settings resolve on first send");
                false
            }
        };
        Self {
            store,
            config,
            settings,
            resolving,
        }
    }

    /// Client with fixed credentials and no settings store.
    pub fn with_credentials(credentials: SmtpCredentials, mut config: SmtpClientConfig) -> Self {
        config.fallback_credentials = Some(credentials.clone());
        let (tx, _) = watch::channel(Some(Ok(credentials)));
        Self {
            store: None,
            config,
            settings: Arc::new(tx),
            resolving: false,
        }
    }

    pub fn config(&self) -> &SmtpClientConfig {
        &self.config
    }

    /// Currently resolved credentials, `None` before resolution finishes
    /// or when it failed.
    pub fn settings(&self) -> Option<SmtpCredentials> {
        self.settings
            .borrow()
            .as_ref()
            .and_then(|r| r.as_ref().ok().cloned())
    }

    /// Re-run settings resolution and replace the cached credentials.
    pub async fn refresh(&self) -> SmtpResult<SmtpCredentials> {
        let resolved = resolve_credentials(
            self.store.as_deref(),
            self.config.fallback_credentials.as_ref(),
        )
        .await;
        self.settings.send_replace(Some(resolved.clone()));
        resolved
    }

    async fn wait_for_settings(&self) -> SmtpResult<SmtpCredentials> {
        if !self.resolving && self.settings.borrow().is_none() {
            return self.refresh().await;
        }
        let mut rx = self.settings.subscribe();
        let waited = tokio::time::timeout(self.config.settings_wait, async {
            rx.wait_for(|slot| slot.is_some())
                .await
                .map(|slot| slot.clone())
        })
        .await;
        match waited {
            Ok(Ok(Some(resolved))) => resolved,
            Ok(Ok(None)) | Ok(Err(_)) => Err(SmtpError::config("SMTP settings resolution was abandoned")),
            Err(_) => Err(SmtpError::config(format!(
                "SMTP settings not resolved within {:?}",
                self.config.settings_wait
            ))),
        }
    }

    /// Send one message. The whole dialogue is bounded by `send_timeout`.
    pub async fn send_email(
        &self,
        recipient: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> SmtpResult<SendReceipt> {
        if !is_valid_address(recipient) {
            return Err(SmtpError::validation(format!(
                "Invalid recipient email address: {}",
                recipient
            )));
        }
        let credentials = self.wait_for_settings().await?;
        credentials.validate()?;
        let mail = OutgoingMail::new(credentials.sender(), recipient, subject, html_body, text_body)?;

        info!(
            "Sending '{}' to {} via {}:{}",
            subject, recipient, credentials.host, credentials.port
        );
        self.run_session(&credentials, mail).await
    }

    /// Like [`send_email`](Self::send_email) but never fails: the error is
    /// logged and folded into a [`SendOutcome`].
    pub async fn send(
        &self,
        recipient: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> SendOutcome {
        let result = self.send_email(recipient, subject, html_body, text_body).await;
        match result {
            Err(ref e) if e.kind.is_protocol() => {
                warn!("Email to {} refused by server: {}", recipient, e)
            }
            Err(ref e) => error!("Email to {} failed: {}", recipient, e),
            Ok(_) => {}
        }
        SendOutcome::from_result(result, "Email sent successfully")
    }

    async fn run_session(
        &self,
        credentials: &SmtpCredentials,
        mail: OutgoingMail,
    ) -> SmtpResult<SendReceipt> {
        let mut session = SmtpSession::new(credentials, &self.config.ehlo_domain, mail);
        let send_timeout = self.config.send_timeout;

        let work = async {
            let mut stream = match transport::connect(credentials, &self.config).await {
                Ok(stream) => stream,
                Err(e) => return Err(session.abort(e)),
            };
            debug!(
                "Connected to {}:{} over {}",
                credentials.host,
                credentials.port,
                if stream.is_tls() { "implicit TLS" } else { "plain TCP" }
            );
            let result = drive(&mut session, &mut stream).await;
            stream.shutdown().await;
            result
        };

        // The socket lives inside `work`, so it is dropped exactly once
        // whichever way this resolves.
        let outcome = tokio::time::timeout(send_timeout, work).await;
        match outcome {
            Ok(Ok(())) => {
                let receipt = session.receipt();
                info!(
                    "Email {} delivered in {} ms",
                    receipt.message_id, receipt.elapsed_ms
                );
                Ok(receipt)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(session.abort(SmtpError::timeout(format!(
                "SMTP send timed out after {:?}",
                send_timeout
            )))),
        }
    }
}

/// Pump bytes between the socket and the session until it terminates.
async fn drive(session: &mut SmtpSession, stream: &mut SmtpStream) -> SmtpResult<()> {
    loop {
        let chunk = match stream.read_chunk().await {
            Ok(chunk) => chunk,
            Err(e) => return io_failure(session, e),
        };
        if chunk.is_empty() {
            return session.on_close();
        }
        for outgoing in session.on_data(&chunk)? {
            if let Err(e) = stream.write_all(&outgoing).await {
                return io_failure(session, e);
            }
        }
        if let Err(e) = stream.flush().await {
            return io_failure(session, e);
        }
        if session.is_complete() {
            return Ok(());
        }
    }
}

/// A socket error after the message was accepted does not fail the send.
fn io_failure(session: &mut SmtpSession, err: SmtpError) -> SmtpResult<()> {
    if *session.state() == SessionState::QuitSent {
        debug!("Ignoring socket error after acceptance: {}", err);
        return session.on_close();
    }
    Err(session.abort(err))
}

#[async_trait]
impl MailTransport for SmtpClient {
    async fn send_email(
        &self,
        recipient: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> SmtpResult<SendReceipt> {
        SmtpClient::send_email(self, recipient, subject, html_body, text_body).await
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
