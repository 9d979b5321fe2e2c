//! Socket layer: plain TCP or implicit TLS.
//!
//! Only connection establishment and byte shuffling live here; the
//! dialogue itself is in `session.rs`.

use std::io::Cursor;
use std::sync::Arc;

use log::{debug, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use crate::types::*;

const READ_CHUNK: usize = 4096;

// ─── Stream Abstraction ─────────────────────────────────────────────

/// Plain or TLS socket behind one interface.
pub(crate) enum SmtpStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl SmtpStream {
    /// Read whatever the server has sent. An empty vec means EOF.
    pub(crate) async fn read_chunk(&mut self) -> SmtpResult<Vec<u8>> {
        let mut buf = vec![0u8; READ_CHUNK];
        let n = match self {
            Self::Plain(s) => s.read(&mut buf).await?,
            Self::Tls(s) => s.read(&mut buf).await?,
        };
        buf.truncate(n);
        Ok(buf)
    }

    pub(crate) async fn write_all(&mut self, data: &[u8]) -> SmtpResult<()> {
        match self {
            Self::Plain(s) => s.write_all(data).await?,
            Self::Tls(s) => s.write_all(data).await?,
        }
        Ok(())
    }

    pub(crate) async fn flush(&mut self) -> SmtpResult<()> {
        match self {
            Self::Plain(s) => s.flush().await?,
            Self::Tls(s) => s.flush().await?,
        }
        Ok(())
    }

    /// Best-effort close; errors here never change a send's outcome.
    pub(crate) async fn shutdown(&mut self) {
        let res = match self {
            Self::Plain(s) => s.shutdown().await,
            Self::Tls(s) => s.shutdown().await,
        };
        if let Err(e) = res {
            debug!("Socket shutdown: {}", e);
        }
    }

    pub(crate) fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

// ─── Connect ────────────────────────────────────────────────────────

/// Open the socket, performing the TLS handshake first when the
/// credentials ask for implicit TLS. Bounded by `connect_timeout`.
pub(crate) async fn connect(
    credentials: &SmtpCredentials,
    config: &SmtpClientConfig,
) -> SmtpResult<SmtpStream> {
    let addr = format!("{}:{}", credentials.host, credentials.port);
    debug!("Connecting to SMTP server {}", addr);

    let establish = async {
        let tcp = TcpStream::connect(&addr).await.map_err(|e| {
            SmtpError::transport(format!("Connection to {} failed: {}", addr, e))
        })?;
        if credentials.use_implicit_tls {
            let tls = handshake(tcp, &credentials.host, config).await?;
            Ok::<_, SmtpError>(SmtpStream::Tls(Box::new(tls)))
        } else {
            Ok::<_, SmtpError>(SmtpStream::Plain(tcp))
        }
    };

    tokio::time::timeout(config.connect_timeout, establish)
        .await
        .map_err(|_| {
            SmtpError::timeout(format!(
                "Connection to {} timed out after {:?}",
                addr, config.connect_timeout
            ))
        })?
        .map_err(|e| e.with_phase(SmtpPhase::Connection))
}

async fn handshake(
    tcp: TcpStream,
    host: &str,
    config: &SmtpClientConfig,
) -> SmtpResult<TlsStream<TcpStream>> {
    let tls_config = build_tls_config(config).await?;
    let connector = TlsConnector::from(Arc::new(tls_config));
    let server_name = rustls::pki_types::ServerName::try_from(host.to_string())
        .map_err(|e| SmtpError::config(format!("Invalid TLS server name '{}': {}", host, e)))?;

    connector
        .connect(server_name, tcp)
        .await
        .map_err(|e| SmtpError::transport(format!("TLS handshake failed: {}", e)))
}

pub(crate) async fn build_tls_config(config: &SmtpClientConfig) -> SmtpResult<rustls::ClientConfig> {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    if let Some(ref ca_path) = config.ca_cert_path {
        let pem_data = tokio::fs::read(ca_path)
            .await
            .map_err(|e| SmtpError::config(format!("Failed to read CA cert {}: {}", ca_path, e)))?;
        let mut cursor = Cursor::new(pem_data);
        let certs = rustls_pemfile::certs(&mut cursor)
            .filter_map(|r| r.ok())
            .collect::<Vec<_>>();
        if certs.is_empty() {
            return Err(SmtpError::config(format!("No certificates found in {}", ca_path)));
        }
        for cert in certs {
            root_store
                .add(cert)
                .map_err(|e| SmtpError::config(format!("Failed to add CA cert: {}", e)))?;
        }
    }

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut tls_config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| SmtpError::config(format!("TLS setup failed: {}", e)))?
        .with_root_certificates(root_store)
        .with_no_client_auth();

    if !config.verify_certificates {
        warn!("TLS certificate verification disabled");
        tls_config
            .dangerous()
            .set_certificate_verifier(Arc::new(NoCertVerifier));
    }

    Ok(tls_config)
}

// ─── NoCertVerifier (for self-signed certs) ─────────────────────────

#[derive(Debug)]
struct NoCertVerifier;

impl rustls::client::danger::ServerCertVerifier for NoCertVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
