//! Connection management for the FTP client
//!
//! This module handles TCP/TLS connection establishment, socket tuning,
//! the server greeting, the explicit-TLS upgrade, and spawning the command
//! dispatcher once the session reaches ready.

use crate::config::{SecureMode, SessionConfig};
use crate::dispatcher::Dispatcher;
use crate::error::{FtpError, Result};
use crate::transport::MaybeTlsStream;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tracing::{debug, warn};

use super::auth;
use super::io::ControlChannel;
use super::state::{SessionEvent, SessionState, TlsStage};
use super::FtpClient;

/// Receive buffer requested for the control/data sockets (1MB)
const RECV_BUFFER_SIZE: usize = 1024 * 1024;

/// Send buffer requested for the control/data sockets (256KB)
const SEND_BUFFER_SIZE: usize = 256 * 1024;

/// Dangerous certificate verifier that accepts all certificates
///
/// **Security Warning:** This verifier disables all certificate validation,
/// making connections vulnerable to man-in-the-middle attacks. Only use this
/// for testing or with servers you trust on a secure network.
#[derive(Debug)]
pub(super) struct DangerousAcceptAnyCertificate;

impl ServerCertVerifier for DangerousAcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, tokio_rustls::rustls::Error> {
        // Accept any certificate without validation
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        // Accept any signature without validation
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        // Accept any signature without validation
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
            SignatureScheme::ED448,
        ]
    }
}

/// TLS settings shared by the control upgrade and every data connection
///
/// The `ClientConfig` is built once per session so rustls session resumption
/// ties data-channel handshakes to the control channel's session.
pub(super) struct TlsContext {
    connector: TlsConnector,
    server_name: ServerName<'static>,
}

impl TlsContext {
    pub(super) fn new(config: &SessionConfig) -> Result<Self> {
        // Install default crypto provider if not already installed
        use tokio_rustls::rustls::crypto::{CryptoProvider, ring};
        let _ = CryptoProvider::install_default(ring::default_provider());

        let tls_config = if config.allow_insecure_tls {
            // Insecure mode: accept any certificate (for self-signed certificates)
            warn!("TLS certificate validation disabled - connection vulnerable to MITM attacks");
            ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(DangerousAcceptAnyCertificate))
                .with_no_client_auth()
        } else {
            // Secure mode: validate certificates against trusted root CAs
            let mut root_store = RootCertStore::empty();
            root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

            ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth()
        };

        let server_name = ServerName::try_from(config.host.as_str())
            .map_err(|e| FtpError::Tls(format!("Invalid domain: {}", e)))?
            .to_owned();

        Ok(Self {
            connector: TlsConnector::from(Arc::new(tls_config)),
            server_name,
        })
    }

    /// Run the TLS handshake over a connected TCP stream
    pub(super) async fn wrap(&self, stream: TcpStream) -> Result<TlsStream<TcpStream>> {
        self.connector
            .connect(self.server_name.clone(), stream)
            .await
            .map_err(|e| FtpError::Tls(format!("TLS handshake failed: {}", e)))
    }
}

/// Create a tuned TCP connection to the given host and port
///
/// Socket buffers are sized for transfer throughput; TCP_NODELAY keeps the
/// command/reply latency low. The blocking connect runs on the blocking
/// pool, with non-blocking mode set only after the connect succeeds.
pub(super) async fn open_tcp_stream(host: &str, port: u16) -> Result<TcpStream> {
    use socket2::{Domain, Protocol, Socket, Type};
    use std::net::ToSocketAddrs;

    let addr = format!("{}:{}", host, port);
    let host_for_resolve = addr.clone();
    // Resolution can block on DNS; keep it off the runtime threads. A
    // failed lookup propagates the system error (ENOTFOUND equivalent).
    let socket_addr = tokio::task::spawn_blocking(move || -> std::io::Result<std::net::SocketAddr> {
        host_for_resolve
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "No address resolved"))
    })
    .await
    .map_err(|e| FtpError::Io(std::io::Error::other(format!("Task join error: {}", e))))?
    .map_err(FtpError::Io)?;

    debug!("connecting to {} ({})", addr, socket_addr);

    let domain = if socket_addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP)).map_err(FtpError::Io)?;

    // Low-latency command/reply pattern
    socket.set_nodelay(true).map_err(FtpError::Io)?;

    if let Err(e) = socket.set_recv_buffer_size(RECV_BUFFER_SIZE) {
        warn!(
            "Failed to set receive buffer size to {} bytes: {}",
            RECV_BUFFER_SIZE, e
        );
    } else if let Ok(actual) = socket.recv_buffer_size() {
        debug!(
            "TCP receive buffer: requested {} bytes, actual {} bytes",
            RECV_BUFFER_SIZE, actual
        );
    }

    if let Err(e) = socket.set_send_buffer_size(SEND_BUFFER_SIZE) {
        warn!(
            "Failed to set send buffer size to {} bytes: {}",
            SEND_BUFFER_SIZE, e
        );
    } else if let Ok(actual) = socket.send_buffer_size() {
        debug!(
            "TCP send buffer: requested {} bytes, actual {} bytes",
            SEND_BUFFER_SIZE, actual
        );
    }

    // socket2's connect is blocking; connect BEFORE setting non-blocking mode
    let tcp_stream = tokio::task::spawn_blocking(move || -> std::io::Result<std::net::TcpStream> {
        socket.connect(&socket_addr.into())?;
        socket.set_nonblocking(true)?;
        Ok(socket.into())
    })
    .await
    .map_err(|e| FtpError::Io(std::io::Error::other(format!("Task join error: {}", e))))?
    .map_err(FtpError::Io)?;

    TcpStream::from_std(tcp_stream).map_err(FtpError::Io)
}

impl FtpClient {
    /// Connect and log in to an FTP server
    ///
    /// Runs the whole sequence the session needs before it is usable:
    /// greeting, optional TLS upgrade, USER/PASS, FEAT discovery and
    /// TYPE I negotiation. The returned client is ready for commands.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - [`FtpError::Io`] - TCP connection fails (DNS resolution, refusal)
    /// - [`FtpError::Tls`] - AUTH negotiation or handshake fails
    /// - [`FtpError::Timeout`] - the sequence exceeds `conn_timeout`
    /// - [`FtpError::Protocol`] - the server rejects the login
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        let config = Arc::new(config);
        timeout(config.conn_timeout, Self::connect_inner(config))
            .await
            .map_err(|_| FtpError::Timeout("Timeout while connecting to server"))?
    }

    async fn connect_inner(config: Arc<SessionConfig>) -> Result<Self> {
        debug!("Connecting to FTP server {}:{}", config.host, config.port);

        let tcp = open_tcp_stream(&config.host, config.port).await?;
        let control_peer = tcp.peer_addr().map_err(FtpError::Io)?;

        let tls = if config.secure != SecureMode::Plain {
            Some(TlsContext::new(&config)?)
        } else {
            None
        };

        // Implicit TLS wraps before the greeting; the AUTH exchange is skipped.
        let stream = if config.secure == SecureMode::Implicit {
            let tls = tls.as_ref().ok_or_else(|| {
                FtpError::Tls("Unable to secure connection(s)".to_string())
            })?;
            MaybeTlsStream::Tls(Box::new(tls.wrap(tcp).await?))
        } else {
            MaybeTlsStream::Plain(tcp)
        };

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mut channel = ControlChannel::new(stream);

        // The greeting is the first reply on the wire
        let greeting = channel.read_reply().await?;
        if !greeting.is_success() {
            return Err(FtpError::Protocol {
                code: greeting.code,
                message: greeting.text,
            });
        }
        debug!("Server greeting: {} {}", greeting.code, greeting.text);
        let _ = event_tx.send(SessionEvent::Greeting(greeting.text));

        let mut tls_stage = TlsStage::None;
        if config.secure.upgrades_control() {
            let (upgraded, stage) = auth::upgrade_control(channel, &config, tls.as_ref()).await?;
            channel = upgraded;
            tls_stage = stage;
        }

        auth::login(&mut channel, &config).await?;
        let features = auth::discover_features(&mut channel, &config).await?;
        auth::negotiate_type(&mut channel).await?;

        let (stream, parser) = channel.into_parts();
        let data_active = Arc::new(AtomicBool::new(false));
        let data_abort = Arc::new(AtomicBool::new(false));
        let dispatcher = Dispatcher::spawn(
            stream,
            parser,
            config.keepalive,
            event_tx.clone(),
            data_active.clone(),
            data_abort.clone(),
        );

        let _ = event_tx.send(SessionEvent::Ready);
        debug!("session ready ({} features)", features.list().len());

        Ok(FtpClient {
            dispatcher,
            config,
            features,
            tls,
            tls_stage,
            control_peer,
            state: std::sync::Mutex::new(SessionState::default()),
            data_lock: Arc::new(tokio::sync::Mutex::new(())),
            data_active,
            data_abort,
            bytes_compressed: Arc::new(std::sync::atomic::AtomicU64::new(0)),
            bytes_decompressed: Arc::new(std::sync::atomic::AtomicU64::new(0)),
            event_tx,
            events: std::sync::Mutex::new(Some(event_rx)),
        })
    }
}
