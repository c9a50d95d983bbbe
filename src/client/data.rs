//! Data channel brokerage
//!
//! For every data operation (LIST/MLSD/RETR/STOR/APPE) the broker picks a
//! negotiation mode, opens the second socket, layers TLS and MODE Z on it,
//! and ties completion to the terminating control-channel reply. Operations
//! are serialized through an owned lock so concurrent callers run one at a
//! time, in call order.

use crate::commands;
use crate::dispatcher::{CommandStream, Dispatcher};
use crate::error::{FtpError, Result};
use crate::response::Reply;
use crate::transport::MaybeTlsStream;
use regex::Regex;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, warn};

use super::FtpClient;

static PASV_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\((\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3})\)")
        .expect("pasv regex")
});

/// Extract host and port from a 227 PASV reply body
pub(crate) fn parse_pasv(text: &str) -> Option<(Ipv4Addr, u16)> {
    let caps = PASV_RE.captures(text)?;
    let octet = |i: usize| caps[i].parse::<u8>().ok();
    let addr = Ipv4Addr::new(octet(1)?, octet(2)?, octet(3)?, octet(4)?);
    let port = (octet(5)? as u16) << 8 | octet(6)? as u16;
    Some((addr, port))
}

/// Extract the port from a 229 EPSV reply body: `(<d><d><d>port<d>)`
///
/// RFC 2428 allows any delimiter character; the address is inherited from
/// the control connection.
pub(crate) fn parse_epsv(text: &str) -> Option<u16> {
    let start = text.find('(')?;
    let end = start + text[start..].find(')')?;
    let inner = &text[start + 1..end];

    let delim = inner.chars().next()?;
    let mut chars = inner.chars();
    for _ in 0..3 {
        if chars.next()? != delim {
            return None;
        }
    }
    let rest: String = chars.collect();
    let port = rest.strip_suffix(delim)?;
    if port.is_empty() {
        return None;
    }
    port.parse().ok()
}

/// Negotiation mode, in the priority order the broker tries them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataMode {
    Epsv,
    Pasv,
    Eprt,
    Port,
}

impl DataMode {
    fn command_name(self) -> &'static str {
        match self {
            DataMode::Epsv => "EPSV",
            DataMode::Pasv => "PASV",
            DataMode::Eprt => "EPRT",
            DataMode::Port => "PORT",
        }
    }
}

/// Phase-one result: a connected passive socket or a bound active listener
enum Negotiated {
    Passive(TcpStream),
    Active(TcpListener),
}

/// An open data connection plus the machinery to complete it
///
/// `finish` closes the socket, awaits the terminating control reply, and
/// restores MODE S when the transfer was compressed. Dropping without
/// finishing releases the serialization lock and still queues the MODE S
/// restore.
pub(super) struct DataChannel {
    pub(super) stream: Option<MaybeTlsStream>,
    control: Option<CommandStream>,
    /// A terminal reply the server sent instead of a 150/125 preliminary
    early_terminal: Option<Reply>,
    guard: Option<tokio::sync::OwnedMutexGuard<()>>,
    dispatcher: Dispatcher,
    data_active: Arc<AtomicBool>,
    data_abort: Arc<AtomicBool>,
    compressed: bool,
    done: bool,
}

impl DataChannel {
    /// Close the data socket and await the terminating reply
    pub(super) async fn finish(mut self) -> Result<Reply> {
        self.done = true;
        // Dropping the socket is what signals end-of-data for uploads.
        drop(self.stream.take());

        let result = match (self.early_terminal.take(), self.control.take()) {
            (Some(reply), _) => Ok(reply),
            (None, Some(control)) => control.terminal().await,
            (None, None) => Err(FtpError::ConnectionClosed),
        };
        let result = match result {
            Err(e) => {
                if self.data_abort.load(Ordering::SeqCst) {
                    Err(FtpError::Aborted)
                } else {
                    Err(e)
                }
            }
            ok => ok,
        };

        if self.compressed {
            if let Ok(stream) = self.dispatcher.send(commands::mode_stream(), false) {
                if let Err(e) = stream.terminal().await {
                    warn!("failed to restore MODE S: {}", e);
                }
            }
        }
        self.data_active.store(false, Ordering::SeqCst);
        self.guard.take();
        result
    }
}

impl Drop for DataChannel {
    fn drop(&mut self) {
        if !self.done {
            self.data_active.store(false, Ordering::SeqCst);
            if self.compressed {
                let _ = self.dispatcher.send(commands::mode_stream(), false);
            }
        }
    }
}

impl FtpClient {
    /// Open a data connection for `command` and gate on its 150/125 reply
    ///
    /// `allow_restart` consumes any offset staged by `restart()` with a REST
    /// before the data command.
    pub(super) async fn open_data(
        &self,
        command: String,
        use_compression: bool,
        allow_restart: bool,
    ) -> Result<DataChannel> {
        // Chained completion: tokio mutexes queue FIFO, so transfers run in
        // the order their façade calls were made.
        let guard = self.data_lock.clone().lock_owned().await;
        self.data_abort.store(false, Ordering::SeqCst);

        let mut compressed = false;
        let result = async {
            if use_compression {
                self.command(commands::mode_deflate()).await?;
                compressed = true;
            }

            if allow_restart {
                let offset = self
                    .state
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .restart_offset
                    .take();
                if let Some(offset) = offset {
                    self.command(commands::rest(offset)).await?;
                }
            }

            let (tcp, control, first_reply) = self.open_data_raw(&command).await?;

            // TLS joins after the server has accepted the transfer; the
            // session is resumed from the control channel's TLS session.
            let stream = if self.config.secure.secures_data() {
                let tls = self
                    .tls
                    .as_ref()
                    .ok_or_else(|| FtpError::Tls("Unable to secure connection(s)".to_string()))?;
                MaybeTlsStream::Tls(Box::new(tls.wrap(tcp).await?))
            } else {
                MaybeTlsStream::Plain(tcp)
            };
            Ok((stream, control, first_reply))
        }
        .await;

        match result {
            Ok((stream, control, first_reply)) => {
                self.data_active.store(true, Ordering::SeqCst);
                let early_terminal = (!first_reply.is_preliminary()).then_some(first_reply);
                Ok(DataChannel {
                    stream: Some(stream),
                    control: Some(control),
                    early_terminal,
                    guard: Some(guard),
                    dispatcher: self.dispatcher.clone(),
                    data_active: self.data_active.clone(),
                    data_abort: self.data_abort.clone(),
                    compressed,
                    done: false,
                })
            }
            Err(e) => {
                if compressed {
                    if let Ok(stream) = self.dispatcher.send(commands::mode_stream(), false) {
                        let _ = stream.terminal().await;
                    }
                }
                Err(e)
            }
        }
    }

    /// Negotiate a mode (with fallback), send the data command, await 150/125
    async fn open_data_raw(
        &self,
        command: &str,
    ) -> Result<(TcpStream, CommandStream, Reply)> {
        let negotiated = loop {
            let mode = self.choose_data_mode()?;
            match self.negotiate(mode).await {
                Ok(negotiated) => break negotiated,
                Err(e) if e.is_unsupported() => {
                    debug!("{} unsupported, trying next data mode", mode.command_name());
                    self.state
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .detected
                        .mark_unsupported(mode.command_name());
                }
                Err(e) => return Err(e),
            }
        };

        let mut control = self.send_streaming(command.to_string())?;
        let first_reply = control.expect_next().await?;

        let stream = match negotiated {
            Negotiated::Passive(stream) => stream,
            Negotiated::Active(listener) => {
                // maxConnections = 1: take the first peer, drop the listener.
                let (stream, peer) = timeout(self.config.data_timeout, listener.accept())
                    .await
                    .map_err(|_| {
                        FtpError::DataChannel("Timed out while making data connection".to_string())
                    })?
                    .map_err(FtpError::Io)?;
                debug!("active-mode data connection from {}", peer);
                stream
            }
        };

        Ok((stream, control, first_reply))
    }

    /// Pick the highest-priority mode not yet known-unsupported
    fn choose_data_mode(&self) -> Result<DataMode> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let detected = &state.detected;
        let remote_v6 = self.control_peer.is_ipv6();
        let features = &self.features;

        if !detected.is_unsupported("EPSV")
            && (remote_v6 || features.has("EPSV") || !features.is_known())
        {
            return Ok(DataMode::Epsv);
        }
        if !remote_v6 && !detected.is_unsupported("PASV") {
            return Ok(DataMode::Pasv);
        }
        if let Some(external) = self.config.port_address {
            if external.is_ipv6() {
                if features.has("EPRT") && !detected.is_unsupported("EPRT") {
                    return Ok(DataMode::Eprt);
                }
            } else if !detected.is_unsupported("PORT") {
                return Ok(DataMode::Port);
            }
        }
        Err(FtpError::DataChannel(
            "Unable to negotiate a data connection".to_string(),
        ))
    }

    async fn negotiate(&self, mode: DataMode) -> Result<Negotiated> {
        match mode {
            DataMode::Epsv => {
                let reply = self.command(commands::epsv()).await?;
                let port = parse_epsv(&reply.text).ok_or_else(|| {
                    FtpError::DataChannel(format!("Unable to parse EPSV reply: {}", reply.text))
                })?;
                // EPSV inherits the control connection's remote address.
                let addr = SocketAddr::new(self.control_peer.ip(), port);
                let stream = self.connect_data(addr).await?;
                Ok(Negotiated::Passive(stream))
            }
            DataMode::Pasv => {
                let reply = self.command(commands::pasv()).await?;
                let (ip, port) = parse_pasv(&reply.text).ok_or_else(|| {
                    FtpError::DataChannel(format!("Unable to parse PASV reply: {}", reply.text))
                })?;
                let advertised = SocketAddr::new(IpAddr::V4(ip), port);

                match self.connect_data(advertised).await {
                    Ok(stream) => Ok(Negotiated::Passive(stream)),
                    Err(first_err) if advertised.ip() != self.control_peer.ip() => {
                        // NAT-misconfigured servers advertise their private
                        // address; retry once against the control peer.
                        warn!(
                            "PASV connect to {} failed ({}); retrying via control peer",
                            advertised, first_err
                        );
                        let fallback = SocketAddr::new(self.control_peer.ip(), port);
                        match self.connect_data(fallback).await {
                            Ok(stream) => Ok(Negotiated::Passive(stream)),
                            Err(e) => {
                                let _ = self.command_promoted(commands::abor()).await;
                                Err(e)
                            }
                        }
                    }
                    Err(e) => {
                        let _ = self.command_promoted(commands::abor()).await;
                        Err(e)
                    }
                }
            }
            DataMode::Eprt | DataMode::Port => {
                let external = self.config.port_address.ok_or_else(|| {
                    FtpError::DataChannel("active mode requires a port address".to_string())
                })?;
                let listener = self.bind_in_range(external).await?;
                let port = listener.local_addr().map_err(FtpError::Io)?.port();

                let command = match external {
                    IpAddr::V4(addr) => commands::port(addr, port),
                    IpAddr::V6(addr) => commands::eprt(addr, port),
                };
                self.command(command).await?;
                Ok(Negotiated::Active(listener))
            }
        }
    }

    async fn connect_data(&self, addr: SocketAddr) -> Result<TcpStream> {
        debug!("opening data connection to {}", addr);
        timeout(self.config.data_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                FtpError::DataChannel("Timed out while making data connection".to_string())
            })?
            .map_err(FtpError::Io)
    }

    /// Bind an active-mode listener, walking the configured port range
    async fn bind_in_range(&self, external: IpAddr) -> Result<TcpListener> {
        let bind_ip = self.config.bind_address.unwrap_or(match external {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        });

        let range = self.config.port_range;
        for port in range.start..=range.end {
            match TcpListener::bind(SocketAddr::new(bind_ip, port)).await {
                Ok(listener) => return Ok(listener),
                Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => continue,
                Err(e) => return Err(FtpError::Io(e)),
            }
        }
        Err(FtpError::DataChannel(
            "Unable to find available port".to_string(),
        ))
    }
}
