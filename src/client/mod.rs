//! FTP client implementation with TLS and MODE Z compression support

mod auth;
mod compression;
mod connection;
mod data;
mod io;
mod listing;
mod metadata;
mod state;
mod transfer;

pub use state::{SessionEvent, TlsStage};
pub use transfer::DataReader;

use crate::commands;
use crate::config::SessionConfig;
use crate::dispatcher::{CommandStream, Dispatcher};
use crate::error::Result;
use crate::features::Features;
use crate::response::Reply;
use connection::TlsContext;
use state::SessionState;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

/// Async FTP client with TLS and MODE Z compression support
///
/// One value drives one control-channel session. Command methods take
/// `&self`; the dispatcher task serializes the control channel and the
/// broker serializes data transfers, so concurrent calls are safe and run
/// in the order they were issued.
///
/// # Example
///
/// ```no_run
/// use ftp_rs::{FtpClient, SessionConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = SessionConfig::with_credentials("ftp.example.com", "user", "pass");
/// let client = FtpClient::connect(config).await?;
///
/// for entry in client.list(Some("/pub"), false).await? {
///     if let Some(entry) = entry.entry() {
///         println!("{} ({} bytes)", entry.name, entry.size);
///     }
/// }
/// client.end().await?;
/// # Ok(())
/// # }
/// ```
#[must_use]
pub struct FtpClient {
    /// Handle to the dispatcher task that owns the control socket
    dispatcher: Dispatcher,
    /// Session configuration
    config: Arc<SessionConfig>,
    /// Features discovered via FEAT (with overrides applied)
    features: Features,
    /// TLS context shared with data connections; None for plain sessions
    tls: Option<TlsContext>,
    /// How the control channel was upgraded
    tls_stage: TlsStage,
    /// Remote address of the control socket (data-mode selection, EPSV)
    control_peer: SocketAddr,
    /// Detected-support cache and staged REST offset
    state: std::sync::Mutex<SessionState>,
    /// Serializes data operations; tokio's FIFO fairness orders them
    data_lock: Arc<tokio::sync::Mutex<()>>,
    /// True while a data socket exists (lets ABOR tag it)
    data_active: Arc<AtomicBool>,
    /// Set by the dispatcher when ABOR is written mid-transfer
    data_abort: Arc<AtomicBool>,
    /// Compressed bytes moved over MODE Z data connections
    bytes_compressed: Arc<AtomicU64>,
    /// Decompressed bytes moved over MODE Z data connections
    bytes_decompressed: Arc<AtomicU64>,
    /// Session event sink (greeting/ready/end/close/error)
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    /// Event receiver handed out once via `take_events`
    events: std::sync::Mutex<Option<mpsc::UnboundedReceiver<SessionEvent>>>,
}

impl FtpClient {
    /// Features the server advertised via FEAT, with overrides applied
    pub fn features(&self) -> &Features {
        &self.features
    }

    /// How far the control channel's TLS upgrade got
    pub fn tls_stage(&self) -> TlsStage {
        self.tls_stage
    }

    /// Take the session event receiver; yields None after the first call
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<SessionEvent>> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    /// Compression statistics as `(bytes_compressed, bytes_decompressed)`
    ///
    /// Both are zero until a MODE Z transfer runs.
    pub fn compression_stats(&self) -> (u64, u64) {
        (
            self.bytes_compressed.load(Ordering::Relaxed),
            self.bytes_decompressed.load(Ordering::Relaxed),
        )
    }

    /// Switch transfers to ASCII mode (TYPE A)
    ///
    /// Line-ending conversion is left entirely to the server.
    pub async fn ascii(&self) -> Result<()> {
        self.command(commands::type_ascii()).await?;
        Ok(())
    }

    /// Switch transfers back to binary mode (TYPE I)
    pub async fn binary(&self) -> Result<()> {
        self.command(commands::type_image()).await?;
        Ok(())
    }

    /// Abort the in-progress data transfer
    ///
    /// ABOR is always promoted to the queue front: it jumps any queued
    /// commands but never displaces the in-flight one. Both argument values
    /// behave identically; the parameter mirrors the historical surface.
    pub async fn abort(&self, _immediate: bool) -> Result<()> {
        self.command_promoted(commands::abor()).await?;
        Ok(())
    }

    /// Finish the session: QUIT, await the farewell, let the queue drain
    ///
    /// Commands already queued complete before the QUIT is sent.
    pub async fn end(&self) -> Result<()> {
        let reply = self.command(commands::quit()).await?;
        debug!("session ended: {} {}", reply.code, reply.text);
        let _ = self.event_tx.send(SessionEvent::End);
        Ok(())
    }

    /// Log out of the session; same wire exchange as [`end`](Self::end)
    pub async fn logout(&self) -> Result<()> {
        self.end().await
    }

    /// Tear the connection down immediately without draining the queue
    pub fn destroy(&self) {
        self.dispatcher.destroy();
    }

    /// Send a command and await its terminating reply
    pub(crate) async fn command(&self, command: impl Into<String>) -> Result<Reply> {
        self.dispatcher.send(command, false)?.terminal().await
    }

    /// Send a queue-front command and await its terminating reply
    pub(crate) async fn command_promoted(&self, command: impl Into<String>) -> Result<Reply> {
        self.dispatcher.send(command, true)?.terminal().await
    }

    /// Send a command keeping the raw reply stream (data operations)
    pub(crate) fn send_streaming(&self, command: impl Into<String>) -> Result<CommandStream> {
        self.dispatcher.send(command, false)
    }
}

impl Drop for FtpClient {
    fn drop(&mut self) {
        debug!("FtpClient dropped");
    }
}
