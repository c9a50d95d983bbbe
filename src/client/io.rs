//! Control-channel I/O for the connect phase
//!
//! Before the dispatcher task takes ownership of the socket, the connect
//! sequence (greeting, TLS upgrade, login, FEAT, TYPE) talks to the server
//! through this sequential channel. The whole phase runs under the
//! session's `conn_timeout`.

use crate::error::{FtpError, Result};
use crate::response::{Reply, ReplyParser};
use crate::transport::MaybeTlsStream;
use std::collections::VecDeque;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{trace, warn};

const READ_CHUNK_SIZE: usize = 4 * 1024;

pub(super) struct ControlChannel {
    stream: MaybeTlsStream,
    parser: ReplyParser,
    pending: VecDeque<Reply>,
}

impl ControlChannel {
    pub(super) fn new(stream: MaybeTlsStream) -> Self {
        Self {
            stream,
            parser: ReplyParser::new(),
            pending: VecDeque::new(),
        }
    }

    /// Rebuild the channel after a TLS upgrade, keeping buffered bytes
    pub(super) fn with_parser(stream: MaybeTlsStream, parser: ReplyParser) -> Self {
        Self {
            stream,
            parser,
            pending: VecDeque::new(),
        }
    }

    pub(super) async fn send_command(&mut self, command: &str) -> Result<()> {
        trace!("sending command: {}", command.trim_end());
        self.stream.write_all(command.as_bytes()).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read the next complete reply, buffering any extras
    pub(super) async fn read_reply(&mut self) -> Result<Reply> {
        loop {
            if let Some(reply) = self.pending.pop_front() {
                trace!("reply: {} {}", reply.code, reply.text);
                return Ok(reply);
            }

            let mut buf = [0u8; READ_CHUNK_SIZE];
            let n = self.stream.read(&mut buf).await?;
            if n == 0 {
                return Err(FtpError::ConnectionClosed);
            }
            self.pending.extend(self.parser.feed(&buf[..n]));
        }
    }

    /// Send a command and return its reply, whatever the code
    ///
    /// The connect-phase state machine branches on codes itself.
    pub(super) async fn command(&mut self, command: &str) -> Result<Reply> {
        self.send_command(command).await?;
        self.read_reply().await
    }

    /// Send a command and require a completion (2xx) reply
    pub(super) async fn expect_success(&mut self, command: &str) -> Result<Reply> {
        let reply = self.command(command).await?;
        if !reply.is_success() {
            return Err(FtpError::Protocol {
                code: reply.code,
                message: reply.text,
            });
        }
        Ok(reply)
    }

    /// Hand the socket and parser buffer over (TLS upgrade, dispatcher spawn)
    pub(super) fn into_parts(self) -> (MaybeTlsStream, ReplyParser) {
        if !self.pending.is_empty() {
            warn!(
                "{} unexpected replies buffered at control-channel handover",
                self.pending.len()
            );
        }
        (self.stream, self.parser)
    }
}
