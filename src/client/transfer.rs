//! File transfers: RETR, STOR, APPE, REST and abort observation

use crate::commands;
use crate::error::{FtpError, Result};
use crate::response::Reply;
use crate::transport::{DeflateWriter, InflateReader, MaybeTlsStream};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tracing::debug;

use super::FtpClient;
use super::data::DataChannel;

const COPY_CHUNK_SIZE: usize = 64 * 1024;

enum Body {
    Plain(MaybeTlsStream),
    Inflate(InflateReader<MaybeTlsStream>),
}

impl AsyncRead for Body {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Body::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Body::Inflate(reader) => Pin::new(reader).poll_read(cx, buf),
        }
    }
}

/// Streaming download returned by [`FtpClient::get`]
///
/// Implements [`AsyncRead`]; backpressure propagates through the TLS and
/// inflate layers to the data socket. After reading to EOF call
/// [`finish`](Self::finish) to consume the terminating control reply.
/// Reads fail with an `aborted` error once ABOR has been issued.
pub struct DataReader {
    body: Option<Body>,
    channel: Option<DataChannel>,
    abort: Arc<AtomicBool>,
    client_stats: (Arc<std::sync::atomic::AtomicU64>, Arc<std::sync::atomic::AtomicU64>),
}

impl DataReader {
    /// Consume the terminating reply and release the data-channel slot
    pub async fn finish(mut self) -> Result<Reply> {
        if let Some(Body::Inflate(reader)) = &self.body {
            self.client_stats
                .0
                .fetch_add(reader.bytes_in(), Ordering::Relaxed);
            self.client_stats
                .1
                .fetch_add(reader.bytes_out(), Ordering::Relaxed);
        }
        // Dropping the body closes the data socket.
        drop(self.body.take());
        match self.channel.take() {
            Some(channel) => channel.finish().await,
            None => Err(FtpError::ConnectionClosed),
        }
    }
}

impl AsyncRead for DataReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.abort.load(Ordering::SeqCst) {
            return Poll::Ready(Err(io::Error::other("aborted")));
        }
        match this.body.as_mut() {
            Some(body) => Pin::new(body).poll_read(cx, buf),
            None => Poll::Ready(Ok(())),
        }
    }
}

impl FtpClient {
    /// Download a remote file as a readable byte stream
    ///
    /// The returned reader yields the file's bytes; call
    /// [`DataReader::finish`] after EOF to observe the terminating reply.
    /// With `use_compression` the transfer runs under MODE Z and is inflated
    /// transparently.
    pub async fn get(&self, path: &str, use_compression: bool) -> Result<DataReader> {
        let mut channel = self
            .open_data(commands::retr(path), use_compression, true)
            .await?;
        let stream = channel.stream.take().ok_or(FtpError::ConnectionClosed)?;
        let body = if use_compression {
            Body::Inflate(InflateReader::new(stream))
        } else {
            Body::Plain(stream)
        };
        debug!("download started: {}", path);
        Ok(DataReader {
            body: Some(body),
            abort: self.data_abort.clone(),
            channel: Some(channel),
            client_stats: (self.bytes_compressed.clone(), self.bytes_decompressed.clone()),
        })
    }

    /// Upload a stream to a remote file (STOR)
    pub async fn put(
        &self,
        path: &str,
        source: impl AsyncRead + Unpin,
        use_compression: bool,
    ) -> Result<()> {
        self.transfer_out(commands::stor(path), source, use_compression)
            .await
    }

    /// Append a stream to a remote file (APPE)
    pub async fn append(
        &self,
        path: &str,
        source: impl AsyncRead + Unpin,
        use_compression: bool,
    ) -> Result<()> {
        self.transfer_out(commands::appe(path), source, use_compression)
            .await
    }

    /// Stage a byte offset sent as REST before the next transfer
    pub fn restart(&self, offset: u64) {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .restart_offset = Some(offset);
    }

    async fn transfer_out(
        &self,
        command: String,
        mut source: impl AsyncRead + Unpin,
        use_compression: bool,
    ) -> Result<()> {
        let mut channel = self.open_data(command, use_compression, true).await?;
        let stream = channel.stream.take().ok_or(FtpError::ConnectionClosed)?;

        let copy_result = if use_compression {
            let mut writer = DeflateWriter::new(stream);
            let result = copy_abortable(&mut source, &mut writer, &self.data_abort).await;
            let result = match result {
                Ok(_) => writer.shutdown().await,
                Err(e) => Err(e),
            };
            self.record_compression(writer.bytes_out(), writer.bytes_in());
            result
        } else {
            let mut stream = stream;
            match copy_abortable(&mut source, &mut stream, &self.data_abort).await {
                Ok(_) => stream.shutdown().await,
                Err(e) => Err(e),
            }
        };

        // The terminating reply decides the outcome even if the local copy
        // failed; an ABOR surfaces as FtpError::Aborted from finish().
        let finish_result = channel.finish().await;
        finish_result?;
        copy_result.map_err(FtpError::Io)?;
        Ok(())
    }
}

/// Chunked copy that fails fast once ABOR has been written
async fn copy_abortable<R, W>(reader: &mut R, writer: &mut W, abort: &AtomicBool) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; COPY_CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        if abort.load(Ordering::SeqCst) {
            return Err(io::Error::other("aborted"));
        }
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(total);
        }
        writer.write_all(&buf[..n]).await?;
        total += n as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_copy_abortable_moves_all_bytes() {
        let data = vec![7u8; 200_000];
        let mut reader = &data[..];
        let mut out = Vec::new();
        let abort = AtomicBool::new(false);

        let n = copy_abortable(&mut reader, &mut out, &abort)
            .await
            .expect("copy");
        assert_eq!(n, data.len() as u64);
        assert_eq!(out, data);
    }

    #[tokio::test]
    async fn test_copy_abortable_observes_abort_flag() {
        let data = vec![7u8; 1024];
        let mut reader = &data[..];
        let mut out = Vec::new();
        let abort = AtomicBool::new(true);

        let err = copy_abortable(&mut reader, &mut out, &abort)
            .await
            .expect_err("abort");
        assert_eq!(err.to_string(), "aborted");
        assert!(out.is_empty());
    }
}
