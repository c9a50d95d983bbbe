//! Stream plumbing: optionally-TLS sockets and MODE Z transforms
//!
//! MODE Z (draft-preston-ftpext-deflate) compresses the data channel with
//! zlib-wrapped deflate. The transforms here are incremental so transfers
//! stream instead of buffering whole files.

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

/// Deflate level used for MODE Z uploads (draft-preston-ftpext-deflate-04 §5)
pub const MODE_Z_LEVEL: u32 = 8;

const SCRATCH_SIZE: usize = 8 * 1024;

/// A socket that is either plain TCP or TLS-wrapped
pub enum MaybeTlsStream {
    /// Plain TCP stream
    Plain(TcpStream),
    /// TLS stream (boxed; the handshake state is large)
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for MaybeTlsStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MaybeTlsStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_flush(cx),
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Incremental zlib decompressor over any AsyncRead
///
/// Reads compressed bytes from the inner stream on demand and yields
/// decompressed bytes, so downstream backpressure reaches the socket.
pub struct InflateReader<R> {
    inner: R,
    decompress: Decompress,
    in_buf: Box<[u8]>,
    pos: usize,
    len: usize,
    eof: bool,
    done: bool,
}

impl<R> InflateReader<R> {
    /// Wrap a compressed stream
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            decompress: Decompress::new(true),
            in_buf: vec![0u8; SCRATCH_SIZE].into_boxed_slice(),
            pos: 0,
            len: 0,
            eof: false,
            done: false,
        }
    }

    /// Compressed bytes consumed so far
    pub fn bytes_in(&self) -> u64 {
        self.decompress.total_in()
    }

    /// Decompressed bytes produced so far
    pub fn bytes_out(&self) -> u64 {
        self.decompress.total_out()
    }

    /// Give back the inner stream
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for InflateReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            if this.done {
                return Poll::Ready(Ok(()));
            }

            if this.pos == this.len && !this.eof {
                let mut rb = ReadBuf::new(&mut this.in_buf);
                match Pin::new(&mut this.inner).poll_read(cx, &mut rb) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                    Poll::Ready(Ok(())) => {
                        let n = rb.filled().len();
                        if n == 0 {
                            this.eof = true;
                        } else {
                            this.pos = 0;
                            this.len = n;
                        }
                    }
                }
            }

            let out = buf.initialize_unfilled();
            if out.is_empty() {
                return Poll::Ready(Ok(()));
            }

            let input = &this.in_buf[this.pos..this.len];
            let flush = if this.eof {
                FlushDecompress::Finish
            } else {
                FlushDecompress::None
            };
            let before_in = this.decompress.total_in();
            let before_out = this.decompress.total_out();
            let status = this
                .decompress
                .decompress(input, out, flush)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            this.pos += (this.decompress.total_in() - before_in) as usize;
            let produced = (this.decompress.total_out() - before_out) as usize;
            buf.advance(produced);

            if status == Status::StreamEnd {
                this.done = true;
            }
            if produced > 0 || this.done {
                return Poll::Ready(Ok(()));
            }
            if this.eof {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "truncated deflate stream",
                )));
            }
            if status == Status::BufError && this.pos < this.len {
                // No progress with both input and output available.
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "deflate stream stalled",
                )));
            }
        }
    }
}

/// Incremental zlib compressor over any AsyncWrite
///
/// `poll_shutdown` finishes the deflate stream before shutting the inner
/// writer down, so the server sees a complete zlib frame.
pub struct DeflateWriter<W> {
    inner: W,
    compress: Compress,
    out_buf: Vec<u8>,
    out_pos: usize,
    // A sync marker is emitted on every Z_SYNC_FLUSH call, so flushes must
    // pump the compressor exactly once until new input arrives.
    sync_queued: bool,
    finished: bool,
}

impl<W> DeflateWriter<W> {
    /// Wrap a writer, compressing at [`MODE_Z_LEVEL`]
    pub fn new(inner: W) -> Self {
        Self::with_level(inner, MODE_Z_LEVEL)
    }

    /// Wrap a writer with an explicit deflate level
    pub fn with_level(inner: W, level: u32) -> Self {
        Self {
            inner,
            compress: Compress::new(Compression::new(level), true),
            out_buf: Vec::with_capacity(SCRATCH_SIZE),
            out_pos: 0,
            sync_queued: false,
            finished: false,
        }
    }

    /// Uncompressed bytes accepted so far
    pub fn bytes_in(&self) -> u64 {
        self.compress.total_in()
    }

    /// Compressed bytes produced so far
    pub fn bytes_out(&self) -> u64 {
        self.compress.total_out()
    }

    /// Run the compressor with empty input, appending output to out_buf
    fn pump(&mut self, flush: FlushCompress) -> io::Result<Status> {
        let mut scratch = [0u8; SCRATCH_SIZE];
        let before_out = self.compress.total_out();
        let status = self
            .compress
            .compress(&[], &mut scratch, flush)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let produced = (self.compress.total_out() - before_out) as usize;
        self.out_buf.extend_from_slice(&scratch[..produced]);
        Ok(status)
    }
}

impl<W: AsyncWrite + Unpin> DeflateWriter<W> {
    /// Write buffered compressed output to the inner writer
    fn poll_drain(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        while self.out_pos < self.out_buf.len() {
            let n = std::task::ready!(
                Pin::new(&mut self.inner).poll_write(cx, &self.out_buf[self.out_pos..])
            )?;
            if n == 0 {
                return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
            }
            self.out_pos += n;
        }
        self.out_buf.clear();
        self.out_pos = 0;
        Poll::Ready(Ok(()))
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for DeflateWriter<W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        std::task::ready!(this.poll_drain(cx))?;
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }

        let mut scratch = [0u8; SCRATCH_SIZE];
        let mut consumed_total = 0;
        while consumed_total < buf.len() {
            let before_in = this.compress.total_in();
            let before_out = this.compress.total_out();
            this.compress
                .compress(&buf[consumed_total..], &mut scratch, FlushCompress::None)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            let consumed = (this.compress.total_in() - before_in) as usize;
            let produced = (this.compress.total_out() - before_out) as usize;
            this.out_buf.extend_from_slice(&scratch[..produced]);
            if consumed == 0 && produced == 0 {
                // Input must never be dropped on a stalled compressor.
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "deflate stream stalled",
                )));
            }
            consumed_total += consumed;
        }
        this.sync_queued = false;
        // Compressed output is drained lazily on the next write/flush.
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if !this.finished && !this.sync_queued {
            this.pump(FlushCompress::Sync)?;
            this.sync_queued = true;
        }
        std::task::ready!(this.poll_drain(cx))?;
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        while !this.finished {
            std::task::ready!(this.poll_drain(cx))?;
            let status = this.pump(FlushCompress::Finish)?;
            if status == Status::StreamEnd {
                this.finished = true;
            }
        }
        std::task::ready!(this.poll_drain(cx))?;
        Pin::new(&mut this.inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::ZlibDecoder;
    use flate2::write::ZlibEncoder;
    use std::io::{Read, Write};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn compress_zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(MODE_Z_LEVEL));
        encoder.write_all(data).expect("encoder write");
        encoder.finish().expect("encoder finish")
    }

    #[tokio::test]
    async fn test_inflate_reader_roundtrip() {
        let original = b"226 Transfer complete\r\n".repeat(500);
        let compressed = compress_zlib(&original);

        let mut reader = InflateReader::new(&compressed[..]);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.expect("inflate");
        assert_eq!(out, original);
        assert_eq!(reader.bytes_in(), compressed.len() as u64);
        assert_eq!(reader.bytes_out(), original.len() as u64);
    }

    #[tokio::test]
    async fn test_inflate_reader_empty_payload() {
        let compressed = compress_zlib(b"");
        let mut reader = InflateReader::new(&compressed[..]);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.expect("inflate");
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_inflate_reader_truncated_stream() {
        let mut compressed = compress_zlib(b"payload that will be cut short");
        compressed.truncate(4);

        let mut reader = InflateReader::new(&compressed[..]);
        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).await.expect_err("truncated");
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_inflate_reader_garbage_input() {
        let garbage = b"this is not zlib data at all";
        let mut reader = InflateReader::new(&garbage[..]);
        let mut out = Vec::new();
        assert!(reader.read_to_end(&mut out).await.is_err());
    }

    #[tokio::test]
    async fn test_deflate_writer_roundtrip() {
        let original: Vec<u8> = (0u8..=255).cycle().take(100_000).collect();

        let mut writer = DeflateWriter::new(Vec::new());
        writer.write_all(&original).await.expect("write");
        writer.shutdown().await.expect("shutdown");
        assert_eq!(writer.bytes_in(), original.len() as u64);

        let compressed = writer.inner;
        let mut decoder = ZlibDecoder::new(&compressed[..]);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).expect("decode");
        assert_eq!(out, original);
    }

    #[tokio::test]
    async fn test_deflate_writer_flush_midstream() {
        let mut writer = DeflateWriter::new(Vec::new());
        writer.write_all(b"first half").await.expect("write");
        writer.flush().await.expect("flush");
        let after_first = writer.inner.len();
        assert!(after_first > 0, "sync flush should emit a complete block");

        writer.write_all(b" second half").await.expect("write");
        writer.shutdown().await.expect("shutdown");

        let mut decoder = ZlibDecoder::new(&writer.inner[..]);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).expect("decode");
        assert_eq!(out, b"first half second half");
    }

    #[tokio::test]
    async fn test_deflate_inflate_pipeline() {
        // What the broker does for a compressed STOR followed by a RETR.
        let original = b"listing line\r\n".repeat(1000);

        let mut writer = DeflateWriter::new(Vec::new());
        writer.write_all(&original).await.expect("write");
        writer.shutdown().await.expect("shutdown");

        let mut reader = InflateReader::new(&writer.inner[..]);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.expect("read");
        assert_eq!(out, original);
    }
}
