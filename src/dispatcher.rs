//! Control-channel command dispatcher
//!
//! A single spawned task owns the control socket after login: it is the only
//! writer, keeps at most one command in flight, and routes every parsed
//! reply to the stream of the request that caused it. Queued commands run in
//! FIFO order; promoted requests jump ahead of queued ones but never ahead
//! of the in-flight command. When the queue is idle past the keepalive
//! interval a NOOP is injected whose replies are discarded.

use crate::client::SessionEvent;
use crate::error::{FtpError, Result};
use crate::response::{Reply, ReplyParser};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// A queued command and the stream its replies are delivered on
struct Request {
    command: String,
    tx: mpsc::UnboundedSender<Result<Reply>>,
}

enum Msg {
    Send { request: Request, promote: bool },
    Destroy,
}

/// Handle used by the client façade to reach the dispatcher task
#[derive(Clone)]
pub(crate) struct Dispatcher {
    tx: mpsc::UnboundedSender<Msg>,
}

impl Dispatcher {
    /// Spawn the dispatcher task over a connected control stream
    ///
    /// `parser` carries any bytes left over from the login phase.
    pub(crate) fn spawn<S>(
        stream: S,
        parser: ReplyParser,
        keepalive: Duration,
        events: mpsc::UnboundedSender<SessionEvent>,
        data_active: Arc<AtomicBool>,
        data_abort: Arc<AtomicBool>,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (tx, mailbox) = mpsc::unbounded_channel();
        let actor = Actor {
            parser,
            queue: VecDeque::new(),
            in_flight: None,
            keepalive,
            deadline: None,
            events,
            data_active,
            data_abort,
        };
        tokio::spawn(actor.run(stream, mailbox));
        Self { tx }
    }

    /// Queue a command; returns the lazy stream of its replies
    ///
    /// `promote` inserts at the queue front instead of appending.
    pub(crate) fn send(&self, command: impl Into<String>, promote: bool) -> Result<CommandStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        let request = Request {
            command: command.into(),
            tx,
        };
        self.tx
            .send(Msg::Send { request, promote })
            .map_err(|_| FtpError::ConnectionClosed)?;
        Ok(CommandStream { rx })
    }

    /// Tear the connection down without draining the queue
    pub(crate) fn destroy(&self) {
        let _ = self.tx.send(Msg::Destroy);
    }
}

/// Lazy stream of `(code, text)` replies for one command
///
/// Single-consumer and non-restartable: the stream ends when the command's
/// terminating reply has been delivered.
pub struct CommandStream {
    rx: mpsc::UnboundedReceiver<Result<Reply>>,
}

impl CommandStream {
    /// Next reply, or None once the command completed
    pub async fn next(&mut self) -> Option<Result<Reply>> {
        self.rx.recv().await
    }

    /// Await the terminating reply, skipping any 1xx preliminaries
    pub async fn terminal(mut self) -> Result<Reply> {
        loop {
            match self.rx.recv().await {
                Some(Ok(reply)) if reply.is_preliminary() => continue,
                Some(Ok(reply)) => return Ok(reply),
                Some(Err(e)) => return Err(e),
                None => return Err(FtpError::ConnectionClosed),
            }
        }
    }

    /// Await the next reply, failing if the stream ended
    pub(crate) async fn expect_next(&mut self) -> Result<Reply> {
        match self.rx.recv().await {
            Some(result) => result,
            None => Err(FtpError::ConnectionClosed),
        }
    }
}

struct Actor {
    parser: ReplyParser,
    queue: VecDeque<Request>,
    in_flight: Option<Request>,
    keepalive: Duration,
    deadline: Option<Instant>,
    events: mpsc::UnboundedSender<SessionEvent>,
    data_active: Arc<AtomicBool>,
    data_abort: Arc<AtomicBool>,
}

impl Actor {
    async fn run<S>(mut self, stream: S, mut mailbox: mpsc::UnboundedReceiver<Msg>)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (mut reader, mut writer) = tokio::io::split(stream);
        let mut buf = vec![0u8; READ_CHUNK_SIZE];
        self.arm_keepalive();

        let had_error = loop {
            // The control socket has a single writer: this task, and only
            // when nothing is in flight.
            if self.in_flight.is_none() {
                if let Some(request) = self.queue.pop_front() {
                    trace!("sending command: {}", request.command.trim_end());
                    if request.command.starts_with("ABOR") && self.data_active.load(Ordering::SeqCst)
                    {
                        self.data_abort.store(true, Ordering::SeqCst);
                    }
                    if let Err(e) = writer.write_all(request.command.as_bytes()).await {
                        let _ = request.tx.send(Err(FtpError::Io(e)));
                        break true;
                    }
                    // Cleared on send; rearmed when the reply arrives.
                    self.deadline = None;
                    self.in_flight = Some(request);
                    continue;
                }
            }

            tokio::select! {
                msg = mailbox.recv() => match msg {
                    Some(Msg::Send { request, promote }) => {
                        if promote {
                            self.queue.push_front(request);
                        } else {
                            self.queue.push_back(request);
                        }
                    }
                    Some(Msg::Destroy) | None => {
                        debug!("control channel torn down");
                        break false;
                    }
                },
                read = reader.read(&mut buf) => match read {
                    Ok(0) => {
                        debug!("control channel closed by server");
                        break false;
                    }
                    Ok(n) => {
                        for reply in self.parser.feed(&buf[..n]) {
                            self.handle_reply(reply);
                        }
                    }
                    Err(e) => {
                        warn!("control channel read error: {}", e);
                        let _ = self.events.send(SessionEvent::Error(FtpError::Io(e)));
                        break true;
                    }
                },
                _ = sleep_until_opt(self.deadline), if self.deadline.is_some() => {
                    if self.queue.is_empty() && self.in_flight.is_none() {
                        trace!("keepalive: injecting NOOP");
                        let (tx, _discard) = mpsc::unbounded_channel();
                        self.queue.push_back(Request {
                            command: crate::commands::noop().to_string(),
                            tx,
                        });
                    }
                    self.arm_keepalive();
                }
            }
        };

        self.fail_outstanding();
        let _ = self.events.send(SessionEvent::Close { had_error });
    }

    fn handle_reply(&mut self, reply: Reply) {
        trace!("reply: {} {}", reply.code, reply.text);
        self.arm_keepalive();

        match reply.group() {
            1 => {
                // Preliminary: deliver without advancing the queue.
                if let Some(request) = &self.in_flight {
                    let _ = request.tx.send(Ok(reply));
                } else {
                    debug!("unsolicited preliminary reply {}", reply.code);
                }
            }
            2 | 3 => {
                if let Some(request) = self.in_flight.take() {
                    let _ = request.tx.send(Ok(reply));
                } else {
                    debug!("unsolicited reply {} {}", reply.code, reply.text);
                }
            }
            _ => {
                let error = FtpError::Protocol {
                    code: reply.code,
                    message: reply.text,
                };
                if let Some(request) = self.in_flight.take() {
                    let _ = request.tx.send(Err(error));
                } else {
                    let _ = self.events.send(SessionEvent::Error(error));
                }
            }
        }
    }

    fn arm_keepalive(&mut self) {
        if self.keepalive > Duration::ZERO {
            self.deadline = Some(Instant::now() + self.keepalive);
        }
    }

    /// Every request's callback fires exactly once; tear-down errors the rest
    fn fail_outstanding(&mut self) {
        if let Some(request) = self.in_flight.take() {
            let _ = request.tx.send(Err(FtpError::ConnectionClosed));
        }
        for request in self.queue.drain(..) {
            let _ = request.tx.send(Err(FtpError::ConnectionClosed));
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    struct Harness {
        dispatcher: Dispatcher,
        server: DuplexStream,
        events: mpsc::UnboundedReceiver<SessionEvent>,
    }

    fn spawn_with_keepalive(keepalive: Duration) -> Harness {
        let (client_side, server_side) = tokio::io::duplex(64 * 1024);
        let (event_tx, events) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::spawn(
            client_side,
            ReplyParser::new(),
            keepalive,
            event_tx,
            Arc::new(AtomicBool::new(false)),
            Arc::new(AtomicBool::new(false)),
        );
        Harness {
            dispatcher,
            server: server_side,
            events,
        }
    }

    fn spawn_harness() -> Harness {
        spawn_with_keepalive(Duration::ZERO)
    }

    async fn read_line(server: &mut DuplexStream) -> String {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            server.read_exact(&mut byte).await.expect("server read");
            line.push(byte[0]);
            if byte[0] == b'\n' {
                break;
            }
        }
        String::from_utf8(line).expect("ascii command")
    }

    #[tokio::test]
    async fn test_command_reply_roundtrip() {
        let mut h = spawn_harness();

        let stream = h.dispatcher.send("SYST\r\n", false).expect("send");
        assert_eq!(read_line(&mut h.server).await, "SYST\r\n");

        h.server.write_all(b"215 UNIX Type: L8\r\n").await.unwrap();
        let reply = stream.terminal().await.expect("reply");
        assert_eq!(reply.code, 215);
        assert_eq!(reply.text, "UNIX Type: L8");
    }

    #[tokio::test]
    async fn test_fifo_order_and_single_in_flight() {
        let mut h = spawn_harness();

        let first = h.dispatcher.send("PWD\r\n", false).expect("send");
        let second = h.dispatcher.send("SYST\r\n", false).expect("send");

        assert_eq!(read_line(&mut h.server).await, "PWD\r\n");
        // Nothing else may be written until the first command terminates.
        h.server.write_all(b"257 \"/\"\r\n").await.unwrap();
        assert_eq!(read_line(&mut h.server).await, "SYST\r\n");
        h.server.write_all(b"215 UNIX\r\n").await.unwrap();

        assert_eq!(first.terminal().await.unwrap().code, 257);
        assert_eq!(second.terminal().await.unwrap().code, 215);
    }

    #[tokio::test]
    async fn test_promotion_jumps_queued_but_not_in_flight() {
        let mut h = spawn_harness();

        let a = h.dispatcher.send("CWD a\r\n", false).expect("send");
        // a goes in flight immediately; b and c queue behind it.
        assert_eq!(read_line(&mut h.server).await, "CWD a\r\n");

        let b = h.dispatcher.send("CWD b\r\n", false).expect("send");
        let c = h.dispatcher.send("ABOR\r\n", true).expect("send");
        // Give the mailbox a chance to drain both requests.
        tokio::task::yield_now().await;

        h.server.write_all(b"250 ok\r\n").await.unwrap();
        assert_eq!(read_line(&mut h.server).await, "ABOR\r\n");
        h.server.write_all(b"226 aborted\r\n").await.unwrap();
        assert_eq!(read_line(&mut h.server).await, "CWD b\r\n");
        h.server.write_all(b"250 ok\r\n").await.unwrap();

        assert_eq!(a.terminal().await.unwrap().code, 250);
        assert_eq!(c.terminal().await.unwrap().code, 226);
        assert_eq!(b.terminal().await.unwrap().code, 250);
    }

    #[tokio::test]
    async fn test_preliminary_does_not_advance_queue() {
        let mut h = spawn_harness();

        let mut list = h.dispatcher.send("LIST\r\n", false).expect("send");
        let next = h.dispatcher.send("PWD\r\n", false).expect("send");
        assert_eq!(read_line(&mut h.server).await, "LIST\r\n");

        h.server.write_all(b"150 here it comes\r\n").await.unwrap();
        let preliminary = list.expect_next().await.expect("preliminary");
        assert_eq!(preliminary.code, 150);

        // The 1xx must not release PWD; only the 226 does.
        h.server.write_all(b"226 done\r\n").await.unwrap();
        assert_eq!(list.expect_next().await.unwrap().code, 226);
        assert_eq!(read_line(&mut h.server).await, "PWD\r\n");
        h.server.write_all(b"257 \"/\"\r\n").await.unwrap();
        assert_eq!(next.terminal().await.unwrap().code, 257);
    }

    #[tokio::test]
    async fn test_error_reply_fails_request() {
        let mut h = spawn_harness();

        let stream = h.dispatcher.send("DELE nope\r\n", false).expect("send");
        assert_eq!(read_line(&mut h.server).await, "DELE nope\r\n");
        h.server.write_all(b"550 No such file\r\n").await.unwrap();

        match stream.terminal().await {
            Err(FtpError::Protocol { code, message }) => {
                assert_eq!(code, 550);
                assert_eq!(message, "No such file");
            }
            other => panic!("expected protocol error, got {:?}", other.map(|r| r.code)),
        }
    }

    #[tokio::test]
    async fn test_unsolicited_error_becomes_event() {
        let mut h = spawn_harness();

        h.server.write_all(b"421 going down\r\n").await.unwrap();
        match h.events.recv().await {
            Some(SessionEvent::Error(FtpError::Protocol { code, .. })) => assert_eq!(code, 421),
            other => panic!("expected error event, got {:?}", other.is_some()),
        }
    }

    #[tokio::test]
    async fn test_keepalive_noop_when_idle() {
        let mut h = spawn_with_keepalive(Duration::from_millis(50));

        // No traffic: the dispatcher must volunteer a NOOP.
        assert_eq!(read_line(&mut h.server).await, "NOOP\r\n");
        h.server.write_all(b"200 zzz\r\n").await.unwrap();
        // And keep doing so while idle.
        assert_eq!(read_line(&mut h.server).await, "NOOP\r\n");
    }

    #[tokio::test]
    async fn test_server_eof_fails_outstanding_and_closes() {
        let h = spawn_harness();
        let Harness {
            dispatcher,
            server,
            mut events,
        } = h;

        let stream = dispatcher.send("PWD\r\n", false).expect("send");
        drop(server);

        assert!(matches!(
            stream.terminal().await,
            Err(FtpError::ConnectionClosed) | Err(FtpError::Io(_))
        ));
        assert!(matches!(
            events.recv().await,
            Some(SessionEvent::Close { .. })
        ));
    }

    #[tokio::test]
    async fn test_destroy_tears_down_immediately() {
        let mut h = spawn_harness();

        let stream = h.dispatcher.send("PWD\r\n", false).expect("send");
        assert_eq!(read_line(&mut h.server).await, "PWD\r\n");
        h.dispatcher.destroy();

        assert!(matches!(
            stream.terminal().await,
            Err(FtpError::ConnectionClosed)
        ));
        assert!(matches!(
            h.events.recv().await,
            Some(SessionEvent::Close { had_error: false })
        ));
    }

    #[tokio::test]
    async fn test_abor_marks_data_socket() {
        let (client_side, mut server_side) = tokio::io::duplex(64 * 1024);
        let (event_tx, _events) = mpsc::unbounded_channel();
        let data_active = Arc::new(AtomicBool::new(true));
        let data_abort = Arc::new(AtomicBool::new(false));
        let dispatcher = Dispatcher::spawn(
            client_side,
            ReplyParser::new(),
            Duration::ZERO,
            event_tx,
            data_active,
            data_abort.clone(),
        );

        let stream = dispatcher.send("ABOR\r\n", true).expect("send");
        assert_eq!(read_line(&mut server_side).await, "ABOR\r\n");
        assert!(data_abort.load(Ordering::SeqCst));

        server_side.write_all(b"226 ok\r\n").await.unwrap();
        assert_eq!(stream.terminal().await.unwrap().code, 226);
    }
}
