//! Newline-framed TCP transport built on Tokio.
//!
//! Each [`LineConnection`] owns two background tasks once it is fully
//! running:
//!
//! ```text
//!   send(line) ──► unbounded queue ──► writer task ──► OwnedWriteHalf
//!   OwnedReadHalf ──► reader task (receive_loop) ──► on_line / on_closed
//! ```
//!
//! The reader task is the only reader of the socket. Both tasks watch a
//! shared "closed" slot; whichever side notices the end of the connection
//! first (peer EOF, I/O error, local `close()`) writes its reason there and
//! the other side follows.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::{ConnectionId, TransportError};

/// Why a connection stopped delivering lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer closed its end of the stream (end of stream on read).
    PeerClosed,
    /// Reading from the socket failed.
    ReadFailed(String),
    /// Writing to the socket failed.
    WriteFailed(String),
    /// [`LineConnection::close`] was called locally.
    LocalClose,
}

// ---------------------------------------------------------------------------
// LineListener
// ---------------------------------------------------------------------------

/// Listens for incoming peers (the host side of a match).
pub struct LineListener {
    listener: TcpListener,
}

impl LineListener {
    /// Binds a listener to the given address. Use port `0` to let the OS
    /// pick one, then read it back with [`local_addr`](Self::local_addr).
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::BindFailed)?;
        tracing::info!(addr, "line transport listening");
        Ok(Self { listener })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener.local_addr().map_err(TransportError::BindFailed)
    }

    /// Waits for the next peer and wraps it into a [`LineConnection`].
    pub async fn accept(&self) -> Result<LineConnection, TransportError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        let conn = LineConnection::from_stream(stream);
        tracing::debug!(conn_id = %conn.id(), %addr, "accepted line connection");
        Ok(conn)
    }
}

// ---------------------------------------------------------------------------
// LineConnection
// ---------------------------------------------------------------------------

/// State shared between the connection handle and its background tasks.
struct Shared {
    id: ConnectionId,
    open: AtomicBool,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    closed_tx: watch::Sender<Option<CloseReason>>,
}

impl Shared {
    /// Marks the connection closed and records `reason` unless another
    /// reason got there first. Returns the reason that won.
    fn shut(&self, reason: CloseReason) -> CloseReason {
        self.open.store(false, Ordering::Release);
        // Dropping the sender lets the writer drain what is queued, then
        // shut down the write half.
        self.outbound.lock().take();
        self.closed_tx.send_if_modified(|slot| {
            if slot.is_none() {
                *slot = Some(reason.clone());
                true
            } else {
                false
            }
        });
        self.closed_tx.borrow().clone().unwrap_or(reason)
    }
}

/// One TCP socket speaking newline-delimited UTF-8.
///
/// Dropping the handle closes the connection.
pub struct LineConnection {
    shared: Arc<Shared>,
    reader: Mutex<Option<OwnedReadHalf>>,
    peer_addr: Option<SocketAddr>,
}

impl LineConnection {
    /// Opens a connection to `addr` (the joining side of a match).
    pub async fn connect(addr: &str) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(TransportError::ConnectFailed)?;
        let conn = Self::from_stream(stream);
        tracing::debug!(conn_id = %conn.id(), addr, "connected line connection");
        Ok(conn)
    }

    /// Wraps an already-connected stream. Must run inside a Tokio runtime:
    /// the writer task is spawned immediately.
    pub fn from_stream(stream: TcpStream) -> Self {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "could not disable Nagle");
        }
        let peer_addr = stream.peer_addr().ok();
        let (read_half, write_half) = stream.into_split();
        let (tx, rx) = mpsc::unbounded_channel();
        let (closed_tx, _) = watch::channel(None);

        let shared = Arc::new(Shared {
            id: ConnectionId::next(),
            open: AtomicBool::new(true),
            outbound: Mutex::new(Some(tx)),
            closed_tx,
        });

        tokio::spawn(write_loop(write_half, rx, Arc::clone(&shared)));

        Self {
            shared,
            reader: Mutex::new(Some(read_half)),
            peer_addr,
        }
    }

    /// Returns the unique identifier for this connection.
    pub fn id(&self) -> ConnectionId {
        self.shared.id
    }

    /// The remote address, if the OS reported one.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Whether the connection still accepts lines.
    pub fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::Acquire)
    }

    /// The reason the connection closed, or `None` while it is open.
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.shared.closed_tx.borrow().clone()
    }

    /// Queues one line for sending. The newline terminator is added here.
    ///
    /// Never blocks and never fails: on a closed connection, or for a line
    /// that would break framing, the line is logged and dropped.
    pub fn send(&self, line: &str) {
        if line.contains('\n') {
            tracing::warn!(conn_id = %self.shared.id, "refusing to send line with embedded newline");
            return;
        }
        if !self.is_open() {
            tracing::debug!(conn_id = %self.shared.id, "send on closed connection ignored");
            return;
        }
        let outbound = self.shared.outbound.lock();
        match outbound.as_ref() {
            Some(tx) if tx.send(line.to_owned()).is_ok() => {}
            _ => {
                tracing::debug!(conn_id = %self.shared.id, "writer gone, line dropped");
            }
        }
    }

    /// Starts the background read loop.
    ///
    /// `on_line` runs on the reader task for every received line (without
    /// its terminator). `on_closed` runs exactly once, after the last
    /// `on_line`, when the loop ends for any reason.
    ///
    /// # Errors
    /// - [`TransportError::AlreadyReceiving`] if a loop was already started.
    /// - [`TransportError::ConnectionClosed`] if the connection was closed
    ///   before the loop could start.
    pub fn receive_loop<L, C>(
        &self,
        mut on_line: L,
        on_closed: C,
    ) -> Result<JoinHandle<()>, TransportError>
    where
        L: FnMut(String) + Send + 'static,
        C: FnOnce(CloseReason) + Send + 'static,
    {
        let Some(read_half) = self.reader.lock().take() else {
            return Err(match self.close_reason() {
                Some(reason) => {
                    TransportError::ConnectionClosed(format!("{reason:?}"))
                }
                None => TransportError::AlreadyReceiving(self.shared.id),
            });
        };

        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            let conn_id = shared.id;
            let mut closed_rx = shared.closed_tx.subscribe();
            let mut reader = BufReader::new(read_half);
            let mut buf = Vec::new();

            let reason = loop {
                tokio::select! {
                    biased;
                    closed = closed_rx.wait_for(Option::is_some) => {
                        let reason = closed.ok().and_then(|slot| slot.clone());
                        break reason.unwrap_or(CloseReason::LocalClose);
                    }
                    read = reader.read_until(b'\n', &mut buf) => match read {
                        Ok(0) => break CloseReason::PeerClosed,
                        Ok(_) => match take_line(&mut buf) {
                            Ok(line) => on_line(line),
                            Err(e) => {
                                tracing::warn!(%conn_id, error = %e, "dropping line that is not UTF-8");
                            }
                        },
                        Err(e) => break CloseReason::ReadFailed(e.to_string()),
                    },
                }
            };

            let reason = shared.shut(reason);
            tracing::debug!(%conn_id, ?reason, "receive loop finished");
            on_closed(reason);
        });

        Ok(handle)
    }

    /// Closes the connection. Safe to call any number of times.
    pub fn close(&self) {
        let was_open = self.shared.open.load(Ordering::Acquire);
        self.shared.shut(CloseReason::LocalClose);
        // A read half that never got a loop is dropped here.
        self.reader.lock().take();
        if was_open {
            tracing::debug!(conn_id = %self.shared.id, "connection closed locally");
        }
    }
}

impl Drop for LineConnection {
    fn drop(&mut self) {
        self.close();
    }
}

/// Empties `buf` into a line without its `\n` or `\r\n` terminator.
fn take_line(buf: &mut Vec<u8>) -> Result<String, std::string::FromUtf8Error> {
    let mut bytes = std::mem::take(buf);
    if bytes.last() == Some(&b'\n') {
        bytes.pop();
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
    }
    String::from_utf8(bytes)
}

/// Drains the outbound queue into the socket until the queue closes or a
/// write fails.
async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<String>,
    shared: Arc<Shared>,
) {
    while let Some(line) = rx.recv().await {
        let mut frame = line.into_bytes();
        frame.push(b'\n');
        if let Err(e) = writer.write_all(&frame).await {
            tracing::debug!(conn_id = %shared.id, error = %e, "write failed");
            shared.shut(CloseReason::WriteFailed(e.to_string()));
            return;
        }
    }
    let _ = writer.shutdown().await;
}
