use crate::socket::error::{Result, SocketError};
use log::{debug, info};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, Notify};

/// One line read from the server.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    EndOfStream,
}

/// Write side and lifecycle of the control-server connection. The read side
/// lives in [`LineReader`], held exclusively by the session's read loop.
pub struct LineSocket {
    writer: Mutex<Option<OwnedWriteHalf>>,
    closed_by_us: AtomicBool,
    close_notify: Notify,
}

impl LineSocket {
    /// Resolves `host` and opens the TCP connection. Resolution failures are
    /// reported separately so the session can show "no signal" for them.
    pub async fn connect(host: &str, port: u16) -> Result<(Arc<Self>, LineReader)> {
        let addr = tokio::net::lookup_host((host, port))
            .await
            .map_err(SocketError::HostUnresolved)?
            .next()
            .ok_or_else(|| {
                SocketError::HostUnresolved(io::Error::new(
                    io::ErrorKind::NotFound,
                    "host resolved to no addresses",
                ))
            })?;

        info!(target: "Session/Socket", "Dialing {addr}");
        let stream = TcpStream::connect(addr).await?;
        let (read_half, write_half) = stream.into_split();

        let socket = Arc::new(Self {
            writer: Mutex::new(Some(write_half)),
            closed_by_us: AtomicBool::new(false),
            close_notify: Notify::new(),
        });
        let reader = LineReader {
            reader: BufReader::new(read_half),
            socket: socket.clone(),
        };
        Ok((socket, reader))
    }

    /// Sends one protocol line. The whole line goes out under a single lock
    /// so concurrent callers can never interleave mid-line.
    pub async fn write_line(&self, line: &str) -> Result<()> {
        debug!(target: "Session/Socket", "--> {line}");
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(SocketError::Closed)?;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        Ok(())
    }

    /// Locally initiated close: the one cancellation primitive. Idempotent.
    /// Marks the close as requested so later I/O errors are classified as
    /// graceful termination, shuts the write half down, and unblocks the
    /// read loop.
    pub async fn close(&self) {
        if self.closed_by_us.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(target: "Session/Socket", "Closing connection");
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        self.close_notify.notify_one();
    }

    pub fn closed_by_us(&self) -> bool {
        self.closed_by_us.load(Ordering::SeqCst)
    }
}

/// Blocking line reader; only the session's dedicated read loop may hold it.
pub struct LineReader {
    reader: BufReader<OwnedReadHalf>,
    socket: Arc<LineSocket>,
}

impl LineReader {
    /// Reads one line, blocking until the server sends one, the stream ends,
    /// or [`LineSocket::close`] is called (surfaced as `EndOfStream`).
    pub async fn read_line(&mut self) -> Result<ReadOutcome> {
        let mut buf = String::new();
        tokio::select! {
            res = self.reader.read_line(&mut buf) => {
                if res? == 0 {
                    debug!(target: "Session/Socket", "<-- (EOF)");
                    return Ok(ReadOutcome::EndOfStream);
                }
                let line = buf.trim_end_matches(['\r', '\n']).to_string();
                debug!(target: "Session/Socket", "<-- {line}");
                Ok(ReadOutcome::Line(line))
            }
            _ = self.socket.close_notify.notified() => {
                debug!(target: "Session/Socket", "<-- (locally closed)");
                Ok(ReadOutcome::EndOfStream)
            }
        }
    }
}
