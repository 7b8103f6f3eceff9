//! stdio transport for the MCP server.
//!
//! This module implements the stdio transport as specified by MCP:
//!
//! - Messages are UTF-8 encoded JSON-RPC
//! - Messages are delimited by newlines
//! - Messages must not contain embedded newlines
//! - stdin: receives messages from client
//! - stdout: sends messages to client
//! - stderr: may be used for logging (not MCP messages)
//!
//! # Concurrency
//!
//! Lines are read by a single serial loop, but each envelope is dispatched
//! on its own task so a slow tool call does not stall reading. Responses are
//! written under one writer lock, one complete line at a time, and may
//! therefore arrive out of request order.

use std::io;
use std::str::Utf8Error;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::mcp::protocol::JsonRpcResponse;
use crate::mcp::server::McpServer;

/// One line read from the input.
#[derive(Debug)]
pub enum Frame {
    /// A UTF-8 line with its terminator stripped.
    Text(String),
    /// A line that is not valid UTF-8.
    Malformed(Utf8Error),
}

/// A line-delimited MCP transport over any async reader/writer pair.
pub struct StdioTransport<R, W> {
    /// Buffered input.
    reader: R,
    /// Output shared by dispatch tasks.
    writer: Arc<Mutex<W>>,
}

impl StdioTransport<BufReader<tokio::io::Stdin>, tokio::io::Stdout> {
    /// Creates a transport over the process's stdin and stdout.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> StdioTransport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Creates a transport over the given streams.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    /// Shared handle to the output stream.
    #[must_use]
    pub fn writer(&self) -> Arc<Mutex<W>> {
        Arc::clone(&self.writer)
    }

    /// Reads the next message line.
    ///
    /// Returns `None` if the input is closed (EOF). A line that is not valid
    /// UTF-8 is returned as [`Frame::Malformed`] so the caller can keep
    /// reading.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails.
    pub async fn read_line(&mut self) -> io::Result<Option<Frame>> {
        let mut buf = Vec::new();
        let bytes_read = self.reader.read_until(b'\n', &mut buf).await?;

        if bytes_read == 0 {
            return Ok(None);
        }

        if buf.ends_with(b"\n") {
            buf.pop();
            if buf.ends_with(b"\r") {
                buf.pop();
            }
        }

        Ok(Some(match String::from_utf8(buf) {
            Ok(line) => Frame::Text(line),
            Err(e) => Frame::Malformed(e.utf8_error()),
        }))
    }

    /// Reads and dispatches envelopes until EOF or `shutdown` fires.
    ///
    /// In-flight dispatches are drained before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails. Write failures are logged and do
    /// not stop the loop.
    pub async fn run(&mut self, server: Arc<McpServer>, shutdown: CancellationToken) -> io::Result<()> {
        let mut in_flight = JoinSet::new();

        let result = loop {
            let line = tokio::select! {
                () = shutdown.cancelled() => {
                    info!("Shutdown requested, stopping stdio transport");
                    break Ok(());
                }
                line = self.read_line() => line,
            };

            let line = match line {
                Ok(Some(Frame::Text(line))) => line,
                Ok(Some(Frame::Malformed(e))) => {
                    debug!(error = %e, "Line is not valid UTF-8");
                    let response = JsonRpcResponse::parse_error();
                    if let Err(e) = write_response(&self.writer, &response).await {
                        warn!(error = %e, "Failed to write response");
                    }
                    continue;
                }
                Ok(None) => {
                    debug!("stdin closed");
                    break Ok(());
                }
                Err(e) => break Err(e),
            };

            if line.trim().is_empty() {
                continue;
            }

            let server = Arc::clone(&server);
            let writer = Arc::clone(&self.writer);
            in_flight.spawn(async move {
                if let Some(response) = server.handle_message(&line).await {
                    if let Err(e) = write_response(&writer, &response).await {
                        warn!(error = %e, "Failed to write response");
                    }
                }
            });

            while let Some(finished) = in_flight.try_join_next() {
                log_join_failure(finished);
            }
        };

        while let Some(finished) = in_flight.join_next().await {
            log_join_failure(finished);
        }

        result
    }
}

impl Default for StdioTransport<BufReader<tokio::io::Stdin>, tokio::io::Stdout> {
    fn default() -> Self {
        Self::stdio()
    }
}

fn log_join_failure(finished: Result<(), tokio::task::JoinError>) {
    if let Err(e) = finished {
        warn!(error = %e, "Dispatch task failed");
    }
}

/// Writes a response as one newline-terminated line under the writer lock.
async fn write_response<W>(writer: &Mutex<W>, response: &JsonRpcResponse) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let json = serde_json::to_string(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    // MCP spec: messages must not contain embedded newlines
    debug_assert!(
        !json.contains('\n'),
        "JSON message must not contain embedded newlines"
    );

    let mut writer = writer.lock().await;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}
