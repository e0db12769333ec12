//! Per-connection lifecycle.
//!
//! Each accepted socket is owned by exactly one `ConnectionHandler`, which
//! turns read results into one of three events and drives the connection
//! from `Open` to `Closed`:
//!
//! - data: the chunk is answered on the same socket, then the next read is
//!   issued
//! - close: the peer ended the stream
//! - error: a read, write or flush failed
//!
//! Close and error are both terminal. Whichever arrives first wins and the
//! socket is released exactly once; anything after that is ignored.

use crate::protocols::greeting;
use bytes::BytesMut;
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, trace, warn};

/// Current state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Accepted and serving.
    Open,
    /// Terminal. The socket has been released.
    Closed,
}

/// Result of waiting on a connection.
#[derive(Debug)]
pub enum ConnEvent {
    /// One chunk, exactly as a single read delivered it.
    Data(BytesMut),
    /// The peer closed its side of the stream.
    Close,
    /// Transport-level fault.
    Error(io::Error),
}

/// Owns a single client connection from accept to close.
pub struct ConnectionHandler<S> {
    /// Socket, present until the terminal transition releases it.
    stream: Option<S>,
    /// Remote address and port, used to tag log records.
    peer: SocketAddr,
    state: ConnState,
    buffer: BytesMut,
    buffer_size: usize,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Take ownership of a freshly accepted connection.
    pub fn new(stream: S, peer: SocketAddr, buffer_size: usize) -> Self {
        info!(peer = %peer, "new client connection");

        ConnectionHandler {
            stream: Some(stream),
            peer,
            state: ConnState::Open,
            buffer: BytesMut::with_capacity(buffer_size),
            buffer_size,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> ConnState {
        self.state
    }

    /// Serve the connection until it closes or fails.
    pub async fn run(mut self) {
        while self.state == ConnState::Open {
            match self.next_event().await {
                ConnEvent::Data(chunk) => {
                    if let Err(e) = self.on_data(&chunk).await {
                        self.on_error(e).await;
                    }
                }
                ConnEvent::Close => {
                    self.on_close().await;
                }
                ConnEvent::Error(e) => {
                    self.on_error(e).await;
                }
            }
        }
    }

    /// Wait for the next event on the socket.
    ///
    /// Each call performs at most one read; the bytes it returns are handed
    /// out whole and nothing is carried over to the next call.
    pub async fn next_event(&mut self) -> ConnEvent {
        let stream = match self.stream.as_mut() {
            Some(stream) => stream,
            None => return ConnEvent::Close,
        };

        self.buffer.reserve(self.buffer_size);
        match stream.read_buf(&mut self.buffer).await {
            Ok(0) => ConnEvent::Close,
            Ok(_) => ConnEvent::Data(self.buffer.split()),
            Err(e) => ConnEvent::Error(e),
        }
    }

    /// Answer one inbound chunk.
    ///
    /// The reply is fully written and flushed before this returns. Chunks
    /// arriving after the connection closed are dropped.
    pub async fn on_data(&mut self, chunk: &[u8]) -> io::Result<()> {
        if self.state == ConnState::Closed {
            return Ok(());
        }
        let stream = match self.stream.as_mut() {
            Some(stream) => stream,
            None => return Ok(()),
        };

        info!(
            peer = %self.peer,
            data = ?String::from_utf8_lossy(chunk),
            "connection data"
        );

        let response = greeting::reply(chunk);
        stream.write_all(&response).await?;
        stream.flush().await?;

        trace!(peer = %self.peer, bytes = response.len(), "reply written");
        Ok(())
    }

    /// Handle the peer closing the connection.
    ///
    /// Returns `false` if the connection had already reached its terminal
    /// state, in which case nothing is logged or released.
    pub async fn on_close(&mut self) -> bool {
        if self.state == ConnState::Closed {
            return false;
        }

        info!(peer = %self.peer, "connection closed");
        self.finish().await;
        true
    }

    /// Handle a transport fault on the connection.
    ///
    /// Returns `false` if the connection had already reached its terminal
    /// state.
    pub async fn on_error(&mut self, err: io::Error) -> bool {
        if self.state == ConnState::Closed {
            return false;
        }

        warn!(peer = %self.peer, error = %err, "connection error");
        self.finish().await;
        true
    }

    /// Enter `Closed` and release the socket.
    async fn finish(&mut self) {
        self.state = ConnState::Closed;

        if let Some(mut stream) = self.stream.take() {
            // The peer may already be gone; there is nothing left to report.
            if let Err(e) = stream.shutdown().await {
                debug!(peer = %self.peer, error = %e, "shutdown failed");
            }
            trace!(peer = %self.peer, "socket released");
        }
    }
}
