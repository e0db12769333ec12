//! TCP server for handling greeting connections.
//!
//! Binds the listening socket and accepts connections, handing each one to
//! its own `ConnectionHandler` task so that no client ever waits on another.

use crate::config::Config;
use crate::connection::ConnectionHandler;
use crate::error::ServerError;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Server instance
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    buffer_size: usize,
}

impl Server {
    /// Bind the listening socket.
    ///
    /// Failing to bind is fatal: the caller must not go on serving.
    pub async fn bind(config: &Config) -> Result<Self, ServerError> {
        let address = config.listen_addr();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| ServerError::Bind { address, source })?;
        let local_addr = listener.local_addr().map_err(ServerError::LocalAddr)?;

        info!(address = %local_addr, "server listening");

        Ok(Server {
            listener,
            local_addr,
            buffer_size: config.buffer_size,
        })
    }

    /// Address the server is actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections forever.
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let handler = ConnectionHandler::new(stream, peer, self.buffer_size);
                    tokio::spawn(handler.run());
                }
                Err(e) => {
                    // Per-connection accept failures (e.g. EMFILE) leave the
                    // listening socket usable.
                    error!(error = %e, "failed to accept connection");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::time::timeout;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn test_config() -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..Config::default()
        }
    }

    async fn start_server() -> SocketAddr {
        let server = Server::bind(&test_config()).await.unwrap();
        let addr = server.local_addr();
        tokio::spawn(server.run());
        addr
    }

    async fn read_exact(stream: &mut TcpStream, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        timeout(TIMEOUT, stream.read_exact(&mut buf))
            .await
            .expect("timed out waiting for reply")
            .unwrap();
        buf
    }

    #[tokio::test]
    async fn test_bind_assigns_port() {
        let server = Server::bind(&test_config()).await.unwrap();
        assert_ne!(server.local_addr().port(), 0);
        assert!(server.local_addr().ip().is_loopback());
    }

    #[tokio::test]
    async fn test_hello_world() {
        let addr = start_server().await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"world\n").await.unwrap();

        assert_eq!(read_exact(&mut client, 12).await, b"Hello world\n");
    }

    #[tokio::test]
    async fn test_silent_client_gets_no_reply() {
        let addr = start_server().await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.shutdown().await.unwrap();

        let mut received = Vec::new();
        timeout(TIMEOUT, client.read_to_end(&mut received))
            .await
            .expect("server did not close the connection")
            .unwrap();
        assert!(received.is_empty());
    }

    #[tokio::test]
    async fn test_clients_are_isolated() {
        let addr = start_server().await;

        let mut a = TcpStream::connect(addr).await.unwrap();
        let mut b = TcpStream::connect(addr).await.unwrap();

        b.write_all(b"B").await.unwrap();
        a.write_all(b"A").await.unwrap();

        assert_eq!(read_exact(&mut a, 7).await, b"Hello A");
        assert_eq!(read_exact(&mut b, 7).await, b"Hello B");
    }

    #[tokio::test]
    async fn test_idle_connection_does_not_block_accept() {
        let addr = start_server().await;

        let _idle = TcpStream::connect(addr).await.unwrap();

        let mut active = TcpStream::connect(addr).await.unwrap();
        active.write_all(b"there\n").await.unwrap();
        assert_eq!(read_exact(&mut active, 12).await, b"Hello there\n");
    }

    #[tokio::test]
    async fn test_pipelined_chunks_keep_order() {
        let addr = start_server().await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"foo").await.unwrap();
        client.write_all(b"bar").await.unwrap();
        client.shutdown().await.unwrap();

        let mut received = Vec::new();
        timeout(TIMEOUT, client.read_to_end(&mut received))
            .await
            .expect("timed out waiting for replies")
            .unwrap();

        // TCP may coalesce the two writes into one segment; either way the
        // replies come back in send order.
        let received = String::from_utf8(received).unwrap();
        assert!(
            received == "Hello fooHello bar" || received == "Hello foobar",
            "unexpected reply: {received:?}"
        );
    }

    #[tokio::test]
    async fn test_peer_reset_does_not_affect_others() {
        let addr = start_server().await;

        let mut survivor = TcpStream::connect(addr).await.unwrap();

        let doomed = TcpStream::connect(addr).await.unwrap();
        doomed.set_linger(Some(Duration::ZERO)).unwrap();
        drop(doomed);

        survivor.write_all(b"still here\n").await.unwrap();
        assert_eq!(read_exact(&mut survivor, 17).await, b"Hello still here\n");

        // The listener keeps accepting after the reset.
        let mut late = TcpStream::connect(addr).await.unwrap();
        late.write_all(b"late\n").await.unwrap();
        assert_eq!(read_exact(&mut late, 11).await, b"Hello late\n");
    }

    #[tokio::test]
    async fn test_second_bind_fails() {
        let first = Server::bind(&test_config()).await.unwrap();

        let config = Config {
            port: first.local_addr().port(),
            ..test_config()
        };

        match Server::bind(&config).await {
            Err(ServerError::Bind { address, source }) => {
                assert_eq!(address, config.listen_addr());
                assert_eq!(source.kind(), std::io::ErrorKind::AddrInUse);
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("second bind on the same port succeeded"),
        }
    }
}
