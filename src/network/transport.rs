//! Byte-stream transport
//!
//! The handshake only needs something it can read from, write to and shut
//! down. TCP is the production transport; tests use in-memory duplex pipes.

use crate::network::error::HandshakeError;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// A bidirectional byte stream the handshake can run over
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

/// Dial a peer, giving up after `timeout`
pub async fn connect(addr: &str, timeout: Duration) -> Result<TcpStream, HandshakeError> {
    log::info!("Connecting to peer: {}", addr);

    let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| HandshakeError::ConnectTimeout(timeout))??;

    stream.set_nodelay(true)?;

    match stream.peer_addr() {
        Ok(peer) => log::info!("Connected to {}", peer),
        Err(e) => log::debug!("Connected, peer address unavailable: {}", e),
    }

    Ok(stream)
}
