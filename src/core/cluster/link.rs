// src/core/cluster/link.rs

//! The per-peer transport: a framed, bidirectional TCP byte stream carrying
//! `wire::Message` packets.

use super::wire::{self, Message, WireError};
use bytes::{Buf, BytesMut};
use std::io;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Initial capacity for a link's read buffer; grows as needed for larger
/// gossip payloads.
const READ_BUF_CAPACITY: usize = 8 * 1024;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("peer closed the connection")]
    Closed,
    #[error("protocol violation: {0}")]
    Protocol(#[from] WireError),
}

/// One TCP connection to (or from) a peer, framed by the bus wire protocol.
///
/// A link is anonymous (its owning node ID unknown) until the first message
/// is read off it, since every packet carries the sender's ID in its header.
pub struct Link {
    stream: TcpStream,
    read_buf: BytesMut,
    pub peer_addr: std::net::SocketAddr,
}

impl Link {
    pub fn new(stream: TcpStream, peer_addr: std::net::SocketAddr) -> Self {
        Self {
            stream,
            read_buf: BytesMut::with_capacity(READ_BUF_CAPACITY),
            peer_addr,
        }
    }

    pub async fn connect(addr: std::net::SocketAddr) -> Result<Self, LinkError> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::new(stream, addr))
    }

    pub async fn send(&mut self, msg: &Message) -> Result<(), LinkError> {
        let encoded = msg.encode();
        self.stream.write_all(&encoded).await?;
        Ok(())
    }

    /// Reads and decodes the next full packet, buffering partial reads
    /// across calls. A single underlying `read` may fill the buffer with
    /// several packets; the leftover bytes are kept for the next call.
    pub async fn recv(&mut self) -> Result<Message, LinkError> {
        loop {
            match Message::decode(&self.read_buf) {
                Ok((msg, consumed)) => {
                    self.read_buf.advance(consumed);
                    return Ok(msg);
                }
                Err(wire::WireError::TooShort(_)) | Err(wire::WireError::Truncated { .. }) => {
                    let mut chunk = [0u8; READ_BUF_CAPACITY];
                    let n = self.stream.read(&mut chunk).await?;
                    if n == 0 {
                        return Err(LinkError::Closed);
                    }
                    self.read_buf.extend_from_slice(&chunk[..n]);
                }
                Err(e) => {
                    // Drop whatever garbage is at the front so a resynced
                    // peer isn't stuck retrying the same bad bytes forever.
                    self.read_buf.clear();
                    return Err(LinkError::Protocol(e));
                }
            }
        }
    }
}
