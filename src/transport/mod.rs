//! Byte-stream transport for framed messages
//!
//! This module moves complete messages over an async byte stream:
//! - Outbound messages are fully framed before the first write
//! - Inbound messages are read by their length prefix and fully buffered
//!   before anyone parses them
//! - I/O failures are passed through unmodified; nothing is retried

use async_trait::async_trait;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, trace};

use crate::config::TransportConfig;
use crate::error::{ProtocolError, Result, WireError};
use crate::wire::{Framed, HEADER_LEN, Sent, WireMessage};

/// Moves framed messages to and from a peer
#[async_trait]
pub trait Transport: Send {
    /// Write every byte of `message`
    ///
    /// # Returns
    /// * `Result<WireMessage<Sent>>` - The message, now in the sent state
    async fn send(&mut self, message: WireMessage<Framed>) -> Result<WireMessage<Sent>>;

    /// Read one complete inbound message, header included
    async fn receive(&mut self) -> Result<Vec<u8>>;
}

/// [`Transport`] over any tokio byte stream
pub struct StreamTransport<S> {
    stream: S,
    io_timeout: Option<Duration>,
    max_message_size: usize,
}

/// TCP connection to a server
pub type TcpTransport = StreamTransport<TcpStream>;

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap a connected stream
    ///
    /// # Arguments
    /// * `stream` - Connected byte stream
    /// * `max_message_size` - Largest accepted inbound message
    pub fn new(stream: S, max_message_size: usize) -> Self {
        Self {
            stream,
            io_timeout: None,
            max_message_size,
        }
    }

    /// Bound every read and write; a zero duration means no deadline
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl TcpTransport {
    /// Connect using the transport configuration
    ///
    /// # Arguments
    /// * `config` - Address, timeouts and frame limit
    ///
    /// # Returns
    /// * `Result<Self>` - Connected transport, `Timeout` or `Io` on failure
    pub async fn connect(config: &TransportConfig) -> Result<Self> {
        let address = config.address();
        debug!(%address, "connecting");

        let stream = with_deadline(Some(config.connect_timeout()), "connect", TcpStream::connect(&address)).await?;
        stream.set_nodelay(true)?;

        info!(%address, "connected");
        Ok(Self::new(stream, config.max_message_size).with_io_timeout(config.io_timeout()))
    }
}

#[async_trait]
impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, message: WireMessage<Framed>) -> Result<WireMessage<Sent>> {
        let stream = &mut self.stream;
        with_deadline(self.io_timeout, "write", async {
            stream.write_all(message.as_bytes()).await?;
            stream.flush().await
        })
        .await?;

        debug!(
            op = %message.op_code(),
            request_id = message.request_id(),
            bytes = message.len(),
            "sent message"
        );
        Ok(message.mark_sent())
    }

    async fn receive(&mut self) -> Result<Vec<u8>> {
        let mut prefix = [0u8; 4];
        let stream = &mut self.stream;
        with_deadline(self.io_timeout, "read", stream.read_exact(&mut prefix)).await?;

        let declared = i32::from_le_bytes(prefix);
        let length = usize::try_from(declared).unwrap_or(0);
        if length < HEADER_LEN || length > self.max_message_size {
            return Err(ProtocolError::Framing(format!(
                "inbound message length {declared} outside {HEADER_LEN}..={}",
                self.max_message_size
            ))
            .into());
        }

        let mut buf = vec![0u8; length];
        buf[..4].copy_from_slice(&prefix);
        let stream = &mut self.stream;
        with_deadline(self.io_timeout, "read", stream.read_exact(&mut buf[4..])).await?;

        trace!(bytes = length, "received message");
        Ok(buf)
    }
}

async fn with_deadline<F, T>(deadline: Option<Duration>, what: &str, operation: F) -> Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match deadline {
        Some(limit) => match tokio::time::timeout(limit, operation).await {
            Ok(result) => result.map_err(WireError::from),
            Err(_) => Err(WireError::Timeout(format!("{what} timed out after {limit:?}"))),
        },
        None => operation.await.map_err(WireError::from),
    }
}
