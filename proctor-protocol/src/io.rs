//! Buffered I/O streams for protocol communication.
//!
//! [`WireReader`] and [`WireWriter`] wrap an async transport half and speak
//! the protocol's wire format: integers are big-endian (network order), and
//! the conversion happens inside the primitive readers and writers so
//! callers never handle unconverted values.
//!
//! The reader serves two very different read patterns. Small fixed fields
//! (message types, rectangle headers, lengths) come out of a staging buffer
//! that is topped up from the transport as needed; [`WireReader::available`]
//! reports how much of it is left, which backs the dispatcher's "has
//! buffered data" check. Bulk payloads (pixel rows, compressed data) drain
//! whatever is staged and then land directly in the caller's buffer, so a
//! full-screen update is never copied through the staging buffer.
//!
//! The writer collects a whole client message and hands it to the transport
//! on [`WireWriter::flush`], so every message leaves in one write.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const STAGING_CAPACITY: usize = 8192;

/// Buffered input stream reading protocol data in network byte order.
pub struct WireReader<R> {
    transport: R,
    staged: BytesMut,
}

impl<R: AsyncRead + Unpin> WireReader<R> {
    /// Create an input stream with the default staging capacity.
    pub fn new(transport: R) -> Self {
        Self::with_capacity(transport, STAGING_CAPACITY)
    }

    /// Create an input stream with the given staging capacity.
    pub fn with_capacity(transport: R, capacity: usize) -> Self {
        Self {
            transport,
            staged: BytesMut::with_capacity(capacity),
        }
    }

    /// Top the staging buffer up until it holds at least `wanted` bytes.
    async fn stage(&mut self, wanted: usize) -> std::io::Result<()> {
        while self.staged.len() < wanted {
            if self.transport.read_buf(&mut self.staged).await? == 0 {
                let missing = wanted - self.staged.len();
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!(
                        "stream ended {} bytes short of a {}-byte field",
                        missing, wanted
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Read one fixed-size field through the staging buffer.
    async fn read_field<const N: usize>(&mut self) -> std::io::Result<[u8; N]> {
        self.stage(N).await?;
        let mut field = [0u8; N];
        self.staged.copy_to_slice(&mut field);
        Ok(field)
    }

    /// Read a single byte.
    pub async fn read_u8(&mut self) -> std::io::Result<u8> {
        Ok(self.read_field::<1>().await?[0])
    }

    /// Read a 16-bit unsigned integer (big-endian).
    pub async fn read_u16(&mut self) -> std::io::Result<u16> {
        Ok(u16::from_be_bytes(self.read_field().await?))
    }

    /// Read a 32-bit unsigned integer (big-endian).
    pub async fn read_u32(&mut self) -> std::io::Result<u32> {
        Ok(u32::from_be_bytes(self.read_field().await?))
    }

    /// Read a 32-bit signed integer (big-endian).
    pub async fn read_i32(&mut self) -> std::io::Result<i32> {
        Ok(i32::from_be_bytes(self.read_field().await?))
    }

    /// Read exactly `buf.len()` bytes.
    ///
    /// Staged bytes are drained first; the remainder is read from the
    /// transport straight into `buf`, bypassing the staging buffer.
    pub async fn read_bytes(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        let from_staging = self.staged.len().min(buf.len());
        if from_staging > 0 {
            self.staged.copy_to_slice(&mut buf[..from_staging]);
        }
        if from_staging < buf.len() {
            self.transport.read_exact(&mut buf[from_staging..]).await?;
        }
        Ok(())
    }

    /// Consume and discard `n` bytes (padding and unwanted bodies).
    pub async fn skip(&mut self, n: usize) -> std::io::Result<()> {
        let from_staging = self.staged.len().min(n);
        self.staged.advance(from_staging);

        let mut left = n - from_staging;
        let mut bin = [0u8; 64];
        while left > 0 {
            let chunk = left.min(bin.len());
            self.transport.read_exact(&mut bin[..chunk]).await?;
            left -= chunk;
        }
        Ok(())
    }

    /// Read a compact length value (1-3 bytes).
    ///
    /// Each byte contributes 7 bits, least significant group first; the MSB
    /// of the first two bytes is a continuation flag. The third byte, when
    /// present, contributes all 8 of its bits, for 22 bits total.
    pub async fn read_compact_len(&mut self) -> std::io::Result<u32> {
        let b0 = self.read_u8().await?;
        let mut len = (b0 & 0x7F) as u32;
        if b0 & 0x80 == 0 {
            return Ok(len);
        }

        let b1 = self.read_u8().await?;
        len |= ((b1 & 0x7F) as u32) << 7;
        if b1 & 0x80 == 0 {
            return Ok(len);
        }

        let b2 = self.read_u8().await?;
        len |= (b2 as u32) << 14;
        Ok(len)
    }

    /// Number of staged bytes readable without touching the transport.
    pub fn available(&self) -> usize {
        self.staged.len()
    }

    /// True if at least one byte is staged.
    pub fn has_data(&self) -> bool {
        !self.staged.is_empty()
    }

    /// Get a mutable reference to the underlying transport half.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.transport
    }

    /// Consume the stream and return the underlying transport half.
    pub fn into_inner(self) -> R {
        self.transport
    }
}

/// Buffered output stream writing protocol data in network byte order.
///
/// Nothing reaches the transport until [`flush`](Self::flush).
pub struct WireWriter<W> {
    transport: W,
    pending: Vec<u8>,
}

impl<W: AsyncWrite + Unpin> WireWriter<W> {
    /// Create an output stream.
    pub fn new(transport: W) -> Self {
        Self {
            transport,
            pending: Vec::with_capacity(STAGING_CAPACITY),
        }
    }

    /// Write a single byte.
    pub fn write_u8(&mut self, value: u8) {
        self.pending.push(value);
    }

    /// Write a 16-bit unsigned integer (big-endian).
    pub fn write_u16(&mut self, value: u16) {
        self.pending.extend_from_slice(&value.to_be_bytes());
    }

    /// Write a 32-bit unsigned integer (big-endian).
    pub fn write_u32(&mut self, value: u32) {
        self.pending.extend_from_slice(&value.to_be_bytes());
    }

    /// Write a 32-bit signed integer (big-endian).
    pub fn write_i32(&mut self, value: i32) {
        self.pending.extend_from_slice(&value.to_be_bytes());
    }

    /// Append a byte slice.
    pub fn write_bytes(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
    }

    /// Hand everything pending to the transport and flush it.
    pub async fn flush(&mut self) -> std::io::Result<()> {
        if !self.pending.is_empty() {
            self.transport.write_all(&self.pending).await?;
            self.pending.clear();
        }
        self.transport.flush().await
    }

    /// Number of bytes waiting to be flushed.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// Get a mutable reference to the underlying transport half.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.transport
    }

    /// Consume the stream and return the underlying transport half.
    ///
    /// Anything still pending is lost.
    pub fn into_inner(self) -> W {
        self.transport
    }
}
