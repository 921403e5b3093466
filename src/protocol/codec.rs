//! Framing codec
//!
//! Every frame on the wire is a 4-byte big-endian length followed by exactly
//! that many payload bytes. Control frames carry UTF-8 JSON; data frames carry
//! raw file content and are moved in bounded chunks.

use log::{debug, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::ServerConfig;
use crate::error::TransportError;

pub const LENGTH_PREFIX_SIZE: usize = 4;
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;
pub const DEFAULT_MAX_CONTROL_FRAME_SIZE: usize = 1024 * 1024;

/// Frame reader/writer shared by the server and its tests.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    chunk_size: usize,
    max_control_frame_size: usize,
    read_timeout: Option<Duration>,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_control_frame_size: DEFAULT_MAX_CONTROL_FRAME_SIZE,
            read_timeout: None,
        }
    }
}

impl FrameCodec {
    pub fn new(chunk_size: usize, max_control_frame_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            max_control_frame_size,
            read_timeout: None,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.chunk_size, config.max_control_frame_size)
            .with_read_timeout(config.read_timeout())
    }

    /// Bounds every frame read by `timeout`.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Serializes `message` as JSON and writes it as one control frame.
    pub async fn write_control_frame<W, T>(
        &self,
        sink: &mut W,
        message: &T,
    ) -> Result<(), TransportError>
    where
        W: AsyncWrite + Unpin,
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_vec(message)?;
        let prefix = encode_length(payload.len())?;

        sink.write_all(&prefix).await?;
        sink.write_all(&payload).await?;
        sink.flush().await?;
        Ok(())
    }

    /// Reads one control frame.
    ///
    /// Returns `Ok(None)` when the peer closed the stream cleanly before the
    /// first byte of a new frame.
    pub async fn read_control_frame<R, T>(&self, source: &mut R) -> Result<Option<T>, TransportError>
    where
        R: AsyncRead + Unpin,
        T: DeserializeOwned,
    {
        let Some(length) = self.timed(read_length_prefix(source)).await? else {
            return Ok(None);
        };

        let length = length as usize;
        if length > self.max_control_frame_size {
            return Err(TransportError::FrameTooLarge {
                size: length,
                limit: self.max_control_frame_size,
            });
        }

        let mut payload = vec![0u8; length];
        self.timed(read_exact(source, &mut payload)).await?;

        let message = serde_json::from_slice(&payload)?;
        Ok(Some(message))
    }

    /// Writes `bytes` as one data frame, flushing after every chunk.
    pub async fn write_data_frame<W>(&self, sink: &mut W, bytes: &[u8]) -> Result<(), TransportError>
    where
        W: AsyncWrite + Unpin,
    {
        let prefix = encode_length(bytes.len())?;
        sink.write_all(&prefix).await?;
        sink.flush().await?;

        for chunk in bytes.chunks(self.chunk_size) {
            sink.write_all(chunk).await?;
            sink.flush().await?;
        }

        debug!("Sent data frame of {} bytes", bytes.len());
        Ok(())
    }

    /// Reads one data frame whose size was announced in a preceding control frame.
    ///
    /// A prefix that disagrees with `expected_size` breaks the framing contract
    /// and fails the read.
    pub async fn read_data_frame<R>(
        &self,
        source: &mut R,
        expected_size: u64,
    ) -> Result<Vec<u8>, TransportError>
    where
        R: AsyncRead + Unpin,
    {
        let length = self.read_announced_prefix(source, Some(expected_size)).await?;

        let mut data = vec![0u8; length as usize];
        for chunk in data.chunks_mut(self.chunk_size) {
            self.timed(read_exact(source, chunk)).await?;
        }

        Ok(data)
    }

    /// Consumes one data frame without keeping its content.
    ///
    /// With `expected_size` set the prefix must match it; without, the prefix
    /// alone decides how much is drained. Returns the number of bytes drained.
    pub async fn discard_data_frame<R>(
        &self,
        source: &mut R,
        expected_size: Option<u64>,
    ) -> Result<u64, TransportError>
    where
        R: AsyncRead + Unpin,
    {
        let length = self.read_announced_prefix(source, expected_size).await?;

        let mut scratch = vec![0u8; self.chunk_size.min(length as usize)];
        let mut remaining = length as usize;
        while remaining > 0 {
            let n = remaining.min(scratch.len());
            self.timed(read_exact(source, &mut scratch[..n])).await?;
            remaining -= n;
        }

        debug!("Drained data frame of {} bytes", length);
        Ok(length)
    }

    async fn read_announced_prefix<R>(
        &self,
        source: &mut R,
        expected_size: Option<u64>,
    ) -> Result<u64, TransportError>
    where
        R: AsyncRead + Unpin,
    {
        // A data frame was announced, so end-of-stream here is never clean
        let length = self
            .timed(read_length_prefix(source))
            .await?
            .ok_or(TransportError::UnexpectedEof)? as u64;

        if let Some(expected) = expected_size {
            if expected != length {
                warn!(
                    "Data frame size mismatch: announced {} bytes, prefix says {}",
                    expected, length
                );
                return Err(TransportError::SizeMismatch {
                    expected,
                    actual: length,
                });
            }
        }

        Ok(length)
    }

    async fn timed<F, T>(&self, fut: F) -> Result<T, TransportError>
    where
        F: Future<Output = Result<T, TransportError>>,
    {
        match self.read_timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| TransportError::Timeout)?,
            None => fut.await,
        }
    }
}

fn encode_length(length: usize) -> Result<[u8; LENGTH_PREFIX_SIZE], TransportError> {
    let length = u32::try_from(length).map_err(|_| TransportError::FrameTooLarge {
        size: length,
        limit: u32::MAX as usize,
    })?;
    Ok(length.to_be_bytes())
}

/// Reads the 4-byte prefix; `None` if the stream ended before any of it arrived.
async fn read_length_prefix<R>(source: &mut R) -> Result<Option<u32>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    let mut filled = 0;

    while filled < LENGTH_PREFIX_SIZE {
        let n = source.read(&mut prefix[filled..]).await?;
        if n == 0 {
            return if filled == 0 {
                Ok(None)
            } else {
                Err(TransportError::UnexpectedEof)
            };
        }
        filled += n;
    }

    Ok(Some(u32::from_be_bytes(prefix)))
}

async fn read_exact<R>(source: &mut R, buf: &mut [u8]) -> Result<(), TransportError>
where
    R: AsyncRead + Unpin,
{
    match source.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(TransportError::UnexpectedEof),
        Err(e) => Err(e.into()),
    }
}
