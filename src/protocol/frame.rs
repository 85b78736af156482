//! Length-prefixed frame codec
//!
//! `encode_frame`/`decode_frame` work on in-memory buffers; `FrameReader` and
//! `write_frame` drive them over any tokio `AsyncRead`/`AsyncWrite`.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{FrameError, Result};

use super::constants::{FRAME_HEADER_SIZE, READ_BUFFER_SIZE};

/// Append one frame (header + payload) to `buf`
pub fn encode_frame(payload: &[u8], buf: &mut BytesMut) {
    buf.reserve(FRAME_HEADER_SIZE + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);
}

/// Split one complete frame off the front of `buf`
///
/// Returns `Ok(None)` if more data is needed. The length is validated against
/// `max_frame_size` as soon as the header is available, before buffering the
/// payload.
pub fn decode_frame(
    buf: &mut BytesMut,
    max_frame_size: usize,
) -> std::result::Result<Option<Bytes>, FrameError> {
    if buf.len() < FRAME_HEADER_SIZE {
        return Ok(None);
    }

    let size = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if size > max_frame_size {
        return Err(FrameError::TooLarge {
            size,
            max: max_frame_size,
        });
    }

    if buf.len() < FRAME_HEADER_SIZE + size {
        buf.reserve(FRAME_HEADER_SIZE + size - buf.len());
        return Ok(None);
    }

    buf.advance(FRAME_HEADER_SIZE);
    Ok(Some(buf.split_to(size).freeze()))
}

/// Write one frame and flush it
///
/// Payloads larger than `u32::MAX` cannot be represented and are rejected.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > u32::MAX as usize {
        return Err(FrameError::TooLarge {
            size: payload.len(),
            max: u32::MAX as usize,
        }
        .into());
    }

    writer.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Buffered frame reader over an async byte stream
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    buf: BytesMut,
    max_frame_size: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Create a reader that rejects frames larger than `max_frame_size`
    pub fn new(inner: R, max_frame_size: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_BUFFER_SIZE),
            max_frame_size,
        }
    }

    /// Read the next frame
    ///
    /// Returns `Ok(None)` on a clean end of stream between frames, and
    /// [`FrameError::Truncated`] if the stream ends inside a frame.
    pub async fn read_frame(&mut self) -> Result<Option<Bytes>> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buf, self.max_frame_size)? {
                return Ok(Some(frame));
            }

            if self.inner.read_buf(&mut self.buf).await? == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(FrameError::Truncated {
                    expected: self.expected_len(),
                    received: self.buf.len(),
                }
                .into());
            }
        }
    }

    /// Total bytes the partial frame in the buffer needs
    fn expected_len(&self) -> usize {
        if self.buf.len() < FRAME_HEADER_SIZE {
            return FRAME_HEADER_SIZE;
        }
        let size = u32::from_be_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]);
        FRAME_HEADER_SIZE + size as usize
    }
}
