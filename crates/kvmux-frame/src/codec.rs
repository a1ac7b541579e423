use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{FrameError, Result};

/// Longest valid varint encoding of a `u64`.
pub const MAX_VARINT_LEN: usize = 10;

/// Default maximum payload size accepted by readers and writers: 512 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 512 * 1024 * 1024;

/// Default number of bytes requested from the channel per read.
pub const DEFAULT_READ_CHUNK: usize = 64 * 1024;

/// Number of bytes `value` occupies as a varint.
pub fn varint_len(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

/// Append `value` as a little-endian base-128 varint.
pub fn encode_varint(mut value: u64, dst: &mut BytesMut) {
    while value >= 0x80 {
        dst.put_u8((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    dst.put_u8(value as u8);
}

/// Encode a payload into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────────────┬─────────────────┐
/// │ Length (varint)    │ Payload          │
/// │ 1..=10 bytes, LEB  │ (Length bytes)   │
/// └────────────────────┴─────────────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) {
    let len = payload.len() as u64;
    dst.reserve(varint_len(len) + payload.len());
    encode_varint(len, dst);
    dst.put_slice(payload);
}

/// Decode the varint length prefix starting at `offset`.
///
/// Returns `Ok(None)` if the buffer ends before the varint does.
/// On success returns `(payload_len, payload_start)`.
pub fn decode_length(src: &[u8], offset: usize) -> Result<Option<(u64, usize)>> {
    let mut value: u64 = 0;
    for (i, pos) in (offset..src.len()).enumerate() {
        if i == MAX_VARINT_LEN {
            return Err(FrameError::VarintOverflow);
        }
        let byte = src[pos];
        let group = u64::from(byte & 0x7F);
        // The tenth group may only carry the top bit of a u64.
        if i == MAX_VARINT_LEN - 1 && group > 1 {
            return Err(FrameError::VarintOverflow);
        }
        value |= group << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(Some((value, pos + 1)));
        }
    }
    if src.len().saturating_sub(offset) >= MAX_VARINT_LEN {
        return Err(FrameError::VarintOverflow);
    }
    Ok(None)
}

/// Decode one frame starting at `offset`.
///
/// Returns `Ok(None)` if the buffer does not yet contain a complete frame;
/// the caller keeps the bytes from `offset` on and retries after more data
/// arrives. On success returns the payload and the offset just past it.
pub fn decode_frame(src: &[u8], offset: usize) -> Result<Option<(&[u8], usize)>> {
    let Some((len, start)) = decode_length(src, offset)? else {
        return Ok(None);
    };
    let available = (src.len() - start) as u64;
    if available < len {
        return Ok(None);
    }
    let end = start + len as usize;
    Ok(Some((&src[start..end], end)))
}

/// Configuration for frame readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 512 MiB.
    pub max_payload_size: usize,
    /// Bytes requested from the channel per read. Default: 64 KiB.
    pub read_chunk_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_chunk_size: DEFAULT_READ_CHUNK,
        }
    }
}

/// `tokio_util` codec for varint-delimited frames.
///
/// The client core drives its own reader and write coordinator; this codec is
/// for the other end of the channel (peers, tests) so both sides share one
/// implementation of the wire format.
#[derive(Debug, Clone)]
pub struct VarintCodec {
    max_payload_size: usize,
}

impl VarintCodec {
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD)
    }

    pub fn with_max_payload(max_payload_size: usize) -> Self {
        Self { max_payload_size }
    }
}

impl Default for VarintCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for VarintCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        let Some((len, start)) = decode_length(src, 0)? else {
            return Ok(None);
        };
        let len = check_len(len, self.max_payload_size)?;
        if src.len() < start + len {
            src.reserve(start + len - src.len());
            return Ok(None);
        }
        src.advance(start);
        Ok(Some(src.split_to(len).freeze()))
    }
}

impl Encoder<Bytes> for VarintCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        check_len(item.len() as u64, self.max_payload_size)?;
        encode_frame(&item, dst);
        Ok(())
    }
}

pub(crate) fn check_len(len: u64, max: usize) -> Result<usize> {
    match usize::try_from(len) {
        Ok(size) if size <= max => Ok(size),
        Ok(size) => Err(FrameError::PayloadTooLarge { size, max }),
        Err(_) => Err(FrameError::PayloadTooLarge {
            size: usize::MAX,
            max,
        }),
    }
}
