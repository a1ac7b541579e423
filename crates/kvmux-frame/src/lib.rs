//! Varint length-prefixed framing for the kvmux channel.
//!
//! Every message on the wire is a little-endian base-128 varint holding the
//! payload length, followed by exactly that many payload bytes. There is no
//! magic number, checksum, or channel id; a single malformed prefix makes the
//! rest of the stream unreadable.
//!
//! - [`FrameReader`] reassembles frames from arbitrary read chunks.
//! - [`FrameWriter`] coalesces frames from concurrent callers into as few
//!   physical writes as possible, with at most one write in flight.
//! - [`VarintCodec`] is the same format as a `tokio_util` codec for peers.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_frame, decode_length, encode_frame, encode_varint, varint_len, FrameConfig,
    VarintCodec, DEFAULT_MAX_PAYLOAD, DEFAULT_READ_CHUNK, MAX_VARINT_LEN,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
