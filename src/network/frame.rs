//! Message framing
//!
//! Every message is a 24-byte header followed by the payload:
//!
//! ```text
//! +-----------+--------------+---------------+--------------+
//! | magic (4) | command (12) | length (4 LE) | checksum (4) |
//! +-----------+--------------+---------------+--------------+
//! | payload (length bytes)                             ...  |
//! +---------------------------------------------------------+
//! ```
//!
//! [`FrameCodec`] only cuts frames out of the byte stream; integrity is
//! checked by [`decode_frame`] once the whole frame is available.

use crate::crypto::hash::{checksum, CHECKSUM_SIZE};
use crate::network::error::{EncodingError, HandshakeError, ProtocolViolation};
use crate::network::message::{Command, OutboundMessage};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Size of the message header
pub const HEADER_SIZE: usize = 24;

/// Size of the zero-padded command field
pub const COMMAND_SIZE: usize = 12;

/// Largest payload we accept (32 MiB)
pub const MAX_PAYLOAD_SIZE: u32 = 32 * 1024 * 1024;

/// Decoded message header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub magic: [u8; 4],
    pub command: [u8; COMMAND_SIZE],
    pub length: u32,
    pub checksum: [u8; CHECKSUM_SIZE],
}

impl FrameHeader {
    /// Parse the header from the first 24 bytes of `bytes`
    pub fn parse(bytes: &[u8]) -> Result<Self, ProtocolViolation> {
        let header: &[u8; HEADER_SIZE] = bytes
            .get(..HEADER_SIZE)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| ProtocolViolation::truncated(HEADER_SIZE, bytes.len()))?;

        Ok(decode_header(header))
    }

    /// Command name with the zero padding removed
    pub fn command_name(&self) -> String {
        String::from_utf8_lossy(&self.command)
            .trim_end_matches('\0')
            .to_string()
    }
}

/// A validated frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub payload: Bytes,
}

/// A frame cut from the stream, not yet validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub header: FrameHeader,
    pub payload: Bytes,
}

/// Decode the 24-byte header
pub fn decode_header(bytes: &[u8; HEADER_SIZE]) -> FrameHeader {
    let mut buf = &bytes[..];

    let mut magic = [0u8; 4];
    buf.copy_to_slice(&mut magic);
    let mut command = [0u8; COMMAND_SIZE];
    buf.copy_to_slice(&mut command);
    let length = buf.get_u32_le();
    let mut checksum = [0u8; CHECKSUM_SIZE];
    buf.copy_to_slice(&mut checksum);

    FrameHeader {
        magic,
        command,
        length,
        checksum,
    }
}

/// Frame `payload` under `command`, appending to `dst`
pub fn encode_frame_into(
    magic: [u8; 4],
    command: &str,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<(), EncodingError> {
    if command.len() > COMMAND_SIZE {
        return Err(EncodingError::CommandTooLong(command.len()));
    }
    if !command.is_ascii() {
        return Err(EncodingError::InvalidCommand(command.to_string()));
    }
    let length = match u32::try_from(payload.len()) {
        Ok(length) if length <= MAX_PAYLOAD_SIZE => length,
        _ => return Err(EncodingError::PayloadTooLarge(payload.len())),
    };

    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&magic);
    dst.put_slice(command.as_bytes());
    dst.put_bytes(0, COMMAND_SIZE - command.len());
    dst.put_u32_le(length);
    dst.put_slice(&checksum(payload));
    dst.put_slice(payload);

    Ok(())
}

/// Frame `payload` under `command`
pub fn encode_frame(magic: [u8; 4], command: &str, payload: &[u8]) -> Result<BytesMut, EncodingError> {
    let mut out = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    encode_frame_into(magic, command, payload, &mut out)?;
    Ok(out)
}

/// Validate a header against its payload
pub fn decode_frame(
    expected_magic: [u8; 4],
    header: &FrameHeader,
    payload: Bytes,
) -> Result<Frame, ProtocolViolation> {
    if header.magic != expected_magic {
        return Err(ProtocolViolation::BadMagic {
            expected: hex::encode(expected_magic),
            actual: hex::encode(header.magic),
        });
    }

    if payload.len() != header.length as usize {
        return Err(ProtocolViolation::LengthMismatch {
            declared: header.length,
            actual: payload.len(),
        });
    }

    let computed = checksum(&payload);
    if computed != header.checksum {
        return Err(ProtocolViolation::BadChecksum {
            expected: hex::encode(header.checksum),
            actual: hex::encode(computed),
        });
    }

    Ok(Frame {
        command: Command::parse(&header.command_name()),
        payload,
    })
}

/// Cuts [`RawFrame`]s out of a byte stream and frames [`OutboundMessage`]s
pub struct FrameCodec {
    magic: [u8; 4],
}

impl FrameCodec {
    pub fn new(magic: [u8; 4]) -> Self {
        Self { magic }
    }
}

impl Decoder for FrameCodec {
    type Item = RawFrame;
    type Error = HandshakeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Need at least header
        if src.len() < HEADER_SIZE {
            src.reserve(HEADER_SIZE - src.len());
            return Ok(None);
        }

        let header = FrameHeader::parse(src)?;
        if header.length > MAX_PAYLOAD_SIZE {
            return Err(ProtocolViolation::PayloadTooLarge(header.length).into());
        }

        // Check if we have full message
        let frame_len = HEADER_SIZE + header.length as usize;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        src.advance(HEADER_SIZE);
        let payload = src.split_to(header.length as usize).freeze();

        Ok(Some(RawFrame { header, payload }))
    }
}

impl Encoder<OutboundMessage> for FrameCodec {
    type Error = HandshakeError;

    fn encode(&mut self, item: OutboundMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame_into(self.magic, item.command.as_str(), &item.payload, dst)?;
        Ok(())
    }
}
