//! Escaped, CRC-protected codec for UART framing
//!
//! All messages are framed as:
//! ```text
//! [ 0x7E ][ size: u16 LE ][ major: u8 ][ minor: u8 ][ msg type: u8 ][ opcode: u16 LE ][ payload ][ crc: u16 LE ]
//! ```
//!
//! `size` counts every byte after itself, CRC included. The CRC (CRC-16/CCITT-FALSE)
//! covers the bytes from `major` up to the end of `payload`. Every byte after the
//! start token is escaped, so a raw `0x7E` on the line always begins a new frame.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

pub const START_TOKEN: u8 = 0x7E;
pub const ESCAPE_TOKEN: u8 = 0x5C;
pub const BIT_FLIP_MASK: u8 = 0x40;

pub const PROTOCOL_MAJOR: u8 = 1;
pub const PROTOCOL_MINOR: u8 = 0;

/// Plain (unencrypted) message
pub const MESSAGE_TYPE_PLAIN: u8 = 0;

/// Largest accepted value of the size field
pub const MAX_MESSAGE_SIZE: usize = 1024;

/// major + minor + message type + opcode
const HEADER_LEN: usize = 5;
const CRC_LEN: usize = 2;

/// Largest payload that still fits in one frame
pub const MAX_PAYLOAD_LEN: usize = MAX_MESSAGE_SIZE - HEADER_LEN - CRC_LEN;

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Message too large: {0} bytes (max: {MAX_MESSAGE_SIZE})")]
    MessageTooLarge(usize),

    #[error("Invalid message size field: {0}")]
    InvalidLength(usize),

    #[error("CRC mismatch: frame says {expected:#06x}, computed {computed:#06x}")]
    CrcMismatch { expected: u16, computed: u16 },

    #[error("Unsupported protocol version {major}.{minor}")]
    UnsupportedProtocol { major: u8, minor: u8 },

    #[error("Not enough data: need {needed} bytes, have {available}")]
    NotEnoughData { needed: usize, available: usize },

    #[error("Unknown {kind}: {value}")]
    UnknownValue { kind: &'static str, value: u16 },

    #[error("Invalid iBeacon UUID: {0:?}")]
    InvalidUuid(String),
}

/// One decoded UART message: an opcode and its raw payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UartMessage {
    pub opcode: u16,
    pub payload: Bytes,
}

impl UartMessage {
    pub fn new(opcode: impl Into<u16>, payload: impl Into<Bytes>) -> Self {
        Self {
            opcode: opcode.into(),
            payload: payload.into(),
        }
    }
}

/// CRC-16/CCITT-FALSE (poly 0x1021, init 0xFFFF)
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

fn put_escaped(buf: &mut BytesMut, byte: u8) {
    if byte == START_TOKEN || byte == ESCAPE_TOKEN {
        buf.put_u8(ESCAPE_TOKEN);
        buf.put_u8(byte ^ BIT_FLIP_MASK);
    } else {
        buf.put_u8(byte);
    }
}

/// Encode a UART message into an escaped frame ready for the wire
pub fn encode(message: &UartMessage) -> Result<Bytes, CodecError> {
    let mut buf = BytesMut::new();
    encode_into(message, &mut buf)?;
    Ok(buf.freeze())
}

/// Encode a UART message directly into a provided buffer
pub fn encode_into(message: &UartMessage, buf: &mut BytesMut) -> Result<(), CodecError> {
    let size = HEADER_LEN + message.payload.len() + CRC_LEN;
    if size > MAX_MESSAGE_SIZE {
        return Err(CodecError::MessageTooLarge(size));
    }

    let mut body = BytesMut::with_capacity(HEADER_LEN + message.payload.len());
    body.put_u8(PROTOCOL_MAJOR);
    body.put_u8(PROTOCOL_MINOR);
    body.put_u8(MESSAGE_TYPE_PLAIN);
    body.put_u16_le(message.opcode);
    body.extend_from_slice(&message.payload);
    let crc = crc16(&body);

    // Worst case every byte gets escaped
    buf.reserve(1 + 2 * (2 + body.len() + CRC_LEN));
    buf.put_u8(START_TOKEN);
    for byte in (size as u16).to_le_bytes() {
        put_escaped(buf, byte);
    }
    for &byte in body.iter() {
        put_escaped(buf, byte);
    }
    for byte in crc.to_le_bytes() {
        put_escaped(buf, byte);
    }

    Ok(())
}

/// Parse an unescaped frame body (everything after the size field)
fn parse_body(mut body: Bytes) -> Result<UartMessage, CodecError> {
    if body.len() < HEADER_LEN + CRC_LEN {
        return Err(CodecError::NotEnoughData {
            needed: HEADER_LEN + CRC_LEN,
            available: body.len(),
        });
    }

    let crc_offset = body.len() - CRC_LEN;
    let expected = u16::from_le_bytes([body[crc_offset], body[crc_offset + 1]]);
    let computed = crc16(&body[..crc_offset]);
    if expected != computed {
        return Err(CodecError::CrcMismatch { expected, computed });
    }
    body.truncate(crc_offset);

    let major = body.get_u8();
    let minor = body.get_u8();
    if major != PROTOCOL_MAJOR {
        return Err(CodecError::UnsupportedProtocol { major, minor });
    }
    let _message_type = body.get_u8();
    let opcode = body.get_u16_le();

    Ok(UartMessage { opcode, payload: body })
}

/// Try to decode one frame from the start of `buf`
///
/// Returns:
/// - `Ok(Some(message))` if a complete frame was decoded
/// - `Ok(None)` if more data is needed
/// - `Err(...)` if a complete frame was invalid (the frame is consumed)
///
/// Bytes before the first start token are discarded.
pub fn decode(buf: &mut BytesMut) -> Result<Option<UartMessage>, CodecError> {
    loop {
        // Skip line noise until a start token
        match buf.iter().position(|&b| b == START_TOKEN) {
            Some(start) => buf.advance(start),
            None => {
                buf.clear();
                return Ok(None);
            }
        }

        let mut unescaped = BytesMut::new();
        let mut expected_size: Option<usize> = None;
        let mut escaping = false;
        let mut restart_at = None;
        let mut consumed = None;
        let mut invalid = None;

        for (i, &byte) in buf.iter().enumerate().skip(1) {
            if byte == START_TOKEN {
                // Frame was cut short, resync on the new start token
                restart_at = Some(i);
                break;
            }
            if escaping {
                unescaped.put_u8(byte ^ BIT_FLIP_MASK);
                escaping = false;
            } else if byte == ESCAPE_TOKEN {
                escaping = true;
                continue;
            } else {
                unescaped.put_u8(byte);
            }

            if expected_size.is_none() && unescaped.len() == 2 {
                let size = u16::from_le_bytes([unescaped[0], unescaped[1]]) as usize;
                if size > MAX_MESSAGE_SIZE || size < HEADER_LEN + CRC_LEN {
                    invalid = Some((i + 1, size));
                    break;
                }
                expected_size = Some(size);
            }

            if let Some(size) = expected_size {
                if unescaped.len() == 2 + size {
                    consumed = Some(i + 1);
                    break;
                }
            }
        }

        if let Some((len, size)) = invalid {
            buf.advance(len);
            return Err(CodecError::InvalidLength(size));
        }

        if let Some(at) = restart_at {
            buf.advance(at);
            continue;
        }

        return match consumed {
            Some(len) => {
                buf.advance(len);
                let body = unescaped.split_off(2).freeze();
                parse_body(body).map(Some)
            }
            None => Ok(None),
        };
    }
}

/// Decoder state machine for streaming decoding
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Raw line data not yet turned into frames
    buffer: BytesMut,
}

impl FrameDecoder {
    /// Create a new frame decoder
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Add data to the decoder buffer
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode the next frame from the buffer
    ///
    /// Call this repeatedly until it returns `Ok(None)` to drain all complete frames.
    /// An `Err` only drops the offending frame; keep calling afterwards.
    pub fn decode_next(&mut self) -> Result<Option<UartMessage>, CodecError> {
        decode(&mut self.buffer)
    }

    /// Get the current buffer length (for debugging)
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }
}
