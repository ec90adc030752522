//! Binary framing for messages and responses.
//!
//! Every frame is `[magic: u32 BE][payload length: u32 BE][payload]`.
//! Message payloads are `message id u64 | source | destination | operation
//! kind u16 | JSON body`; response payloads are `message id u64 |
//! destination | part count u32 | (address, response code u16)*`. An address
//! is encoded as `level u8 | agent i32 | worker i32 | test i32`.
//!
//! Decoding never consumes input on failure, so a caller can retry once more
//! bytes arrive or hand the buffer to another decoder.
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::ProtocolError;

use super::{
    AddressLevel, Operation, OperationType, Response, ResponseType, SimulatorAddress,
    SimulatorMessage,
};

pub const MESSAGE_MAGIC: u32 = 0xA5E1_CA57;
pub const RESPONSE_MAGIC: u32 = 0x3E5D_0B5E;
pub const HEADER_LEN: usize = 8;
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

const ADDRESS_LEN: usize = 13;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Message,
    Response,
}

impl FrameKind {
    #[must_use]
    pub const fn from_magic(magic: u32) -> Option<Self> {
        match magic {
            MESSAGE_MAGIC => Some(Self::Message),
            RESPONSE_MAGIC => Some(Self::Response),
            _ => None,
        }
    }

    #[must_use]
    pub const fn magic(self) -> u32 {
        match self {
            Self::Message => MESSAGE_MAGIC,
            Self::Response => RESPONSE_MAGIC,
        }
    }
}

/// Encodes a message into a complete frame.
///
/// # Errors
///
/// Returns an error when the operation body cannot be serialized or the
/// payload exceeds [`MAX_FRAME_BYTES`].
pub fn encode_message(message: &SimulatorMessage) -> Result<Bytes, ProtocolError> {
    let mut payload = BytesMut::with_capacity(64);
    payload.put_u64(message.message_id);
    put_address(&mut payload, &message.source);
    put_address(&mut payload, &message.destination);
    let kind = message.operation.operation_type();
    payload.put_u16(kind.code());
    let body = match &message.operation {
        Operation::CreateTest(op) => encode_body(kind, op)?,
        Operation::StartTest(op) => encode_body(kind, op)?,
        Operation::StartTestPhase(op) => encode_body(kind, op)?,
        Operation::StopTest(op) => encode_body(kind, op)?,
        Operation::PhaseCompleted(op) => encode_body(kind, op)?,
        Operation::ExecuteScript(op) => encode_body(kind, op)?,
        Operation::Failure(op) => encode_body(kind, op)?,
        Operation::PerformanceStats(op) => encode_body(kind, op)?,
        Operation::Log(op) => encode_body(kind, op)?,
    };
    payload.put_slice(&body);
    frame(FrameKind::Message, &payload)
}

/// Encodes a response into a complete frame.
///
/// # Errors
///
/// Returns an error when the payload exceeds [`MAX_FRAME_BYTES`].
pub fn encode_response(response: &Response) -> Result<Bytes, ProtocolError> {
    let mut payload = BytesMut::with_capacity(32);
    payload.put_u64(response.message_id);
    put_address(&mut payload, &response.destination);
    let count = u32::try_from(response.part_count()).map_err(|_overflow| {
        ProtocolError::FrameTooLarge {
            max_bytes: MAX_FRAME_BYTES,
            actual: response.part_count(),
        }
    })?;
    payload.put_u32(count);
    for (address, response_type) in response.parts() {
        put_address(&mut payload, address);
        payload.put_u16(response_type.code());
    }
    frame(FrameKind::Response, &payload)
}

/// Decodes one message frame from the front of `src`, advancing it past the
/// frame on success.
///
/// # Errors
///
/// Returns [`ProtocolError::BadMagic`] when the frame does not start with
/// [`MESSAGE_MAGIC`], [`ProtocolError::Incomplete`] when more bytes are
/// needed, and [`ProtocolError::UnknownOperationKind`] for an unrecognized
/// discriminator. `src` is left untouched on every error.
pub fn decode_message(src: &mut &[u8]) -> Result<SimulatorMessage, ProtocolError> {
    let (mut payload, consumed) = split_frame(src, FrameKind::Message)?;
    let message_id = take_u64(&mut payload)?;
    let source = take_address(&mut payload)?;
    let destination = take_address(&mut payload)?;
    let code = take_u16(&mut payload)?;
    let kind = OperationType::from_code(code)
        .ok_or(ProtocolError::UnknownOperationKind { code })?;
    let operation = match kind {
        OperationType::CreateTest => Operation::CreateTest(decode_body(kind, payload)?),
        OperationType::StartTest => Operation::StartTest(decode_body(kind, payload)?),
        OperationType::StartTestPhase => Operation::StartTestPhase(decode_body(kind, payload)?),
        OperationType::StopTest => Operation::StopTest(decode_body(kind, payload)?),
        OperationType::PhaseCompleted => Operation::PhaseCompleted(decode_body(kind, payload)?),
        OperationType::ExecuteScript => Operation::ExecuteScript(decode_body(kind, payload)?),
        OperationType::Failure => Operation::Failure(decode_body(kind, payload)?),
        OperationType::PerformanceStats => {
            Operation::PerformanceStats(decode_body(kind, payload)?)
        }
        OperationType::Log => Operation::Log(decode_body(kind, payload)?),
    };
    src.advance(consumed);
    Ok(SimulatorMessage {
        message_id,
        source,
        destination,
        operation,
    })
}

/// Decodes one response frame from the front of `src`, advancing it past the
/// frame on success.
///
/// # Errors
///
/// Returns [`ProtocolError::BadMagic`] when the frame does not start with
/// [`RESPONSE_MAGIC`], [`ProtocolError::Incomplete`] when more bytes are
/// needed, and [`ProtocolError::UnknownResponseType`] for an unknown result
/// code. `src` is left untouched on every error.
pub fn decode_response(src: &mut &[u8]) -> Result<Response, ProtocolError> {
    let (mut payload, consumed) = split_frame(src, FrameKind::Response)?;
    let message_id = take_u64(&mut payload)?;
    let destination = take_address(&mut payload)?;
    let count = take_u32(&mut payload)?;
    let mut response = Response::new(message_id, destination);
    for _ in 0..count {
        let address = take_address(&mut payload)?;
        let code = take_u16(&mut payload)?;
        let response_type =
            ResponseType::from_code(code).ok_or(ProtocolError::UnknownResponseType { code })?;
        response.add_part(address, response_type);
    }
    src.advance(consumed);
    Ok(response)
}

/// Reads the frame kind from the magic at the front of `src` without
/// consuming anything.
///
/// # Errors
///
/// Returns [`ProtocolError::Incomplete`] for fewer than four bytes and
/// [`ProtocolError::BadMagic`] for an unknown magic.
pub fn peek_frame_kind(src: &[u8]) -> Result<FrameKind, ProtocolError> {
    let mut header = src;
    if header.remaining() < 4 {
        return Err(ProtocolError::Incomplete {
            needed: 4,
            available: header.remaining(),
        });
    }
    let magic = header.get_u32();
    FrameKind::from_magic(magic).ok_or(ProtocolError::BadMagic {
        expected: MESSAGE_MAGIC,
        actual: magic,
    })
}

fn frame(kind: FrameKind, payload: &[u8]) -> Result<Bytes, ProtocolError> {
    if payload.len() > MAX_FRAME_BYTES {
        return Err(ProtocolError::FrameTooLarge {
            max_bytes: MAX_FRAME_BYTES,
            actual: payload.len(),
        });
    }
    let length = u32::try_from(payload.len()).map_err(|_overflow| {
        ProtocolError::FrameTooLarge {
            max_bytes: MAX_FRAME_BYTES,
            actual: payload.len(),
        }
    })?;
    let mut out = BytesMut::with_capacity(HEADER_LEN.saturating_add(payload.len()));
    out.put_u32(kind.magic());
    out.put_u32(length);
    out.put_slice(payload);
    Ok(out.freeze())
}

/// Validates the header at the front of `src` and returns the payload slice
/// plus the total frame length. Reads through a copy of the slice so `src`
/// itself is never moved.
fn split_frame<'buf>(
    src: &&'buf [u8],
    kind: FrameKind,
) -> Result<(&'buf [u8], usize), ProtocolError> {
    let mut header: &'buf [u8] = *src;
    if header.remaining() < 4 {
        return Err(ProtocolError::Incomplete {
            needed: HEADER_LEN,
            available: header.remaining(),
        });
    }
    let magic = header.get_u32();
    if magic != kind.magic() {
        return Err(ProtocolError::BadMagic {
            expected: kind.magic(),
            actual: magic,
        });
    }
    if header.remaining() < 4 {
        return Err(ProtocolError::Incomplete {
            needed: HEADER_LEN,
            available: src.len(),
        });
    }
    let length = usize::try_from(header.get_u32()).unwrap_or(usize::MAX);
    if length > MAX_FRAME_BYTES {
        return Err(ProtocolError::FrameTooLarge {
            max_bytes: MAX_FRAME_BYTES,
            actual: length,
        });
    }
    let total = HEADER_LEN.saturating_add(length);
    let Some(payload) = header.get(..length) else {
        return Err(ProtocolError::Incomplete {
            needed: total,
            available: src.len(),
        });
    };
    Ok((payload, total))
}

fn encode_body<T: Serialize>(kind: OperationType, body: &T) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec(body).map_err(|err| ProtocolError::Encode {
        kind: kind.as_str(),
        source: err,
    })
}

fn decode_body<T: DeserializeOwned>(kind: OperationType, body: &[u8]) -> Result<T, ProtocolError> {
    serde_json::from_slice(body).map_err(|err| ProtocolError::MalformedBody {
        kind: kind.as_str(),
        source: err,
    })
}

fn put_address(buf: &mut BytesMut, address: &SimulatorAddress) {
    buf.put_u8(address.level().depth());
    buf.put_i32(address.agent_index());
    buf.put_i32(address.worker_index());
    buf.put_i32(address.test_index());
}

fn ensure(buf: &[u8], needed: usize) -> Result<(), ProtocolError> {
    if buf.remaining() < needed {
        return Err(ProtocolError::TruncatedPayload {
            needed,
            available: buf.remaining(),
        });
    }
    Ok(())
}

fn take_u64(buf: &mut &[u8]) -> Result<u64, ProtocolError> {
    ensure(buf, 8)?;
    Ok(buf.get_u64())
}

fn take_u32(buf: &mut &[u8]) -> Result<u32, ProtocolError> {
    ensure(buf, 4)?;
    Ok(buf.get_u32())
}

fn take_u16(buf: &mut &[u8]) -> Result<u16, ProtocolError> {
    ensure(buf, 2)?;
    Ok(buf.get_u16())
}

fn take_address(buf: &mut &[u8]) -> Result<SimulatorAddress, ProtocolError> {
    ensure(buf, ADDRESS_LEN)?;
    let depth = buf.get_u8();
    let level = AddressLevel::from_depth(depth)
        .ok_or(ProtocolError::InvalidAddressLevel { level: depth })?;
    let agent_index = buf.get_i32();
    let worker_index = buf.get_i32();
    let test_index = buf.get_i32();
    Ok(SimulatorAddress::new(
        level,
        agent_index,
        worker_index,
        test_index,
    ))
}
