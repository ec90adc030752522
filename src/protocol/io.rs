use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ProtocolError;

use super::codec::{
    FrameKind, HEADER_LEN, MAX_FRAME_BYTES, decode_message, decode_response, encode_message,
    encode_response,
};
use super::{Response, SimulatorMessage};

/// A decoded frame read from a stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Message(SimulatorMessage),
    Response(Response),
}

/// Reads exactly one frame from `reader`.
///
/// # Errors
///
/// Returns [`ProtocolError::ConnectionClosed`] on a clean end of stream at a
/// frame boundary, and the codec error for a frame that cannot be decoded.
pub async fn read_frame<R>(reader: &mut R) -> Result<Frame, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed);
        }
        Err(err) => {
            return Err(ProtocolError::Io {
                context: "read frame header",
                source: err,
            });
        }
    }
    let [m0, m1, m2, m3, l0, l1, l2, l3] = header;
    let magic = u32::from_be_bytes([m0, m1, m2, m3]);
    let kind = FrameKind::from_magic(magic).ok_or(ProtocolError::BadMagic {
        expected: FrameKind::Message.magic(),
        actual: magic,
    })?;
    let length = usize::try_from(u32::from_be_bytes([l0, l1, l2, l3])).unwrap_or(usize::MAX);
    if length > MAX_FRAME_BYTES {
        return Err(ProtocolError::FrameTooLarge {
            max_bytes: MAX_FRAME_BYTES,
            actual: length,
        });
    }

    let mut buffer = Vec::with_capacity(HEADER_LEN.saturating_add(length));
    buffer.extend_from_slice(&header);
    buffer.resize(HEADER_LEN.saturating_add(length), 0);
    if let Some(payload) = buffer.get_mut(HEADER_LEN..) {
        reader
            .read_exact(payload)
            .await
            .map_err(|err| ProtocolError::Io {
                context: "read frame payload",
                source: err,
            })?;
    }

    let mut src = buffer.as_slice();
    match kind {
        FrameKind::Message => decode_message(&mut src).map(Frame::Message),
        FrameKind::Response => decode_response(&mut src).map(Frame::Response),
    }
}

/// Writes a message frame to `writer`.
///
/// # Errors
///
/// Returns an error when encoding or the write fails.
pub async fn write_message<W>(writer: &mut W, message: &SimulatorMessage) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_message(message)?;
    write_all(writer, &frame, "send message frame").await
}

/// Writes a response frame to `writer`.
///
/// # Errors
///
/// Returns an error when encoding or the write fails.
pub async fn write_response<W>(writer: &mut W, response: &Response) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_response(response)?;
    write_all(writer, &frame, "send response frame").await
}

async fn write_all<W>(writer: &mut W, bytes: &[u8], context: &'static str) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(bytes)
        .await
        .map_err(|err| ProtocolError::Io {
            context,
            source: err,
        })?;
    writer.flush().await.map_err(|err| ProtocolError::Io {
        context,
        source: err,
    })
}
