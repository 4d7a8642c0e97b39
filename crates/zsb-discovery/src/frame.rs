use byteorder::ByteOrder;
use byteorder::LittleEndian;
use bytes::BufMut;
use bytes::BytesMut;

/// Hard cap on a frame body; anything larger is a protocol violation.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Errors from the framing layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Length prefix of zero or above [`MAX_FRAME_LEN`].
    BadLength(u32),
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadLength(n) => write!(f, "bad frame length {}", n),
        }
    }
}

impl std::error::Error for FrameError {}

/// Encodes one frame: `[u32 LE (1 + |payload|)][type][payload]`.
pub fn encode_frame(kind: u8, payload: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(5 + payload.len());
    buf.put_u32_le(1 + payload.len() as u32);
    buf.put_u8(kind);
    buf.put_slice(payload);
    buf.to_vec()
}

/// Attempts to decode one frame from the front of `buf`.
///
/// Returns `Ok(None)` when more bytes are needed, and
/// `Ok(Some((kind, payload, consumed)))` on a whole frame.
pub fn decode_frame(buf: &[u8]) -> Result<Option<(u8, &[u8], usize)>, FrameError> {
    if buf.len() < 4 {
        return Ok(None);
    }
    let length = LittleEndian::read_u32(&buf[..4]);
    if length == 0 || length as usize > MAX_FRAME_LEN {
        return Err(FrameError::BadLength(length));
    }
    let total = 4 + length as usize;
    if buf.len() < total {
        return Ok(None);
    }
    Ok(Some((buf[4], &buf[5..total], total)))
}
