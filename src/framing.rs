//! Length-prefixed JSON framing
//!
//! Every message is JSON preceded by its length as a 4-byte little-endian
//! integer. Used both by the IPC socket and the transcription relay link.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest accepted message body
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Errors reading or writing a framed message
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("message of {0} bytes exceeds the frame limit")]
    TooLarge(usize),

    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read one message. Returns `Ok(None)` on a clean end of stream.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>, FramingError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(FramingError::TooLarge(len));
    }

    let mut msg_buf = vec![0u8; len];
    reader.read_exact(&mut msg_buf).await?;
    Ok(Some(serde_json::from_slice(&msg_buf)?))
}

/// Write one message
pub async fn write_frame<W, T>(writer: &mut W, msg: &T) -> Result<(), FramingError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let msg_bytes = serde_json::to_vec(msg)?;
    if msg_bytes.len() > MAX_FRAME_LEN {
        return Err(FramingError::TooLarge(msg_bytes.len()));
    }
    let msg_len = (msg_bytes.len() as u32).to_le_bytes();

    writer.write_all(&msg_len).await?;
    writer.write_all(&msg_bytes).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_frame_roundtrip() {
        let (mut a, mut b) = tokio::io::duplex(64 * 1024);
        write_frame(&mut a, &json!({"type": "ping"})).await.unwrap();
        write_frame(&mut a, &json!({"type": "undo"})).await.unwrap();
        drop(a);

        let first: Option<Value> = read_frame(&mut b).await.unwrap();
        assert_eq!(first.unwrap()["type"], "ping");
        let second: Option<Value> = read_frame(&mut b).await.unwrap();
        assert_eq!(second.unwrap()["type"], "undo");
        let end: Option<Value> = read_frame(&mut b).await.unwrap();
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        let len = ((MAX_FRAME_LEN + 1) as u32).to_le_bytes();
        a.write_all(&len).await.unwrap();

        let result: Result<Option<Value>, _> = read_frame(&mut b).await;
        assert!(matches!(result, Err(FramingError::TooLarge(_))));
    }
}
