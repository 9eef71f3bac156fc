//! Request/response envelope and the length-prefixed frame codec.
//!
//! Every call is one protobuf message preceded by a 4-byte big-endian
//! length. The `message` field carries an opaque payload whose encoding is
//! owned by the table layer; the envelope never inspects it.

use prost::Message;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{Result, RpcError};

/// Upper bound on a single frame. Dense assigns of large models are the
/// biggest payloads in practice.
pub const MAX_FRAME_LEN: usize = 1 << 30;

#[derive(Clone, PartialEq, Message)]
pub struct RpcRequest {
    /// Wire value of the operation, see `MessageType`.
    #[prost(uint32, tag = "1")]
    pub message_type: u32,
    #[prost(string, tag = "2")]
    pub table_name: String,
    /// Operation payload. Save requests carry the destination path as raw
    /// UTF-8 here; everything else is archive-encoded.
    #[prost(bytes = "vec", tag = "3")]
    pub message: Vec<u8>,
    #[prost(bool, tag = "4")]
    pub is_training: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct RpcResponse {
    /// `ErrNo` wire value; zero on success.
    #[prost(int32, tag = "1")]
    pub return_value: i32,
    #[prost(bytes = "vec", tag = "2")]
    pub message: Vec<u8>,
}

pub async fn write_frame<W, M>(writer: &mut W, msg: &M) -> Result<()>
where
    W: AsyncWriteExt + Unpin,
    M: Message,
{
    let len = msg.encoded_len();
    if len > MAX_FRAME_LEN {
        return Err(RpcError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }
    let mut buf = Vec::with_capacity(4 + len);
    buf.extend_from_slice(&(len as u32).to_be_bytes());
    msg.encode(&mut buf)?;
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame. Returns `Ok(None)` on a clean close at a frame
/// boundary; a close mid-frame is an error.
pub async fn read_frame<R, M>(reader: &mut R) -> Result<Option<M>>
where
    R: AsyncReadExt + Unpin,
    M: Message + Default,
{
    let mut len_bytes = [0u8; 4];
    match reader.read_exact(&mut len_bytes).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > MAX_FRAME_LEN {
        return Err(RpcError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }
    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => RpcError::UnexpectedEof,
            _ => RpcError::Io(e),
        })?;
    Ok(Some(M::decode(body.as_slice())?))
}

impl From<prost::EncodeError> for RpcError {
    fn from(e: prost::EncodeError) -> Self {
        // encode only fails when the destination buffer is too small, which
        // a Vec destination rules out.
        RpcError::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frame_round_trip() {
        let req = RpcRequest {
            message_type: 4,
            table_name: "emb".to_string(),
            message: vec![1, 2, 3],
            is_training: true,
        };
        let mut buf = Vec::new();
        write_frame(&mut buf, &req).await.unwrap();

        let mut reader = buf.as_slice();
        let decoded: RpcRequest = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(decoded, req);

        // Clean EOF after the frame.
        let next: Option<RpcRequest> = read_frame(&mut reader).await.unwrap();
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn test_truncated_frame_is_an_error() {
        let resp = RpcResponse {
            return_value: 0,
            message: vec![9; 64],
        };
        let mut buf = Vec::new();
        write_frame(&mut buf, &resp).await.unwrap();
        buf.truncate(buf.len() - 1);

        let mut reader = buf.as_slice();
        let err = read_frame::<_, RpcResponse>(&mut reader).await.unwrap_err();
        assert!(matches!(err, RpcError::UnexpectedEof));
    }

    #[tokio::test]
    async fn test_oversized_length_prefix_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(u32::MAX).to_be_bytes());
        buf.extend_from_slice(&[0; 8]);

        let mut reader = buf.as_slice();
        let err = read_frame::<_, RpcRequest>(&mut reader).await.unwrap_err();
        assert!(matches!(err, RpcError::FrameTooLarge { .. }));
    }
}
