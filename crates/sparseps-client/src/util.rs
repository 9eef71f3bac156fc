//! Shared envelope and payload helpers for the table clients.

use sparseps_archive::{Archivable, BinaryArchive};
use sparseps_core::{ErrNo, MessageType};
use sparseps_rpc::{RpcRequest, RpcResponse};

use crate::error::{ClientError, Result};

pub(crate) fn request(
    message_type: MessageType,
    table_name: &str,
    message: Vec<u8>,
    is_training: bool,
) -> RpcRequest {
    RpcRequest {
        message_type: message_type.into(),
        table_name: table_name.to_string(),
        message,
        is_training,
    }
}

/// Unwraps a response into its payload, surfacing a non-zero return code as
/// a domain error.
pub(crate) fn check(resp: RpcResponse) -> Result<Vec<u8>> {
    if resp.return_value == 0 {
        Ok(resp.message)
    } else {
        Err(ClientError::Server(ErrNo::from_i32(resp.return_value)))
    }
}

pub(crate) fn encode_value<T: Archivable>(value: &T) -> Vec<u8> {
    let mut ar = BinaryArchive::new();
    value.put(&mut ar);
    ar.into_bytes()
}

pub(crate) fn encode_vec<T: Archivable>(values: &[T]) -> Vec<u8> {
    let mut ar = BinaryArchive::new();
    ar.put_vec(values);
    ar.into_bytes()
}

pub(crate) fn decode_value<T: Archivable>(payload: &[u8]) -> Result<T> {
    let mut ar = BinaryArchive::from_bytes(payload.to_vec());
    Ok(T::get(&mut ar)?)
}

pub(crate) fn decode_vec<T: Archivable>(payload: &[u8]) -> Result<Vec<T>> {
    let mut ar = BinaryArchive::from_bytes(payload.to_vec());
    Ok(ar.get_vec()?)
}
