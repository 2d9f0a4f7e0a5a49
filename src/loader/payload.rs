//! Tensor payload decoding
//!
//! A payload is a [`PayloadHeader`] followed by the tensor elements packed
//! row-major with no padding. Element bytes are taken as-is in host byte
//! order, matching how the files are written.

use std::io::{self, Cursor, Write};

use bytemuck::Pod;
use tracing::trace;

use crate::error::{ConvertError, ConvertResult, FormatError};
use crate::loader::header::PayloadHeader;
use crate::loader::store::PayloadSource;
use crate::tensor::{element_count, DenseTensor};

/// Decode a complete payload into a tensor of shape `dims`.
pub fn decode_payload<T: Pod>(bytes: &[u8], dims: &[usize]) -> Result<DenseTensor<T>, FormatError> {
    let mut cursor = Cursor::new(bytes);
    PayloadHeader::read(&mut cursor)?;
    let offset = cursor.position() as usize;
    decode_elements(&bytes[offset..], dims)
}

/// Reinterpret packed element bytes as a tensor of shape `dims`.
pub fn decode_elements<T: Pod>(body: &[u8], dims: &[usize]) -> Result<DenseTensor<T>, FormatError> {
    let width = std::mem::size_of::<T>();
    if body.len() % width != 0 {
        return Err(FormatError::Misaligned {
            len: body.len(),
            width,
        });
    }

    let actual = body.len() / width;
    let expected = element_count(dims).ok_or_else(|| FormatError::ShapeOverflow {
        shape: dims.to_vec(),
    })?;
    if actual != expected {
        return Err(FormatError::ShapeMismatch {
            shape: dims.to_vec(),
            expected,
            actual,
        });
    }

    // Copy into a typed buffer; `body` carries no alignment guarantee.
    let mut data = vec![T::zeroed(); actual];
    bytemuck::cast_slice_mut::<T, u8>(&mut data).copy_from_slice(body);
    DenseTensor::from_vec(dims, data)
}

/// Write `tensor` with `header` framing in front of it.
pub fn encode_payload<T: Pod, W: Write>(
    writer: &mut W,
    tensor: &DenseTensor<T>,
    header: &PayloadHeader,
) -> io::Result<()> {
    header.write(writer)?;
    writer.write_all(bytemuck::cast_slice(tensor.data()))
}

/// Encode `tensor` behind an all-default header (version 0, no LOD, empty
/// descriptor).
pub fn encode_to_vec<T: Pod>(tensor: &DenseTensor<T>) -> Vec<u8> {
    let header = PayloadHeader::default();
    let mut buf = Vec::with_capacity(header.encoded_len() as usize + tensor.len() * std::mem::size_of::<T>());
    // Writing into a Vec cannot fail
    let _ = encode_payload(&mut buf, tensor, &header);
    buf
}

/// Decode the payload named `name`, which must exist.
pub fn load_payload<T: Pod>(
    source: &dyn PayloadSource,
    name: &str,
    dims: &[usize],
) -> ConvertResult<DenseTensor<T>> {
    match source.read(name)? {
        Some(bytes) => {
            trace!(variable = name, bytes = bytes.len(), "decoding payload");
            decode_payload(&bytes, dims).map_err(|e| ConvertError::format(name, e))
        }
        None => Err(ConvertError::MissingPayload(name.to_string())),
    }
}

/// Decode the payload named `name`, or return zeros of shape `dims` when
/// the source has no such payload.
pub fn decode_or_default<T: Pod>(
    source: &dyn PayloadSource,
    name: &str,
    dims: &[usize],
) -> ConvertResult<DenseTensor<T>> {
    match source.read(name)? {
        Some(bytes) => decode_payload(&bytes, dims).map_err(|e| ConvertError::format(name, e)),
        None => {
            trace!(variable = name, ?dims, "no payload, using zeros");
            DenseTensor::zeros(dims).map_err(|e| ConvertError::format(name, e))
        }
    }
}
