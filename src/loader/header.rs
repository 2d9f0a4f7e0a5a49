//! Tensor payload header parsing
//!
//! Every payload file starts with a framing header in front of the raw
//! element data:
//! - u32 outer version (carried, not checked)
//! - u64 LOD level count, then per level a u64 byte length and that many bytes
//! - u32 tensor version, must be [`TENSOR_VERSION`]
//! - i32 tensor descriptor size, then that many bytes
//!
//! LOD and descriptor contents are opaque here; only their lengths matter.
//! All integers are little-endian.

use std::io::{self, Read, Write};

use crate::error::FormatError;

/// The only tensor version this decoder understands
pub const TENSOR_VERSION: u32 = 0;

/// Parsed payload framing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayloadHeader {
    pub version: u32,
    /// Byte length of each LOD level
    pub lod_lengths: Vec<u64>,
    pub tensor_version: u32,
    /// Byte length of the tensor descriptor
    pub desc_len: u32,
}

impl PayloadHeader {
    /// Read the header, leaving `reader` positioned at the first data byte.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self, FormatError> {
        let version = read_u32(reader, "version")?;

        let lod_level = read_u64(reader, "lod level count")?;
        let mut lod_lengths = Vec::new();
        for _ in 0..lod_level {
            let len = read_u64(reader, "lod level length")?;
            skip_bytes(reader, len, "lod level")?;
            lod_lengths.push(len);
        }

        let tensor_version = read_u32(reader, "tensor version")?;
        if tensor_version != TENSOR_VERSION {
            return Err(FormatError::UnsupportedVersion {
                found: tensor_version,
                expected: TENSOR_VERSION,
            });
        }

        let desc_size = read_i32(reader, "tensor desc size")?;
        let desc_len = u32::try_from(desc_size).map_err(|_| FormatError::NegativeLength {
            what: "tensor desc",
            value: i64::from(desc_size),
        })?;
        skip_bytes(reader, u64::from(desc_len), "tensor desc")?;

        Ok(Self {
            version,
            lod_lengths,
            tensor_version,
            desc_len,
        })
    }

    /// Write the header; LOD and descriptor contents are zero-filled.
    ///
    /// A `desc_len` above `i32::MAX` has no encoding and is rejected with
    /// `InvalidInput` before anything is written.
    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let desc_len = i32::try_from(self.desc_len).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("descriptor length {} exceeds i32::MAX", self.desc_len),
            )
        })?;
        writer.write_all(&self.version.to_le_bytes())?;
        writer.write_all(&(self.lod_lengths.len() as u64).to_le_bytes())?;
        for &len in &self.lod_lengths {
            writer.write_all(&len.to_le_bytes())?;
            io::copy(&mut io::repeat(0).take(len), writer)?;
        }
        writer.write_all(&self.tensor_version.to_le_bytes())?;
        writer.write_all(&desc_len.to_le_bytes())?;
        io::copy(&mut io::repeat(0).take(u64::from(self.desc_len)), writer)?;
        Ok(())
    }

    /// Header size in bytes
    pub fn encoded_len(&self) -> u64 {
        let lod: u64 = self.lod_lengths.iter().map(|len| 8 + len).sum();
        4 + 8 + lod + 4 + 4 + u64::from(self.desc_len)
    }
}

fn read_array<R: Read, const N: usize>(
    reader: &mut R,
    what: &'static str,
) -> Result<[u8; N], FormatError> {
    let mut buf = [0u8; N];
    reader
        .read_exact(&mut buf)
        .map_err(|_| FormatError::Truncated { what })?;
    Ok(buf)
}

pub fn read_u32<R: Read>(reader: &mut R, what: &'static str) -> Result<u32, FormatError> {
    read_array(reader, what).map(u32::from_le_bytes)
}

pub fn read_i32<R: Read>(reader: &mut R, what: &'static str) -> Result<i32, FormatError> {
    read_array(reader, what).map(i32::from_le_bytes)
}

pub fn read_u64<R: Read>(reader: &mut R, what: &'static str) -> Result<u64, FormatError> {
    read_array(reader, what).map(u64::from_le_bytes)
}

/// Discard exactly `len` bytes
pub fn skip_bytes<R: Read>(reader: &mut R, len: u64, what: &'static str) -> Result<(), FormatError> {
    let skipped = io::copy(&mut reader.by_ref().take(len), &mut io::sink())
        .map_err(|_| FormatError::Truncated { what })?;
    if skipped != len {
        return Err(FormatError::Truncated { what });
    }
    Ok(())
}
