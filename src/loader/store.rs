//! Payload sources
//!
//! A model directory holds one payload file per persistable variable, named
//! after the variable. [`PayloadSource`] abstracts that lookup so conversion
//! can also run against in-memory payloads.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use bytemuck::Pod;
use tracing::warn;

use crate::error::{ConvertError, ConvertResult};
use crate::loader::payload::encode_to_vec;
use crate::tensor::DenseTensor;

/// Read-only lookup of raw payload bytes by variable name.
pub trait PayloadSource: Send + Sync {
    /// Raw bytes of the payload named `name`, `None` if there is none.
    fn read(&self, name: &str) -> ConvertResult<Option<Cow<'_, [u8]>>>;

    fn contains(&self, name: &str) -> bool;
}

/// Payload files stored side by side in a model directory.
#[derive(Debug, Clone)]
pub struct DirectoryPayloadSource {
    root: PathBuf,
}

impl DirectoryPayloadSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path for `name`, `None` if the name would leave the directory.
    fn payload_path(&self, name: &str) -> Option<PathBuf> {
        let escapes = name.is_empty()
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\\');
        if escapes {
            warn!(variable = name, "variable name is not a valid payload file name");
            return None;
        }
        Some(self.root.join(name))
    }
}

impl PayloadSource for DirectoryPayloadSource {
    fn read(&self, name: &str) -> ConvertResult<Option<Cow<'_, [u8]>>> {
        let Some(path) = self.payload_path(name) else {
            return Ok(None);
        };
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(Cow::Owned(bytes))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ConvertError::io(path, e)),
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.payload_path(name).is_some_and(|path| path.is_file())
    }
}

/// Payloads held in memory, keyed by variable name.
#[derive(Debug, Clone, Default)]
pub struct MemoryPayloadSource {
    blobs: HashMap<String, Vec<u8>>,
}

impl MemoryPayloadSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw payload bytes (header included).
    pub fn insert(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.blobs.insert(name.into(), bytes);
    }

    /// Encode `tensor` with a default header and store it.
    pub fn insert_tensor<T: Pod>(&mut self, name: impl Into<String>, tensor: &DenseTensor<T>) {
        self.insert(name, encode_to_vec(tensor));
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl PayloadSource for MemoryPayloadSource {
    fn read(&self, name: &str) -> ConvertResult<Option<Cow<'_, [u8]>>> {
        Ok(self.blobs.get(name).map(|bytes| Cow::Borrowed(bytes.as_slice())))
    }

    fn contains(&self, name: &str) -> bool {
        self.blobs.contains_key(name)
    }
}
