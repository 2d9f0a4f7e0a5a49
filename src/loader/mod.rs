//! Tensor payload loading

pub mod header;
pub mod payload;
pub mod store;

pub use header::{PayloadHeader, TENSOR_VERSION};
pub use payload::{
    decode_elements, decode_or_default, decode_payload, encode_payload, encode_to_vec,
    load_payload,
};
pub use store::{DirectoryPayloadSource, MemoryPayloadSource, PayloadSource};
