//! Host tensor types

pub mod dense;

pub use dense::{element_count, DenseTensor, TensorShape};
