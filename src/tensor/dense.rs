//! Dense host tensors for weights and constants

use bytemuck::Pod;

use crate::error::FormatError;

/// Stable tensor shape with stride computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorShape {
    dims: Vec<usize>,
    strides: Vec<usize>,
    total: usize,
}

impl TensorShape {
    /// Create tensor shape from dimensions, computing row-major strides.
    ///
    /// Fails with [`FormatError::ShapeOverflow`] when the element count does
    /// not fit in `usize`.
    pub fn from_dims(dims: &[usize]) -> Result<Self, FormatError> {
        let total = element_count(dims).ok_or_else(|| FormatError::ShapeOverflow {
            shape: dims.to_vec(),
        })?;
        Ok(Self::with_total(dims.to_vec(), total))
    }

    // Strides can only overflow at or after a zero dimension. They saturate,
    // and `get` rejects the index at that zero axis before using them.
    fn with_total(dims: Vec<usize>, total: usize) -> Self {
        let mut strides = vec![1usize; dims.len()];
        for i in (0..dims.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1].saturating_mul(dims[i + 1]);
        }
        Self {
            dims,
            strides,
            total,
        }
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Total number of elements (1 for a scalar shape)
    pub fn total_elements(&self) -> usize {
        self.total
    }
}

/// Product of `dims`, `None` on overflow
pub fn element_count(dims: &[usize]) -> Option<usize> {
    dims.iter().try_fold(1usize, |acc, &x| acc.checked_mul(x))
}

/// Row-major tensor owning its elements.
///
/// The element count always equals the product of the shape; constructors
/// enforce it.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseTensor<T> {
    shape: TensorShape,
    data: Vec<T>,
}

impl<T: Pod> DenseTensor<T> {
    pub fn from_vec(dims: &[usize], data: Vec<T>) -> Result<Self, FormatError> {
        let shape = TensorShape::from_dims(dims)?;
        let expected = shape.total_elements();
        if data.len() != expected {
            return Err(FormatError::ShapeMismatch {
                shape: dims.to_vec(),
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// All-zero tensor of shape `dims`.
    ///
    /// A shape whose byte size cannot be allocated is a
    /// [`FormatError::ShapeOverflow`], not an abort.
    pub fn zeros(dims: &[usize]) -> Result<Self, FormatError> {
        let shape = TensorShape::from_dims(dims)?;
        let n = shape.total_elements();
        let mut data = Vec::new();
        data.try_reserve_exact(n)
            .map_err(|_| FormatError::ShapeOverflow { shape: dims.to_vec() })?;
        data.resize(n, T::zeroed());
        Ok(Self { shape, data })
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn shape(&self) -> &TensorShape {
        &self.shape
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Element at a multi-dimensional index, `None` when out of bounds.
    pub fn get(&self, index: &[usize]) -> Option<T> {
        if index.len() != self.shape.rank() {
            return None;
        }
        let mut offset = 0;
        for ((&i, &dim), &stride) in index
            .iter()
            .zip(self.shape.dims())
            .zip(self.shape.strides())
        {
            if i >= dim {
                return None;
            }
            offset += i * stride;
        }
        self.data.get(offset).copied()
    }

    /// Transpose that swaps axes 0 and 1, keeping the rest in place.
    ///
    /// `[A, B, ...]` becomes `[B, A, ...]`. Tensors of rank < 2 are returned
    /// unchanged.
    pub fn swap_leading_axes(&self) -> Self {
        let dims = self.shape.dims();
        if dims.len() < 2 {
            return self.clone();
        }

        let (a, b) = (dims[0], dims[1]);
        let inner: usize = dims[2..].iter().product();
        let mut data = Vec::with_capacity(self.data.len());
        for j in 0..b {
            for i in 0..a {
                let start = (i * b + j) * inner;
                data.extend_from_slice(&self.data[start..start + inner]);
            }
        }

        let mut swapped = dims.to_vec();
        swapped.swap(0, 1);
        Self {
            shape: TensorShape::with_total(swapped, self.shape.total_elements()),
            data,
        }
    }
}
