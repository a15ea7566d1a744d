use std::fmt;
use std::sync::Arc;

use crate::environment::BufferLedger;
use crate::{DType, Result, StrandError};

#[derive(Debug)]
pub enum TensorData {
    I64(Vec<i64>),
    F32(Vec<f32>),
}

impl TensorData {
    fn len(&self) -> usize {
        match self {
            TensorData::I64(v) => v.len(),
            TensorData::F32(v) => v.len(),
        }
    }

    fn dtype(&self) -> DType {
        match self {
            TensorData::I64(_) => DType::I64,
            TensorData::F32(_) => DType::F32,
        }
    }
}

/// A shaped, contiguous host buffer allocated through an [`Environment`].
///
/// Buffers are move-only. Whoever holds the value owns it; the buffer is
/// released exactly once, when it is dropped or passed to [`release`].
///
/// [`Environment`]: crate::Environment
/// [`release`]: TensorBuffer::release
pub struct TensorBuffer {
    data: TensorData,
    shape: Vec<usize>,
    ledger: Arc<BufferLedger>,
}

impl TensorBuffer {
    pub(crate) fn new(data: TensorData, shape: &[usize], ledger: Arc<BufferLedger>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(StrandError::ShapeMismatch {
                expected: shape.to_vec(),
                got: vec![data.len()],
            });
        }
        ledger.record_allocation();
        Ok(Self {
            data,
            shape: shape.to_vec(),
            ledger,
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn size_bytes(&self) -> usize {
        self.numel() * self.dtype().size_in_bytes()
    }

    pub fn as_i64(&self) -> Result<&[i64]> {
        match &self.data {
            TensorData::I64(v) => Ok(v),
            other => Err(StrandError::UnsupportedDtype(other.dtype())),
        }
    }

    pub fn as_f32(&self) -> Result<&[f32]> {
        match &self.data {
            TensorData::F32(v) => Ok(v),
            other => Err(StrandError::UnsupportedDtype(other.dtype())),
        }
    }

    pub fn as_f32_mut(&mut self) -> Result<&mut [f32]> {
        match &mut self.data {
            TensorData::F32(v) => Ok(v),
            other => Err(StrandError::UnsupportedDtype(other.dtype())),
        }
    }

    /// Check the buffer against an expected shape.
    pub fn expect_shape(&self, expected: &[usize]) -> Result<()> {
        if self.shape != expected {
            return Err(StrandError::ShapeMismatch {
                expected: expected.to_vec(),
                got: self.shape.clone(),
            });
        }
        Ok(())
    }

    /// Release the buffer now instead of at the end of the owning scope.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for TensorBuffer {
    fn drop(&mut self) {
        self.ledger.record_release();
    }
}

impl fmt::Debug for TensorBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TensorBuffer")
            .field("dtype", &self.dtype())
            .field("shape", &self.shape)
            .finish()
    }
}
