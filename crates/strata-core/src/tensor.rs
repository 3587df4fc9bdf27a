//! Minimal dense tensor
//!
//! Just enough container for dispatch: a contiguous row-major `f32` buffer,
//! a shape and the backend the data lives on. Memory layout beyond that
//! belongs to the kernel layer.

use crate::error::{Error, Result};
use strata_backends::{BackendType, DType, OperationProperties};

/// Dense row-major `f32` tensor tagged with its backend
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: Vec<f32>,
    shape: Vec<usize>,
    backend: BackendType,
    /// Placed with [`Tensor::to`]; operations honour the placement
    pinned: bool,
}

impl Tensor {
    /// Wrap `data` with `shape` on the CPU
    ///
    /// Fails when the shape does not describe exactly `data.len()` elements.
    pub fn new(data: Vec<f32>, shape: Vec<usize>) -> Result<Self> {
        let numel = shape
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
            .ok_or_else(|| Error::invalid_shape(format!("shape {shape:?} overflows")))?;
        if numel != data.len() {
            return Err(Error::invalid_shape(format!(
                "shape {shape:?} needs {numel} elements, got {}",
                data.len()
            )));
        }
        Ok(Self {
            data,
            shape,
            backend: BackendType::Cpu,
            pinned: false,
        })
    }

    /// One-dimensional tensor
    pub fn from_vec(data: Vec<f32>) -> Self {
        let len = data.len();
        Self {
            data,
            shape: vec![len],
            backend: BackendType::Cpu,
            pinned: false,
        }
    }

    pub fn scalar(value: f32) -> Self {
        Self {
            data: vec![value],
            shape: Vec::new(),
            backend: BackendType::Cpu,
            pinned: false,
        }
    }

    pub fn zeros(shape: Vec<usize>) -> Result<Self> {
        let numel = shape
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
            .ok_or_else(|| Error::invalid_shape(format!("shape {shape:?} overflows")))?;
        Self::new(vec![0.0; numel], shape)
    }

    /// Same data placed explicitly on `backend`
    ///
    /// Explicit placement overrides the selection heuristic for every
    /// operation that takes this tensor as input.
    pub fn to(mut self, backend: BackendType) -> Self {
        self.backend = backend;
        self.pinned = true;
        self
    }

    pub(crate) fn placed(mut self, backend: BackendType, pinned: bool) -> Self {
        self.backend = backend;
        self.pinned = pinned;
        self
    }

    pub fn backend(&self) -> BackendType {
        self.backend
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// Selection input describing this tensor
    pub fn properties(&self) -> Result<OperationProperties> {
        Ok(OperationProperties::new(dims_u32(&self.shape)?, DType::F32)?)
    }
}

/// Narrow a shape to the `u32` extents used by operation properties
pub(crate) fn dims_u32(shape: &[usize]) -> Result<Vec<u32>> {
    shape
        .iter()
        .map(|&dim| u32::try_from(dim).map_err(|_| Error::invalid_shape(format!("dimension {dim} exceeds u32"))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn shape_must_match_data() {
        assert!(Tensor::new(vec![1.0; 6], vec![2, 3]).is_ok());
        assert!(matches!(
            Tensor::new(vec![1.0; 5], vec![2, 3]),
            Err(Error::InvalidShape(_))
        ));
    }

    #[test]
    fn scalar_and_vector_shapes() {
        let s = Tensor::scalar(2.0);
        assert_eq!(s.ndim(), 0);
        assert_eq!(s.numel(), 1);
        assert_eq!(s.properties().unwrap().element_count(), 1);

        let v = Tensor::from_vec(vec![1.0, 2.0, 3.0]);
        assert_eq!(v.shape(), &[3]);
    }

    #[test]
    fn explicit_placement_pins() {
        let t = Tensor::zeros(vec![2, 2]).unwrap();
        assert_eq!(t.backend(), BackendType::Cpu);
        assert!(!t.is_pinned());

        let g = t.to(BackendType::Gpu);
        assert_eq!(g.backend(), BackendType::Gpu);
        assert!(g.is_pinned());
    }

    proptest! {
        #[test]
        fn properties_count_every_element(shape in proptest::collection::vec(1usize..6, 0..4)) {
            let t = Tensor::zeros(shape.clone()).unwrap();
            let props = t.properties().unwrap();
            prop_assert_eq!(props.element_count(), t.numel() as u64);
            prop_assert_eq!(props.shape().len(), shape.len());
        }
    }
}
