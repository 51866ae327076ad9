use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::ShapeError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Cuda { device_id: u32 },
    TensorRt { device_id: u32 },
}

/// Element type of a binding, as reported by the compiled engine at runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    F32,
    F16,
    I8,
    I32,
    I64,
    U8,
}

impl DType {
    pub const fn size(self) -> usize {
        match self {
            DType::F32 | DType::I32 => 4,
            DType::F16 => 2,
            DType::I8 | DType::U8 => 1,
            DType::I64 => 8,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            DType::F32 => "float32",
            DType::F16 => "float16",
            DType::I8 => "int8",
            DType::I32 => "int32",
            DType::I64 => "int64",
            DType::U8 => "uint8",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concrete dimensions of a binding, batch dimension first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Dims(pub SmallVec<[usize; 6]>);

impl Dims {
    pub fn from_slice(d: &[usize]) -> Self {
        Self(d.iter().copied().collect())
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    pub fn numel(&self) -> usize {
        self.0.iter().product()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Maps the dims onto `[n, c, h, w]`.
    ///
    /// Lower ranks are padded with trailing ones; higher ranks fold every
    /// dimension past the fourth into `w`.
    pub fn to_nchw(&self) -> [usize; 4] {
        let mut out = [1usize; 4];
        for (i, d) in self.0.iter().enumerate() {
            if i < 4 {
                out[i] = *d;
            } else {
                out[3] *= *d;
            }
        }
        out
    }
}

impl fmt::Display for Dims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("x")?;
            }
            write!(f, "{d}")?;
        }
        Ok(())
    }
}

/// Dense float32 tensor of shape `[n, c, h, w]`.
///
/// Instances (entries along `n`) are stored back to back, each one
/// `c * h * w` elements long. The shape is fixed at construction.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TensorBuffer {
    shape: [usize; 4],
    data: Vec<f32>,
}

impl TensorBuffer {
    /// Zero-filled tensor.
    pub fn new(n: usize, c: usize, h: usize, w: usize) -> Self {
        Self::zeros([n, c, h, w])
    }

    pub fn zeros(shape: [usize; 4]) -> Self {
        let len = shape.iter().product();
        Self {
            shape,
            data: vec![0.0; len],
        }
    }

    pub fn from_vec(shape: [usize; 4], data: Vec<f32>) -> Result<Self, ShapeError> {
        let expected = shape.iter().product::<usize>();
        if data.len() != expected {
            return Err(ShapeError {
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }

    pub fn total_elements(&self) -> usize {
        self.data.len()
    }

    pub fn instance_elements(&self) -> usize {
        self.shape[1] * self.shape[2] * self.shape[3]
    }

    pub fn instance_count(&self) -> usize {
        self.shape[0]
    }

    pub fn byte_len(&self) -> usize {
        std::mem::size_of_val(self.data.as_slice())
    }

    /// # Panics
    ///
    /// Panics if `i >= self.instance_count()`.
    pub fn instance(&self, i: usize) -> &[f32] {
        let range = self.instance_range(i);
        &self.data[range]
    }

    /// # Panics
    ///
    /// Panics if `i >= self.instance_count()`.
    pub fn instance_mut(&mut self, i: usize) -> &mut [f32] {
        let range = self.instance_range(i);
        &mut self.data[range]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    fn instance_range(&self, i: usize) -> std::ops::Range<usize> {
        assert!(
            i < self.instance_count(),
            "instance {i} out of range for batch of {}",
            self.instance_count()
        );
        let len = self.instance_elements();
        i * len..(i + 1) * len
    }
}
