//! Conversion of raw host buffers into canonical float32 tensors.
//!
//! The element type comes from the engine binding, never from the
//! configuration: an engine built with reduced precision may report float16
//! or int8 outputs even when the network was declared in float32.

use half::f16;

use crate::{Binding, DType, TensorBuffer};

/// How an output tensor was produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarshalStatus {
    Converted { source: DType },
    /// The element type has no float32 conversion; the tensor has the right
    /// shape but is zero-filled.
    Unsupported { source: DType },
    /// The declared output has no engine binding; the tensor is empty.
    Missing,
}

impl MarshalStatus {
    pub fn is_degraded(self) -> bool {
        !matches!(self, MarshalStatus::Converted { .. })
    }
}

#[derive(Clone, Debug)]
pub struct InferOutput {
    pub name: String,
    pub tensor: TensorBuffer,
    pub status: MarshalStatus,
}

impl InferOutput {
    pub fn missing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tensor: TensorBuffer::default(),
            status: MarshalStatus::Missing,
        }
    }
}

type Widen = fn(&[u8]) -> f32;

fn conversion(dtype: DType) -> Option<(usize, Widen)> {
    let widen: Widen = match dtype {
        DType::F32 => |b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]),
        DType::F16 => |b| f16::from_le_bytes([b[0], b[1]]).to_f32(),
        DType::I8 => |b| b[0] as i8 as f32,
        DType::I32 => |b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32,
        DType::I64 | DType::U8 => return None,
    };
    Some((dtype.size(), widen))
}

/// Builds a float32 tensor from the host buffer of `binding`.
///
/// # Panics
///
/// Panics if `host` is not exactly `instance_count * instance_elements`
/// elements of the binding's element type.
pub fn extract(host: &[u8], binding: &Binding) -> InferOutput {
    let mut tensor = TensorBuffer::zeros(binding.dims.to_nchw());
    let name = binding.name.0.clone();

    let Some((elem_size, widen)) = conversion(binding.dtype) else {
        tracing::warn!(
            tensor = %name,
            dtype = %binding.dtype,
            "unsupported element type, returning zero-filled tensor"
        );
        return InferOutput {
            name,
            tensor,
            status: MarshalStatus::Unsupported {
                source: binding.dtype,
            },
        };
    };

    let inst_elems = tensor.instance_elements();
    let inst_bytes = inst_elems * elem_size;
    assert_eq!(
        host.len(),
        tensor.instance_count() * inst_bytes,
        "host buffer for `{name}` does not match binding {} ({})",
        binding.dims,
        binding.dtype
    );

    tracing::debug!(tensor = %name, dtype = %binding.dtype, "extracting output");
    for i in 0..tensor.instance_count() {
        let src = &host[i * inst_bytes..(i + 1) * inst_bytes];
        for (dst, raw) in tensor
            .instance_mut(i)
            .iter_mut()
            .zip(src.chunks_exact(elem_size))
        {
            *dst = widen(raw);
        }
    }

    InferOutput {
        name,
        tensor,
        status: MarshalStatus::Converted {
            source: binding.dtype,
        },
    }
}
