use anyhow::{bail, ensure, Context, Result};
use deploynet_core::{Binding, DType, IOName, TensorSpec};
use half::f16;
use ort::{
    tensor::TensorElementType,
    value::{DynValue, ValueRef, ValueType},
};

pub(crate) fn tensor_spec_from_value_type(name: &str, value_type: &ValueType) -> Result<TensorSpec> {
    let ValueType::Tensor { ty, shape, .. } = value_type else {
        bail!("unsupported non-tensor IO value type for `{name}`");
    };

    let dtype = ort_tensor_element_to_dtype(*ty)?;
    let dims = shape
        .iter()
        .map(|d| if *d < 0 { None } else { Some(*d as usize) })
        .collect::<Vec<_>>();

    Ok(TensorSpec {
        name: IOName(name.to_string()),
        dtype,
        dims,
    })
}

pub(crate) fn ort_tensor_element_to_dtype(ty: TensorElementType) -> Result<DType> {
    match ty {
        TensorElementType::Float32 => Ok(DType::F32),
        TensorElementType::Float16 => Ok(DType::F16),
        TensorElementType::Int8 => Ok(DType::I8),
        TensorElementType::Int32 => Ok(DType::I32),
        TensorElementType::Int64 => Ok(DType::I64),
        TensorElementType::Uint8 => Ok(DType::U8),
        _ => bail!("unsupported tensor element type: {ty}"),
    }
}

/// Wraps a staged input buffer into an ORT value shaped like its binding.
pub(crate) fn host_to_ort_value(binding: &Binding, bytes: &[u8]) -> Result<DynValue> {
    ensure!(
        bytes.len() == binding.byte_size(),
        "input byte size mismatch for `{}`: got {}, expected {}",
        binding.name,
        bytes.len(),
        binding.byte_size()
    );
    let shape: Vec<usize> = binding.dims.as_slice().to_vec();

    let value = match binding.dtype {
        DType::F32 => ort::value::Tensor::from_array((shape, bytes_to_f32(bytes)))?.into_dyn(),
        DType::F16 => ort::value::Tensor::from_array((shape, bytes_to_f16(bytes)))?.into_dyn(),
        DType::I8 => {
            let data: Vec<i8> = bytes.iter().map(|b| *b as i8).collect();
            ort::value::Tensor::from_array((shape, data))?.into_dyn()
        }
        DType::I32 => ort::value::Tensor::from_array((shape, bytes_to_i32(bytes)))?.into_dyn(),
        DType::I64 => ort::value::Tensor::from_array((shape, bytes_to_i64(bytes)))?.into_dyn(),
        DType::U8 => ort::value::Tensor::from_array((shape, bytes.to_vec()))?.into_dyn(),
    };

    Ok(value)
}

/// Writes the raw elements of an ORT output into the binding's buffer.
pub(crate) fn ort_value_to_host(
    value: &ValueRef<'_>,
    binding: &Binding,
    dst: &mut [u8],
) -> Result<()> {
    match binding.dtype {
        DType::F32 => {
            let array = value.try_extract_array::<f32>()?;
            write_slice(array.as_slice().context("non-contiguous output tensor")?, dst)
        }
        DType::F16 => {
            let array = value.try_extract_array::<f16>()?;
            write_slice(array.as_slice().context("non-contiguous output tensor")?, dst)
        }
        DType::I8 => {
            let array = value.try_extract_array::<i8>()?;
            write_slice(array.as_slice().context("non-contiguous output tensor")?, dst)
        }
        DType::I32 => {
            let array = value.try_extract_array::<i32>()?;
            write_slice(array.as_slice().context("non-contiguous output tensor")?, dst)
        }
        DType::I64 => {
            let array = value.try_extract_array::<i64>()?;
            write_slice(array.as_slice().context("non-contiguous output tensor")?, dst)
        }
        DType::U8 => {
            let array = value.try_extract_array::<u8>()?;
            write_slice(array.as_slice().context("non-contiguous output tensor")?, dst)
        }
    }
    .with_context(|| format!("failed to read output `{}`", binding.name))
}

fn write_slice<T: bytemuck::Pod>(slice: &[T], dst: &mut [u8]) -> Result<()> {
    let src: &[u8] = bytemuck::cast_slice(slice);
    ensure!(
        src.len() == dst.len(),
        "output byte size mismatch: got {}, expected {}",
        src.len(),
        dst.len()
    );
    dst.copy_from_slice(src);
    Ok(())
}

fn bytes_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn bytes_to_f16(bytes: &[u8]) -> Vec<f16> {
    bytes
        .chunks_exact(2)
        .map(|b| f16::from_le_bytes([b[0], b[1]]))
        .collect()
}

fn bytes_to_i32(bytes: &[u8]) -> Vec<i32> {
    bytes
        .chunks_exact(4)
        .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn bytes_to_i64(bytes: &[u8]) -> Vec<i64> {
    bytes
        .chunks_exact(8)
        .map(|b| i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
        .collect()
}
