use std::fmt;

use crate::{DType, Dims};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IOName(pub String);

impl fmt::Display for IOName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A tensor of a parsed network graph.
#[derive(Clone, Debug)]
pub struct TensorSpec {
    pub name: IOName,
    pub dtype: DType,
    pub dims: Vec<Option<usize>>, // None = dynamic
}

impl TensorSpec {
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Resolves the graph dims into concrete binding dims. A dynamic leading
    /// dimension takes `batch`; any other dynamic dimension yields `None`.
    pub fn resolve_dims(&self, batch: usize) -> Option<Dims> {
        let mut out = Dims::default();
        for (i, d) in self.dims.iter().enumerate() {
            match (i, d) {
                (_, Some(d)) => out.0.push(*d),
                (0, None) => out.0.push(batch),
                (_, None) => return None,
            }
        }
        Some(out)
    }
}

impl fmt::Display for TensorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [", self.name)?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                f.write_str("x")?;
            }
            match d {
                Some(d) => write!(f, "{d}")?,
                None => f.write_str("?")?,
            }
        }
        write!(f, "] {}", self.dtype)
    }
}

/// Engine metadata for one named tensor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    pub name: IOName,
    pub index: usize,
    pub dims: Dims,
    pub dtype: DType,
    pub is_input: bool,
}

impl Binding {
    pub fn volume(&self) -> usize {
        self.dims.numel()
    }

    pub fn byte_size(&self) -> usize {
        self.volume() * self.dtype.size()
    }
}
