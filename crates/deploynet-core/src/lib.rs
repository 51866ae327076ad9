//! Core types for deploynet: tensors, bindings, configuration, the backend
//! collaborator traits and the float32 output marshaller.

pub mod artifact;
pub mod backend;
pub mod config;
pub mod error;
pub mod library;
pub mod marshal;
pub mod spec;
pub mod state;
pub mod tensor;

pub use artifact::*;
pub use backend::*;
pub use config::*;
pub use error::*;
pub use library::*;
pub use marshal::{InferOutput, MarshalStatus};
pub use spec::*;
pub use state::*;
pub use tensor::*;
