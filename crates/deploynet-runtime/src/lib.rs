//! Engine construction and the inference pipeline: parse, build, bind,
//! execute, extract.

pub mod buffers;
pub mod builder;
pub mod engine;
pub mod runner;

pub use buffers::*;
pub use builder::*;
pub use engine::*;
pub use runner::*;
