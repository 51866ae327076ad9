use std::sync::Arc;

use anyhow::Result;

use crate::{Binding, ModelFiles, ParserLibrary, TensorSpec};

#[derive(Clone, Copy, Debug)]
pub struct BackendCapabilities {
    pub native_streams: bool,
    pub accelerator_cores: bool,
    pub reduced_precision: bool,
}

/// Entry point of an execution backend: hands out the builder and parser
/// collaborators and owns the process-wide parser library state.
pub trait Backend: Send + Sync + 'static {
    type Graph: NetworkGraph;
    type Engine: CompiledEngine;
    type Builder: GraphBuilder<Graph = Self::Graph, Engine = Self::Engine>;
    type Parser: ModelParser<Graph = Self::Graph>;

    fn name(&self) -> &'static str;
    fn capabilities(&self) -> BackendCapabilities;
    fn create_builder(&self) -> Result<Self::Builder>;
    fn create_parser(&self) -> Result<Self::Parser>;
    fn parser_library(&self) -> &ParserLibrary;

    /// Frees process-wide parser resources. Only ever invoked through
    /// [`ParserLibrary::shutdown`].
    fn release_parser_library(&self);
}

pub trait GraphBuilder {
    type Graph: NetworkGraph;
    type Engine: CompiledEngine;

    fn create_network(&mut self) -> Result<Self::Graph>;
    fn set_max_batch_size(&mut self, batch: usize);
    fn set_max_workspace_size(&mut self, bytes: usize);
    fn set_fp16_mode(&mut self, enabled: bool);
    fn set_int8_mode(&mut self, enabled: bool);
    /// Runs supported layers on the given hardware sub-engine, falling back
    /// to the main device for the rest. `None` disables sub-engine placement.
    fn set_accelerator_core(&mut self, core: Option<u32>);
    fn build_engine(&mut self, network: &Self::Graph) -> Result<Self::Engine>;
}

pub trait NetworkGraph {
    /// Graph inputs discovered by the parser, in graph order.
    fn inputs(&self) -> Vec<TensorSpec>;
    /// Tensors currently marked as engine outputs.
    fn outputs(&self) -> Vec<TensorSpec>;
    /// Marks `name` as an engine output. Returns `false` if the graph has no
    /// tensor of that name.
    fn mark_output(&mut self, name: &str) -> bool;
}

pub trait ModelParser {
    type Graph: NetworkGraph;

    fn parse(&mut self, files: &ModelFiles, network: &mut Self::Graph) -> Result<()>;
}

/// Compiled execution plan. Read-only once built and shared through `Arc`.
pub trait CompiledEngine: Send + Sync + 'static {
    type Buffer: DeviceBuffer;
    type Context: ExecutionContext<Buffer = Self::Buffer>;

    fn num_bindings(&self) -> usize;
    fn binding(&self, index: usize) -> Option<Binding>;
    fn binding_index(&self, name: &str) -> Option<usize>;
    fn max_batch_size(&self) -> usize;
    fn allocate(&self, bytes: usize) -> Result<Self::Buffer>;

    /// The context holds its own reference so it can never outlive the engine.
    fn create_execution_context(self: Arc<Self>) -> Result<Self::Context>;
}

pub trait ExecutionContext {
    type Buffer: DeviceBuffer;
    type Stream: ExecutionStream;

    /// Blocking dispatch.
    fn execute(&mut self, batch_size: usize, bindings: &mut [Self::Buffer]) -> Result<()>;

    fn create_stream(&self) -> Result<Self::Stream>;

    /// Dispatch ordered on `stream`. Results are only valid after
    /// [`ExecutionStream::synchronize`].
    fn enqueue(
        &mut self,
        batch_size: usize,
        bindings: &mut [Self::Buffer],
        stream: &mut Self::Stream,
    ) -> Result<()>;
}

/// Ordered device execution queue. Destroyed on drop.
pub trait ExecutionStream {
    fn synchronize(&mut self) -> Result<()>;
}

pub trait DeviceBuffer: Send {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn copy_from_host(&mut self, src: &[u8]) -> Result<()>;
    fn copy_to_host(&self, dst: &mut [u8]) -> Result<()>;
}
