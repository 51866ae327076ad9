//! In-memory backend for exercising the runtime without a device.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, ensure, Result};
use deploynet_core::{
    Backend, BackendCapabilities, Binding, CompiledEngine, DType, DeviceBuffer, ExecutionContext,
    ExecutionStream, GraphBuilder, IOName, ModelFiles, ModelParser, NetworkConfig, NetworkGraph,
    ParserLibrary, TensorSpec,
};
use half::f16;
use tempfile::TempDir;

#[derive(Debug, Default)]
pub struct Counters {
    pub host_to_device: AtomicUsize,
    pub device_to_host: AtomicUsize,
    pub dispatches: AtomicUsize,
    pub streams_created: AtomicUsize,
    pub streams_dropped: AtomicUsize,
    pub contexts_dropped: AtomicUsize,
    pub parses: AtomicUsize,
    pub releases: AtomicUsize,
}

pub fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

/// Failure switches for each acquisition step.
#[derive(Clone, Debug, Default)]
pub struct Faults {
    pub builder: bool,
    pub network: bool,
    pub parser: bool,
    pub parse: bool,
    pub compile: bool,
    pub dispatch: bool,
}

pub struct FakeBackend {
    pub inputs: Vec<TensorSpec>,
    pub tensors: Vec<TensorSpec>,
    pub faults: Faults,
    pub counters: Arc<Counters>,
    library: ParserLibrary,
}

pub fn tensor(name: &str, dtype: DType, dims: &[Option<usize>]) -> TensorSpec {
    TensorSpec {
        name: IOName(name.to_string()),
        dtype,
        dims: dims.to_vec(),
    }
}

impl FakeBackend {
    /// A googlenet-like graph: `data` [1,3,224,224] f32 in, `prob`
    /// [1,1000,1,1] f32 out.
    pub fn googlenet() -> Self {
        Self::new(
            vec![tensor("data", DType::F32, &[Some(1), Some(3), Some(224), Some(224)])],
            vec![tensor("prob", DType::F32, &[Some(1), Some(1000), Some(1), Some(1)])],
        )
    }

    pub fn new(inputs: Vec<TensorSpec>, tensors: Vec<TensorSpec>) -> Self {
        Self {
            inputs,
            tensors,
            faults: Faults::default(),
            counters: Arc::new(Counters::default()),
            library: ParserLibrary::new("fake"),
        }
    }

    pub fn with_faults(mut self, faults: Faults) -> Self {
        self.faults = faults;
        self
    }
}

/// Scratch data directory holding empty model files.
pub fn model_dir() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("googlenet.prototxt"), b"").expect("write topology");
    std::fs::write(dir.path().join("googlenet.caffemodel"), b"").expect("write weights");
    dir
}

pub fn googlenet_config(dir: &TempDir) -> NetworkConfig {
    let mut config = NetworkConfig::new("googlenet.prototxt");
    config.data_dirs = vec![PathBuf::from("/nonexistent"), dir.path().to_path_buf()];
    config.weights_file = Some(PathBuf::from("googlenet.caffemodel"));
    config.input_tensor_names = vec!["data".into()];
    config.output_tensor_names = vec!["prob".into()];
    config.batch_size = 4;
    config.accelerator_core = Some(-1);
    config
}

impl Backend for FakeBackend {
    type Graph = FakeGraph;
    type Engine = FakeEngine;
    type Builder = FakeBuilder;
    type Parser = FakeParser;

    fn name(&self) -> &'static str {
        "fake"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            native_streams: true,
            accelerator_cores: true,
            reduced_precision: true,
        }
    }

    fn create_builder(&self) -> Result<FakeBuilder> {
        ensure!(!self.faults.builder, "no builder");
        Ok(FakeBuilder {
            settings: Settings::default(),
            faults: self.faults.clone(),
            counters: Arc::clone(&self.counters),
        })
    }

    fn create_parser(&self) -> Result<FakeParser> {
        ensure!(!self.faults.parser, "no parser");
        Ok(FakeParser {
            inputs: self.inputs.clone(),
            tensors: self.tensors.clone(),
            fail: self.faults.parse,
            counters: Arc::clone(&self.counters),
        })
    }

    fn parser_library(&self) -> &ParserLibrary {
        &self.library
    }

    fn release_parser_library(&self) {
        bump(&self.counters.releases);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Settings {
    pub max_batch: usize,
    pub workspace: usize,
    pub fp16: bool,
    pub int8: bool,
    pub core: Option<u32>,
}

pub struct FakeBuilder {
    settings: Settings,
    faults: Faults,
    counters: Arc<Counters>,
}

impl GraphBuilder for FakeBuilder {
    type Graph = FakeGraph;
    type Engine = FakeEngine;

    fn create_network(&mut self) -> Result<FakeGraph> {
        ensure!(!self.faults.network, "no network");
        Ok(FakeGraph::default())
    }

    fn set_max_batch_size(&mut self, batch: usize) {
        self.settings.max_batch = batch;
    }

    fn set_max_workspace_size(&mut self, bytes: usize) {
        self.settings.workspace = bytes;
    }

    fn set_fp16_mode(&mut self, enabled: bool) {
        self.settings.fp16 = enabled;
    }

    fn set_int8_mode(&mut self, enabled: bool) {
        self.settings.int8 = enabled;
    }

    fn set_accelerator_core(&mut self, core: Option<u32>) {
        self.settings.core = core;
    }

    fn build_engine(&mut self, network: &FakeGraph) -> Result<FakeEngine> {
        ensure!(!self.faults.compile, "compilation failed");
        let batch = self.settings.max_batch;
        let mut bindings = Vec::new();
        let io = network
            .inputs
            .iter()
            .map(|t| (t, true))
            .chain(network.marked.iter().map(|t| (t, false)));
        for (spec, is_input) in io {
            let Some(dims) = spec.resolve_dims(batch) else {
                bail!("dynamic dimension in `{}`", spec.name);
            };
            bindings.push(Binding {
                name: spec.name.clone(),
                index: bindings.len(),
                dims,
                dtype: spec.dtype,
                is_input,
            });
        }
        Ok(FakeEngine {
            bindings,
            settings: self.settings.clone(),
            fail_dispatch: self.faults.dispatch,
            counters: Arc::clone(&self.counters),
        })
    }
}

#[derive(Default)]
pub struct FakeGraph {
    inputs: Vec<TensorSpec>,
    tensors: Vec<TensorSpec>,
    marked: Vec<TensorSpec>,
}

impl NetworkGraph for FakeGraph {
    fn inputs(&self) -> Vec<TensorSpec> {
        self.inputs.clone()
    }

    fn outputs(&self) -> Vec<TensorSpec> {
        self.marked.clone()
    }

    fn mark_output(&mut self, name: &str) -> bool {
        match self.tensors.iter().find(|t| t.name.0 == name) {
            Some(t) => {
                self.marked.push(t.clone());
                true
            }
            None => false,
        }
    }
}

pub struct FakeParser {
    inputs: Vec<TensorSpec>,
    tensors: Vec<TensorSpec>,
    fail: bool,
    counters: Arc<Counters>,
}

impl ModelParser for FakeParser {
    type Graph = FakeGraph;

    fn parse(&mut self, files: &ModelFiles, network: &mut FakeGraph) -> Result<()> {
        bump(&self.counters.parses);
        ensure!(!self.fail, "malformed {}", files.topology.display());
        ensure!(files.topology.is_file(), "topology not resolved");
        network.inputs = self.inputs.clone();
        network.tensors = self.tensors.clone();
        Ok(())
    }
}

#[derive(Debug)]
pub struct FakeEngine {
    pub bindings: Vec<Binding>,
    pub settings: Settings,
    fail_dispatch: bool,
    counters: Arc<Counters>,
}

impl CompiledEngine for FakeEngine {
    type Buffer = FakeBuffer;
    type Context = FakeContext;

    fn num_bindings(&self) -> usize {
        self.bindings.len()
    }

    fn binding(&self, index: usize) -> Option<Binding> {
        self.bindings.get(index).cloned()
    }

    fn binding_index(&self, name: &str) -> Option<usize> {
        self.bindings.iter().position(|b| b.name.0 == name)
    }

    fn max_batch_size(&self) -> usize {
        self.settings.max_batch
    }

    fn allocate(&self, bytes: usize) -> Result<FakeBuffer> {
        Ok(FakeBuffer {
            bytes: vec![0; bytes],
            counters: Arc::clone(&self.counters),
        })
    }

    fn create_execution_context(self: Arc<Self>) -> Result<FakeContext> {
        Ok(FakeContext { engine: self })
    }
}

pub struct FakeBuffer {
    bytes: Vec<u8>,
    counters: Arc<Counters>,
}

impl DeviceBuffer for FakeBuffer {
    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn copy_from_host(&mut self, src: &[u8]) -> Result<()> {
        ensure!(src.len() == self.bytes.len(), "size mismatch");
        bump(&self.counters.host_to_device);
        self.bytes.copy_from_slice(src);
        Ok(())
    }

    fn copy_to_host(&self, dst: &mut [u8]) -> Result<()> {
        ensure!(dst.len() == self.bytes.len(), "size mismatch");
        bump(&self.counters.device_to_host);
        dst.copy_from_slice(&self.bytes);
        Ok(())
    }
}

/// Value the fake kernel writes at element `k` of every output.
pub fn pattern(k: usize) -> f32 {
    (k % 7) as f32 - 3.0
}

pub struct FakeContext {
    engine: Arc<FakeEngine>,
}

impl FakeContext {
    /// Writes the sum of the first input into element 0 of every output and
    /// `pattern(k)` everywhere else.
    fn run_kernel(&self, bindings: &mut [FakeBuffer]) -> Result<()> {
        bump(&self.engine.counters.dispatches);
        ensure!(!self.engine.fail_dispatch, "device dispatch failed");

        let input_sum: f32 = self
            .engine
            .bindings
            .iter()
            .find(|b| b.is_input && b.dtype == DType::F32)
            .map(|b| {
                bindings[b.index]
                    .bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .sum::<f32>()
            })
            .unwrap_or(0.0);

        for binding in self.engine.bindings.iter().filter(|b| !b.is_input) {
            let buf = &mut bindings[binding.index].bytes;
            let size = binding.dtype.size();
            for (k, chunk) in buf.chunks_exact_mut(size).enumerate() {
                let v = if k == 0 { input_sum } else { pattern(k) };
                match binding.dtype {
                    DType::F32 => chunk.copy_from_slice(&v.to_le_bytes()),
                    DType::F16 => chunk.copy_from_slice(&f16::from_f32(v).to_le_bytes()),
                    DType::I8 => chunk[0] = v as i8 as u8,
                    DType::I32 => chunk.copy_from_slice(&(v as i32).to_le_bytes()),
                    DType::I64 => chunk.copy_from_slice(&(v as i64).to_le_bytes()),
                    DType::U8 => chunk[0] = v as u8,
                }
            }
        }
        Ok(())
    }
}

impl Drop for FakeContext {
    fn drop(&mut self) {
        bump(&self.engine.counters.contexts_dropped);
    }
}

impl ExecutionContext for FakeContext {
    type Buffer = FakeBuffer;
    type Stream = FakeStream;

    fn execute(&mut self, _batch_size: usize, bindings: &mut [FakeBuffer]) -> Result<()> {
        self.run_kernel(bindings)
    }

    fn create_stream(&self) -> Result<FakeStream> {
        bump(&self.engine.counters.streams_created);
        Ok(FakeStream {
            counters: Arc::clone(&self.engine.counters),
        })
    }

    fn enqueue(
        &mut self,
        _batch_size: usize,
        bindings: &mut [FakeBuffer],
        _stream: &mut FakeStream,
    ) -> Result<()> {
        self.run_kernel(bindings)
    }
}

pub struct FakeStream {
    counters: Arc<Counters>,
}

impl ExecutionStream for FakeStream {
    fn synchronize(&mut self) -> Result<()> {
        Ok(())
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        bump(&self.counters.streams_dropped);
    }
}
