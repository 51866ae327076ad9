//! ONNX Runtime implementation of the deploynet backend traits.
//!
//! The topology file is an `.onnx` model; ONNX embeds its weights, so a
//! configured weights file is ignored. Execution providers are chosen from
//! the [`Device`]: CPU always, CUDA and TensorRT behind the `cuda` and
//! `tensorrt` cargo features.

mod convert;
mod engine;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use deploynet_core::{
    Backend, BackendCapabilities, Binding, Device, GraphBuilder, ModelFiles, ModelParser,
    NetworkGraph, ParserLibrary, TensorSpec,
};
use ort::session::{
    builder::{GraphOptimizationLevel, SessionBuilder},
    Session,
};
use tracing::{debug, info, warn};

pub use engine::{HostBuffer, OrtContext, OrtEngine, OrtStream};

use crate::convert::tensor_spec_from_value_type;

/// The ORT environment is global to the process, so its parser state is too.
static ONNX_PARSER: ParserLibrary = ParserLibrary::new("onnx");

#[derive(Clone, Debug)]
pub struct OrtBackend {
    device: Device,
}

impl OrtBackend {
    pub fn new(device: Device) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}

impl Default for OrtBackend {
    fn default() -> Self {
        Self::new(Device::Cpu)
    }
}

impl Backend for OrtBackend {
    type Graph = OrtNetwork;
    type Engine = OrtEngine;
    type Builder = OrtGraphBuilder;
    type Parser = OrtParser;

    fn name(&self) -> &'static str {
        "onnxruntime"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            native_streams: false,
            accelerator_cores: matches!(self.device, Device::TensorRt { .. }),
            reduced_precision: matches!(self.device, Device::TensorRt { .. }),
        }
    }

    fn create_builder(&self) -> Result<Self::Builder> {
        Ok(OrtGraphBuilder::new(self.device.clone()))
    }

    fn create_parser(&self) -> Result<Self::Parser> {
        Ok(OrtParser)
    }

    fn parser_library(&self) -> &ParserLibrary {
        &ONNX_PARSER
    }

    fn release_parser_library(&self) {
        // ort tears its environment down at process exit.
        debug!("onnx parser library released");
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct ProviderOptions {
    workspace: usize,
    fp16: bool,
    int8: bool,
    accelerator_core: Option<u32>,
}

pub struct OrtGraphBuilder {
    device: Device,
    max_batch: usize,
    options: ProviderOptions,
}

impl OrtGraphBuilder {
    fn new(device: Device) -> Self {
        Self {
            device,
            max_batch: 1,
            options: ProviderOptions::default(),
        }
    }
}

impl GraphBuilder for OrtGraphBuilder {
    type Graph = OrtNetwork;
    type Engine = OrtEngine;

    fn create_network(&mut self) -> Result<Self::Graph> {
        Ok(OrtNetwork::default())
    }

    fn set_max_batch_size(&mut self, batch: usize) {
        self.max_batch = batch;
    }

    fn set_max_workspace_size(&mut self, bytes: usize) {
        self.options.workspace = bytes;
    }

    fn set_fp16_mode(&mut self, enabled: bool) {
        self.options.fp16 = enabled;
    }

    fn set_int8_mode(&mut self, enabled: bool) {
        self.options.int8 = enabled;
    }

    fn set_accelerator_core(&mut self, core: Option<u32>) {
        self.options.accelerator_core = core;
    }

    fn build_engine(&mut self, network: &Self::Graph) -> Result<Self::Engine> {
        let Some(model) = &network.model else {
            bail!("network has not been parsed");
        };

        let builder = Session::builder()
            .context("failed to create ORT session builder")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("failed to configure ORT session builder")?;
        let builder = configure_session_builder(builder, &self.device, &self.options)?;
        let session = builder
            .commit_from_file(model)
            .with_context(|| format!("failed to load ONNX model {}", model.display()))?;

        let specs = network
            .inputs
            .iter()
            .map(|s| (s, true))
            .chain(network.marked_outputs().map(|s| (s, false)));
        let mut bindings = Vec::new();
        for (index, (spec, is_input)) in specs.enumerate() {
            let Some(dims) = spec.resolve_dims(self.max_batch) else {
                bail!("tensor `{}` has a dynamic non-batch dimension", spec.name);
            };
            bindings.push(Binding {
                name: spec.name.clone(),
                index,
                dims,
                dtype: spec.dtype,
                is_input,
            });
        }

        info!(
            model = %model.display(),
            device = ?self.device,
            bindings = bindings.len(),
            "ORT session committed"
        );
        Ok(OrtEngine::new(session, bindings, self.max_batch))
    }
}

/// Graph view of an ONNX model: its declared IO and the outputs selected
/// for the engine.
#[derive(Debug, Default)]
pub struct OrtNetwork {
    model: Option<PathBuf>,
    inputs: Vec<TensorSpec>,
    outputs: Vec<TensorSpec>,
    marked: Vec<usize>,
}

impl OrtNetwork {
    fn marked_outputs(&self) -> impl Iterator<Item = &TensorSpec> {
        self.marked.iter().map(|i| &self.outputs[*i])
    }
}

impl NetworkGraph for OrtNetwork {
    fn inputs(&self) -> Vec<TensorSpec> {
        self.inputs.clone()
    }

    fn outputs(&self) -> Vec<TensorSpec> {
        self.marked_outputs().cloned().collect()
    }

    fn mark_output(&mut self, name: &str) -> bool {
        let Some(pos) = self.outputs.iter().position(|o| o.name.0 == name) else {
            return false;
        };
        if !self.marked.contains(&pos) {
            self.marked.push(pos);
        }
        true
    }
}

pub struct OrtParser;

impl ModelParser for OrtParser {
    type Graph = OrtNetwork;

    fn parse(&mut self, files: &ModelFiles, network: &mut Self::Graph) -> Result<()> {
        if let Some(weights) = &files.weights {
            warn!(weights = %weights.display(), "ONNX models embed their weights, ignoring file");
        }

        let session = Session::builder()
            .context("failed to create ORT session builder")?
            .with_optimization_level(GraphOptimizationLevel::Disable)
            .context("failed to configure ORT session builder")?
            .commit_from_file(&files.topology)
            .with_context(|| format!("failed to parse {}", files.topology.display()))?;

        network.inputs = session
            .inputs
            .iter()
            .map(|input| tensor_spec_from_value_type(&input.name, &input.input_type))
            .collect::<Result<Vec<_>>>()?;
        network.outputs = session
            .outputs
            .iter()
            .map(|output| tensor_spec_from_value_type(&output.name, &output.output_type))
            .collect::<Result<Vec<_>>>()?;
        network.marked.clear();
        network.model = Some(files.topology.clone());
        Ok(())
    }
}

fn configure_session_builder(
    builder: SessionBuilder,
    device: &Device,
    options: &ProviderOptions,
) -> Result<SessionBuilder> {
    match device {
        Device::Cpu => {
            if options.fp16 || options.int8 || options.accelerator_core.is_some() {
                warn!("reduced precision and accelerator cores are ignored on CPU");
            }
            Ok(builder)
        }
        Device::Cuda { device_id } => configure_cuda(builder, *device_id),
        Device::TensorRt { device_id } => configure_tensorrt(builder, *device_id, options),
    }
}

fn configure_cuda(builder: SessionBuilder, device_id: u32) -> Result<SessionBuilder> {
    #[cfg(feature = "cuda")]
    {
        use ort::execution_providers::cuda::CUDAExecutionProvider;
        let ep = CUDAExecutionProvider::default()
            .with_device_id(device_id as i32)
            .build();
        builder
            .with_execution_providers([ep])
            .context("failed to enable ORT CUDA execution provider")
    }
    #[cfg(not(feature = "cuda"))]
    {
        let _ = (builder, device_id);
        bail!("CUDA requested but deploynet-backend-ort was built without the `cuda` feature")
    }
}

fn configure_tensorrt(
    builder: SessionBuilder,
    device_id: u32,
    options: &ProviderOptions,
) -> Result<SessionBuilder> {
    #[cfg(feature = "tensorrt")]
    {
        use ort::execution_providers::TensorRTExecutionProvider;
        let mut ep = TensorRTExecutionProvider::default()
            .with_device_id(device_id as i32)
            .with_max_workspace_size(options.workspace)
            .with_fp16(options.fp16)
            .with_int8(options.int8);
        if let Some(core) = options.accelerator_core {
            ep = ep.with_dla(true).with_dla_core(core);
        }
        builder
            .with_execution_providers([ep.build()])
            .context("failed to enable ORT TensorRT execution provider")
    }
    #[cfg(not(feature = "tensorrt"))]
    {
        let _ = (builder, device_id, options);
        bail!("TensorRT requested but deploynet-backend-ort was built without the `tensorrt` feature")
    }
}
