mod cli;
mod timing;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command, RunArgs};
use deploynet_backend_ort::OrtBackend;
use deploynet_core::{Binding, DType, Device, NetworkConfig, TensorBuffer};
use deploynet_runtime::{ExecMode, ModelExecutionEngine};
use tracing_subscriber::EnvFilter;

use timing::{ms, Timings};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => {
            init_tracing(&args.log);
            run(args)
        }
    }
}

fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(args: RunArgs) -> Result<()> {
    let device = parse_device(&args.device)?;
    let mode = if args.sync {
        ExecMode::Sync
    } else {
        ExecMode::Stream
    };
    let iterations = args.iterations.max(1);
    let config = network_config(args)?;

    let mut engine = ModelExecutionEngine::new(OrtBackend::new(device), config);

    let t0 = Instant::now();
    engine.build().context("failed to build engine")?;
    let load = t0.elapsed();

    let inputs = zero_inputs(&engine.input_bindings())?;

    let mut timings = Timings::default();
    let mut outputs = Vec::new();
    for _ in 0..iterations {
        let t = Instant::now();
        outputs = engine
            .infer_with(&inputs, mode)
            .context("inference failed")?;
        timings.record(t.elapsed());
    }

    println!("Input(s):");
    for binding in engine.input_bindings() {
        println!("  {} [{}] {}", binding.name, binding.dims, binding.dtype);
    }
    println!("Output(s):");
    for out in &outputs {
        let [n, c, h, w] = out.tensor.shape();
        println!("  {} {n}x{c}x{h}x{w} {:?}", out.name, out.status);
    }

    engine.teardown().context("failed to tear down engine")?;

    println!("load: {:.3} ms", ms(load));
    println!("infer: {timings}");
    Ok(())
}

/// Zero-filled inputs shaped from the engine's input bindings. Only float32
/// bindings can be fed from a `TensorBuffer`.
fn zero_inputs(bindings: &[Binding]) -> Result<Vec<TensorBuffer>> {
    bindings
        .iter()
        .map(|b| {
            if b.dtype != DType::F32 {
                anyhow::bail!(
                    "input `{}` is {}, only float32 inputs can be fed",
                    b.name,
                    b.dtype
                );
            }
            Ok(TensorBuffer::zeros(b.dims.to_nchw()))
        })
        .collect()
}

/// File values first, then command-line overrides. Without a file the
/// defaults describe the GoogleNet sample layout.
fn network_config(args: RunArgs) -> Result<NetworkConfig> {
    let mut config = match &args.config {
        Some(path) => NetworkConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => googlenet_defaults(),
    };

    if !args.data_dirs.is_empty() {
        config.data_dirs = args.data_dirs;
    }
    if let Some(topology) = args.topology {
        config.topology_file = topology;
    }
    if args.weights.is_some() {
        config.weights_file = args.weights;
    }
    if !args.outputs.is_empty() {
        config.output_tensor_names = args.outputs;
    }
    if let Some(batch) = args.batch_size {
        config.batch_size = batch;
    }
    if let Some(fp16) = args.fp16 {
        config.fp16 = fp16;
    }
    if let Some(int8) = args.int8 {
        config.int8 = int8;
    }
    if args.use_dla_core.is_some() {
        config.accelerator_core = args.use_dla_core;
    }

    config.validate()?;
    Ok(config)
}

fn googlenet_defaults() -> NetworkConfig {
    let mut config = NetworkConfig::new("googlenet.onnx");
    config.data_dirs = vec![
        PathBuf::from("data/googlenet/"),
        PathBuf::from("data/samples/googlenet/"),
    ];
    config.input_tensor_names = vec!["data".into()];
    config.output_tensor_names = vec!["prob".into()];
    config.batch_size = 4;
    config
}

fn parse_device(raw: &str) -> Result<Device> {
    if raw.eq_ignore_ascii_case("cpu") {
        return Ok(Device::Cpu);
    }

    if let Some(rest) = raw.strip_prefix("cuda:") {
        let device_id: u32 = rest.parse().context("invalid cuda device id")?;
        return Ok(Device::Cuda { device_id });
    }

    if let Some(rest) = raw.strip_prefix("tensorrt:") {
        let device_id: u32 = rest.parse().context("invalid tensorrt device id")?;
        return Ok(Device::TensorRt { device_id });
    }

    anyhow::bail!("unsupported device: {raw} (expected cpu, cuda:N or tensorrt:N)");
}
