use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use deploynet_backend_ort::OrtBackend;
use deploynet_core::{BuildError, EngineState, MarshalStatus, NetworkConfig, TensorBuffer};
use deploynet_runtime::ModelExecutionEngine;

fn config_in(dir: &std::path::Path, topology: &str) -> NetworkConfig {
    let mut config = NetworkConfig::new(topology);
    config.data_dirs = vec![dir.to_path_buf()];
    config.output_tensor_names = vec!["output".into()];
    config
}

#[test]
fn missing_model_fails_before_parsing() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), "absent.onnx");
    let mut engine = ModelExecutionEngine::new(OrtBackend::default(), config);

    let err = engine.build().unwrap_err();
    assert!(matches!(err, BuildError::Locate(_)), "{err:?}");
    assert_eq!(engine.state(), EngineState::Uninitialized);
}

#[test]
fn corrupt_model_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("broken.onnx"), b"not a protobuf").unwrap();
    let config = config_in(dir.path(), "broken.onnx");
    let mut engine = ModelExecutionEngine::new(OrtBackend::default(), config);

    let err = engine.build().unwrap_err();
    assert!(matches!(err, BuildError::Parse(_)), "{err:?}");
    assert!(engine.config().input_dimensions.is_empty());
}

#[test]
#[ignore = "needs models/identity.onnx"]
fn identity_model_round_trips_on_cpu() -> Result<()> {
    let models = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../models");
    let config = config_in(&models, "identity.onnx");
    let mut engine = ModelExecutionEngine::new(OrtBackend::default(), config);
    engine.build()?;

    let input = engine
        .input_bindings()
        .first()
        .cloned()
        .context("identity model has no input")?;
    let mut tensor = TensorBuffer::zeros(input.dims.to_nchw());
    for (i, v) in tensor.as_mut_slice().iter_mut().enumerate() {
        *v = i as f32;
    }

    let outputs = engine.infer(&[tensor.clone()])?;
    let out = outputs.first().context("missing model output")?;
    ensure!(
        matches!(out.status, MarshalStatus::Converted { .. }),
        "output not converted: {:?}",
        out.status
    );
    assert_eq!(out.tensor.as_slice(), tensor.as_slice());
    Ok(())
}
