use std::sync::Arc;

use deploynet_core::{
    marshal, CompiledEngine, ExecutionContext, ExecutionStream, InferError, InferOutput,
    NetworkConfig, TensorBuffer,
};
use tracing::{debug, warn};

use crate::BufferManager;

/// How a dispatch reaches the device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExecMode {
    /// Asynchronous dispatch on a transient stream, synchronized before
    /// results are copied back.
    #[default]
    Stream,
    /// Blocking dispatch.
    Sync,
}

/// Runs one inference call against a compiled engine.
///
/// Buffers, execution context and stream live for the duration of
/// [`InferenceRunner::run`] only.
pub struct InferenceRunner<'a, E: CompiledEngine> {
    engine: &'a Arc<E>,
    config: &'a NetworkConfig,
}

impl<'a, E: CompiledEngine> InferenceRunner<'a, E> {
    pub fn new(engine: &'a Arc<E>, config: &'a NetworkConfig) -> Self {
        Self { engine, config }
    }

    /// Returns one output per declared output name, in declared order.
    ///
    /// # Panics
    ///
    /// Panics if the number of inputs differs from the declared input names,
    /// if a declared input has no engine binding, or if an input's byte size
    /// differs from its binding buffer.
    pub fn run(
        &self,
        inputs: &[TensorBuffer],
        mode: ExecMode,
    ) -> Result<Vec<InferOutput>, InferError> {
        let names = &self.config.input_tensor_names;
        assert_eq!(
            inputs.len(),
            names.len(),
            "expected {} input tensors, got {}",
            names.len(),
            inputs.len()
        );

        let mut buffers = BufferManager::new(self.engine.as_ref()).map_err(InferError::Buffers)?;
        let mut context = Arc::clone(self.engine)
            .create_execution_context()
            .map_err(InferError::Context)?;

        for (name, input) in names.iter().zip(inputs) {
            let host = buffers
                .host_buffer_mut(name)
                .unwrap_or_else(|| panic!("engine has no binding for input `{name}`"));
            assert_eq!(
                host.len(),
                input.byte_len(),
                "input `{name}` is {} bytes, its binding expects {}",
                input.byte_len(),
                host.len()
            );
            host.copy_from_slice(input.as_bytes());
        }
        buffers.copy_input_to_device().map_err(InferError::Transfer)?;

        let batch = self.config.batch_size;
        debug!(?mode, batch, "dispatching");
        // Declared before the match so the stream outlives the copy back.
        let mut stream = None;
        match mode {
            ExecMode::Sync => context
                .execute(batch, buffers.device_bindings())
                .map_err(InferError::Dispatch)?,
            ExecMode::Stream => {
                let s = stream.insert(context.create_stream().map_err(InferError::Stream)?);
                context
                    .enqueue(batch, buffers.device_bindings(), s)
                    .map_err(InferError::Dispatch)?;
                s.synchronize().map_err(InferError::Stream)?;
            }
        }

        buffers.copy_output_to_host().map_err(InferError::Transfer)?;

        let outputs = self
            .config
            .output_tensor_names
            .iter()
            .map(|name| self.extract(&buffers, name))
            .collect();
        drop(stream);
        Ok(outputs)
    }

    fn extract(&self, buffers: &BufferManager<E>, name: &str) -> InferOutput {
        // Binding metadata is read from the engine on every call.
        let binding = self
            .engine
            .binding_index(name)
            .and_then(|index| self.engine.binding(index));
        match (binding, buffers.host_buffer(name)) {
            (Some(binding), Some(host)) => marshal::extract(host, &binding),
            _ => {
                warn!(output = %name, "declared output has no engine binding");
                InferOutput::missing(name)
            }
        }
    }
}
