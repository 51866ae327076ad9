use std::sync::Arc;

use deploynet_core::{
    Backend, Binding, BuildError, CompiledEngine, EngineState, InferError, InferOutput,
    NetworkConfig, TeardownError, TensorBuffer,
};
use tracing::{error, info};

use crate::{EngineBuilder, ExecMode, InferenceRunner};

/// Owns a compiled engine and drives it through
/// `Uninitialized -> Built -> Ready -> TornDown`.
///
/// Inference takes `&mut self`, so one facade never runs two inferences at
/// once. The compiled engine itself is shared read-only with the per-call
/// execution contexts.
pub struct ModelExecutionEngine<B: Backend> {
    backend: B,
    config: NetworkConfig,
    engine: Option<Arc<B::Engine>>,
    state: EngineState,
}

impl<B: Backend> ModelExecutionEngine<B> {
    pub fn new(backend: B, config: NetworkConfig) -> Self {
        Self {
            backend,
            config,
            engine: None,
            state: EngineState::Uninitialized,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// A failed build leaves the engine `Uninitialized` with its config
    /// untouched, so it can be retried.
    pub fn build(&mut self) -> Result<(), BuildError> {
        if self.state != EngineState::Uninitialized {
            return Err(BuildError::InvalidState(self.state));
        }

        let mut config = self.config.clone();
        let engine = EngineBuilder::new(&self.backend)
            .build(&mut config)
            .inspect_err(|e| error!(error = ?e, "engine build failed"))?;

        info!(
            inputs = ?config.input_tensor_names,
            outputs = ?config.output_tensor_names,
            "engine ready for inference"
        );
        self.config = config;
        self.engine = Some(Arc::new(engine));
        self.state = EngineState::Built;
        Ok(())
    }

    /// Stream-mode inference. See [`InferenceRunner::run`] for panics.
    pub fn infer(&mut self, inputs: &[TensorBuffer]) -> Result<Vec<InferOutput>, InferError> {
        self.infer_with(inputs, ExecMode::Stream)
    }

    /// Blocking-dispatch inference for callers that do not need overlap.
    pub fn infer_sync(&mut self, inputs: &[TensorBuffer]) -> Result<Vec<InferOutput>, InferError> {
        self.infer_with(inputs, ExecMode::Sync)
    }

    pub fn infer_with(
        &mut self,
        inputs: &[TensorBuffer],
        mode: ExecMode,
    ) -> Result<Vec<InferOutput>, InferError> {
        let engine = match &self.engine {
            Some(engine) if self.state.can_infer() => engine,
            _ => return Err(InferError::InvalidState(self.state)),
        };

        let outputs = InferenceRunner::new(engine, &self.config)
            .run(inputs, mode)
            .inspect_err(|e| error!(error = ?e, "inference failed"))?;

        self.state = EngineState::Ready;
        Ok(outputs)
    }

    pub fn binding(&self, name: &str) -> Option<Binding> {
        let engine = self.engine.as_ref()?;
        engine.binding(engine.binding_index(name)?)
    }

    /// Bindings of the declared inputs, in declared order.
    pub fn input_bindings(&self) -> Vec<Binding> {
        self.config
            .input_tensor_names
            .iter()
            .filter_map(|name| self.binding(name))
            .collect()
    }

    /// Releases the engine and shuts the backend's parser library down.
    ///
    /// The parser library is process-wide: only the first teardown in a
    /// process releases it, and no engine on that backend can be built
    /// afterwards. The engine moves to `TornDown` even when another engine
    /// already released the library.
    pub fn teardown(&mut self) -> Result<(), TeardownError> {
        if !self.state.can_infer() {
            return Err(TeardownError::InvalidState(self.state));
        }

        self.engine = None;
        self.state = EngineState::TornDown;

        let backend = &self.backend;
        backend
            .parser_library()
            .shutdown(|| backend.release_parser_library())
    }
}
