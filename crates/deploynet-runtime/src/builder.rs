use std::time::Instant;

use deploynet_core::{
    Backend, BuildError, GraphBuilder, ModelFiles, ModelParser, NetworkConfig, NetworkGraph,
};
use tracing::{error, info, warn};

/// Turns a model description into a compiled engine.
pub struct EngineBuilder<'a, B: Backend> {
    backend: &'a B,
}

impl<'a, B: Backend> EngineBuilder<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Parses, configures and compiles the network described by `config`.
    ///
    /// On success `config.input_tensor_names` lists every graph input (names
    /// discovered by the parser are appended) and `config.input_dimensions`
    /// holds their runtime dims. Declared outputs the graph does not contain
    /// are logged and skipped.
    pub fn build(&self, config: &mut NetworkConfig) -> Result<B::Engine, BuildError> {
        config.validate()?;

        let library = self.backend.parser_library();
        if library.is_shut_down() {
            return Err(BuildError::ParserShutDown(library.name()));
        }

        let t0 = Instant::now();
        let mut builder = self.backend.create_builder().map_err(BuildError::Builder)?;
        let mut network = builder.create_network().map_err(BuildError::Network)?;
        let mut parser = self.backend.create_parser().map_err(BuildError::Parser)?;

        self.construct_network(&mut builder, &mut network, &mut parser, config)?;

        let engine = builder
            .build_engine(&network)
            .map_err(BuildError::Compile)?;

        info!(
            backend = self.backend.name(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "engine built"
        );
        Ok(engine)
    }

    fn construct_network(
        &self,
        builder: &mut B::Builder,
        network: &mut B::Graph,
        parser: &mut B::Parser,
        config: &mut NetworkConfig,
    ) -> Result<(), BuildError> {
        let files = ModelFiles::locate(
            &config.topology_file,
            config.weights_file.as_deref(),
            &config.data_dirs,
        )?;
        parser.parse(&files, network).map_err(BuildError::Parse)?;

        for input in network.inputs() {
            let dims = input.resolve_dims(config.batch_size);
            if dims.is_none() {
                warn!(input = %input, "input has dynamic non-batch dims, not recording them");
            } else {
                info!(input = %input, "network input");
            }
            config.record_input(&input.name.0, dims);
        }

        for name in &config.output_tensor_names {
            if !network.mark_output(name) {
                error!(output = %name, "could not find output tensor");
            }
        }

        for output in network.outputs() {
            info!(output = %output, "network output");
        }

        let core = config.accelerator_core();
        builder.set_max_batch_size(config.batch_size);
        builder.set_max_workspace_size(config.workspace_size);
        // Sub-engines only run reduced precision.
        builder.set_fp16_mode(config.fp16 || (core.is_some() && !config.int8));
        builder.set_int8_mode(config.int8);
        builder.set_accelerator_core(core);
        Ok(())
    }
}
