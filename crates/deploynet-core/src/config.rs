//! Network configuration

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::Dims;

/// Workspace budget handed to the graph builder unless configured.
pub const DEFAULT_WORKSPACE_SIZE: usize = 16 << 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Directories searched in order for the model files.
    #[serde(default)]
    pub data_dirs: Vec<PathBuf>,
    pub topology_file: PathBuf,
    /// Separate weights file; formats that embed their weights leave it unset.
    #[serde(default)]
    pub weights_file: Option<PathBuf>,
    #[serde(default)]
    pub input_tensor_names: Vec<String>,
    pub output_tensor_names: Vec<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub fp16: bool,
    #[serde(default)]
    pub int8: bool,
    /// Hardware sub-engine index; negative values mean none.
    #[serde(default)]
    pub accelerator_core: Option<i32>,
    #[serde(default = "default_workspace_size")]
    pub workspace_size: usize,
    /// Runtime dims of every graph input, filled in by the engine build.
    #[serde(skip)]
    pub input_dimensions: BTreeMap<String, Dims>,
}

fn default_batch_size() -> usize {
    1
}

fn default_workspace_size() -> usize {
    DEFAULT_WORKSPACE_SIZE
}

impl NetworkConfig {
    pub fn new(topology_file: impl Into<PathBuf>) -> Self {
        Self {
            data_dirs: Vec::new(),
            topology_file: topology_file.into(),
            weights_file: None,
            input_tensor_names: Vec::new(),
            output_tensor_names: Vec::new(),
            batch_size: default_batch_size(),
            fp16: false,
            int8: false,
            accelerator_core: None,
            workspace_size: DEFAULT_WORKSPACE_SIZE,
            input_dimensions: BTreeMap::new(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: NetworkConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be at least 1".into()));
        }
        if self.topology_file.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("topology_file is empty".into()));
        }
        if self.output_tensor_names.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one output tensor must be declared".into(),
            ));
        }
        Ok(())
    }

    /// The selected accelerator core, if any.
    pub fn accelerator_core(&self) -> Option<u32> {
        self.accelerator_core
            .and_then(|core| u32::try_from(core).ok())
    }

    /// Records a graph input discovered while parsing. Names the caller
    /// already declared keep their position. Inputs whose dims could not be
    /// resolved are listed by name only.
    pub fn record_input(&mut self, name: &str, dims: Option<Dims>) {
        if !self.input_tensor_names.iter().any(|n| n == name) {
            self.input_tensor_names.push(name.to_string());
        }
        match dims {
            Some(dims) => {
                self.input_dimensions.insert(name.to_string(), dims);
            }
            None => {
                self.input_dimensions.remove(name);
            }
        }
    }
}
