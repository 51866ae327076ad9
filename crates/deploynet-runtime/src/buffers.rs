use anyhow::{Context, Result};
use bytes::BytesMut;
use deploynet_core::{Binding, CompiledEngine, DeviceBuffer};

/// Host staging and device buffers for every binding of an engine, kept in
/// binding-index order. Call-scoped: everything is freed on drop.
pub struct BufferManager<E: CompiledEngine> {
    bindings: Vec<Binding>,
    host: Vec<BytesMut>,
    device: Vec<E::Buffer>,
}

impl<E: CompiledEngine> BufferManager<E> {
    /// Sizes each buffer as `volume(dims) * element size`. Binding dims carry
    /// the batch dimension the engine was built for.
    pub fn new(engine: &E) -> Result<Self> {
        let count = engine.num_bindings();
        let mut bindings = Vec::with_capacity(count);
        let mut host = Vec::with_capacity(count);
        let mut device = Vec::with_capacity(count);

        for index in 0..count {
            let binding = engine
                .binding(index)
                .with_context(|| format!("engine reports no binding at index {index}"))?;
            let size = binding.byte_size();
            host.push(BytesMut::zeroed(size));
            device.push(
                engine
                    .allocate(size)
                    .with_context(|| format!("failed to allocate {size} bytes for `{}`", binding.name))?,
            );
            bindings.push(binding);
        }

        Ok(Self {
            bindings,
            host,
            device,
        })
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.bindings.iter().position(|b| b.name.0 == name)
    }

    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.position(name).map(|i| &self.bindings[i])
    }

    pub fn size(&self, name: &str) -> Option<usize> {
        self.position(name).map(|i| self.host[i].len())
    }

    pub fn host_buffer(&self, name: &str) -> Option<&[u8]> {
        self.position(name).map(|i| &self.host[i][..])
    }

    pub fn host_buffer_mut(&mut self, name: &str) -> Option<&mut [u8]> {
        self.position(name).map(|i| &mut self.host[i][..])
    }

    pub fn copy_input_to_device(&mut self) -> Result<()> {
        for ((binding, host), device) in self.bindings.iter().zip(&self.host).zip(&mut self.device) {
            if binding.is_input {
                device
                    .copy_from_host(host)
                    .with_context(|| format!("host to device copy of `{}`", binding.name))?;
            }
        }
        Ok(())
    }

    pub fn copy_output_to_host(&mut self) -> Result<()> {
        for ((binding, host), device) in self.bindings.iter().zip(&mut self.host).zip(&self.device) {
            if !binding.is_input {
                device
                    .copy_to_host(host)
                    .with_context(|| format!("device to host copy of `{}`", binding.name))?;
            }
        }
        Ok(())
    }

    /// Device buffers ordered by binding index, as the execution context expects.
    pub fn device_bindings(&mut self) -> &mut [E::Buffer] {
        &mut self.device
    }
}
