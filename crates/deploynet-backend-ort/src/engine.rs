use std::sync::Arc;

use anyhow::{ensure, Context, Result};
use deploynet_core::{Binding, CompiledEngine, DeviceBuffer, ExecutionContext, ExecutionStream};
use ort::session::{Session, SessionInputValue};
use parking_lot::Mutex;

use crate::convert::{host_to_ort_value, ort_value_to_host};

/// A committed ORT session plus the bindings selected at build time: graph
/// inputs first, then the marked outputs.
pub struct OrtEngine {
    session: Mutex<Session>,
    bindings: Vec<Binding>,
    max_batch: usize,
}

impl OrtEngine {
    pub(crate) fn new(session: Session, bindings: Vec<Binding>, max_batch: usize) -> Self {
        Self {
            session: Mutex::new(session),
            bindings,
            max_batch,
        }
    }
}

impl CompiledEngine for OrtEngine {
    type Buffer = HostBuffer;
    type Context = OrtContext;

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
        self.max_batch
    }

    fn allocate(&self, bytes: usize) -> Result<Self::Buffer> {
        Ok(HostBuffer(vec![0; bytes]))
    }

    fn create_execution_context(self: Arc<Self>) -> Result<Self::Context> {
        Ok(OrtContext { engine: self })
    }
}

/// ORT sessions take host memory, so "device" buffers live on the host and
/// providers do their own transfers.
#[derive(Debug)]
pub struct HostBuffer(Vec<u8>);

impl DeviceBuffer for HostBuffer {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn copy_from_host(&mut self, src: &[u8]) -> Result<()> {
        ensure!(
            src.len() == self.0.len(),
            "host copy of {} bytes into a {} byte buffer",
            src.len(),
            self.0.len()
        );
        self.0.copy_from_slice(src);
        Ok(())
    }

    fn copy_to_host(&self, dst: &mut [u8]) -> Result<()> {
        ensure!(
            dst.len() == self.0.len(),
            "host copy of a {} byte buffer into {} bytes",
            self.0.len(),
            dst.len()
        );
        dst.copy_from_slice(&self.0);
        Ok(())
    }
}

pub struct OrtContext {
    engine: Arc<OrtEngine>,
}

impl ExecutionContext for OrtContext {
    type Buffer = HostBuffer;
    type Stream = OrtStream;

    fn execute(&mut self, batch_size: usize, bindings: &mut [Self::Buffer]) -> Result<()> {
        let engine = &self.engine;
        ensure!(
            batch_size <= engine.max_batch,
            "batch size {batch_size} exceeds engine maximum {}",
            engine.max_batch
        );
        ensure!(
            bindings.len() == engine.bindings.len(),
            "expected {} binding buffers, got {}",
            engine.bindings.len(),
            bindings.len()
        );

        let mut ort_inputs = Vec::new();
        for (binding, buffer) in engine.bindings.iter().zip(bindings.iter()) {
            if binding.is_input {
                let value = host_to_ort_value(binding, &buffer.0)?;
                ort_inputs.push((binding.name.0.clone(), SessionInputValue::from(value)));
            }
        }

        let mut session = engine.session.lock();
        let outputs = session.run(ort_inputs).context("ORT session run failed")?;
        for (name, value) in outputs.iter() {
            let Some(index) = engine
                .bindings
                .iter()
                .position(|b| !b.is_input && b.name.0 == name)
            else {
                continue;
            };
            ort_value_to_host(&value, &engine.bindings[index], &mut bindings[index].0)?;
        }
        Ok(())
    }

    fn create_stream(&self) -> Result<Self::Stream> {
        Ok(OrtStream)
    }

    /// ORT exposes no user streams; the run completes before returning.
    fn enqueue(
        &mut self,
        batch_size: usize,
        bindings: &mut [Self::Buffer],
        _stream: &mut Self::Stream,
    ) -> Result<()> {
        self.execute(batch_size, bindings)
    }
}

pub struct OrtStream;

impl ExecutionStream for OrtStream {
    fn synchronize(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_buffer_rejects_mismatched_copies() {
        let mut buf = HostBuffer(vec![0; 4]);
        buf.copy_from_host(&[1, 2, 3, 4]).unwrap();
        assert!(buf.copy_from_host(&[1]).is_err());

        let mut out = [0u8; 4];
        buf.copy_to_host(&mut out).unwrap();
        assert_eq!(out, [1, 2, 3, 4]);
        assert!(buf.copy_to_host(&mut [0u8; 8]).is_err());
    }
}
