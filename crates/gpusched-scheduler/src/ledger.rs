//! Scratch memory ledger used while a policy builds its decisions

use gpusched_core::{GpuId, GpuSchedError, GpuSchedResult, GpuState};
use tracing::trace;

/// Free memory per GPU, tracked for the duration of one scheduling call
///
/// Policies hand out memory on the ledger rather than on the real
/// [`GpuState`]s, so a single call can dispatch several tasks without
/// over-committing a device and without mutating the engine's state.
#[derive(Debug, Clone)]
pub struct MemoryLedger {
    /// (GPU, free memory) in GPU order
    slots: Vec<(GpuId, u64)>,
}

impl MemoryLedger {
    /// Snapshot the free memory of each GPU
    pub fn new(gpus: &[GpuState]) -> Self {
        Self {
            slots: gpus.iter().map(|g| (g.id, g.free_memory())).collect(),
        }
    }

    /// Number of GPUs in the ledger
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Free memory for each GPU, in GPU order
    pub fn free_slots(&self) -> &[(GpuId, u64)] {
        &self.slots
    }

    /// Free memory on one GPU
    pub fn free(&self, gpu: GpuId) -> Option<u64> {
        self.slots.iter().find(|(id, _)| *id == gpu).map(|(_, f)| *f)
    }

    /// Take memory from a GPU
    pub fn allocate(&mut self, gpu: GpuId, memory: u64) -> GpuSchedResult<()> {
        let (_, free) = self
            .slots
            .iter_mut()
            .find(|(id, _)| *id == gpu)
            .ok_or_else(|| GpuSchedError::InvalidState(format!("unknown GPU {}", gpu)))?;
        if *free < memory {
            return Err(GpuSchedError::InsufficientMemory {
                gpu: gpu.to_string(),
                requested: memory,
                free: *free,
            });
        }
        *free -= memory;
        trace!(gpu = %gpu, memory, remaining = *free, "Ledger allocation");
        Ok(())
    }
}
