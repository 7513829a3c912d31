//! GPU placement strategies

use gpusched_core::GpuId;

use crate::ledger::MemoryLedger;

/// Strategy for choosing a GPU for one task
pub trait PlacementStrategy: Send + Sync {
    /// Pick a GPU with at least `memory` free, or `None` if nothing fits
    fn place(&self, memory: u64, ledger: &MemoryLedger) -> Option<GpuId>;
}

/// Lowest-indexed GPU with enough free memory
pub struct FirstFit;

impl PlacementStrategy for FirstFit {
    fn place(&self, memory: u64, ledger: &MemoryLedger) -> Option<GpuId> {
        ledger
            .free_slots()
            .iter()
            .find(|(_, free)| *free >= memory)
            .map(|(id, _)| *id)
    }
}

/// GPU with the smallest sufficient free memory
///
/// Ties go to the lowest index.
pub struct BestFit;

impl PlacementStrategy for BestFit {
    fn place(&self, memory: u64, ledger: &MemoryLedger) -> Option<GpuId> {
        ledger
            .free_slots()
            .iter()
            .filter(|(_, free)| *free >= memory)
            .min_by_key(|(id, free)| (*free, *id))
            .map(|(id, _)| *id)
    }
}
