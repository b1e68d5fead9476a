//! Deterministic allocate/release traces for comparing policies.

use crate::alloc::{Allocator, Stats};
use crate::error::Result;
use crate::page::PageSupplier;
use crate::slot::ObjectPtr;
use crate::strategy::Strategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Allocate { id: usize, size: usize },
    Release { id: usize },
}

/// Shape of a generated trace. Sizes are drawn uniformly from the multiples
/// of 8 in `[min_size, max_size]`; roughly one op in `release_every` is a
/// release of a random live object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Workload {
    pub seed: u64,
    pub ops: usize,
    pub min_size: usize,
    pub max_size: usize,
    pub release_every: u64,
}

impl Default for Workload {
    fn default() -> Self {
        Workload {
            seed: 0x2545_f491_4f6c_dd1d,
            ops: 10_000,
            min_size: 8,
            max_size: 4000,
            release_every: 3,
        }
    }
}

impl Workload {
    pub fn trace(&self) -> Vec<Op> {
        let mut rng = XorShift(self.seed.max(1));
        let steps = self.max_size.saturating_sub(self.min_size) / 8 + 1;
        let mut live: Vec<usize> = Vec::new();
        let mut next_id = 0;
        let mut ops = Vec::with_capacity(self.ops);

        for _ in 0..self.ops {
            if !live.is_empty() && rng.next_u64() % self.release_every.max(1) == 0 {
                let index = (rng.next_u64() % live.len() as u64) as usize;
                ops.push(Op::Release {
                    id: live.swap_remove(index),
                });
            } else {
                let size = self.min_size + (rng.next_u64() % steps as u64) as usize * 8;
                ops.push(Op::Allocate { id: next_id, size });
                live.push(next_id);
                next_id += 1;
            }
        }
        ops
    }
}

/// Figures gathered while replaying a trace.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Report {
    pub end: Stats,
    pub peak_live_bytes: usize,
    /// live bytes over mapped bytes, averaged over every op
    pub mean_utilization: f64,
}

/// Runs `trace` against `alloc`, stamping each object's bytes with its id and
/// checking the stamp before release.
pub fn replay<S, P>(alloc: &mut Allocator<S, P>, trace: &[Op]) -> Result<Report>
where
    S: Strategy,
    P: PageSupplier,
{
    let mut objects: Vec<Option<ObjectPtr>> = Vec::new();
    let mut report = Report::default();
    let mut utilization_sum = 0.0;

    for op in trace {
        match *op {
            Op::Allocate { id, size } => {
                let ptr = alloc.allocate(size)?;
                alloc.payload_mut(ptr)?.fill(id as u8);
                if objects.len() <= id {
                    objects.resize(id + 1, None);
                }
                objects[id] = Some(ptr);
            }
            Op::Release { id } => {
                if let Some(ptr) = objects.get_mut(id).and_then(Option::take) {
                    debug_assert!(alloc.payload(ptr)?.iter().all(|&b| b == id as u8));
                    alloc.release(ptr)?;
                }
            }
        }
        let stats = alloc.stats();
        report.peak_live_bytes = report.peak_live_bytes.max(stats.live_bytes);
        utilization_sum += stats.utilization();
    }

    report.end = alloc.stats();
    if !trace.is_empty() {
        report.mean_utilization = utilization_sum / trace.len() as f64;
    }
    Ok(report)
}

struct XorShift(u64);

impl XorShift {
    fn next_u64(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }
}
