//! Row-buffer-aware [`DramModel`] implementation.
//!
//! Grounded on the teacher's `soc::memory::controller::DramController`
//! (single open row per controller, `t_cas`/`t_ras`/`t_pre` cycle costs).
//! That controller is a synchronous `access_latency(addr) -> cycles` call;
//! this module adapts the same row-buffer bookkeeping to the queue-based
//! `send`/`tick` seam [`crate::memory::dram::DramController`] expects,
//! tracking one open row per channel rather than one open row overall,
//! since this simulator's channels are independent in DRAM terms.

use std::collections::{HashMap, VecDeque};

use crate::common::error::ExternalFault;
use crate::memory::dram::{ControllerRequest, DramModel};

/// A request in flight, counting down to completion.
struct Pending {
    remaining: u64,
    source_id: u64,
}

/// Row-buffer timing model: a closed row costs `t_ras + t_cas` to open and
/// read; a row already open on the same channel costs only `t_cas`; a row
/// conflict (different row already open) costs `t_pre + t_ras + t_cas` and
/// counts as both a precharge and a fresh activation.
pub struct RowBufferModel {
    t_cas: u64,
    t_ras: u64,
    t_pre: u64,
    row_mask: u64,
    open_row: HashMap<u32, u64>,
    pending: VecDeque<Pending>,
    activations: u64,
    precharges: u64,
}

impl RowBufferModel {
    /// Creates a model with the given cycle costs and `row_size`-byte rows.
    #[must_use]
    pub fn new(t_cas: u64, t_ras: u64, t_pre: u64, row_size: u64) -> Self {
        Self {
            t_cas,
            t_ras,
            t_pre,
            row_mask: !(row_size - 1),
            open_row: HashMap::new(),
            pending: VecDeque::new(),
            activations: 0,
            precharges: 0,
        }
    }
}

impl DramModel for RowBufferModel {
    fn send(&mut self, req: ControllerRequest) -> Result<(), ExternalFault> {
        let row = req.address & self.row_mask;
        let latency = match self.open_row.get(&req.channel) {
            Some(&open) if open == row => self.t_cas,
            Some(_) => {
                self.precharges += 1;
                self.activations += 1;
                self.t_pre + self.t_ras + self.t_cas
            }
            None => {
                self.activations += 1;
                self.t_ras + self.t_cas
            }
        };
        self.open_row.insert(req.channel, row);
        self.pending.push_back(Pending {
            remaining: latency,
            source_id: req.source_id,
        });
        Ok(())
    }

    fn tick(&mut self) -> Vec<u64> {
        let mut done = Vec::new();
        for p in &mut self.pending {
            if p.remaining == 0 {
                done.push(p.source_id);
            } else {
                p.remaining -= 1;
            }
        }
        self.pending.retain(|p| p.remaining > 0);
        done
    }

    fn activations(&self) -> u64 {
        self.activations
    }

    fn precharges(&self) -> u64 {
        self.precharges
    }
}
