//! DRAM controller wrapper: bridges the cycle-stepped simulator to a
//! black-box memory-controller timing/power model.
//!
//! The timing model itself (CAS/RAS/precharge latencies, row-buffer state,
//! power tables) is out of scope for this crate; [`DramModel`] is
//! the seam a caller plugs a real model into. [`DramController`] supplies
//! everything a caller needs: address→channel mapping, the
//! `{write_request, peek_return, read_return}` surface, and power totals at
//! finalization.

use std::collections::VecDeque;

use crate::common::error::ExternalFault;
use crate::common::request::{MemoryRequest, MemoryReturn, RequestKind};
use crate::config::{ChannelMapping, DramConfig};
use crate::memory::backing::DramBacking;

/// One controller-level record submitted to the black-box timing model.
#[derive(Clone, Debug)]
pub struct ControllerRequest {
    /// Physical address.
    pub address: u64,
    /// Read or write.
    pub kind: ControllerRequestKind,
    /// Channel selected by the address mapping.
    pub channel: u32,
    /// Opaque id used to match a later callback to the originating
    /// [`MemoryRequest`].
    pub source_id: u64,
}

/// Read or write, as seen by the black-box timing model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerRequestKind {
    /// Read access.
    Read,
    /// Write access.
    Write,
}

/// The seam a real DRAM timing/power model plugs into.
///
/// Implementations own row-buffer state, CAS/RAS/precharge timing, and
/// power accounting; this crate never inspects their internals.
pub trait DramModel {
    /// Submits one controller-level request. Implementations may reject a
    /// request (queue full, address fault) by returning an
    /// [`ExternalFault`]; such faults are surfaced unchanged, never retried.
    fn send(&mut self, req: ControllerRequest) -> Result<(), ExternalFault>;

    /// Advances internal timing state by one cycle and returns the
    /// `source_id`s of any requests that completed this cycle.
    fn tick(&mut self) -> Vec<u64>;

    /// Row activations performed so far (for power accounting).
    fn activations(&self) -> u64;
    /// Row precharges performed so far.
    fn precharges(&self) -> u64;
}

/// Address → channel decomposition for one of the two mapping presets.
fn channel_of(address: u64, mapping: ChannelMapping, num_channels: usize, row_size: u64) -> u32 {
    let channel_bits = num_channels.trailing_zeros();
    match mapping {
        // Row | Rank | Bank | Channel | Column: channel bits sit just above
        // the column (row-size-aligned) offset.
        ChannelMapping::RoRaBaChCo => {
            let shift = row_size.trailing_zeros();
            ((address >> shift) & ((1u64 << channel_bits) - 1)) as u32
        }
        // Row | BankGroup | Bank | Rank | Channel | Column: channel bits sit
        // one rank-selector bit higher.
        ChannelMapping::RoBgBaRaChCo => {
            let shift = row_size.trailing_zeros() + 1;
            ((address >> shift) & ((1u64 << channel_bits) - 1)) as u32
        }
    }
}

struct Pending {
    request: MemoryRequest,
    source_id: u64,
}

/// Wraps a [`DramModel`] with the request/return queues and address-mapping
/// logic.
pub struct DramController<M: DramModel> {
    model: M,
    mapping: ChannelMapping,
    num_channels: usize,
    row_size: u64,
    next_source_id: u64,
    in_flight: VecDeque<Pending>,
    /// Returns ready to be read by the consumer, in completion order.
    pub return_queue: VecDeque<MemoryReturn>,
    /// Total bytes read, accumulated for [`Self::total_bytes_read`].
    bytes_read: u64,
    /// Total bytes written, accumulated for [`Self::total_bytes_written`].
    bytes_written: u64,
    /// Byte content backing this controller's address space. Not part of
    /// the [`DramModel`] seam: that trait models timing/power only, so the
    /// wrapper itself owns the bytes a completed read hands back.
    backing: DramBacking,
}

impl<M: DramModel> DramController<M> {
    /// Wraps `model` with the configuration's channel mapping.
    pub fn new(model: M, config: &DramConfig) -> Self {
        Self {
            model,
            mapping: config.channel_mapping,
            num_channels: config.num_channels,
            row_size: config.row_size,
            next_source_id: 0,
            in_flight: VecDeque::new(),
            return_queue: VecDeque::new(),
            bytes_read: 0,
            bytes_written: 0,
            backing: DramBacking::new(),
        }
    }

    /// Preloads `data` into the backing store at `addr` without going
    /// through the timing model, for seeding scene content (treelets,
    /// triangles, initial ray state) before a run starts.
    pub fn preload(&mut self, addr: u64, data: &[u8]) {
        self.backing.write(addr, data);
    }

    /// Reads `len` bytes directly from the backing store, bypassing the
    /// timing model, for inspecting committed results (hit records,
    /// framebuffer pixels) after a run.
    #[must_use]
    pub fn peek_bytes(&self, addr: u64, len: usize) -> Vec<u8> {
        self.backing.read(addr, len)
    }

    /// Submits `req` (read or write) to the black-box model, returning the
    /// external fault unchanged if the model rejects it.
    pub fn write_request(&mut self, req: MemoryRequest) -> Result<(), ExternalFault> {
        let channel = channel_of(req.paddr.val(), self.mapping, self.num_channels, self.row_size);
        let source_id = self.next_source_id;
        self.next_source_id += 1;
        let kind = match req.kind {
            RequestKind::Store => ControllerRequestKind::Write,
            _ => ControllerRequestKind::Read,
        };
        if kind == ControllerRequestKind::Write {
            self.bytes_written += req.size as u64;
            self.backing.write(req.paddr.val(), req.payload());
        }
        self.model.send(ControllerRequest {
            address: req.paddr.val(),
            kind,
            channel,
            source_id,
        })?;
        self.in_flight.push_back(Pending { request: req, source_id });
        Ok(())
    }

    /// Advances the black-box model by one cycle, moving any requests it
    /// reports complete into [`Self::return_queue`] (store requests produce
    /// no return).
    pub fn tick(&mut self) {
        let completed = self.model.tick();
        if completed.is_empty() {
            return;
        }
        let mut remaining = VecDeque::with_capacity(self.in_flight.len());
        while let Some(pending) = self.in_flight.pop_front() {
            if completed.contains(&pending.source_id) {
                if !matches!(pending.request.kind, RequestKind::Store) {
                    self.bytes_read += pending.request.size as u64;
                    let block = self.backing.read(pending.request.paddr.val(), pending.request.size as usize);
                    let ret = MemoryReturn::from_request(&pending.request, &block);
                    self.return_queue.push_back(ret);
                }
            } else {
                remaining.push_back(pending);
            }
        }
        self.in_flight = remaining;
    }

    /// Peeks the next ready return without consuming it.
    #[must_use]
    pub fn peek_return(&self) -> Option<&MemoryReturn> {
        self.return_queue.front()
    }

    /// Consumes and returns the next ready return.
    pub fn read_return(&mut self) -> Option<MemoryReturn> {
        self.return_queue.pop_front()
    }

    /// Total bytes read over the run.
    #[must_use]
    pub fn total_bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Total bytes written over the run.
    #[must_use]
    pub fn total_bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Estimated power in watts at finalization, from the model's aggregate
    /// activation/precharge counters plus this wrapper's byte counters.
    #[must_use]
    pub fn finalize_power_watts(&self, run_seconds: f64) -> f64 {
        if run_seconds <= 0.0 {
            return 0.0;
        }
        let activation_nj = 1.2 * self.model.activations() as f64;
        let precharge_nj = 0.9 * self.model.precharges() as f64;
        let byte_nj = 0.02 * (self.bytes_read + self.bytes_written) as f64;
        (activation_nj + precharge_nj + byte_nj) / 1_000_000_000.0 / run_seconds
    }
}
