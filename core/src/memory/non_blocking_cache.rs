//! Non-blocking cache: per-bank MSHR allocation, data-array-latency fills,
//! write-combining, bypass, and prefetch.
//!
//! Grounded on the original hardware model's `UnitNonBlockingCache`
//! (`_fetch_lfb`, `_allocate_lfb`, `_proccess_request`, `_proccess_return`,
//! `_try_request_lfb`, `_try_return_lfb`, bank-level `clock_rise`/`clock_fall`).
//! Address routing to a bank and the crossbars on either side of the cache
//! are modeled by the surrounding [`crate::interconnect`] primitives; this
//! type owns exactly one bank's worth of MSHR bookkeeping, replicated
//! `num_banks` times.

use std::collections::VecDeque;

use crate::common::addr::PhysAddr;
use crate::common::request::{BypassFlags, MemoryRequest, MemoryReturn, RequestKind, ReturnKind};
use crate::config::{CacheConfig, ReplacementPolicy};
use crate::memory::cache_base::CacheBase;
use crate::memory::mshr::{Mshr, MshrState, MshrType};

/// Outcome of processing one ingress request against a bank, used only for
/// statistics attribution by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Joined an existing, not-yet-filled MSHR.
    HalfMiss,
    /// Joined an already-filled line-fill buffer.
    LfbHit,
    /// Tag array hit on allocation; will fill from the data-array pipeline.
    Hit,
    /// Tag array miss; forwarded to the next level.
    Miss,
    /// MSHR pool exhausted; caller must retry the request next cycle.
    Stall,
}

struct PendingFill {
    mshr: usize,
    cycles_remaining: u32,
}

/// One bank's MSHR pool and associated queues.
struct Bank {
    mshrs: Vec<Mshr>,
    data_array_pipeline: Vec<PendingFill>,
    mshr_request_queue: VecDeque<usize>,
    mshr_return_queue: VecDeque<usize>,
    uncached_write_queue: VecDeque<MemoryRequest>,
}

impl Bank {
    fn new(num_mshr: usize) -> Self {
        Self {
            mshrs: (0..num_mshr).map(|_| Mshr::default()).collect(),
            data_array_pipeline: Vec::new(),
            mshr_request_queue: VecDeque::new(),
            mshr_return_queue: VecDeque::new(),
            uncached_write_queue: VecDeque::new(),
        }
    }

    /// Linear scan for a non-`Invalid` MSHR matching `block_addr`/`kind`.
    fn fetch(&self, block_addr: u64, kind: MshrType) -> Option<usize> {
        self.mshrs.iter().position(|m| {
            !m.is_invalid()
                && m.block_addr == block_addr
                && std::mem::discriminant(&m.kind) == std::mem::discriminant(&kind)
        })
    }

    /// Allocates a fresh MSHR, preferring an `Invalid` slot; else the
    /// `Retired` slot with the highest LRU, incrementing every other slot's
    /// LRU and resetting the winner's.
    fn allocate(&mut self, block_addr: u64, kind: MshrType) -> Option<usize> {
        if let Some(idx) = self.mshrs.iter().position(Mshr::is_invalid) {
            self.mshrs[idx].allocate(block_addr, kind);
            return Some(idx);
        }
        let retired = self
            .mshrs
            .iter()
            .enumerate()
            .filter(|(_, m)| matches!(m.state, MshrState::Retired))
            .max_by_key(|(_, m)| m.lru)
            .map(|(idx, _)| idx)?;
        for m in &mut self.mshrs {
            m.lru = m.lru.saturating_add(1);
        }
        self.mshrs[retired].transition(MshrState::Invalid, 0);
        self.mshrs[retired].allocate(block_addr, kind);
        Some(retired)
    }

    fn fetch_or_allocate(&mut self, block_addr: u64, kind: MshrType) -> Option<usize> {
        self.fetch(block_addr, kind)
            .or_else(|| self.allocate(block_addr, kind))
    }
}

/// A non-blocking cache: tag/data array plus a set of independently banked
/// MSHR pools.
pub struct NonBlockingCache {
    cache_base: CacheBase,
    banks: Vec<Bank>,
    block_size: usize,
    latency: u64,
    use_lfb: bool,
    level: u8,

    /// Requests produced here must be forwarded to the next memory level.
    pub miss_out: VecDeque<MemoryRequest>,
    /// Returns ready for the response crossbar.
    pub response_out: VecDeque<MemoryReturn>,
}

impl NonBlockingCache {
    /// Builds a new non-blocking cache from `config`, tagged as cache
    /// `level` (used for [`BypassFlags`] interpretation).
    #[must_use]
    pub fn new(config: &CacheConfig, block_size: usize, level: u8) -> Self {
        let sector_size = config.resolved_sector_size(block_size);
        Self {
            cache_base: CacheBase::new(
                config.size_bytes,
                block_size,
                config.associativity,
                sector_size,
                config.policy,
            ),
            banks: (0..config.num_banks)
                .map(|_| Bank::new(config.num_mshr))
                .collect(),
            block_size,
            latency: config.latency,
            use_lfb: config.use_lfb,
            level,
        }
    }

    fn bank_index(&self, block_addr: u64) -> usize {
        ((block_addr / self.block_size as u64) as usize) % self.banks.len()
    }

    /// Advances every bank's data-array latency pipeline by one cycle,
    /// moving MSHRs whose latency has elapsed from `DataArray` to `Filled`
    /// and enqueueing them for return.
    pub fn clock_data_arrays(&mut self, cycle: u64) {
        for bank in &mut self.banks {
            let mut finished = Vec::new();
            bank.data_array_pipeline.retain_mut(|pending| {
                if pending.cycles_remaining == 0 {
                    finished.push(pending.mshr);
                    false
                } else {
                    pending.cycles_remaining -= 1;
                    true
                }
            });
            for mshr in finished {
                bank.mshrs[mshr].transition(MshrState::Filled, cycle);
                bank.mshr_return_queue.push_back(mshr);
            }
        }
    }

    /// Processes one ingress request against the bank it maps to.
    ///
    /// Handles bypass (forwarded unchanged), prefetch (joins/allocates a
    /// `Read` MSHR with no sub-entry), store (write-combining under LFB, or
    /// a plain forward otherwise), and load (fetch-or-allocate, tag array
    /// lookup, data-array-pipeline entry or miss-queue entry).
    pub fn process_request(&mut self, req: MemoryRequest, cycle: u64) -> RequestOutcome {
        assert!(
            req.size as usize <= self.block_size,
            "{}",
            crate::common::error::Violation::RequestTooLarge {
                cycle,
                size: req.size as usize,
                max: self.block_size,
            }
        );

        if req.flags.bypasses(self.level) {
            self.miss_out.push_back(req);
            return RequestOutcome::Miss;
        }

        let block_addr = PhysAddr::new(req.paddr.val()).block_addr(self.block_size as u64).val();
        let bank_idx = self.bank_index(block_addr);

        match req.kind {
            RequestKind::Store if self.use_lfb => {
                self.process_write_combining(bank_idx, block_addr, &req, cycle)
            }
            RequestKind::Store => {
                self.banks[bank_idx].uncached_write_queue.push_back(req);
                RequestOutcome::Miss
            }
            RequestKind::Prefetch => {
                self.process_prefetch(bank_idx, block_addr, cycle);
                RequestOutcome::Miss
            }
            _ => self.process_read(bank_idx, block_addr, &req, cycle),
        }
    }

    fn process_write_combining(
        &mut self,
        bank_idx: usize,
        block_addr: u64,
        req: &MemoryRequest,
        cycle: u64,
    ) -> RequestOutcome {
        let Some(mshr_idx) = self.banks[bank_idx].fetch_or_allocate(block_addr, MshrType::WriteCombining) else {
            return RequestOutcome::Stall;
        };
        let bank = &mut self.banks[bank_idx];
        let mshr = &mut bank.mshrs[mshr_idx];
        let was_empty = matches!(mshr.state, MshrState::Empty);
        let offset = (req.paddr.val() - block_addr) as usize;
        let full = mshr.combine_write(offset, req.payload());
        if was_empty {
            mshr.transition(MshrState::Filled, cycle);
            bank.mshr_request_queue.push_back(mshr_idx);
        }
        if full {
            RequestOutcome::Hit
        } else {
            RequestOutcome::HalfMiss
        }
    }

    fn process_prefetch(&mut self, bank_idx: usize, block_addr: u64, cycle: u64) {
        if let Some(mshr_idx) = self.banks[bank_idx].fetch_or_allocate(block_addr, MshrType::Read) {
            self.try_start_fill(bank_idx, mshr_idx, block_addr, cycle);
        }
    }

    fn process_read(
        &mut self,
        bank_idx: usize,
        block_addr: u64,
        req: &MemoryRequest,
        cycle: u64,
    ) -> RequestOutcome {
        let existing = self.banks[bank_idx].fetch(block_addr, MshrType::Read);
        let (mshr_idx, is_new) = match existing {
            Some(idx) => (idx, false),
            None => match self.banks[bank_idx].allocate(block_addr, MshrType::Read) {
                Some(idx) => (idx, true),
                None => return RequestOutcome::Stall,
            },
        };

        let sub_entry = crate::memory::mshr::SubEntry {
            dst: req.dst,
            port: req.port,
            size: req.size,
            offset: (req.paddr.val() - block_addr) as u16,
        };

        let state = self.banks[bank_idx].mshrs[mshr_idx].state;
        match state {
            MshrState::Missed => {
                self.banks[bank_idx].mshrs[mshr_idx].sub_entries.push_back(sub_entry);
                RequestOutcome::HalfMiss
            }
            MshrState::Filled => {
                self.banks[bank_idx].mshrs[mshr_idx].sub_entries.push_back(sub_entry);
                RequestOutcome::LfbHit
            }
            MshrState::Retired => {
                self.banks[bank_idx]
                    .mshrs[mshr_idx]
                    .transition(MshrState::Filled, cycle);
                self.banks[bank_idx].mshrs[mshr_idx].sub_entries.push_back(sub_entry);
                self.banks[bank_idx].mshr_return_queue.push_back(mshr_idx);
                RequestOutcome::LfbHit
            }
            MshrState::Empty if is_new => {
                self.banks[bank_idx].mshrs[mshr_idx].sub_entries.push_back(sub_entry);
                self.try_start_fill(bank_idx, mshr_idx, block_addr, cycle)
            }
            MshrState::DataArray | MshrState::Empty => {
                self.banks[bank_idx].mshrs[mshr_idx].sub_entries.push_back(sub_entry);
                RequestOutcome::HalfMiss
            }
            MshrState::Invalid => unreachable!("fetch/allocate never returns an invalid slot"),
        }
    }

    /// Consults the tag array for a freshly-allocated `Empty` MSHR: on hit,
    /// copies the block into staging and enters the data-array latency
    /// pipeline (or, for zero latency, transitions straight to `Filled`);
    /// on miss, transitions to `Missed` and enqueues the bank's miss queue.
    fn try_start_fill(
        &mut self,
        bank_idx: usize,
        mshr_idx: usize,
        block_addr: u64,
        cycle: u64,
    ) -> RequestOutcome {
        if let Some(sector) = self.cache_base.read_sector(block_addr) {
            let bytes = sector.to_vec();
            let bank = &mut self.banks[bank_idx];
            bank.mshrs[mshr_idx].block_data[..bytes.len()].copy_from_slice(&bytes);
            if self.latency == 0 {
                bank.mshrs[mshr_idx].transition(MshrState::Filled, cycle);
                bank.mshr_return_queue.push_back(mshr_idx);
            } else {
                bank.mshrs[mshr_idx].transition(MshrState::DataArray, cycle);
                bank.data_array_pipeline.push(PendingFill {
                    mshr: mshr_idx,
                    cycles_remaining: self.latency as u32,
                });
            }
            RequestOutcome::Hit
        } else {
            let bank = &mut self.banks[bank_idx];
            bank.mshrs[mshr_idx].transition(MshrState::Missed, cycle);
            bank.mshr_request_queue.push_back(mshr_idx);
            RequestOutcome::Miss
        }
    }

    /// Processes a return arriving from the next memory level: finds the
    /// `Missed` MSHR by block address, installs the block both into the
    /// tag/data array and the MSHR staging buffer, and enqueues it for
    /// return draining.
    pub fn process_return(&mut self, ret: &MemoryReturn, cycle: u64) {
        let block_addr = ret.paddr.block_addr(self.block_size as u64).val();
        let bank_idx = self.bank_index(block_addr);
        let Some(mshr_idx) = self.banks[bank_idx].fetch(block_addr, MshrType::Read) else {
            return;
        };
        assert_eq!(
            self.banks[bank_idx].mshrs[mshr_idx].state,
            MshrState::Missed,
            "return for MSHR not in Missed state"
        );
        self.cache_base.allocate_block(block_addr);
        self.cache_base.write_sector(block_addr, ret.payload(), false);

        let bank = &mut self.banks[bank_idx];
        let mshr = &mut bank.mshrs[mshr_idx];
        mshr.block_data[..ret.payload().len()].copy_from_slice(ret.payload());
        mshr.transition(MshrState::Filled, cycle);
        bank.mshr_return_queue.push_back(mshr_idx);
    }

    /// Drains at most one sub-entry per bank per cycle from the head of the
    /// return queue, composing a [`MemoryReturn`] and pushing it to
    /// [`Self::response_out`]. When an MSHR's sub-entries are exhausted,
    /// retires it: `Retired` (LFB mode, reusable) or `Invalid`.
    pub fn drain_returns(&mut self, cycle: u64) -> u64 {
        let mut bytes_read = 0u64;
        for bank in &mut self.banks {
            let Some(&mshr_idx) = bank.mshr_return_queue.front() else {
                continue;
            };
            let Some(sub) = bank.mshrs[mshr_idx].sub_entries.pop_front() else {
                bank.mshr_return_queue.pop_front();
                let next = if self.use_lfb {
                    MshrState::Retired
                } else {
                    MshrState::Invalid
                };
                bank.mshrs[mshr_idx].transition(next, cycle);
                continue;
            };
            let offset = sub.offset as usize;
            let size = sub.size as usize;
            let mut data = [0u8; crate::common::request::MAX_SIZE];
            data[..size].copy_from_slice(&bank.mshrs[mshr_idx].block_data[offset..offset + size]);
            self.response_out.push_back(MemoryReturn {
                kind: ReturnKind::LoadReturn,
                size: sub.size,
                dst: sub.dst,
                port: sub.port,
                paddr: PhysAddr::new(bank.mshrs[mshr_idx].block_addr + sub.offset as u64),
                data,
            });
            bytes_read += size as u64;

            if bank.mshrs[mshr_idx].sub_entries.is_empty() {
                bank.mshr_return_queue.pop_front();
                let next = if self.use_lfb {
                    MshrState::Retired
                } else {
                    MshrState::Invalid
                };
                bank.mshrs[mshr_idx].transition(next, cycle);
            }
        }
        bytes_read
    }

    /// Issues outstanding bank-level miss/write-combining requests and
    /// forwarded plain stores to [`Self::miss_out`].
    pub fn issue_misses(&mut self) {
        for bank in &mut self.banks {
            if let Some(&mshr_idx) = bank.mshr_request_queue.front() {
                let mshr = &bank.mshrs[mshr_idx];
                match mshr.kind {
                    MshrType::Read => {
                        assert_eq!(mshr.state, MshrState::Missed);
                        self.miss_out.push_back(MemoryRequest::read(
                            RequestKind::Load,
                            PhysAddr::new(mshr.block_addr),
                            self.block_size as u8,
                            0,
                        ));
                        bank.mshr_request_queue.pop_front();
                    }
                    MshrType::WriteCombining => {
                        assert_eq!(mshr.state, MshrState::Filled);
                        self.miss_out.push_back(MemoryRequest::store(
                            PhysAddr::new(mshr.block_addr),
                            &mshr.block_data[..self.block_size],
                            0,
                        ));
                        bank.mshr_request_queue.pop_front();
                    }
                    MshrType::Write => {}
                }
                if matches!(mshr.kind, MshrType::WriteCombining) {
                    let idx = mshr_idx;
                    bank.mshrs[idx].transition(MshrState::Invalid, 0);
                }
            } else if let Some(store) = bank.uncached_write_queue.pop_front() {
                self.miss_out.push_back(store);
            }
        }
    }

    /// Writes `data` directly into the underlying cache-base data array for
    /// test setup.
    pub fn direct_write(&mut self, block_addr: u64, data: &[u8]) {
        self.cache_base.direct_write(block_addr, data);
    }

    /// Number of banks in this cache.
    #[must_use]
    pub fn num_banks(&self) -> usize {
        self.banks.len()
    }
}

/// Convenience constructor used by tests and the thread-processor wiring to
/// build a non-bypassed, no-flags request.
#[must_use]
pub fn simple_load(paddr: u64, size: u8, port: u32) -> MemoryRequest {
    let mut req = MemoryRequest::read(RequestKind::Load, PhysAddr::new(paddr), size, port);
    req.flags = BypassFlags::NONE;
    req
}
