//! Simulation statistics: the numeric counters reported at the end of a run.
//!
//! `SimStats` is a plain data struct accumulated by units over the run and
//! printed via [`SimStats::print_sections`], mirroring the separation the
//! teacher crate draws between `stats.rs` (a data struct with its own
//! `print`) and `tracing` calls used for diagnostics elsewhere in this crate.

use std::time::Instant;

/// Simulation statistics accumulated over one run.
#[derive(Clone)]
pub struct SimStats {
    start_time: Instant,
    /// Total simulator cycles elapsed.
    pub cycles: u64,

    /// Rays launched (root + all secondary/child-segment rays).
    pub rays_launched: u64,
    /// Rays that resolved to a hit.
    pub rays_hit: u64,
    /// BVH nodes intersected.
    pub nodes_intersected: u64,
    /// Triangles intersected.
    pub triangles_intersected: u64,

    /// Segments (treelets) admitted to the active set over the run.
    pub segments_launched: u64,
    /// Buckets dispatched to an RT-core for draining.
    pub buckets_launched: u64,
    /// Buckets written back to DRAM (filled and flushed).
    pub buckets_generated: u64,

    /// L1 cache hits.
    pub l1_hits: u64,
    /// L1 cache misses (first access to a line).
    pub l1_misses: u64,
    /// L1 half-misses (joined an in-flight MSHR).
    pub l1_half_misses: u64,
    /// L2 cache hits.
    pub l2_hits: u64,
    /// L2 cache misses.
    pub l2_misses: u64,
    /// L2 half-misses.
    pub l2_half_misses: u64,

    /// Bytes read from DRAM.
    pub dram_bytes_read: u64,
    /// Bytes written to DRAM.
    pub dram_bytes_written: u64,
    /// Row activations performed by the DRAM model.
    pub dram_activations: u64,
    /// Row precharges performed by the DRAM model.
    pub dram_precharges: u64,

    /// Cycles any RT-core spent stalled for lack of a schedulable ray.
    pub rt_core_stall_cycles: u64,
}

impl Default for SimStats {
    fn default() -> Self {
        Self {
            start_time: Instant::now(),
            cycles: 0,
            rays_launched: 0,
            rays_hit: 0,
            nodes_intersected: 0,
            triangles_intersected: 0,
            segments_launched: 0,
            buckets_launched: 0,
            buckets_generated: 0,
            l1_hits: 0,
            l1_misses: 0,
            l1_half_misses: 0,
            l2_hits: 0,
            l2_misses: 0,
            l2_half_misses: 0,
            dram_bytes_read: 0,
            dram_bytes_written: 0,
            dram_activations: 0,
            dram_precharges: 0,
            rt_core_stall_cycles: 0,
        }
    }
}

/// Section names for selective stats output.
pub const STATS_SECTIONS: &[&str] = &["summary", "rays", "coalescer", "memory", "dram"];

impl SimStats {
    /// Estimated DRAM energy in millijoules, from a crude per-activation /
    /// per-byte cost model (the black-box DRAM model's own power figures,
    /// where available, should be preferred; this is a fallback estimate
    /// when only the aggregate counters are known).
    #[must_use]
    pub fn estimated_dram_energy_mj(&self) -> f64 {
        let activation_cost_nj = 1.2;
        let precharge_cost_nj = 0.9;
        let byte_cost_nj = 0.02;
        let nj = (self.dram_activations as f64) * activation_cost_nj
            + (self.dram_precharges as f64) * precharge_cost_nj
            + ((self.dram_bytes_read + self.dram_bytes_written) as f64) * byte_cost_nj;
        nj / 1_000_000.0
    }

    /// Prints only the requested statistics sections to stdout.
    ///
    /// Pass an empty slice to print every section (same as [`Self::print`]).
    pub fn print_sections(&self, sections: &[String]) {
        let want = |s: &str| sections.is_empty() || sections.iter().any(|x| x == s);
        let duration = self.start_time.elapsed();
        let seconds = duration.as_secs_f64().max(1e-9);
        let cyc = self.cycles.max(1);

        if want("summary") {
            let mrays_per_sec = (self.rays_launched as f64 / seconds) / 1_000_000.0;
            println!("\n==========================================================");
            println!("RAY-TRACING ACCELERATOR SIMULATION STATISTICS");
            println!("==========================================================");
            println!("host_seconds             {seconds:.4} s");
            println!("sim_cycles               {}", self.cycles);
            println!("mrays_per_sec            {mrays_per_sec:.3}");
            println!("energy_mj                {:.3}", self.estimated_dram_energy_mj());
            println!("----------------------------------------------------------");
        }
        if want("rays") {
            let hit_rate = 100.0 * self.rays_hit as f64 / self.rays_launched.max(1) as f64;
            println!("RAYS");
            println!("  rays.launched          {}", self.rays_launched);
            println!("  rays.hit               {} ({hit_rate:.2}%)", self.rays_hit);
            println!("  nodes.intersected      {}", self.nodes_intersected);
            println!("  tris.intersected       {}", self.triangles_intersected);
            println!(
                "  rt_core.stall_cycles   {} ({:.2}%)",
                self.rt_core_stall_cycles,
                100.0 * self.rt_core_stall_cycles as f64 / cyc as f64
            );
            println!("----------------------------------------------------------");
        }
        if want("coalescer") {
            println!("COALESCER / SCHEDULER");
            println!("  segments.launched      {}", self.segments_launched);
            println!("  buckets.launched       {}", self.buckets_launched);
            println!("  buckets.generated      {}", self.buckets_generated);
            println!("----------------------------------------------------------");
        }
        if want("memory") {
            let print_cache = |name: &str, hits: u64, misses: u64, half: u64| {
                let total = hits + misses + half;
                let miss_rate = if total > 0 {
                    100.0 * misses as f64 / total as f64
                } else {
                    0.0
                };
                println!(
                    "  {name:<6} accesses: {total:<10} hits: {hits:<10} half_miss: {half:<10} miss_rate: {miss_rate:.2}%"
                );
            };
            println!("CACHE HIERARCHY");
            print_cache("L1", self.l1_hits, self.l1_misses, self.l1_half_misses);
            print_cache("L2", self.l2_hits, self.l2_misses, self.l2_half_misses);
            println!("----------------------------------------------------------");
        }
        if want("dram") {
            println!("DRAM");
            println!("  bytes.read             {}", self.dram_bytes_read);
            println!("  bytes.written          {}", self.dram_bytes_written);
            println!("  activations            {}", self.dram_activations);
            println!("  precharges             {}", self.dram_precharges);
        }
        println!("==========================================================");
    }

    /// Prints every statistics section to stdout. Equivalent to
    /// `print_sections(&[])`.
    pub fn print(&self) {
        self.print_sections(&[]);
    }
}
