//! Admission control: which treelet segments are active, and in what
//! order their children are revealed.

use crate::config::{TraversalScheme, WeightScheme};
use crate::coalescer::segment::SegmentState;
use crate::rt::treelet::TreeletHeader;
use std::collections::{HashMap, VecDeque};

/// Drives which segments are in the active working set and hands out the
/// next segment whose children should be revealed, under a byte budget.
pub struct Scheduler {
    pub traversal_scheme: TraversalScheme,
    pub weight_scheme: WeightScheme,
    pub max_active_set_size: u64,

    pub segment_states: HashMap<u32, SegmentState>,
    pub active_segments: Vec<u32>,
    last_segment_activated: u32,
    active_segments_size: u64,

    traversal_queue: VecDeque<u32>,
    traversal_stack: Vec<u32>,

    pub root_rays_counter: u32,
    pub num_root_rays: u32,
}

impl Scheduler {
    /// Creates a scheduler with segment 0 (the root treelet) already active.
    #[must_use]
    pub fn new(
        traversal_scheme: TraversalScheme,
        weight_scheme: WeightScheme,
        max_active_set_size: u64,
        num_root_rays: u32,
        root_bytes: u64,
    ) -> Self {
        let mut segment_states = HashMap::new();
        segment_states.insert(0, SegmentState::default());
        Self {
            traversal_scheme,
            weight_scheme,
            max_active_set_size,
            segment_states,
            active_segments: vec![0],
            last_segment_activated: 0,
            active_segments_size: root_bytes,
            traversal_queue: VecDeque::new(),
            traversal_stack: Vec::new(),
            root_rays_counter: 0,
            num_root_rays,
        }
    }

    /// `true` once every segment has retired and none remain active.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.active_segments.is_empty()
    }

    fn child_weight(&self, child: &SegmentState) -> f64 {
        match self.weight_scheme {
            WeightScheme::TotalWeight => child.weight as f64,
            WeightScheme::AverageRayWeight => child.weight as f64 / child.num_rays.max(1) as f64,
            WeightScheme::InverseRayCount => 1.0 / child.num_rays.max(1) as f64,
            WeightScheme::MemoryOrder => 0.0,
        }
    }

    /// Advances admission control by one step: reveals the active
    /// segment's children (if not already revealed) and, budget
    /// permitting, admits the next one from the traversal order.
    ///
    /// `headers` resolves a segment id to its on-disk treelet header, used
    /// to read `num_children`/`first_child`/`depth`/`bytes`.
    pub fn step(&mut self, headers: &impl Fn(u32) -> TreeletHeader) {
        if self.root_rays_counter < self.num_root_rays {
            return;
        }
        let buckets_ready: usize = self
            .active_segments
            .iter()
            .filter_map(|s| self.segment_states.get(s))
            .map(|s| s.bucket_address_queue.len())
            .sum();

        let last = self.last_segment_activated;
        let last_children_scheduled = self.segment_states.get(&last).map(|s| s.children_scheduled).unwrap_or(true);
        if !last_children_scheduled {
            self.reveal_children(last, headers);
        }

        let next = match self.traversal_scheme {
            TraversalScheme::Bfs => self.traversal_queue.front().copied(),
            TraversalScheme::Dfs => self.traversal_stack.last().copied(),
        };
        let Some(next_segment) = next else {
            return;
        };
        let header = headers(next_segment);
        if u64::from(header.bytes) + self.active_segments_size <= self.max_active_set_size || buckets_ready == 0 {
            match self.traversal_scheme {
                TraversalScheme::Bfs => {
                    self.traversal_queue.pop_front();
                }
                TraversalScheme::Dfs => {
                    self.traversal_stack.pop();
                }
            }
            self.active_segments_size += u64::from(header.bytes);
            self.active_segments.push(next_segment);
            self.last_segment_activated = next_segment;
            self.segment_states.entry(next_segment).or_default();
            if header.num_children == 0 {
                if let Some(s) = self.segment_states.get_mut(&next_segment) {
                    s.children_scheduled = true;
                }
            }
        }
    }

    fn reveal_children(&mut self, parent: u32, headers: &impl Fn(u32) -> TreeletHeader) {
        let (parent_finished, total_buckets) = self
            .segment_states
            .get(&parent)
            .map_or((false, 0), |s| (s.parent_finished, s.total_buckets));

        // A segment whose parent has already finished and that never received a
        // bucket is a provably empty subtree: its children are never revealed.
        if parent_finished && total_buckets == 0 {
            if let Some(s) = self.segment_states.get_mut(&parent) {
                s.children_scheduled = true;
            }
            return;
        }

        let header = headers(parent);
        let parent_depth = self.segment_states.get(&parent).map(|s| s.depth).unwrap_or(0);
        let mut child_ids: Vec<u32> = (0..header.num_children).map(|i| header.first_child + i).collect();
        for &child in &child_ids {
            let child_state = self.segment_states.entry(child).or_default();
            child_state.depth = parent_depth + 1;
        }
        match self.traversal_scheme {
            TraversalScheme::Bfs => {
                for child in child_ids {
                    self.traversal_queue.push_back(child);
                }
            }
            TraversalScheme::Dfs => {
                child_ids.sort_by(|&a, &b| {
                    let wa = self.segment_states.get(&a).map(|s| self.child_weight(s)).unwrap_or(0.0);
                    let wb = self.segment_states.get(&b).map(|s| self.child_weight(s)).unwrap_or(0.0);
                    wa.partial_cmp(&wb).unwrap_or(std::cmp::Ordering::Equal)
                });
                for child in child_ids {
                    self.traversal_stack.push(child);
                }
            }
        }
        if let Some(s) = self.segment_states.get_mut(&parent) {
            s.children_scheduled = true;
        }
    }

    /// Finds the highest-priority active segment with a ready bucket for
    /// `requesting_tm`, preferring the segment it was last pinned to.
    #[must_use]
    pub fn pick_segment_for_tm(&self, requesting_tm: u32, last_segment_on_tm: Option<u32>) -> Option<u32> {
        let mut best: Option<(u32, f64)> = None;
        for &segment in &self.active_segments {
            let state = self.segment_states.get(&segment)?;
            if state.bucket_address_queue.is_empty() {
                continue;
            }
            if state.num_tms == 0 {
                return Some(segment);
            }
            if Some(segment) == last_segment_on_tm {
                return Some(segment);
            }
            let score = f64::from(state.num_tms) / state.bucket_address_queue.len() as f64;
            let better = match best {
                Some((_, best_score)) => score < best_score,
                None => true,
            };
            if better {
                best = Some((segment, score));
            }
        }
        let _ = requesting_tm;
        best.map(|(segment, _)| segment)
    }
}

#[cfg(test)]
mod tests {
    use super::Scheduler;
    use crate::config::{TraversalScheme, WeightScheme};
    use crate::rt::treelet::TreeletHeader;

    fn header_of(id: u32) -> TreeletHeader {
        match id {
            0 => TreeletHeader {
                bytes: 1024,
                num_children: 2,
                first_child: 1,
                depth: 0,
            },
            _ => TreeletHeader {
                bytes: 512,
                num_children: 0,
                first_child: 0,
                depth: 1,
            },
        }
    }

    #[test]
    fn bfs_reveals_and_admits_children_in_order() {
        let mut sched = Scheduler::new(TraversalScheme::Bfs, WeightScheme::TotalWeight, 1 << 20, 1, 1024);
        sched.root_rays_counter = 1;
        sched.step(&header_of);
        assert!(sched.active_segments.contains(&1));
        sched.step(&header_of);
        assert!(sched.active_segments.contains(&2));
    }

    #[test]
    fn children_of_a_finished_empty_parent_are_never_revealed() {
        let mut sched = Scheduler::new(TraversalScheme::Bfs, WeightScheme::TotalWeight, 1 << 20, 1, 1024);
        sched.root_rays_counter = 1;
        sched.segment_states.get_mut(&0).unwrap().parent_finished = true;
        sched.segment_states.get_mut(&0).unwrap().total_buckets = 0;
        sched.step(&header_of);
        assert!(sched.traversal_queue.is_empty());
        assert!(!sched.active_segments.contains(&1));
        assert!(sched.segment_states.get(&0).unwrap().children_scheduled);
    }

    #[test]
    fn scheduler_completes_once_no_segments_remain_active() {
        let mut sched = Scheduler::new(TraversalScheme::Bfs, WeightScheme::TotalWeight, 1 << 20, 0, 1024);
        assert!(!sched.is_complete());
        sched.active_segments.clear();
        assert!(sched.is_complete());
    }
}
