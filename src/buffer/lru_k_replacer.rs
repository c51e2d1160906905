use std::collections::{HashMap, VecDeque};

use log::trace;

use crate::common::config::FrameId;
use crate::common::time::{SystemTimeSource, TimeSource};

#[derive(Clone, Copy, Debug)]
pub enum AccessType {
    Unknown = 0,
    Lookup,
    Scan,
    Index,
}

/// Per-frame access history: up to `k` timestamps, newest at the back.
struct LRUKNode {
    history: VecDeque<u64>,
    is_evictable: bool,
}

impl LRUKNode {
    fn new(k: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(k),
            is_evictable: false,
        }
    }

    /// Oldest remembered access. With the history capped at `k`, this is also
    /// the k-th most recent access once the frame has been seen `k` times.
    fn earliest_access(&self) -> u64 {
        *self.history.front().expect("node has no access history")
    }
}

/// LRU-K replacement policy.
///
/// The victim is the evictable frame with the greatest backward k-distance:
/// frames with fewer than `k` recorded accesses have infinite distance and are
/// preferred, tie-broken by their earliest access timestamp; otherwise the
/// frame whose k-th most recent access is oldest wins.
pub struct LRUKReplacer {
    node_store: HashMap<FrameId, LRUKNode>,
    curr_size: usize,
    replacer_size: usize,
    k: usize,
    time_source: Box<dyn TimeSource>,
    last_timestamp: u64,
}

impl LRUKReplacer {
    pub fn new(num_frames: usize, k: usize) -> Self {
        Self::with_time_source(num_frames, k, Box::new(SystemTimeSource))
    }

    pub fn with_time_source(num_frames: usize, k: usize, time_source: Box<dyn TimeSource>) -> Self {
        assert!(k >= 1, "lru-k requires k >= 1");
        Self {
            node_store: HashMap::new(),
            curr_size: 0,
            replacer_size: num_frames,
            k,
            time_source,
            last_timestamp: 0,
        }
    }

    /// Picks and removes the eviction victim, or returns `None` when no frame
    /// is evictable. The victim's history is cleared (it becomes untracked).
    pub fn evict(&mut self) -> Option<FrameId> {
        if self.curr_size == 0 {
            return None;
        }

        // Frames with fewer than k accesses have +inf distance and are
        // victimized first, oldest first access wins.
        let mut victim: Option<(u64, FrameId)> = None;
        for (&frame_id, node) in &self.node_store {
            if !node.is_evictable || node.history.len() >= self.k {
                continue;
            }
            let earliest = node.earliest_access();
            if victim.map_or(true, |(best, _)| earliest < best) {
                victim = Some((earliest, frame_id));
            }
        }

        if victim.is_none() {
            // All evictable frames have full histories; the oldest k-th most
            // recent access loses.
            for (&frame_id, node) in &self.node_store {
                if !node.is_evictable {
                    continue;
                }
                let kth_recent = node.earliest_access();
                if victim.map_or(true, |(best, _)| kth_recent < best) {
                    victim = Some((kth_recent, frame_id));
                }
            }
        }

        let (_, frame_id) = victim?;
        self.node_store.remove(&frame_id);
        self.curr_size -= 1;
        trace!("evicting frame {}", frame_id);
        Some(frame_id)
    }

    /// Appends an access timestamp for the frame, creating its record on
    /// first use. At most `k` timestamps are retained.
    ///
    /// # Panics
    ///
    /// Panics if `frame_id` is outside the replacer's capacity.
    pub fn record_access(&mut self, frame_id: FrameId, _access_type: AccessType) {
        assert!(
            frame_id < self.replacer_size,
            "frame id {} exceeds replacer capacity {}",
            frame_id,
            self.replacer_size
        );

        let timestamp = self.next_timestamp();
        let k = self.k;
        let node = self
            .node_store
            .entry(frame_id)
            .or_insert_with(|| LRUKNode::new(k));
        node.history.push_back(timestamp);
        if node.history.len() > k {
            node.history.pop_front();
        }
    }

    /// Toggles whether the frame may be chosen as a victim, adjusting the
    /// evictable count on an actual change.
    ///
    /// # Panics
    ///
    /// Panics if the frame is out of range or has never been accessed.
    pub fn set_evictable(&mut self, frame_id: FrameId, set_evictable: bool) {
        assert!(
            frame_id < self.replacer_size,
            "frame id {} exceeds replacer capacity {}",
            frame_id,
            self.replacer_size
        );
        let node = self
            .node_store
            .get_mut(&frame_id)
            .unwrap_or_else(|| panic!("frame {} has never been accessed", frame_id));

        if node.is_evictable != set_evictable {
            node.is_evictable = set_evictable;
            if set_evictable {
                self.curr_size += 1;
            } else {
                self.curr_size -= 1;
            }
        }
    }

    /// Drops the frame's record. A no-op for untracked frames.
    ///
    /// # Panics
    ///
    /// Panics if the frame is tracked but not evictable.
    pub fn remove(&mut self, frame_id: FrameId) {
        assert!(
            frame_id < self.replacer_size,
            "frame id {} exceeds replacer capacity {}",
            frame_id,
            self.replacer_size
        );
        match self.node_store.get(&frame_id) {
            None => {}
            Some(node) => {
                assert!(
                    node.is_evictable,
                    "cannot remove non-evictable frame {}",
                    frame_id
                );
                self.node_store.remove(&frame_id);
                self.curr_size -= 1;
            }
        }
    }

    /// Number of frames currently evictable.
    pub fn size(&self) -> usize {
        self.curr_size
    }

    /// Number of frames with a tracked access history.
    pub fn total_frames(&self) -> usize {
        self.node_store.len()
    }

    /// Timestamps must be strictly increasing for victim selection to be a
    /// total order, even when the clock's resolution is coarser than the
    /// access rate.
    fn next_timestamp(&mut self) -> u64 {
        let now = self.time_source.now().max(self.last_timestamp + 1);
        self.last_timestamp = now;
        now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evict_on_empty_replacer_returns_none() {
        let mut replacer = LRUKReplacer::new(4, 2);
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn under_k_frames_are_victimized_before_full_histories() {
        let mut replacer = LRUKReplacer::new(4, 2);
        replacer.record_access(0, AccessType::Unknown);
        replacer.record_access(0, AccessType::Unknown);
        replacer.record_access(1, AccessType::Unknown);
        replacer.set_evictable(0, true);
        replacer.set_evictable(1, true);

        // Frame 1 has a single access: infinite distance, evicted first.
        assert_eq!(replacer.evict(), Some(1));
        assert_eq!(replacer.evict(), Some(0));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    #[should_panic(expected = "exceeds replacer capacity")]
    fn record_access_out_of_range_panics() {
        let mut replacer = LRUKReplacer::new(2, 2);
        replacer.record_access(2, AccessType::Unknown);
    }

    #[test]
    #[should_panic(expected = "never been accessed")]
    fn set_evictable_unknown_frame_panics() {
        let mut replacer = LRUKReplacer::new(2, 2);
        replacer.set_evictable(0, true);
    }

    #[test]
    #[should_panic(expected = "non-evictable")]
    fn remove_pinned_frame_panics() {
        let mut replacer = LRUKReplacer::new(2, 2);
        replacer.record_access(0, AccessType::Unknown);
        replacer.remove(0);
    }

    #[test]
    fn set_evictable_is_idempotent() {
        let mut replacer = LRUKReplacer::new(2, 2);
        replacer.record_access(0, AccessType::Unknown);
        replacer.set_evictable(0, true);
        replacer.set_evictable(0, true);
        assert_eq!(replacer.size(), 1);
        replacer.set_evictable(0, false);
        replacer.set_evictable(0, false);
        assert_eq!(replacer.size(), 0);
    }
}
