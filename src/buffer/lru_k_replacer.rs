use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::common::FrameId;

type Timestamp = u64;

#[derive(Debug)]
struct AccessHistory {
    /// Most recent access at the back; at most k entries kept.
    timestamps: VecDeque<Timestamp>,
    evictable: bool,
}

impl AccessHistory {
    fn new() -> Self {
        Self {
            timestamps: VecDeque::new(),
            evictable: false,
        }
    }

    fn record(&mut self, now: Timestamp, k: usize) {
        self.timestamps.push_back(now);
        while self.timestamps.len() > k {
            self.timestamps.pop_front();
        }
    }

    /// Backward k-distance; None encodes +inf (fewer than k accesses).
    fn k_distance(&self, now: Timestamp, k: usize) -> Option<Timestamp> {
        if self.timestamps.len() < k {
            None
        } else {
            Some(now - self.timestamps[self.timestamps.len() - k])
        }
    }

    fn earliest(&self) -> Option<Timestamp> {
        self.timestamps.front().copied()
    }
}

struct ReplacerState {
    frames: HashMap<FrameId, AccessHistory>,
    num_evictable: usize,
    clock: Timestamp,
}

/// LRU-K replacement policy: evict the evictable frame with the largest
/// backward k-distance; frames with fewer than k accesses count as infinitely
/// distant and tie-break on their earliest access.
pub struct LruKReplacer {
    k: usize,
    max_frames: usize,
    state: Mutex<ReplacerState>,
}

impl LruKReplacer {
    pub fn new(k: usize, max_frames: usize) -> Self {
        assert!(k >= 1);
        Self {
            k,
            max_frames,
            state: Mutex::new(ReplacerState {
                frames: HashMap::new(),
                num_evictable: 0,
                clock: 0,
            }),
        }
    }

    /// Picks and removes a victim. Returns None when nothing is evictable.
    pub fn evict(&self) -> Option<FrameId> {
        let mut state = self.state.lock();
        if state.num_evictable == 0 {
            return None;
        }
        let now = state.clock;

        let mut victim: Option<(FrameId, Option<Timestamp>, Option<Timestamp>)> = None;
        for (&frame_id, info) in state.frames.iter() {
            if !info.evictable {
                continue;
            }
            let candidate = (frame_id, info.k_distance(now, self.k), info.earliest());
            let replace = match &victim {
                None => true,
                Some((_, victim_dist, victim_earliest)) => match (victim_dist, candidate.1) {
                    (None, Some(_)) => false,
                    (Some(_), None) => true,
                    (None, None) => match (victim_earliest, candidate.2) {
                        (Some(v), Some(c)) => c < *v,
                        (None, Some(_)) => true,
                        _ => false,
                    },
                    (Some(v), Some(c)) => c > *v,
                },
            };
            if replace {
                victim = Some(candidate);
            }
        }

        let (frame_id, _, _) = victim?;
        state.frames.remove(&frame_id);
        state.num_evictable -= 1;
        Some(frame_id)
    }

    /// Records an access to `frame_id` at the next logical timestamp.
    pub fn record_access(&self, frame_id: FrameId) {
        if frame_id.as_usize() >= self.max_frames {
            return;
        }
        let mut state = self.state.lock();
        state.clock += 1;
        let now = state.clock;
        state
            .frames
            .entry(frame_id)
            .or_insert_with(AccessHistory::new)
            .record(now, self.k);
    }

    pub fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        if frame_id.as_usize() >= self.max_frames {
            return;
        }
        let mut guard = self.state.lock();
        let state = &mut *guard;
        match state.frames.get_mut(&frame_id) {
            Some(info) => {
                if info.evictable != evictable {
                    info.evictable = evictable;
                    if evictable {
                        state.num_evictable += 1;
                    } else {
                        state.num_evictable -= 1;
                    }
                }
            }
            None if evictable => {
                let mut info = AccessHistory::new();
                info.evictable = true;
                state.frames.insert(frame_id, info);
                state.num_evictable += 1;
            }
            None => {}
        }
    }

    /// Forgets a frame entirely (page deletion).
    pub fn remove(&self, frame_id: FrameId) {
        let mut state = self.state.lock();
        if let Some(info) = state.frames.remove(&frame_id) {
            if info.evictable {
                state.num_evictable -= 1;
            }
        }
    }

    /// Number of evictable frames.
    pub fn size(&self) -> usize {
        self.state.lock().num_evictable
    }
}
