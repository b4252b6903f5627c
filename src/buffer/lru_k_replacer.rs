use parking_lot::Mutex;

use crate::common::{FrameId, Result, StratumError};

/// Per-frame access bookkeeping. Nodes live in a fixed arena indexed by frame
/// id; `prev`/`next` are arena indices forming the intrusive lists.
#[derive(Debug, Clone, Copy)]
struct LruKNode {
    access_count: usize,
    evictable: bool,
    /// True once the frame has at least k recorded accesses and sits in the
    /// cache list instead of the history list.
    in_cache: bool,
    present: bool,
    prev: Option<usize>,
    next: Option<usize>,
}

impl LruKNode {
    const fn empty() -> Self {
        Self {
            access_count: 0,
            evictable: false,
            in_cache: false,
            present: false,
            prev: None,
            next: None,
        }
    }
}

/// Doubly-linked list over the node arena. Head is the most recently
/// accessed node, tail the least recently accessed.
#[derive(Debug, Default)]
struct NodeList {
    head: Option<usize>,
    tail: Option<usize>,
}

impl NodeList {
    fn push_front(&mut self, nodes: &mut [LruKNode], idx: usize) {
        nodes[idx].prev = None;
        nodes[idx].next = self.head;
        if let Some(old_head) = self.head {
            nodes[old_head].prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn unlink(&mut self, nodes: &mut [LruKNode], idx: usize) {
        let (prev, next) = (nodes[idx].prev, nodes[idx].next);
        match prev {
            Some(p) => nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => nodes[n].prev = prev,
            None => self.tail = prev,
        }
        nodes[idx].prev = None;
        nodes[idx].next = None;
    }

    /// Walks tail-to-head and returns the first node passing `pred`.
    fn find_from_tail<F: Fn(&LruKNode) -> bool>(
        &self,
        nodes: &[LruKNode],
        pred: F,
    ) -> Option<usize> {
        let mut cur = self.tail;
        while let Some(idx) = cur {
            if pred(&nodes[idx]) {
                return Some(idx);
            }
            cur = nodes[idx].prev;
        }
        None
    }
}

struct ReplacerState {
    nodes: Vec<LruKNode>,
    /// Frames with fewer than k accesses: backward k-distance is infinite, so
    /// the tail (oldest) is always the preferred victim.
    history: NodeList,
    /// Frames with at least k accesses, ordered by recency of last access.
    cache: NodeList,
    evictable_count: usize,
}

/// LRU-K replacement policy.
///
/// Evicts the evictable frame with the greatest backward k-distance: the gap
/// between now and the k-th most recent access. Frames with fewer than k
/// accesses have infinite distance and are victimized first, oldest first
/// (classical LRU tie-break). Among frames with k or more accesses, the one
/// whose last access is oldest has the greatest k-distance, so scanning the
/// cache list from its tail yields the correct victim without timestamps.
pub struct LruKReplacer {
    k: usize,
    num_frames: usize,
    state: Mutex<ReplacerState>,
}

impl LruKReplacer {
    /// Creates a replacer tracking frames `0..num_frames` with the given k.
    pub fn new(k: usize, num_frames: usize) -> Self {
        assert!(k >= 1, "k must be at least 1");
        Self {
            k,
            num_frames,
            state: Mutex::new(ReplacerState {
                nodes: vec![LruKNode::empty(); num_frames],
                history: NodeList::default(),
                cache: NodeList::default(),
                evictable_count: 0,
            }),
        }
    }

    /// Records an access to `frame_id`, creating its node on first touch and
    /// migrating it from the history list to the cache list once its access
    /// count reaches k.
    pub fn record_access(&self, frame_id: FrameId) -> Result<()> {
        let idx = self.check_frame(frame_id)?;
        let state = &mut *self.state.lock();

        if !state.nodes[idx].present {
            state.nodes[idx] = LruKNode::empty();
            state.nodes[idx].present = true;
            state.history.push_front(&mut state.nodes, idx);
        } else if state.nodes[idx].in_cache {
            state.cache.unlink(&mut state.nodes, idx);
            state.cache.push_front(&mut state.nodes, idx);
        } else {
            state.history.unlink(&mut state.nodes, idx);
            state.history.push_front(&mut state.nodes, idx);
        }

        state.nodes[idx].access_count += 1;
        if !state.nodes[idx].in_cache && state.nodes[idx].access_count >= self.k {
            state.history.unlink(&mut state.nodes, idx);
            state.cache.push_front(&mut state.nodes, idx);
            state.nodes[idx].in_cache = true;
        }

        Ok(())
    }

    /// Flips the evictable flag of a tracked frame. A no-op when the flag
    /// already holds the requested value.
    pub fn set_evictable(&self, frame_id: FrameId, evictable: bool) -> Result<()> {
        let idx = self.check_frame(frame_id)?;
        let state = &mut *self.state.lock();

        if !state.nodes[idx].present {
            return Err(StratumError::FrameNotFound(frame_id));
        }
        if state.nodes[idx].evictable != evictable {
            state.nodes[idx].evictable = evictable;
            if evictable {
                state.evictable_count += 1;
            } else {
                state.evictable_count -= 1;
            }
        }
        Ok(())
    }

    /// Evicts the frame with the greatest backward k-distance, clearing its
    /// access history. Returns None when no frame is evictable.
    pub fn evict(&self) -> Option<FrameId> {
        let state = &mut *self.state.lock();

        if state.evictable_count == 0 {
            return None;
        }

        let victim = state
            .history
            .find_from_tail(&state.nodes, |n| n.evictable)
            .map(|idx| (idx, false))
            .or_else(|| {
                state
                    .cache
                    .find_from_tail(&state.nodes, |n| n.evictable)
                    .map(|idx| (idx, true))
            });

        let (idx, from_cache) = victim?;
        if from_cache {
            state.cache.unlink(&mut state.nodes, idx);
        } else {
            state.history.unlink(&mut state.nodes, idx);
        }
        state.nodes[idx] = LruKNode::empty();
        state.evictable_count -= 1;

        Some(FrameId::new(idx as u32))
    }

    /// Drops a frame's node regardless of its access count. A no-op for
    /// untracked frames; removing a non-evictable frame is a caller bug.
    pub fn remove(&self, frame_id: FrameId) {
        if frame_id.as_usize() >= self.num_frames {
            return;
        }
        let idx = frame_id.as_usize();
        let state = &mut *self.state.lock();

        if !state.nodes[idx].present {
            return;
        }
        assert!(
            state.nodes[idx].evictable,
            "removed frame {} while it was pinned",
            frame_id
        );

        if state.nodes[idx].in_cache {
            state.cache.unlink(&mut state.nodes, idx);
        } else {
            state.history.unlink(&mut state.nodes, idx);
        }
        state.nodes[idx] = LruKNode::empty();
        state.evictable_count -= 1;
    }

    /// Number of currently evictable frames.
    pub fn size(&self) -> usize {
        self.state.lock().evictable_count
    }

    pub fn k(&self) -> usize {
        self.k
    }

    fn check_frame(&self, frame_id: FrameId) -> Result<usize> {
        let idx = frame_id.as_usize();
        if idx >= self.num_frames {
            return Err(StratumError::InvalidFrameId(frame_id));
        }
        Ok(idx)
    }
}
