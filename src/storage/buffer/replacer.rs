use std::cmp::Ordering;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::trace;

use super::{AccessType, FrameId, Replacer};
use crate::error::{Error, Result};

/// Eviction rank of a frame, the smallest one is the victim.
#[derive(Debug, Eq, PartialEq)]
struct KDistance {
    frame_id: FrameId,
    /// backward k-distance, usize::MAX stands for +inf.
    distance: usize,
    /// the least recent timestamp in the history.
    first_access_at: usize,
}

impl PartialOrd for KDistance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KDistance {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .cmp(&other.distance)
            .reverse()
            .then(self.first_access_at.cmp(&other.first_access_at))
            .then(self.frame_id.cmp(&other.frame_id))
    }
}

struct LRUKNode {
    k: usize,
    frame_id: FrameId,
    is_evictable: bool,
    /// history of last seen K timestamp of the given frame.
    /// Least recent timestamp stored in front.
    history: VecDeque<usize>,
}

impl LRUKNode {
    fn new(frame_id: FrameId, k: usize) -> Self {
        LRUKNode { history: VecDeque::with_capacity(k), k, frame_id, is_evictable: false }
    }

    fn record_access(&mut self, timestamp: usize) {
        if self.history.len() == self.k {
            self.history.pop_front();
        }
        self.history.push_back(timestamp)
    }

    fn k_distance(&self, current_timestamp: usize) -> KDistance {
        // a node is created along with its first access, the
        // history is never empty.
        let first = self.history.front().copied().unwrap_or_default();
        let distance = if self.history.len() < self.k {
            usize::MAX
        } else {
            current_timestamp - first
        };
        KDistance { frame_id: self.frame_id, distance, first_access_at: first }
    }
}

/// LRUKReplacer implements the LRU-k replacement policy.
///
/// The LRU-k algorithm evicts a frame whose backward k-distance is maximum of
/// all frames. Backward k-distance is computed as the difference in time between
/// the current timestamp and the timestamp of k-th previous access.
///
/// A frame with less than k history references is given +inf as its backward k-distance.
/// when multiple frames have +inf backward k-distance, the one seen earliest is chosen
/// as the victim.
pub struct LRUKReplacer {
    nodes: HashMap<FrameId, LRUKNode>,
    /// logical clock, advanced once per recorded access.
    current_timestamp: usize,
    /// number of evictable frames.
    current_size: usize,
    /// max number of frames, frame ids are in range [0, replacer_size).
    replacer_size: usize,
    k: usize,
}

impl LRUKReplacer {
    pub fn new(num_frames: usize, k: usize) -> Result<Self> {
        if k == 0 {
            let msg = "replacer k should be larger than zero".to_string();
            return Err(Error::InvalidArgument(msg));
        }
        let nodes = HashMap::new();
        let replacer_size = num_frames;
        Ok(LRUKReplacer { nodes, current_timestamp: 0, current_size: 0, replacer_size, k })
    }

    /// Record the event that the given frame id is accessed at current timestamp.
    /// Create a new entry for access history if frame id has not been seen before.
    pub fn record_access(&mut self, frame_id: FrameId, _access_type: AccessType) -> Result<()> {
        if frame_id >= self.replacer_size {
            return Err(Error::InvalidArgument(format!(
                "frame {} is out of range, replacer size is {}",
                frame_id, self.replacer_size
            )));
        }
        self.current_timestamp += 1;
        let k = self.k;
        let node = self.nodes.entry(frame_id).or_insert_with(|| LRUKNode::new(frame_id, k));
        node.record_access(self.current_timestamp);
        Ok(())
    }

    /// Find the frame with the largest backward k-distance and evict that frame. Only frames
    /// that are marked as evictable are candidates for eviction.
    ///
    /// A Frame with less than k historical reference is given +inf as its backward k-distance.
    /// If multiple frames have inf backward k-distance, then evict the frame with the earliest
    /// timestamp overall.
    ///
    /// Successful eviction of a frame should decrement the size of replacer and remove the frame's
    /// access history.
    ///
    /// Return the frame id if a frame is evicted successfully, None if no frames can be evicted.
    pub fn evict(&mut self) -> Option<FrameId> {
        if self.current_size == 0 {
            return None;
        }
        let victim = self
            .nodes
            .values()
            .filter(|node| node.is_evictable)
            .map(|node| node.k_distance(self.current_timestamp))
            .min()?;

        self.nodes.remove(&victim.frame_id);
        self.current_size -= 1;
        trace!("evicted frame {}, k-distance {}", victim.frame_id, victim.distance);

        Some(victim.frame_id)
    }

    /// Mark a frame evictable or pinned. The replacer size counts evictable
    /// frames, so it moves by one on a real transition and stays put when the
    /// flag already has the requested value.
    ///
    /// A frame that has never been accessed is an `InvalidArgument`.
    pub fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) -> Result<()> {
        let node = self.nodes.get_mut(&frame_id).ok_or_else(|| {
            Error::InvalidArgument(format!("frame {} has never been accessed", frame_id))
        })?;
        if node.is_evictable == evictable {
            return Ok(());
        }

        node.is_evictable = evictable;
        if evictable {
            self.current_size += 1;
        } else {
            self.current_size -= 1;
        }
        Ok(())
    }

    /// Drop an evictable frame and its access history, the size shrinks by one.
    ///
    /// Unlike `evict`, the frame is chosen by the caller whatever its backward
    /// k-distance is.
    ///
    /// Removing a pinned frame is an `InvalidState`, removing an unknown frame
    /// is a no-op.
    pub fn remove(&mut self, frame_id: FrameId) -> Result<()> {
        let Some(node) = self.nodes.get(&frame_id) else {
            return Ok(());
        };
        if !node.is_evictable {
            return Err(Error::InvalidState(format!("remove non-evictable frame {}", frame_id)));
        }
        self.nodes.remove(&frame_id);
        self.current_size -= 1;
        Ok(())
    }

    pub fn size(&self) -> usize {
        self.current_size
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn capacity(&self) -> usize {
        self.replacer_size
    }
}

/// SyncLRUKReplacer implements the thread-safe version of LRU-k replacement policy,
/// basically all the heavy lifting are happens in the LRUKReplacer. Every operation
/// holds the one latch from start to end.
pub struct SyncLRUKReplacer {
    inner: Mutex<LRUKReplacer>,
}

impl SyncLRUKReplacer {
    pub fn new(num_frames: usize, k: usize) -> Result<Self> {
        let inner = Mutex::new(LRUKReplacer::new(num_frames, k)?);
        Ok(SyncLRUKReplacer { inner })
    }

    // no operation panics half way through a mutation, the state
    // behind a poisoned latch is still consistent.
    fn latch(&self) -> MutexGuard<'_, LRUKReplacer> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Replacer for SyncLRUKReplacer {
    fn record_access(&self, frame_id: FrameId, access_type: AccessType) -> Result<()> {
        self.latch().record_access(frame_id, access_type)
    }

    fn evict(&self) -> Option<FrameId> {
        self.latch().evict()
    }

    fn set_evictable(&self, frame_id: FrameId, evictable: bool) -> Result<()> {
        self.latch().set_evictable(frame_id, evictable)
    }

    fn remove(&self, frame_id: FrameId) -> Result<()> {
        self.latch().remove(frame_id)
    }

    fn size(&self) -> usize {
        self.latch().size()
    }
}
