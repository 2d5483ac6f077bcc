use crate::error::Result;

pub mod replacer;

pub use replacer::{LRUKReplacer, SyncLRUKReplacer};

pub type FrameId = usize;

/// The kind of access that touched a frame. It's recorded along
/// with the access but doesn't weigh into the eviction yet.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum AccessType {
    #[default]
    Unknown,
    Lookup,
    Scan,
    Index,
}

///  Replacer tracks frame usage for replacement in case of buffer pool is full.
pub trait Replacer: Send + Sync {
    /// Record the event that the given frame id is accessed at current timestamp.
    /// Create a new entry for access history if frame id has not been seen before.
    ///
    /// A frame id beyond the replacer capacity is an invalid argument.
    fn record_access(&self, frame_id: FrameId, access_type: AccessType) -> Result<()>;

    /// Find the frame to evict with replace policy(e.g. backward k-distance). Only frames that
    /// are marked as evictable are candidates for eviction.
    ///
    /// Successful eviction of a frame should decrement the size of replacer and remove the frame's
    /// access history.
    ///
    /// Return the frame id if a frame is evicted successfully, None if no frames can be evicted.
    fn evict(&self) -> Option<FrameId>;

    /// Mark a frame evictable or pinned. The replacer size counts evictable
    /// frames, so it moves by one on a real transition and stays put when the
    /// flag already has the requested value.
    ///
    /// A frame that has never been accessed is an `InvalidArgument`.
    fn set_evictable(&self, frame_id: FrameId, evictable: bool) -> Result<()>;

    /// Drop an evictable frame and its access history, the size shrinks by one.
    ///
    /// Unlike `evict`, the frame is chosen by the caller whatever its backward
    /// k-distance is.
    ///
    /// Removing a pinned frame is an `InvalidState`, removing an unknown frame
    /// is a no-op.
    fn remove(&self, frame_id: FrameId) -> Result<()>;

    /// replace size, i.e., the number of evictable frames.
    fn size(&self) -> usize;
}
