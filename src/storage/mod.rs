//! The memory-management tier of the storage engine, the pieces a buffer
//! pool manager is built on top of:
//!
//! - [`disk`]: the page stores and the disk scheduler that serializes page
//!   reads and writes onto a store from a background worker.
//! - [`buffer`]: the replacement policy that picks which frame to reclaim
//!   when the pool is full.
//!
//! The two never call each other, the buffer pool manager composes them:
//! ask the replacer for a victim frame, schedule the write-back of its dirty
//! page, then schedule the read of the page that takes the frame over.

pub mod buffer;
pub mod disk;
pub mod page;
