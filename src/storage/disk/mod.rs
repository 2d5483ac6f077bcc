use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::page::PageId;

pub mod manager;
pub mod memory;
pub mod scheduler;

pub use manager::DiskManager;
pub use memory::MemoryPageStore;
pub use scheduler::{Completion, DiskRequest, DiskScheduler, RequestKind};

/// A page store reads and writes fixed-size pages by page id. It is the
/// synchronous layer underneath the disk scheduler, the scheduler's worker
/// thread is the only caller in normal operation.
///
/// The PageStore trait is designed as `trait object` compatible so that
/// the scheduler can hold any backend as `Arc<dyn PageStore>`.
pub trait PageStore: Debug + Send + Sync {
    /// Write exactly one page of data for the given page id. An unknown page id
    /// gets a new slot allocated first.
    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()>;

    /// Read exactly one page of the given page id into the buffer. Reading a
    /// page that is never written, or is deleted, fails with `PageNotFound`.
    fn read_page(&self, page_id: PageId, data: &mut [u8]) -> Result<()>;

    /// Release the slot of the given page, deleting an unknown page is a no-op.
    fn delete_page(&self, page_id: PageId) -> Result<()>;
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    File,
    Memory,
}

/// Build a page store of the given type, `db_file` is ignored by the
/// memory store.
pub fn new_page_store(
    typ: StorageType,
    db_file: &Path,
    page_capacity: usize,
) -> Result<Arc<dyn PageStore>> {
    match typ {
        StorageType::File => Ok(Arc::new(DiskManager::with_capacity(db_file, page_capacity)?)),
        StorageType::Memory => Ok(Arc::new(MemoryPageStore::new())),
    }
}
