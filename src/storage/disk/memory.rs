use std::collections::HashMap;
use std::sync::Mutex;

use super::PageStore;
use crate::error::{Error, Result};
use crate::storage::page::{check_page_buf, check_page_id, PageId};

/// MemoryPageStore keeps pages in a hash map, nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryPageStore {
    pages: Mutex<HashMap<PageId, Box<[u8]>>>,
}

impl MemoryPageStore {
    pub fn new() -> MemoryPageStore {
        MemoryPageStore { pages: Mutex::new(HashMap::new()) }
    }

    /// Number of live pages.
    pub fn len(&self) -> Result<usize> {
        Ok(self.pages.lock()?.len())
    }
}

impl PageStore for MemoryPageStore {
    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        check_page_id(page_id)?;
        check_page_buf(page_id, data)?;
        let mut pages = self.pages.lock()?;
        pages.insert(page_id, Box::from(data));
        Ok(())
    }

    fn read_page(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        check_page_id(page_id)?;
        check_page_buf(page_id, data)?;
        let pages = self.pages.lock()?;
        let page = pages.get(&page_id).ok_or(Error::PageNotFound(page_id))?;
        data.copy_from_slice(page);
        Ok(())
    }

    fn delete_page(&self, page_id: PageId) -> Result<()> {
        let mut pages = self.pages.lock()?;
        pages.remove(&page_id);
        Ok(())
    }
}
