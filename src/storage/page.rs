use crate::error::{Error, Result};

pub type PageId = i64;

/// Size of a data page in byte.
pub const PAGE_SIZE: usize = 4096;

/// Number of pages a fresh page file is sized for.
pub const DEFAULT_PAGE_CAPACITY: usize = 16;

/// Invalid page id, means "no page" and is never handed to the disk.
pub const INVALID_PAGE_ID: PageId = -1;

/// Allocate a zeroed in-memory page buffer.
pub fn new_page_buf() -> Box<[u8]> {
    vec![0u8; PAGE_SIZE].into_boxed_slice()
}

/// Reject the page ids that can't name a page on disk, i.e.,
/// the [`INVALID_PAGE_ID`] sentinel and anything else negative.
pub fn check_page_id(page_id: PageId) -> Result<()> {
    if page_id < 0 {
        return Err(Error::InvalidArgument(format!("invalid page id {}", page_id)));
    }
    Ok(())
}

/// Page buffers must hold exactly one page.
pub fn check_page_buf(page_id: PageId, buf: &[u8]) -> Result<()> {
    if buf.len() != PAGE_SIZE {
        return Err(Error::InvalidArgument(format!(
            "page {} buffer is {} bytes, expect {}",
            page_id,
            buf.len(),
            PAGE_SIZE
        )));
    }
    Ok(())
}
