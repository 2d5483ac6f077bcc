use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use log::{debug, warn};
use tokio::sync::oneshot;

use super::PageStore;
use crate::error::{Error, Result};
use crate::storage::page::{check_page_buf, check_page_id, PageId, DEFAULT_PAGE_CAPACITY, PAGE_SIZE};

/// The file handles and the in-memory allocation table, everything
/// that has to be mutated together under the disk latch.
#[derive(Debug)]
struct DiskFiles {
    db_io: File,
    log_io: File,
    /// page id -> byte offset of the page inside the db file.
    pages: HashMap<PageId, u64>,
    /// offsets released by deleted pages, reused before the file grows.
    free_slots: Vec<u64>,
    /// number of pages the db file is currently sized for.
    page_capacity: usize,
    /// signalled by the next log write to complete, registered by
    /// whoever wants to know that an outstanding log flush is done.
    flush_log_notifier: Option<oneshot::Sender<()>>,
}

impl DiskFiles {
    /// Pick a byte offset for a page id we haven't seen before, recycle a
    /// freed slot first, otherwise extend the file.
    ///
    /// With no free slot, the live pages occupy exactly the first
    /// `pages.len()` slots, so the next slot follows them.
    fn allocate_page(&mut self) -> Result<u64> {
        if let Some(offset) = self.free_slots.pop() {
            return Ok(offset);
        }
        if self.pages.len() >= self.page_capacity {
            let page_capacity = self.page_capacity * 2;
            debug!("growing db file to {} pages", page_capacity);
            self.db_io
                .set_len((page_capacity * PAGE_SIZE) as u64)
                .map_err(io_err("growing db file".to_string()))?;
            self.page_capacity = page_capacity;
        }
        Ok((self.pages.len() * PAGE_SIZE) as u64)
    }

    fn write_at(&mut self, page_id: PageId, offset: u64, data: &[u8]) -> Result<()> {
        self.db_io
            .seek(SeekFrom::Start(offset))
            .map_err(io_err(format!("seeking page {}", page_id)))?;
        self.db_io
            .write_all(data)
            .map_err(io_err(format!("writing page {}", page_id)))?;
        self.db_io
            .flush()
            .map_err(io_err(format!("flushing page {}", page_id)))
    }
}

/// DiskManager is the file-backed page store. It takes care of the
/// allocation and deallocation of pages within the db file, and of the
/// append-only log file next to it.
///
/// The allocation table is never persisted, the db file is truncated on
/// open, and page ids can be reused after deletion within the lifetime
/// of the process.
///
/// All file access is serialized by one latch, in normal operation the
/// disk scheduler's worker is the only caller, but nothing stops tests
/// or tools from using the manager directly.
#[derive(Debug)]
pub struct DiskManager {
    db_file: PathBuf,
    log_file: PathBuf,

    inner: Mutex<DiskFiles>,

    num_flushes: AtomicUsize,
    num_writes: AtomicUsize,
    num_deletes: AtomicUsize,
    /// true while a log write is in flight.
    flush_log: AtomicBool,
}

impl DiskManager {
    /// Open the db file with the default page capacity. The log
    /// file is the db file with the `.log` extension.
    pub fn open(db_file: impl AsRef<Path>) -> Result<DiskManager> {
        Self::with_capacity(db_file, DEFAULT_PAGE_CAPACITY)
    }

    pub fn with_capacity(db_file: impl AsRef<Path>, page_capacity: usize) -> Result<DiskManager> {
        if page_capacity == 0 {
            return Err(Error::InvalidArgument("page capacity must be positive".to_string()));
        }
        let db_file = db_file.as_ref().to_path_buf();
        let log_file = db_file.with_extension("log");
        if log_file == db_file {
            return Err(Error::InvalidArgument(format!(
                "db file {} can't use the log extension",
                db_file.display()
            )));
        }

        let db_io = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&db_file)
            .map_err(io_err(format!("opening db file {}", db_file.display())))?;
        let log_io = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&log_file)
            .map_err(io_err(format!("opening log file {}", log_file.display())))?;
        debug!("opened db file {} and log file {}", db_file.display(), log_file.display());

        let inner = DiskFiles {
            db_io,
            log_io,
            pages: HashMap::new(),
            free_slots: Vec::new(),
            page_capacity,
            flush_log_notifier: None,
        };
        Ok(DiskManager {
            db_file,
            log_file,
            inner: Mutex::new(inner),
            num_flushes: AtomicUsize::new(0),
            num_writes: AtomicUsize::new(0),
            num_deletes: AtomicUsize::new(0),
            flush_log: AtomicBool::new(false),
        })
    }

    /// Sync both files to the disk.
    pub fn shutdown(&self) -> Result<()> {
        let files = self.inner.lock()?;
        files.db_io.sync_all()?;
        files.log_io.sync_all()?;
        Ok(())
    }

    /// Append the data to the log file and wait until it's on the disk.
    ///
    /// The flush state is raised for the duration of the write, the flush
    /// counter is bumped and the registered flush notifier, if any, is fired
    /// once the data is synced.
    pub fn write_log(&self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let mut files = self.inner.lock()?;

        self.flush_log.store(true, Ordering::SeqCst);
        let res = files.log_io.write_all(data).and_then(|_| files.log_io.sync_data());
        self.flush_log.store(false, Ordering::SeqCst);
        res.map_err(io_err("writing log".to_string()))?;

        self.num_flushes.fetch_add(1, Ordering::SeqCst);
        if let Some(notifier) = files.flush_log_notifier.take() {
            // nobody waiting anymore is fine.
            let _ = notifier.send(());
        }
        Ok(())
    }

    /// Read `data.len()` bytes from the log file starting at the given offset.
    ///
    /// Return false if the offset is at or beyond the end of the log, which is
    /// how callers learn there is nothing more to read. A read that hits the
    /// end of the log part way fills the remaining bytes with zero.
    pub fn read_log(&self, data: &mut [u8], offset: u64) -> Result<bool> {
        let mut files = self.inner.lock()?;
        let size = files.log_io.metadata()?.len();
        if offset >= size {
            return Ok(false);
        }
        files
            .log_io
            .seek(SeekFrom::Start(offset))
            .map_err(io_err("seeking log".to_string()))?;
        let n = read_full(&mut files.log_io, data)
            .map_err(io_err("reading log".to_string()))?;
        if n < data.len() {
            debug!("read less than requested from log at {}", offset);
            data[n..].fill(0);
        }
        Ok(true)
    }

    /// Register the notifier fired by the next log write to complete,
    /// replacing any registered one.
    pub fn set_flush_log_notifier(&self, notifier: oneshot::Sender<()>) -> Result<()> {
        let mut files = self.inner.lock()?;
        files.flush_log_notifier = Some(notifier);
        Ok(())
    }

    pub fn has_flush_log_notifier(&self) -> Result<bool> {
        let files = self.inner.lock()?;
        Ok(files.flush_log_notifier.is_some())
    }

    /// Size of the db file in byte, an empty file is a legit zero.
    pub fn db_file_size(&self) -> Result<u64> {
        match std::fs::metadata(&self.db_file) {
            Ok(metadata) => Ok(metadata.len()),
            Err(err) => {
                warn!("I/O error: fail to get db file size: {}", err);
                Err(Error::Io(format!(
                    "could not determine size of {}: {}",
                    self.db_file.display(),
                    err
                )))
            }
        }
    }

    /// Byte offset of the given page inside the db file, None if the
    /// page is unknown.
    pub fn page_offset(&self, page_id: PageId) -> Result<Option<u64>> {
        let files = self.inner.lock()?;
        Ok(files.pages.get(&page_id).copied())
    }

    pub fn page_capacity(&self) -> Result<usize> {
        let files = self.inner.lock()?;
        Ok(files.page_capacity)
    }

    pub fn num_flushes(&self) -> usize {
        self.num_flushes.load(Ordering::SeqCst)
    }

    pub fn num_writes(&self) -> usize {
        self.num_writes.load(Ordering::SeqCst)
    }

    pub fn num_deletes(&self) -> usize {
        self.num_deletes.load(Ordering::SeqCst)
    }

    /// Whether a log write is in flight.
    pub fn flush_state(&self) -> bool {
        self.flush_log.load(Ordering::SeqCst)
    }

    pub fn db_file(&self) -> &Path {
        &self.db_file
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }
}

impl PageStore for DiskManager {
    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        check_page_id(page_id)?;
        check_page_buf(page_id, data)?;
        let mut files = self.inner.lock()?;

        // a new page is only mapped once its data is in place, a failed
        // write hands the slot back.
        match files.pages.get(&page_id).copied() {
            Some(offset) => files.write_at(page_id, offset, data)?,
            None => {
                let offset = files.allocate_page()?;
                if let Err(err) = files.write_at(page_id, offset, data) {
                    files.free_slots.push(offset);
                    return Err(err);
                }
                files.pages.insert(page_id, offset);
            }
        }

        self.num_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read_page(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        check_page_id(page_id)?;
        check_page_buf(page_id, data)?;
        let mut files = self.inner.lock()?;

        let offset = *files.pages.get(&page_id).ok_or(Error::PageNotFound(page_id))?;
        let size = files.db_io.metadata()?.len();
        if offset > size {
            return Err(Error::Io(format!("reading page {} past end of file", page_id)));
        }

        files
            .db_io
            .seek(SeekFrom::Start(offset))
            .map_err(io_err(format!("seeking page {}", page_id)))?;
        let n = read_full(&mut files.db_io, data)
            .map_err(io_err(format!("reading page {}", page_id)))?;
        if n < PAGE_SIZE {
            debug!("read less than a page for page {}", page_id);
            data[n..].fill(0);
        }
        Ok(())
    }

    fn delete_page(&self, page_id: PageId) -> Result<()> {
        let mut files = self.inner.lock()?;
        if let Some(offset) = files.pages.remove(&page_id) {
            files.free_slots.push(offset);
            self.num_deletes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

fn io_err(doing: String) -> impl FnOnce(std::io::Error) -> Error {
    move |err| Error::Io(format!("I/O error while {}: {}", doing, err))
}

/// Read until the buffer is full or the end of file is hit,
/// return the number of bytes read.
fn read_full(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut n = 0;
    while n < buf.len() {
        match file.read(&mut buf[n..]) {
            Ok(0) => break,
            Ok(read) => n += read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(n)
}
