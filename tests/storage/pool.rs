use std::collections::HashMap;
use std::sync::Arc;

use frameio::error::{Error, Result};
use frameio::storage::buffer::{AccessType, FrameId, Replacer, SyncLRUKReplacer};
use frameio::storage::disk::{DiskManager, DiskRequest, DiskScheduler};
use frameio::storage::page::{new_page_buf, PageId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Just enough of a buffer pool to drive the replacer and the scheduler
/// together: a page table, a free list and one pin per fetched page.
struct Pool {
    frames: Vec<Box<[u8]>>,
    /// page held by each frame and whether it's dirty.
    frame_pages: Vec<Option<(PageId, bool)>>,
    page_table: HashMap<PageId, FrameId>,
    free_list: Vec<FrameId>,
    replacer: SyncLRUKReplacer,
    scheduler: DiskScheduler,
}

impl Pool {
    fn new(scheduler: DiskScheduler, pool_size: usize, k: usize) -> Result<Pool> {
        Ok(Pool {
            frames: (0..pool_size).map(|_| new_page_buf()).collect(),
            frame_pages: vec![None; pool_size],
            page_table: HashMap::new(),
            free_list: (0..pool_size).rev().collect(),
            replacer: SyncLRUKReplacer::new(pool_size, k)?,
            scheduler,
        })
    }

    fn write_back(&mut self, frame_id: FrameId, page_id: PageId) -> Result<()> {
        let data = std::mem::take(&mut self.frames[frame_id]);
        let (write, done) = DiskRequest::write(page_id, data);
        self.scheduler.schedule_one(write)?;
        self.frames[frame_id] = done.wait()?;
        Ok(())
    }

    /// Bring the page into a frame and pin it.
    fn fetch(&mut self, page_id: PageId) -> Result<FrameId> {
        if let Some(&frame_id) = self.page_table.get(&page_id) {
            self.replacer.record_access(frame_id, AccessType::Lookup)?;
            self.replacer.set_evictable(frame_id, false)?;
            return Ok(frame_id);
        }

        let frame_id = match self.free_list.pop() {
            Some(frame_id) => frame_id,
            None => self
                .replacer
                .evict()
                .ok_or_else(|| Error::InvalidState("every frame is pinned".to_string()))?,
        };
        if let Some((victim, dirty)) = self.frame_pages[frame_id].take() {
            self.page_table.remove(&victim);
            if dirty {
                self.write_back(frame_id, victim)?;
            }
        }

        let data = std::mem::take(&mut self.frames[frame_id]);
        let (read, done) = DiskRequest::read(page_id, data);
        self.scheduler.schedule_one(read)?;
        self.frames[frame_id] = done.wait()?;

        self.frame_pages[frame_id] = Some((page_id, false));
        self.page_table.insert(page_id, frame_id);
        self.replacer.record_access(frame_id, AccessType::Lookup)?;
        self.replacer.set_evictable(frame_id, false)?;
        Ok(frame_id)
    }

    fn unpin(&mut self, frame_id: FrameId, is_dirty: bool) -> Result<()> {
        if let Some((_, dirty)) = self.frame_pages[frame_id].as_mut() {
            *dirty |= is_dirty;
        }
        self.replacer.set_evictable(frame_id, true)
    }

    fn flush_all(&mut self) -> Result<()> {
        for frame_id in 0..self.frames.len() {
            if let Some((page_id, true)) = self.frame_pages[frame_id] {
                self.write_back(frame_id, page_id)?;
                self.frame_pages[frame_id] = Some((page_id, false));
            }
        }
        Ok(())
    }
}

fn counter(data: &[u8]) -> u64 {
    u64::from_be_bytes(data[..8].try_into().unwrap())
}

#[test]
fn test_pool_workload() -> Result<()> {
    setup!(db);
    let dm = Arc::new(DiskManager::open(db.path())?);
    let scheduler = DiskScheduler::new(dm.clone())?;

    let num_pages = 8;
    let mut completions = vec![];
    for page_id in 0..num_pages {
        let (write, done) = DiskRequest::write(page_id, new_page_buf());
        scheduler.schedule_one(write)?;
        completions.push(done);
    }
    for done in completions {
        done.wait()?;
    }

    let mut pool = Pool::new(scheduler, 3, 2)?;
    let mut expected: HashMap<PageId, u64> = HashMap::new();
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..500 {
        // skew the access towards the first pages.
        let page_id =
            if rng.gen_bool(0.6) { rng.gen_range(0..2) } else { rng.gen_range(0..num_pages) };
        let frame_id = pool.fetch(page_id)?;
        let data = &mut pool.frames[frame_id];
        let next = counter(data) + 1;
        data[..8].copy_from_slice(&next.to_be_bytes());
        *expected.entry(page_id).or_default() += 1;
        pool.unpin(frame_id, true)?;
        assert!(pool.replacer.size() <= 3);
    }

    // a pinned pool has nothing to give.
    let pinned: Vec<FrameId> = (0..3).map(|p| pool.fetch(p)).collect::<Result<_>>()?;
    assert_eq!(0, pool.replacer.size());
    assert!(matches!(pool.fetch(7), Err(Error::InvalidState(_))));
    for frame_id in pinned {
        pool.unpin(frame_id, false)?;
    }

    pool.flush_all()?;
    assert!(dm.num_writes() > num_pages as usize);
    for page_id in 0..num_pages {
        let (read, done) = DiskRequest::read(page_id, new_page_buf());
        pool.scheduler.schedule_one(read)?;
        let data = done.wait()?;
        assert_eq!(expected.get(&page_id).copied().unwrap_or_default(), counter(&data));
    }
    Ok(())
}
