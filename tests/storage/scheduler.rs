use std::sync::Arc;
use std::time::Duration;

use frameio::error::{Error, Result};
use frameio::storage::disk::{DiskManager, DiskRequest, DiskScheduler, PageStore, RequestKind};
use frameio::storage::page::{new_page_buf, PageId, PAGE_SIZE};
use log::info;

use crate::store::RecordingStore;

fn page_of(page_id: PageId, version: u8) -> Box<[u8]> {
    let mut data = new_page_buf();
    data[..8].copy_from_slice(&page_id.to_be_bytes());
    data[8..].fill(version);
    data
}

#[test]
fn test_fifo_single_submitter() -> Result<()> {
    setup!();
    let store = Arc::new(RecordingStore::new());
    let mut scheduler = DiskScheduler::new(store.clone())?;

    // every page is written before it's read back.
    let mut expected = vec![];
    let mut requests = vec![];
    let mut completions = vec![];
    for i in 0..40 {
        let page_id = i / 2;
        let (request, done) = if i % 2 == 0 {
            DiskRequest::write(page_id, page_of(page_id, i as u8))
        } else {
            DiskRequest::read(page_id, scheduler.create_buffer())
        };
        expected.push((request.kind, request.page_id));
        requests.push(request);
        completions.push(done);
    }
    scheduler.schedule(requests)?;

    for (i, done) in completions.into_iter().enumerate() {
        let data = done.wait()?;
        // the store has returned from the i-th call by the time it completes.
        assert!(store.ops().len() > i);
        if i % 2 == 1 {
            let page_id = (i / 2) as PageId;
            assert_eq!(page_of(page_id, (i - 1) as u8), data);
        }
    }
    assert_eq!(expected, store.ops());

    scheduler.shutdown()?;
    Ok(())
}

#[test]
fn test_concurrent_submitters() -> Result<()> {
    setup!();
    let store = Arc::new(RecordingStore::new());
    let scheduler = Arc::new(DiskScheduler::new(store.clone())?);

    let mut handles = vec![];
    for t in 0..4 {
        let scheduler = Arc::clone(&scheduler);
        handles.push(std::thread::spawn(move || -> Result<()> {
            let mut completions = vec![];
            for v in 0..25u8 {
                let (write, done) = DiskRequest::write(t, page_of(t, v));
                scheduler.schedule_one(write)?;
                completions.push(done);
            }
            for done in completions {
                done.wait()?;
            }
            Ok(())
        }));
    }
    for handle in handles {
        handle.join().map_err(|_| Error::Internal("submitter panicked".to_string()))??;
    }

    let ops = store.ops();
    assert_eq!(100, ops.len());
    info!("{} requests from 4 submitters executed", ops.len());

    // each submitter's last write wins on its own page.
    for t in 0..4 {
        let (read, done) = DiskRequest::read(t, scheduler.create_buffer());
        scheduler.schedule_one(read)?;
        assert_eq!(page_of(t, 24), done.wait()?);
    }
    Ok(())
}

#[test]
fn test_shutdown_drains_queue() -> Result<()> {
    setup!();
    let store = Arc::new(RecordingStore::with_delay(Duration::from_millis(2)));
    let mut scheduler = DiskScheduler::new(store.clone())?;

    let mut requests = vec![];
    let mut completions = vec![];
    for page_id in 0..20 {
        let (write, done) = DiskRequest::write(page_id, page_of(page_id, 1));
        requests.push(write);
        completions.push(done);
    }
    scheduler.schedule(requests)?;
    // everything queued before the shutdown still runs.
    scheduler.shutdown()?;
    assert!(!scheduler.is_running());
    assert_eq!(20, store.ops().len());
    for done in completions {
        done.wait()?;
    }

    // nothing after it does.
    let (write, done) = DiskRequest::write(20, page_of(20, 1));
    assert_eq!(Err(Error::SchedulerClosed), scheduler.schedule_one(write));
    assert_eq!(Err(Error::SchedulerClosed), done.wait());
    assert_eq!(20, store.ops().len());
    Ok(())
}

#[test]
fn test_failure_through_completion() -> Result<()> {
    setup!();
    let store = Arc::new(RecordingStore::new());
    let scheduler = DiskScheduler::new(store.clone())?;

    let (read, read_done) = DiskRequest::read(5, scheduler.create_buffer());
    let (write, write_done) = DiskRequest::write(5, page_of(5, 9));
    let (short, short_done) = DiskRequest::write(6, vec![0u8; 10].into_boxed_slice());
    scheduler.schedule(vec![read, write, short])?;

    assert_eq!(Err(Error::PageNotFound(5)), read_done.wait());
    assert_eq!(page_of(5, 9), write_done.wait()?);
    assert!(matches!(short_done.wait(), Err(Error::InvalidArgument(_))));
    assert_eq!(vec![(RequestKind::Write, 5)], store.ops());
    Ok(())
}

#[test]
fn test_schedule_over_disk_manager() -> Result<()> {
    setup!(db);
    let dm = Arc::new(DiskManager::with_capacity(db.path(), 4)?);
    let scheduler = DiskScheduler::new(dm.clone())?;

    let mut completions = vec![];
    for page_id in 0..10 {
        let (write, done) = DiskRequest::write(page_id, page_of(page_id, 7));
        scheduler.schedule_one(write)?;
        completions.push(done);
    }
    for done in completions {
        done.wait()?;
    }
    assert_eq!(10, dm.num_writes());
    assert_eq!(16 * PAGE_SIZE as u64, dm.db_file_size()?);

    // free a slot behind the scheduler's back, the next new page takes it.
    let freed = dm.page_offset(3)?;
    dm.delete_page(3)?;
    let (write, done) = DiskRequest::write(42, page_of(42, 1));
    scheduler.schedule_one(write)?;
    done.wait()?;
    assert_eq!(freed, dm.page_offset(42)?);

    for page_id in [0, 1, 2, 4, 9, 42] {
        let (read, done) = DiskRequest::read(page_id, scheduler.create_buffer());
        scheduler.schedule_one(read)?;
        let version = if page_id == 42 { 1 } else { 7 };
        assert_eq!(page_of(page_id, version), done.wait()?);
    }

    let (read, done) = DiskRequest::read(3, scheduler.create_buffer());
    scheduler.schedule_one(read)?;
    assert_eq!(Err(Error::PageNotFound(3)), done.wait());
    Ok(())
}
