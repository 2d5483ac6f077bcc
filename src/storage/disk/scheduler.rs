use std::future::Future;
use std::pin::Pin;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::thread::JoinHandle;

use log::{debug, trace, warn};
use tokio::sync::oneshot;

use super::PageStore;
use crate::error::{Error, Result};
use crate::storage::page::{check_page_id, new_page_buf, PageId};

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RequestKind {
    Read,
    Write,
}

/// A request to read a page into, or write a page out of, the buffer
/// carried along with it.
///
/// The buffer is moved into the request on submission and handed back
/// through the completion, so the submitter gets it back once the page
/// store is done with it.
#[derive(Debug)]
pub struct DiskRequest {
    pub kind: RequestKind,
    pub page_id: PageId,
    pub data: Box<[u8]>,
    /// fulfilled by the worker once the page store call returns.
    done: oneshot::Sender<Result<Box<[u8]>>>,
}

impl DiskRequest {
    pub fn new(kind: RequestKind, page_id: PageId, data: Box<[u8]>) -> (DiskRequest, Completion) {
        let (tx, rx) = oneshot::channel();
        (DiskRequest { kind, page_id, data, done: tx }, Completion { rx })
    }

    /// Read the page into `data`.
    pub fn read(page_id: PageId, data: Box<[u8]>) -> (DiskRequest, Completion) {
        Self::new(RequestKind::Read, page_id, data)
    }

    /// Write `data` out as the page.
    pub fn write(page_id: PageId, data: Box<[u8]>) -> (DiskRequest, Completion) {
        Self::new(RequestKind::Write, page_id, data)
    }

    pub fn is_write(&self) -> bool {
        self.kind == RequestKind::Write
    }
}

/// Completion is the submitter's end of a request. It yields the request
/// buffer on success or the page store error on failure.
///
/// It can be waited on from a plain thread, or awaited as a future from
/// async code. Either way it's consumed, so an outcome is observed once.
/// A request the scheduler never executed resolves to `SchedulerClosed`.
#[derive(Debug)]
pub struct Completion {
    rx: oneshot::Receiver<Result<Box<[u8]>>>,
}

impl Completion {
    /// Block the current thread until the request is done.
    ///
    /// Must not be called from within an async runtime, await the
    /// completion there instead.
    pub fn wait(self) -> Result<Box<[u8]>> {
        self.rx.blocking_recv()?
    }
}

impl Future for Completion {
    type Output = Result<Box<[u8]>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(res)) => Poll::Ready(res),
            Poll::Ready(Err(err)) => Poll::Ready(Err(err.into())),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// What the worker consumes, the shutdown marker is queued behind
/// every request scheduled before it.
enum Task {
    Request(DiskRequest),
    Shutdown,
}

/// DiskScheduler schedules disk read and write operations.
///
/// A request is scheduled by calling `schedule` with a batch of `DiskRequest`s.
/// Requests are executed in FIFO order by a dedicated background worker
/// thread against the page store, one at a time. The scheduler can be
/// shared across threads, every submitter puts its requests onto the same
/// queue, so the execution order is the arrival order of the queue.
///
/// The requests queued before `shutdown` are still executed, the ones
/// after are refused with `SchedulerClosed`.
pub struct DiskScheduler {
    store: Arc<dyn PageStore>,
    /// None once the scheduler is shutdown.
    tx: Mutex<Option<Sender<Task>>>,
    worker: Option<JoinHandle<()>>,
}

impl DiskScheduler {
    pub fn new(store: Arc<dyn PageStore>) -> Result<DiskScheduler> {
        let (tx, rx) = mpsc::channel();
        let worker_store = Arc::clone(&store);
        let worker = std::thread::Builder::new()
            .name("disk-scheduler".to_string())
            .spawn(move || run_worker(worker_store, rx))?;
        Ok(DiskScheduler { store, tx: Mutex::new(Some(tx)), worker: Some(worker) })
    }

    /// Queue the requests in the given order, return without waiting for
    /// any of them.
    ///
    /// The page ids are checked up front, a batch carrying an invalid page
    /// id is refused as a whole and nothing of it is queued.
    pub fn schedule(&self, requests: Vec<DiskRequest>) -> Result<()> {
        for request in &requests {
            check_page_id(request.page_id)?;
        }
        let guard = self.tx.lock()?;
        let tx = guard.as_ref().ok_or(Error::SchedulerClosed)?;
        for request in requests {
            tx.send(Task::Request(request))?;
        }
        Ok(())
    }

    pub fn schedule_one(&self, request: DiskRequest) -> Result<()> {
        self.schedule(vec![request])
    }

    /// A zeroed buffer fitting one page.
    pub fn create_buffer(&self) -> Box<[u8]> {
        new_page_buf()
    }

    pub fn store(&self) -> &Arc<dyn PageStore> {
        &self.store
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Stop accepting requests, let the worker drain what's queued so far
    /// and wait for it to exit. Calling it again does nothing.
    pub fn shutdown(&mut self) -> Result<()> {
        let tx = self.tx.lock()?.take();
        if let Some(tx) = tx {
            // the worker only goes away early by panicking, which the join
            // below reports.
            let _ = tx.send(Task::Shutdown);
        }
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| Error::Internal("disk scheduler worker panicked".to_string()))?;
        }
        Ok(())
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!("failed to shutdown disk scheduler: {}", err);
        }
    }
}

fn run_worker(store: Arc<dyn PageStore>, rx: Receiver<Task>) {
    debug!("disk scheduler worker started");
    // a disconnected queue means every sender is gone, same as shutdown.
    while let Ok(task) = rx.recv() {
        let request = match task {
            Task::Request(request) => request,
            Task::Shutdown => break,
        };
        let DiskRequest { kind, page_id, mut data, done } = request;
        trace!("dispatching {:?} of page {}", kind, page_id);
        let res = match kind {
            RequestKind::Write => store.write_page(page_id, &data),
            RequestKind::Read => store.read_page(page_id, &mut data),
        };
        let outcome = match res {
            Ok(()) => Ok(data),
            Err(err) => {
                warn!("{:?} of page {} failed: {}", kind, page_id, err);
                Err(err)
            }
        };
        // the submitter may have dropped its completion, nothing to report to.
        let _ = done.send(outcome);
    }
    debug!("disk scheduler worker stopped");
}
