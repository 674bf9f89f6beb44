//! Task dispatcher
//!
//! A fixed pool of named worker threads fed from an unbounded queue. Submitting
//! never blocks; each work item is picked up by exactly one worker, converted, and
//! handed to the completion channel.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, warn};

use super::work::{WorkItem, WorkState};
use crate::error::panic_message;
use crate::ffi::ConversionInterface;
use crate::request::ConversionRequest;

/// Thread name prefix for conversion workers
pub const WORKER_NAME: &str = "convertWorker";

/// Worker pool running conversions off the host thread
pub struct Dispatcher {
    queue: Option<Sender<WorkItem>>,
    workers: Vec<JoinHandle<()>>,
    /// Items submitted but not yet picked up by a worker
    queued: Arc<AtomicUsize>,
}

impl Dispatcher {
    /// Spawn `workers` threads (at least one). Finished items are sent on
    /// `completions`.
    pub fn new(
        workers: usize,
        interface: Arc<dyn ConversionInterface>,
        completions: Sender<WorkItem>,
    ) -> io::Result<Self> {
        let (queue, jobs) = unbounded::<WorkItem>();
        let queued = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::with_capacity(workers.max(1));
        for n in 0..workers.max(1) {
            let jobs = jobs.clone();
            let interface = Arc::clone(&interface);
            let completions = completions.clone();
            let queued = Arc::clone(&queued);
            let handle = thread::Builder::new()
                .name(format!("{}-{}", WORKER_NAME, n))
                .spawn(move || worker_loop(jobs, interface, completions, queued))?;
            handles.push(handle);
        }

        Ok(Self {
            queue: Some(queue),
            workers: handles,
            queued,
        })
    }

    /// Queue an item for conversion. Returns the item if the pool is shut down.
    pub fn submit(&self, mut item: WorkItem) -> Result<(), WorkItem> {
        let Some(queue) = &self.queue else {
            return Err(item);
        };
        item.advance(WorkState::Queued);
        self.queued.fetch_add(1, Ordering::AcqRel);
        queue.send(item).map_err(|e| {
            self.queued.fetch_sub(1, Ordering::AcqRel);
            e.into_inner()
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Items waiting for a free worker
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    /// Stop accepting work, let workers drain the queue, and join them
    pub fn shutdown(&mut self) {
        self.queue.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("conversion worker exited by panic");
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(
    jobs: Receiver<WorkItem>,
    interface: Arc<dyn ConversionInterface>,
    completions: Sender<WorkItem>,
    queued: Arc<AtomicUsize>,
) {
    while let Ok(mut item) = jobs.recv() {
        queued.fetch_sub(1, Ordering::AcqRel);
        execute(interface.as_ref(), &mut item);
        if let Err(e) = completions.send(item) {
            // Host side is gone; nobody is left to notify
            warn!("dropping completed work item {}: reporter closed", e.into_inner().id());
        }
    }
    debug!("{} exiting", thread::current().name().unwrap_or(WORKER_NAME));
}

/// Run one work item to completion on the current thread
pub(crate) fn execute(interface: &dyn ConversionInterface, item: &mut WorkItem) {
    item.advance(WorkState::Running);

    // Loading counts as part of the conversion: a panic in either is a failure
    let call = panic::catch_unwind(AssertUnwindSafe(|| {
        if let Some(library) = item.library() {
            interface.ensure_loaded(library, item.options().verbose);
        }
        match item.request() {
            ConversionRequest::Single {
                source,
                destination,
            } => interface.convert_single(source, destination, item.options()),
            ConversionRequest::MultiPage { pages, destination } => {
                interface.convert_multi(pages, destination, item.options())
            }
        }
    }));

    let success = match call {
        Ok(success) => success,
        Err(payload) => {
            error!(
                "work item {}: conversion panicked: {}",
                item.id(),
                panic_message(payload.as_ref())
            );
            false
        }
    };

    if !success {
        warn!(
            "work item {}: {} ({})",
            item.id(),
            item.request().failure_message(),
            item.request().destination().display()
        );
    }
    item.complete(success);
}
