//! Completion reporter
//!
//! Lives on the host's primary thread. Workers send finished items through a
//! channel; the host drains it with [`CompletionReporter::run_pending`] (or one of
//! the blocking variants) and each item's callback runs there, exactly once.
//!
//! The reporter is `!Send`: callbacks can never be invoked from a
//! worker thread because the reporter cannot get there.

use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error};

use super::work::{WorkId, WorkItem, WorkState};
use crate::error::{panic_message, ReportingError};

/// Host completion function: `(error message or None, success)`.
///
/// An `Err` return (or a panic) is logged and otherwise ignored.
pub type CompletionCallback = Box<dyn FnOnce(Option<String>, bool) -> anyhow::Result<()>>;

/// Delivers completion notifications on the thread that owns it
pub struct CompletionReporter {
    pending: RefCell<HashMap<WorkId, CompletionCallback>>,
    sender: Sender<WorkItem>,
    completions: Receiver<WorkItem>,
    /// Pins the reporter to the thread that created it
    _host: PhantomData<*const ()>,
}

impl CompletionReporter {
    pub fn new() -> Self {
        let (sender, completions) = unbounded();
        Self {
            pending: RefCell::new(HashMap::new()),
            sender,
            completions,
            _host: PhantomData,
        }
    }

    /// Channel on which workers hand back finished items
    pub fn sender(&self) -> Sender<WorkItem> {
        self.sender.clone()
    }

    /// Attach the completion callback for a work item about to be queued
    pub fn register(&self, id: WorkId, callback: CompletionCallback) {
        if self.pending.borrow_mut().insert(id, callback).is_some() {
            error!("work item {} registered twice; earlier callback dropped", id);
        }
    }

    /// Callbacks still waiting for their work item
    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Deliver the result of one finished item and dispose of it.
    ///
    /// Callback failures are logged and swallowed.
    pub fn report(&self, item: WorkItem) {
        if let Err(e) = self.deliver(item) {
            error!("{}", e);
        }
    }

    fn deliver(&self, mut item: WorkItem) -> Result<(), ReportingError> {
        let id = item.id();
        let (message, success) = item.result();

        // Take the callback out before calling it so it may submit more work
        let callback = self.pending.borrow_mut().remove(&id);
        let callback = callback.ok_or(ReportingError::Unregistered(id.0))?;

        debug!("work item {}: reporting success={}", id, success);
        let outcome = panic::catch_unwind(AssertUnwindSafe(move || callback(message, success)));
        item.advance(WorkState::Reported);
        item.advance(WorkState::Disposed);

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(ReportingError::Callback { id: id.0, source }),
            Err(payload) => Err(ReportingError::Panicked {
                id: id.0,
                message: panic_message(payload.as_ref()),
            }),
        }
    }

    /// Report every item that has already finished. Never blocks.
    pub fn run_pending(&self) -> usize {
        let mut delivered = 0;
        while let Ok(item) = self.completions.try_recv() {
            self.report(item);
            delivered += 1;
        }
        delivered
    }

    /// Wait up to `timeout` for at least one item, then report everything ready
    pub fn wait(&self, timeout: Duration) -> usize {
        match self.completions.recv_timeout(timeout) {
            Ok(item) => {
                self.report(item);
                1 + self.run_pending()
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    /// Keep reporting until no callbacks are pending
    pub fn run_until_idle(&self) -> usize {
        let mut delivered = 0;
        while self.pending() > 0 {
            match self.completions.recv() {
                Ok(item) => {
                    self.report(item);
                    delivered += 1;
                }
                Err(_) => break,
            }
        }
        delivered
    }

    /// Like [`run_until_idle`](Self::run_until_idle) but gives up after
    /// `timeout`. Returns whether every pending callback was delivered.
    pub fn run_until_idle_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.pending() > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            self.wait(remaining);
        }
        true
    }
}

impl Default for CompletionReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{ConversionRequest, GeneratorOptions};
    use std::rc::Rc;
    use std::thread;

    fn finished(success: bool) -> WorkItem {
        let mut item = WorkItem::new(
            ConversionRequest::single("a.emf", "a.svg"),
            GeneratorOptions::default(),
            None,
        );
        item.advance(WorkState::Queued);
        item.advance(WorkState::Running);
        item.complete(success);
        item
    }

    type Calls = Rc<RefCell<Vec<(Option<String>, bool)>>>;

    fn recorder(calls: &Calls) -> CompletionCallback {
        let calls = Rc::clone(calls);
        Box::new(move |message, success| {
            calls.borrow_mut().push((message, success));
            Ok(())
        })
    }

    #[test]
    fn test_report_invokes_callback_once() {
        let reporter = CompletionReporter::new();
        let calls: Calls = Rc::default();

        let item = finished(true);
        reporter.register(item.id(), recorder(&calls));
        assert_eq!(reporter.pending(), 1);

        reporter.report(item);
        assert_eq!(reporter.pending(), 0);
        assert_eq!(*calls.borrow(), vec![(None, true)]);
    }

    #[test]
    fn test_failure_message_delivered() {
        let reporter = CompletionReporter::new();
        let calls: Calls = Rc::default();

        let item = finished(false);
        reporter.register(item.id(), recorder(&calls));
        reporter.report(item);
        assert_eq!(
            *calls.borrow(),
            vec![(Some("EMF to SVG convert failed.".to_string()), false)]
        );
    }

    #[test]
    fn test_callback_error_is_swallowed() {
        let reporter = CompletionReporter::new();
        let item = finished(true);
        let id = item.id();
        reporter.register(id, Box::new(|_, _| Err(anyhow::anyhow!("host threw"))));

        let err = reporter.deliver(item).unwrap_err();
        assert!(matches!(err, ReportingError::Callback { id: i, .. } if i == id.0));
        assert_eq!(reporter.pending(), 0);
    }

    #[test]
    fn test_callback_panic_is_swallowed() {
        let reporter = CompletionReporter::new();
        let calls: Calls = Rc::default();

        let bad = finished(true);
        reporter.register(bad.id(), Box::new(|_, _| panic!("host blew up")));
        let good = finished(true);
        reporter.register(good.id(), recorder(&calls));

        let tx = reporter.sender();
        tx.send(bad).unwrap();
        tx.send(good).unwrap();
        assert_eq!(reporter.run_pending(), 2);
        assert_eq!(calls.borrow().len(), 1);
        assert_eq!(reporter.pending(), 0);
    }

    #[test]
    fn test_unregistered_item() {
        let reporter = CompletionReporter::new();
        let item = finished(true);
        let id = item.id();
        assert!(matches!(
            reporter.deliver(item),
            Err(ReportingError::Unregistered(i)) if i == id.0
        ));
    }

    #[test]
    fn test_items_from_other_threads_reported_here() {
        let reporter = CompletionReporter::new();
        let host = thread::current().id();
        let seen_on = Rc::new(RefCell::new(Vec::new()));

        let mut items = Vec::new();
        for _ in 0..4 {
            let item = finished(true);
            let seen_on = Rc::clone(&seen_on);
            reporter.register(
                item.id(),
                Box::new(move |_, _| {
                    seen_on.borrow_mut().push(thread::current().id());
                    Ok(())
                }),
            );
            items.push(item);
        }

        let tx = reporter.sender();
        let producer = thread::spawn(move || {
            for item in items {
                tx.send(item).unwrap();
            }
        });
        producer.join().unwrap();

        assert_eq!(reporter.run_until_idle(), 4);
        assert_eq!(seen_on.borrow().len(), 4);
        assert!(seen_on.borrow().iter().all(|t| *t == host));
    }

    #[test]
    fn test_wait_times_out_when_idle() {
        let reporter = CompletionReporter::new();
        assert_eq!(reporter.wait(Duration::from_millis(10)), 0);
        assert!(reporter.run_until_idle_timeout(Duration::from_millis(10)));
    }
}
