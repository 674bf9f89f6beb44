//! The host-facing entry point
//!
//! A [`Bridge`] belongs to the host's primary thread. [`Bridge::convert`] validates
//! a request, queues it, and returns immediately; the host later drives
//! [`Bridge::run_pending`] (or a blocking variant) to receive callbacks.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use once_cell::unsync::OnceCell;
use serde_json::Value;

use crate::config::BridgeConfig;
use crate::error::ArgumentError;
use crate::ffi::{ConversionInterface, DynamicInterface};
use crate::request::parse_request;
use crate::runtime::{CompletionReporter, Dispatcher, WorkId, WorkItem};

/// Asynchronous EMF conversion bridge.
///
/// Dropping the bridge waits for queued conversions to finish and delivers their
/// callbacks on the dropping thread before returning.
pub struct Bridge {
    interface: Arc<dyn ConversionInterface>,
    /// Library recorded from the first request (or config) that named one
    library: OnceCell<PathBuf>,
    dispatcher: Dispatcher,
    reporter: CompletionReporter,
}

impl Bridge {
    /// Bridge over the process-wide dynamic interface with default settings
    pub fn new() -> io::Result<Self> {
        Self::with_config(&BridgeConfig::default(), DynamicInterface::shared())
    }

    /// Bridge over any interface implementation with default settings
    pub fn with_interface(interface: Arc<dyn ConversionInterface>) -> io::Result<Self> {
        Self::with_config(&BridgeConfig::default(), interface)
    }

    pub fn with_config(
        config: &BridgeConfig,
        interface: Arc<dyn ConversionInterface>,
    ) -> io::Result<Self> {
        let reporter = CompletionReporter::new();
        let dispatcher = Dispatcher::new(
            config.worker_count(),
            Arc::clone(&interface),
            reporter.sender(),
        )?;

        let library = OnceCell::new();
        if let Some(path) = &config.bridge.library {
            let _ = library.set(path.clone());
        }

        debug!("bridge started with {} worker(s)", dispatcher.worker_count());
        Ok(Self {
            interface,
            library,
            dispatcher,
            reporter,
        })
    }

    /// Queue a conversion.
    ///
    /// Fails synchronously only for malformed requests, in which case `callback`
    /// is dropped without being called. Otherwise `callback` runs exactly once, on
    /// this thread, from one of the `run_*`/`wait` methods.
    pub fn convert<F>(&self, options: &Value, callback: F) -> Result<WorkId, ArgumentError>
    where
        F: FnOnce(Option<String>, bool) -> anyhow::Result<()> + 'static,
    {
        let library_required = self.library.get().is_none() && !self.interface.is_loaded();
        let parsed = parse_request(options, library_required)?;

        if let Some(requested) = parsed.library {
            match self.library.get() {
                None => {
                    let _ = self.library.set(requested);
                }
                Some(current) if *current != requested => warn!(
                    "ignoring library '{}': already using '{}'",
                    requested.display(),
                    current.display()
                ),
                Some(_) => {}
            }
        }

        let item = WorkItem::new(parsed.request, parsed.options, self.library.get().cloned());
        let id = item.id();
        self.reporter.register(id, Box::new(callback));

        if let Err(mut item) = self.dispatcher.submit(item) {
            // Pool is gone: report the failure through the normal path
            warn!("work item {}: dispatcher unavailable", id);
            item.complete(false);
            self.reporter.report(item);
        }
        Ok(id)
    }

    /// The native library this bridge loads, once known
    pub fn library(&self) -> Option<&Path> {
        self.library.get().map(PathBuf::as_path)
    }

    /// Callbacks not yet delivered
    pub fn pending(&self) -> usize {
        self.reporter.pending()
    }

    /// Deliver every completion that is ready. Never blocks.
    pub fn run_pending(&self) -> usize {
        self.reporter.run_pending()
    }

    /// Block up to `timeout` for a completion, then deliver all that are ready
    pub fn wait(&self, timeout: Duration) -> usize {
        self.reporter.wait(timeout)
    }

    /// Block until every queued conversion has been reported
    pub fn run_until_idle(&self) -> usize {
        self.reporter.run_until_idle()
    }

    /// [`run_until_idle`](Self::run_until_idle) with an upper bound; returns
    /// whether everything was delivered
    pub fn run_until_idle_timeout(&self, timeout: Duration) -> bool {
        self.reporter.run_until_idle_timeout(timeout)
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        // Workers finish whatever is queued; their results are reported here
        self.dispatcher.shutdown();
        let delivered = self.reporter.run_pending();
        if delivered > 0 {
            debug!("delivered {} callback(s) while dropping bridge", delivered);
        }
        let lost = self.reporter.pending();
        if lost > 0 {
            warn!("dropping bridge with {} undelivered callback(s)", lost);
        }
    }
}
