//! Work items and their lifecycle

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use log::error;

use crate::request::{ConversionRequest, GeneratorOptions};

/// Unique work item identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkId(pub u64);

static WORK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

impl WorkId {
    fn next() -> Self {
        WorkId(WORK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for WorkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a work item. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WorkState {
    Created,
    Queued,
    Running,
    Completed,
    Reported,
    Disposed,
}

/// Result slot of a finished conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(String),
}

/// One asynchronous conversion.
///
/// Travels from the submitting thread to a worker and back to the host context.
/// Its completion callback stays behind on the host, keyed by [`WorkId`].
#[derive(Debug)]
pub struct WorkItem {
    id: WorkId,
    request: ConversionRequest,
    options: GeneratorOptions,
    /// Library the worker makes sure is loaded before converting
    library: Option<PathBuf>,
    state: WorkState,
    outcome: Option<Outcome>,
}

impl WorkItem {
    pub fn new(
        request: ConversionRequest,
        options: GeneratorOptions,
        library: Option<PathBuf>,
    ) -> Self {
        Self {
            id: WorkId::next(),
            request,
            options,
            library,
            state: WorkState::Created,
            outcome: None,
        }
    }

    pub fn id(&self) -> WorkId {
        self.id
    }

    pub fn request(&self) -> &ConversionRequest {
        &self.request
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    pub fn library(&self) -> Option<&Path> {
        self.library.as_deref()
    }

    pub fn state(&self) -> WorkState {
        self.state
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    /// The two-part result handed to the completion callback.
    ///
    /// An item that never completed reads as a failure of its call shape.
    pub fn result(&self) -> (Option<String>, bool) {
        match &self.outcome {
            Some(Outcome::Success) => (None, true),
            Some(Outcome::Failure(msg)) => (Some(msg.clone()), false),
            None => (Some(self.request.failure_message().to_string()), false),
        }
    }

    /// Move to `next`. Backward or repeated transitions are refused.
    pub(crate) fn advance(&mut self, next: WorkState) -> bool {
        if next <= self.state {
            error!(
                "work item {}: refusing transition {:?} -> {:?}",
                self.id, self.state, next
            );
            return false;
        }
        self.state = next;
        true
    }

    /// Fill the result slot and move to `Completed`
    pub(crate) fn complete(&mut self, success: bool) {
        self.outcome = Some(if success {
            Outcome::Success
        } else {
            Outcome::Failure(self.request.failure_message().to_string())
        });
        self.advance(WorkState::Completed);
    }
}
