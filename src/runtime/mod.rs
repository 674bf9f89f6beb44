//! Conversion runtime
//!
//! Moves work items off the host thread and back again.
//!
//! # Architecture
//!
//! ```text
//! host thread                      worker threads (convertWorker-N)
//! ───────────                      ────────────────────────────────
//! Bridge::convert
//!   │ register callback
//!   │ Dispatcher::submit ──queue──▶ ensure_loaded + native call
//!   │                                      │
//! CompletionReporter ◀──completions────────┘
//!   │ callback(error, success)
//!   ▼
//! item disposed
//! ```
//!
//! Work item states only move forward:
//! Created → Queued → Running → Completed → Reported → Disposed.

mod dispatcher;
mod reporter;
mod work;

pub use dispatcher::{Dispatcher, WORKER_NAME};
pub use reporter::{CompletionCallback, CompletionReporter};
pub use work::{Outcome, WorkId, WorkItem, WorkState};
