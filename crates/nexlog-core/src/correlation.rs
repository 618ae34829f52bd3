//! Correlation context
//!
//! Holds the correlation id of the unit of work currently executing. Inside a
//! [`scope`] the id lives in a tokio task-local slot and follows the task
//! across worker threads. Code running outside any tokio runtime falls back
//! to a thread-local slot, which covers synchronous code and plain threads.
//!
//! Inside a runtime but outside a [`scope`], tasks share worker threads, so
//! there is no slot to bind into: [`set`] and [`bind`] do nothing there, the
//! first such call is reported once as a warning, and [`get`] reads `None`.
//!
//! Reads never block and never panic. Having no id bound is a normal state.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::sync::Once;
use uuid::Uuid;

/// Longest inbound id accepted as-is
pub const MAX_CORRELATION_ID_LEN: usize = 128;

tokio::task_local! {
    static TASK_CORRELATION: RefCell<Option<CorrelationId>>;
}

thread_local! {
    static THREAD_CORRELATION: RefCell<Option<CorrelationId>> = const { RefCell::new(None) };
}

static UNSCOPED_WARNING: Once = Once::new();

/// Identifier tying together all records of one request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// New random id (UUID v4)
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accept an externally supplied id if it is well-formed.
    ///
    /// Well-formed means 1 to 128 characters drawn from ASCII alphanumerics
    /// and `-`, `_`, `.`, `:`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let valid = !raw.is_empty()
            && raw.len() <= MAX_CORRELATION_ID_LEN
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'));
        valid.then(|| Self(raw.to_string()))
    }

    /// Use the inbound id when well-formed, otherwise generate one
    pub fn resolve(inbound: Option<&str>) -> Self {
        inbound.and_then(Self::parse).unwrap_or_else(Self::generate)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Uuid> for CorrelationId {
    fn from(id: Uuid) -> Self {
        Self(id.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Task,
    Thread,
    /// Runtime task without a scope; nothing was written
    Detached,
}

/// True when the caller runs on a tokio runtime, where the thread slot would
/// be shared by every task on the worker
fn in_runtime() -> bool {
    tokio::runtime::Handle::try_current().is_ok()
}

fn warn_unscoped() {
    UNSCOPED_WARNING.call_once(|| {
        tracing::warn!(
            target: "nexlog::correlation",
            "correlation id bound from a tokio task outside correlation::scope; binding ignored"
        );
    });
}

/// Swap the id in whichever slot is active, returning the slot and old value
fn replace(id: Option<CorrelationId>) -> (Slot, Option<CorrelationId>) {
    let mut pending = Some(id);
    let from_task = TASK_CORRELATION
        .try_with(|cell| {
            let new = pending.take().flatten();
            cell.try_borrow_mut().ok().map(|mut slot| std::mem::replace(&mut *slot, new))
        })
        .ok();

    match from_task {
        Some(previous) => (Slot::Task, previous.flatten()),
        None if in_runtime() => {
            if pending.flatten().is_some() {
                warn_unscoped();
            }
            (Slot::Detached, None)
        }
        None => {
            let new = pending.take().flatten();
            let previous = THREAD_CORRELATION
                .try_with(|cell| {
                    cell.try_borrow_mut()
                        .ok()
                        .and_then(|mut slot| std::mem::replace(&mut *slot, new))
                })
                .ok()
                .flatten();
            (Slot::Thread, previous)
        }
    }
}

fn restore(slot: Slot, id: Option<CorrelationId>) {
    let write = |cell: &RefCell<Option<CorrelationId>>| {
        if let Ok(mut current) = cell.try_borrow_mut() {
            *current = id.clone();
        }
    };
    match slot {
        Slot::Task => {
            let _ = TASK_CORRELATION.try_with(write);
        }
        Slot::Thread => {
            let _ = THREAD_CORRELATION.try_with(write);
        }
        Slot::Detached => {}
    }
}

/// Bind `id` to the current unit of work.
///
/// Ignored on a tokio runtime outside [`scope`].
pub fn set(id: CorrelationId) {
    replace(Some(id));
}

/// The id bound to the current unit of work, if any
pub fn get() -> Option<CorrelationId> {
    if let Ok(id) = TASK_CORRELATION.try_with(|cell| cell.try_borrow().ok().and_then(|id| id.clone())) {
        return id;
    }
    if in_runtime() {
        return None;
    }
    THREAD_CORRELATION
        .try_with(|cell| cell.try_borrow().ok().and_then(|id| id.clone()))
        .ok()
        .flatten()
}

/// Unbind the current id. Clearing when nothing is bound is a no-op.
pub fn clear() {
    replace(None);
}

/// Bind `id` until the returned guard is dropped, then restore whatever was
/// bound before.
///
/// On a tokio runtime outside [`scope`] the guard is inert and nothing is
/// bound.
pub fn bind(id: CorrelationId) -> CorrelationScope {
    let (slot, previous) = replace(Some(id));
    CorrelationScope { slot, previous }
}

/// Guard returned by [`bind`]
#[must_use = "the id is unbound as soon as the guard is dropped"]
#[derive(Debug)]
pub struct CorrelationScope {
    slot: Slot,
    previous: Option<CorrelationId>,
}

impl Drop for CorrelationScope {
    fn drop(&mut self) {
        restore(self.slot, self.previous.take());
    }
}

/// Run `future` with its own, initially empty, correlation slot.
///
/// Ids set inside the future are invisible to every other task and vanish
/// when the future completes or is dropped.
pub async fn scope<F: Future>(future: F) -> F::Output {
    TASK_CORRELATION.scope(RefCell::new(None), future).await
}

/// Run `future` in its own slot with `id` already bound
pub async fn scope_with<F: Future>(id: CorrelationId, future: F) -> F::Output {
    TASK_CORRELATION.scope(RefCell::new(Some(id)), future).await
}

/// Carry the caller's current id into `future`, typically one about to be
/// handed to `tokio::spawn`.
pub fn propagate<F: Future>(future: F) -> impl Future<Output = F::Output> {
    let current = get();
    TASK_CORRELATION.scope(RefCell::new(current), future)
}
