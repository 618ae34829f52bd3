//! Serialized exception information
//!
//! Errors and panics are never stored on a record as native objects; they are
//! reduced to a kind name, a message and an ordered list of frame strings
//! (outermost frame first).

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::RefCell;
use std::sync::Once;

/// Frames from the panic machinery and backtrace capture itself
const NOISE_FRAME_PREFIXES: &[&str] = &[
    "std::backtrace",
    "std::panicking",
    "std::panic::",
    "core::panicking",
    "core::panic::",
    "std::sys",
    "rust_begin_unwind",
    "__rust",
    "nexlog_core::domain::exception::install_panic_hook",
    "nexlog_core::domain::exception::ExceptionInfo::from_",
    "<alloc::boxed::Box<F,A> as core::ops::function::Fn",
];

thread_local! {
    static LAST_PANIC_TRACEBACK: RefCell<Option<Vec<String>>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Exception block of a log record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    /// Kind name (error type or `panic`)
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    /// Stack frames, outermost first
    pub traceback: Vec<String>,
    /// Messages of the error's source chain, nearest cause first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
}

impl ExceptionInfo {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            traceback: Vec::new(),
            causes: Vec::new(),
        }
    }

    pub fn with_traceback(mut self, traceback: Vec<String>) -> Self {
        self.traceback = traceback;
        self
    }

    /// Build from a typed error.
    ///
    /// The traceback is always captured at the call site, whatever
    /// `RUST_BACKTRACE`/`RUST_LIB_BACKTRACE` say.
    pub fn from_error<E>(error: &E) -> Self
    where
        E: std::error::Error + 'static,
    {
        Self {
            kind: short_type_name(std::any::type_name::<E>()),
            message: error.to_string(),
            traceback: frames(&Backtrace::force_capture()),
            causes: source_chain(error),
        }
    }

    /// Build from an `anyhow::Error`, using the backtrace it carries or one
    /// captured here when the error was created with capture disabled
    pub fn from_anyhow(error: &anyhow::Error) -> Self {
        let carried = error.backtrace();
        let traceback = if carried.status() == BacktraceStatus::Captured {
            frames(carried)
        } else {
            frames(&Backtrace::force_capture())
        };
        Self {
            kind: "anyhow::Error".to_string(),
            message: error.to_string(),
            traceback,
            causes: error.chain().skip(1).map(|cause| cause.to_string()).collect(),
        }
    }

    /// Build from a caught panic payload.
    ///
    /// The traceback is the one recorded by [`install_panic_hook`] on this
    /// thread, if the hook is installed.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "panic with non-string payload".to_string()
        };

        Self {
            kind: "panic".to_string(),
            message,
            traceback: take_panic_traceback(),
            causes: Vec::new(),
        }
    }
}

/// Install a process-wide panic hook that records the panicking thread's
/// backtrace for [`ExceptionInfo::from_panic`]. The previous hook still runs.
/// Calling this more than once has no further effect.
pub fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let traceback = frames(&Backtrace::force_capture());
            LAST_PANIC_TRACEBACK.with(|slot| {
                if let Ok(mut slot) = slot.try_borrow_mut() {
                    *slot = Some(traceback);
                }
            });
            previous(info);
        }));
    });
}

/// Take the traceback recorded for the last panic on this thread
pub fn take_panic_traceback() -> Vec<String> {
    LAST_PANIC_TRACEBACK
        .with(|slot| slot.try_borrow_mut().ok().and_then(|mut slot| slot.take()))
        .unwrap_or_default()
}

fn short_type_name(full: &str) -> String {
    // Keep generics intact; shorten only the leading path
    let (path, generics) = match full.find('<') {
        Some(idx) => full.split_at(idx),
        None => (full, ""),
    };
    let name = path.rsplit("::").next().unwrap_or(path);
    format!("{name}{generics}")
}

fn source_chain(error: &(dyn std::error::Error + 'static)) -> Vec<String> {
    let mut causes = Vec::new();
    let mut current = error.source();
    while let Some(cause) = current {
        causes.push(cause.to_string());
        current = cause.source();
    }
    causes
}

/// Render a captured backtrace as frame strings, outermost first.
///
/// The `Display` form lists frames innermost first as `N: symbol` lines
/// optionally followed by `at file:line` lines.
fn frames(backtrace: &Backtrace) -> Vec<String> {
    if backtrace.status() != BacktraceStatus::Captured {
        return Vec::new();
    }

    let rendered = backtrace.to_string();
    let mut frames: Vec<String> = Vec::new();
    for line in rendered.lines() {
        let trimmed = line.trim_start();
        if let Some(location) = trimmed.strip_prefix("at ") {
            if let Some(last) = frames.last_mut() {
                if !last.contains(" at ") {
                    last.push_str(" at ");
                    last.push_str(location);
                }
            }
            continue;
        }
        if let Some((index, symbol)) = trimmed.split_once(": ") {
            if index.chars().all(|c| c.is_ascii_digit()) {
                frames.push(symbol.to_string());
            }
        }
    }

    frames.retain(|frame| !NOISE_FRAME_PREFIXES.iter().any(|p| frame.starts_with(p)));
    frames.reverse();
    frames
}
