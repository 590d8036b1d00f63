//! Per-batch progress reporting shared by all probe tasks

use crate::proxy::models::ProxyResult;
use log::warn;
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Progress line is printed on every sixth completion.
const PROGRESS_EVERY: usize = 6;

/// Completion counter and output stream for one batch.
///
/// Owned by a single [`ProxyChecker`](crate::proxy::ProxyChecker) run and
/// dropped when it returns. All writes go through the mutex so concurrent
/// completions never interleave partial lines.
pub struct Progress {
    total: usize,
    realtime: bool,
    done: AtomicUsize,
    out: Mutex<Box<dyn Write + Send>>,
}

impl Progress {
    pub fn new(total: usize, realtime: bool, out: Box<dyn Write + Send>) -> Self {
        Self {
            total,
            realtime,
            done: AtomicUsize::new(0),
            out: Mutex::new(out),
        }
    }

    pub fn stdout(total: usize, realtime: bool) -> Self {
        Self::new(total, realtime, Box::new(io::stdout()))
    }

    /// Record one finished probe.
    ///
    /// In realtime mode the result line is printed right away. Otherwise a
    /// `Processed X of N proxies` line overwrites the current terminal line
    /// whenever the count is 5 mod 6.
    pub fn complete(&self, result: &ProxyResult) -> usize {
        let mut out = match self.out.lock() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        };
        let done = self.done.fetch_add(1, Ordering::SeqCst) + 1;

        let written = if self.realtime {
            writeln!(out, "{}", result)
        } else if done % PROGRESS_EVERY == PROGRESS_EVERY - 1 {
            write!(out, "Processed {} of {} proxies\r", done, self.total)
        } else {
            Ok(())
        };

        if let Err(e) = written.and_then(|_| out.flush()) {
            warn!("failed to write progress: {}", e);
        }

        done
    }

    /// Clear the progress line once every probe has finished.
    pub fn finish(&self) {
        let mut out = match self.out.lock() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = write!(out, "\r").and_then(|_| out.flush()) {
            warn!("failed to write progress: {}", e);
        }
    }
}
