//! Stderr ring buffer for worker failure diagnostics
//!
//! The stderr reader forwards every line to the subscriber and also keeps the
//! most recent lines here, bounded by line count and byte size. When the
//! script exits non-zero the tail becomes the `error` control message text.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::config::{DEFAULT_STDERR_MAX_BYTES, DEFAULT_STDERR_MAX_LINES};

#[derive(Debug, Default)]
struct Inner {
    lines: VecDeque<String>,
    bytes: usize,
}

/// A thread-safe ring buffer for stderr lines
#[derive(Debug, Clone)]
pub struct StderrBuffer {
    inner: Arc<Mutex<Inner>>,
    max_lines: usize,
    max_bytes: usize,
}

impl Default for StderrBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_STDERR_MAX_LINES, DEFAULT_STDERR_MAX_BYTES)
    }
}

impl StderrBuffer {
    pub fn new(max_lines: usize, max_bytes: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                lines: VecDeque::with_capacity(max_lines.min(1024)),
                bytes: 0,
            })),
            max_lines: max_lines.max(1),
            max_bytes,
        }
    }

    /// Add a line, evicting the oldest lines to stay within both limits
    pub fn push_line(&self, line: String) {
        let mut inner = self.inner.lock();

        while inner.bytes + line.len() > self.max_bytes || inner.lines.len() >= self.max_lines {
            match inner.lines.pop_front() {
                Some(old) => inner.bytes = inner.bytes.saturating_sub(old.len()),
                None => break,
            }
        }

        inner.bytes += line.len();
        inner.lines.push_back(line);
    }

    /// All buffered lines joined with newlines
    pub fn contents(&self) -> String {
        let inner = self.inner.lock();
        inner.lines.iter().cloned().collect::<Vec<_>>().join("\n")
    }

    /// The last `n` lines joined with newlines
    pub fn tail(&self, n: usize) -> String {
        let inner = self.inner.lock();
        let skip = inner.lines.len().saturating_sub(n);
        inner
            .lines
            .iter()
            .skip(skip)
            .cloned()
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn len(&self) -> usize {
        self.inner.lock().lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().lines.is_empty()
    }

    pub fn byte_count(&self) -> usize {
        self.inner.lock().bytes
    }
}
