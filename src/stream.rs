//! Chunked transfer driver shared by the download and flash pipelines.
//!
//! ```text
//!   offset ──▶ next_window() ──▶ [offset, offset + chunk)  ──▶ caller reads/writes
//!        ◀── commit(n) ◀────────────── n bytes moved ◀─────┘
//!                  │
//!                  └──▶ Some(percent) when the integer percentage rises
//! ```
//!
//! [`ChunkedTransfer`] owns no I/O. The adapter and updater drive it in a
//! blocking loop; a cooperative host can call [`ChunkedTransfer::next_window`]
//! and [`ChunkedTransfer::commit`] once per scheduler turn instead.

use core::ops::Range;

/// Integer percentage that reports only strict increases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressTracker {
    total: usize,
    last: u8,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self { total, last: 0 }
    }

    /// Percentage for `done` bytes, or `None` if it has not risen since the
    /// last report. Always within `0..=100`.
    pub fn advance(&mut self, done: usize) -> Option<u8> {
        if self.total == 0 {
            return None;
        }
        let pct = (done.min(self.total) as u64 * 100 / self.total as u64) as u8;
        if pct > self.last {
            self.last = pct;
            Some(pct)
        } else {
            None
        }
    }

    pub fn last(&self) -> u8 {
        self.last
    }
}

/// Cursor over a transfer of `total` bytes in windows of at most `chunk`.
#[derive(Debug, Clone)]
pub struct ChunkedTransfer {
    total: usize,
    chunk: usize,
    offset: usize,
    progress: ProgressTracker,
}

impl ChunkedTransfer {
    pub fn new(total: usize, chunk: usize) -> Self {
        Self {
            total,
            chunk: chunk.max(1),
            offset: 0,
            progress: ProgressTracker::new(total),
        }
    }

    /// Byte range to move next, or `None` once everything is committed.
    pub fn next_window(&self) -> Option<Range<usize>> {
        if self.offset >= self.total {
            return None;
        }
        let end = (self.offset + self.chunk).min(self.total);
        Some(self.offset..end)
    }

    /// Record `n` bytes moved at the current offset.
    ///
    /// Returns the new percentage when it rose.
    pub fn commit(&mut self, n: usize) -> Option<u8> {
        self.offset = (self.offset + n).min(self.total);
        self.progress.advance(self.offset)
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_complete(&self) -> bool {
        self.offset >= self.total
    }
}

// ── Tests ─────────────────────────────────────────────────────
