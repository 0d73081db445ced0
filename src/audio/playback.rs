//! Handoff queue between the control domain and the render thread.
//!
//! The control domain pushes decoded chunks and clears the queue on
//! cancellation; the render thread pulls a fixed number of samples per
//! period. This is the only shared state crossing the two domains. A single
//! short-lived mutex guards the queue, so a `clear` is atomic with respect
//! to any in-flight `pull`: one pull sees either the pre-clear queue or the
//! post-clear queue, never a mix. `pull` copies into a caller-owned slice
//! and performs no allocation.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

struct Queue {
    chunks: VecDeque<Vec<i16>>,
    /// Samples of the front chunk already consumed by previous pulls.
    front_offset: usize,
    queued_samples: usize,
}

pub struct PlaybackBuffer {
    inner: Mutex<Queue>,
    max_chunks: usize,
    dropped_chunks: AtomicU64,
}

pub const DEFAULT_MAX_CHUNKS: usize = 64;

impl PlaybackBuffer {
    pub fn new(max_chunks: usize) -> Self {
        Self {
            inner: Mutex::new(Queue {
                chunks: VecDeque::new(),
                front_offset: 0,
                queued_samples: 0,
            }),
            max_chunks,
            dropped_chunks: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Queue> {
        // A panic while holding this lock poisons it; the queue itself is
        // still structurally sound, so keep rendering.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a decoded chunk. Called from the control domain only. If the
    /// queue is at capacity the oldest chunk is dropped and counted.
    pub fn push(&self, chunk: Vec<i16>) {
        if chunk.is_empty() {
            return;
        }
        let mut q = self.lock();
        if q.chunks.len() >= self.max_chunks {
            if let Some(old) = q.chunks.pop_front() {
                q.queued_samples -= old.len() - q.front_offset;
                q.front_offset = 0;
                self.dropped_chunks.fetch_add(1, Ordering::Relaxed);
            }
        }
        q.queued_samples += chunk.len();
        q.chunks.push_back(chunk);
    }

    /// Fill `out` from the queue, zero-filling any shortfall. Never blocks on
    /// the control domain beyond the queue mutex and never allocates; an
    /// empty queue yields a full slice of silence.
    pub fn pull(&self, out: &mut [i16]) {
        let mut q = self.lock();
        let mut written = 0;
        while written < out.len() {
            let (copied, exhausted) = match q.chunks.front() {
                Some(chunk) => {
                    let available = &chunk[q.front_offset..];
                    let n = available.len().min(out.len() - written);
                    out[written..written + n].copy_from_slice(&available[..n]);
                    (n, q.front_offset + n == chunk.len())
                }
                None => break,
            };
            written += copied;
            q.queued_samples -= copied;
            if exhausted {
                q.chunks.pop_front();
                q.front_offset = 0;
            } else {
                q.front_offset += copied;
            }
        }
        drop(q);
        out[written..].fill(0);
    }

    /// Discard everything queued in one atomic step. Safe to call while a
    /// `pull` is in flight on the render thread; idempotent.
    pub fn clear(&self) {
        let mut q = self.lock();
        q.chunks.clear();
        q.front_offset = 0;
        q.queued_samples = 0;
    }

    /// Samples currently queued.
    pub fn queued_samples(&self) -> usize {
        self.lock().queued_samples
    }

    /// Chunks discarded by the overflow valve since startup.
    pub fn dropped_chunks(&self) -> u64 {
        self.dropped_chunks.load(Ordering::Relaxed)
    }
}
