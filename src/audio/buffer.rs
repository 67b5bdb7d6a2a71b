// ABOUTME: Lock-free playback buffer between the network and the audio callback
// ABOUTME: Unbounded chunk FIFO with fixed-size pop-or-silence on the consumer side

use crossbeam::queue::{ArrayQueue, SegQueue};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Consumed chunks parked for the producer to free
const SPENT_CAPACITY: usize = 64;

/// What the consumer does when fewer samples are queued than requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum UnderrunPolicy {
    /// Output a full frame of silence and leave the queue untouched
    #[default]
    Silence,
    /// Output whatever is queued, then pad the frame with silence
    Drain,
}

impl UnderrunPolicy {
    /// Convert to config string
    pub fn as_str(&self) -> &'static str {
        match self {
            UnderrunPolicy::Silence => "silence",
            UnderrunPolicy::Drain => "drain",
        }
    }
}

/// Producer side of the playback handoff.
///
/// Speakers append resampled chunks with [`PlaybackBuffer::append`]. The
/// matching [`PlaybackReader`] is the only consumer and is owned by the audio
/// callback. Neither side ever takes a lock.
#[derive(Debug)]
pub struct PlaybackBuffer {
    /// Appended chunks, oldest first
    chunks: SegQueue<Box<[i16]>>,
    /// Samples appended and not yet consumed, including the reader's head chunk
    queued: AtomicUsize,
    /// Optional cap on `queued`; chunks that would exceed it are dropped
    limit: Option<usize>,
    /// Frames that could not be served in full
    underruns: AtomicU64,
    /// Chunks rejected by `limit`
    dropped: AtomicU64,
    /// Chunks the reader has finished with, freed by the next `append`
    spent: ArrayQueue<Box<[i16]>>,
}

impl PlaybackBuffer {
    /// Create an unbounded buffer and its single reader
    pub fn channel() -> (Arc<Self>, PlaybackReader) {
        Self::with_limit(None, UnderrunPolicy::default())
    }

    /// Create a buffer with an optional sample cap and the given underrun policy
    pub fn with_limit(
        limit: Option<usize>,
        policy: UnderrunPolicy,
    ) -> (Arc<Self>, PlaybackReader) {
        let buffer = Arc::new(Self {
            chunks: SegQueue::new(),
            queued: AtomicUsize::new(0),
            limit,
            underruns: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            spent: ArrayQueue::new(SPENT_CAPACITY),
        });

        let reader = PlaybackReader {
            buffer: Arc::clone(&buffer),
            head: Box::new([]),
            offset: 0,
            policy,
        };

        (buffer, reader)
    }

    /// Append samples at the tail. Never blocks.
    ///
    /// Returns `false` if the chunk was dropped because of the sample cap.
    pub fn append(&self, samples: Vec<i16>) -> bool {
        // Deallocate what the reader retired, here rather than on the audio thread
        while self.spent.pop().is_some() {}

        let len = samples.len();
        if len == 0 {
            return true;
        }

        if let Some(limit) = self.limit {
            // Approximate under concurrent appenders, exact for a single speaker
            if self.queued.load(Ordering::Acquire) + len > limit {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                log::debug!("Playback buffer full, dropping {} samples", len);
                return false;
            }
        }

        self.chunks.push(samples.into_boxed_slice());
        // Publish the count only once the chunk is reachable by the reader
        self.queued.fetch_add(len, Ordering::Release);
        true
    }

    /// Number of samples waiting to be played
    pub fn len(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    /// Whether nothing is waiting to be played
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of frames served short or as silence
    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }

    /// Number of chunks dropped by the sample cap
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Hand a consumed chunk back to the producer side.
    ///
    /// Pushing into the preallocated queue never allocates. If the producer
    /// has been idle long enough for it to fill up, the chunk is freed here.
    /// `SegQueue::pop` still releases its internal blocks on the reader side,
    /// once per 31 chunks.
    fn retire(&self, chunk: Box<[i16]>) {
        if chunk.is_empty() {
            return;
        }
        if let Err(chunk) = self.spent.push(chunk) {
            drop(chunk);
        }
    }
}

/// Consumer side of the playback handoff.
///
/// There is exactly one reader per buffer. It keeps the partially consumed
/// head chunk locally, so each call costs O(frames requested) regardless of
/// how much audio is queued behind it.
#[derive(Debug)]
pub struct PlaybackReader {
    buffer: Arc<PlaybackBuffer>,
    head: Box<[i16]>,
    offset: usize,
    policy: UnderrunPolicy,
}

impl PlaybackReader {
    /// Fill `out` from the head of the queue.
    ///
    /// With [`UnderrunPolicy::Silence`], either all of `out` is real audio or
    /// all of it is zeros and nothing is consumed. With
    /// [`UnderrunPolicy::Drain`], queued samples are used first and the rest
    /// is zero-filled. Never blocks and never allocates.
    ///
    /// Returns the number of real samples written.
    pub fn fill(&mut self, out: &mut [i16]) -> usize {
        let requested = out.len();
        if requested == 0 {
            return 0;
        }

        let available = self.buffer.queued.load(Ordering::Acquire);
        let take = if available >= requested {
            requested
        } else {
            self.buffer.underruns.fetch_add(1, Ordering::Relaxed);
            match self.policy {
                UnderrunPolicy::Silence => 0,
                UnderrunPolicy::Drain => available,
            }
        };

        let mut written = 0;
        while written < take {
            if self.offset == self.head.len() {
                match self.buffer.chunks.pop() {
                    Some(chunk) => {
                        let spent = std::mem::replace(&mut self.head, chunk);
                        self.buffer.retire(spent);
                        self.offset = 0;
                    }
                    None => break,
                }
            }

            let n = (take - written).min(self.head.len() - self.offset);
            out[written..written + n].copy_from_slice(&self.head[self.offset..self.offset + n]);
            self.offset += n;
            written += n;
        }

        out[written..].fill(0);
        if written > 0 {
            self.buffer.queued.fetch_sub(written, Ordering::AcqRel);
        }
        written
    }

    /// Pop exactly `n` samples, substituting silence on underrun
    pub fn pop_fixed(&mut self, n: usize) -> Vec<i16> {
        let mut out = vec![0; n];
        self.fill(&mut out);
        out
    }

    /// Underrun policy this reader applies
    pub fn policy(&self) -> UnderrunPolicy {
        self.policy
    }
}
