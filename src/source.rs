//! Frame sources.
//!
//! A source owns a queue of ready frames and offers two acquisition modes:
//! `acquire_next` hands out the oldest unconsumed frame (the every-frame
//! policy uses this so nothing is skipped), `acquire_latest` hands out the
//! newest and releases any older queued frames on the spot (the keep-latest
//! policy uses this so the analyzer never falls behind the producer).
//!
//! Producers publish a frame and then notify the controller through its
//! `on_frame_ready` entry point; the source itself never calls into the
//! delivery layer.

use anyhow::Result;
use rand::Rng;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::frame::{Frame, FramePool};

/// A notification-driven frame source.
pub trait FrameSource: Send + Sync {
    /// Oldest unconsumed frame, or `None` when the queue is empty.
    fn acquire_next(&self) -> Option<Frame>;

    /// Most recent frame; older queued frames are released on the spot.
    fn acquire_latest(&self) -> Option<Frame>;
}

/// In-process frame source backed by a FIFO queue.
pub struct QueueSource {
    queue: Mutex<VecDeque<Frame>>,
}

impl QueueSource {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Enqueue a frame for delivery. The queue itself is unbounded; the
    /// frame pool is what bounds the number of frames in flight.
    pub fn publish(&self, frame: Frame) {
        self.queue.lock().unwrap().push_back(frame);
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().unwrap().len()
    }
}

impl Default for QueueSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for QueueSource {
    fn acquire_next(&self) -> Option<Frame> {
        self.queue.lock().unwrap().pop_front()
    }

    fn acquire_latest(&self) -> Option<Frame> {
        let (latest, stale) = {
            let mut queue = self.queue.lock().unwrap();
            let latest = queue.pop_back()?;
            let stale: Vec<Frame> = queue.drain(..).collect();
            (latest, stale)
        };
        for frame in stale {
            log::debug!("releasing superseded frame {}", frame.timestamp());
            frame.release();
        }
        Some(latest)
    }
}

// ----------------------------------------------------------------------------
// Synthetic feed (stub producer for the demo daemon and tests)
// ----------------------------------------------------------------------------

/// Statistics for a synthetic feed.
#[derive(Clone, Debug)]
pub struct FeedStats {
    pub frames_produced: u64,
}

/// Generates patterned frames with strictly increasing timestamps.
pub struct SyntheticFeed {
    pool: FramePool,
    frame_count: u64,
    scene_state: u8,
}

impl SyntheticFeed {
    pub fn new(pool: FramePool) -> Self {
        Self {
            pool,
            frame_count: 0,
            scene_state: 0,
        }
    }

    /// Produce the next frame. Fails when the pool is exhausted, which is
    /// the backpressure signal under the every-frame policy.
    pub fn next_frame(&mut self) -> Result<Frame> {
        let timestamp = (self.frame_count + 1) as i64;
        let mut frame = self.pool.acquire(timestamp)?;
        self.frame_count += 1;
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        self.fill_pixels(frame.pixels_mut());
        Ok(frame)
    }

    fn fill_pixels(&self, pixels: &mut [u8]) {
        let mut rng = rand::thread_rng();
        for (i, pixel) in pixels.iter_mut().enumerate() {
            let base = (i as u64 + self.frame_count + self.scene_state as u64) % 256;
            *pixel = (base as u8).wrapping_add(rng.gen_range(0..4));
        }
    }

    pub fn stats(&self) -> FeedStats {
        FeedStats {
            frames_produced: self.frame_count,
        }
    }
}
