//! Frame buffers and the bounded frame pool.
//!
//! A [`Frame`] wraps one pixel buffer borrowed from a [`FramePool`]. The pool
//! is bounded: a producer that outruns its consumers eventually finds the
//! pool empty and must wait or skip, which is how backpressure reaches the
//! capture side. Every frame must be handed back with [`Frame::release`]
//! exactly once. A frame dropped without release is reclaimed anyway, with a
//! warning, so the pool cannot stall; the warning means a delivery path lost
//! track of ownership.

use anyhow::{anyhow, Result};
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use zeroize::Zeroize;

/// Sentinel timestamp meaning "no frame posted yet".
pub const NO_FRAME: i64 = -1;

/// Bounded pool of recyclable frame buffers.
///
/// Cloning yields another handle to the same pool.
#[derive(Clone)]
pub struct FramePool {
    shared: Arc<PoolShared>,
}

struct PoolShared {
    free: Mutex<Vec<Vec<u8>>>,
    frame_bytes: usize,
    width: u32,
    height: u32,
    capacity: usize,
    outstanding: AtomicUsize,
}

impl FramePool {
    /// Create a pool of `capacity` buffers sized for `width` x `height` RGB frames.
    pub fn new(capacity: usize, width: u32, height: u32) -> Self {
        let frame_bytes = width as usize * height as usize * 3;
        let free = (0..capacity).map(|_| vec![0u8; frame_bytes]).collect();
        Self {
            shared: Arc::new(PoolShared {
                free: Mutex::new(free),
                frame_bytes,
                width,
                height,
                capacity,
                outstanding: AtomicUsize::new(0),
            }),
        }
    }

    /// Borrow a buffer from the pool as a fresh frame.
    ///
    /// Fails when every buffer is in flight; for the every-frame delivery
    /// policy this failure is the backpressure signal.
    pub fn acquire(&self, timestamp: i64) -> Result<Frame> {
        if timestamp < 0 {
            return Err(anyhow!("frame timestamp must be non-negative"));
        }
        let mut data = {
            let mut free = self.shared.free.lock().unwrap();
            free.pop().ok_or_else(|| {
                anyhow!(
                    "frame pool exhausted ({} frames in flight)",
                    self.shared.capacity
                )
            })?
        };
        data.resize(self.shared.frame_bytes, 0);
        self.shared.outstanding.fetch_add(1, Ordering::SeqCst);
        Ok(Frame {
            data,
            width: self.shared.width,
            height: self.shared.height,
            timestamp,
            pool: Arc::clone(&self.shared),
            released: false,
        })
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Frames currently in flight (acquired but not yet released).
    pub fn outstanding(&self) -> usize {
        self.shared.outstanding.load(Ordering::SeqCst)
    }

    pub fn available(&self) -> usize {
        self.shared.free.lock().unwrap().len()
    }
}

impl PoolShared {
    fn recycle(&self, mut data: Vec<u8>) {
        // Scrub before the buffer goes back in rotation.
        data.zeroize();
        self.free.lock().unwrap().push(data);
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
    }
}

/// One frame borrowed from a [`FramePool`].
///
/// Whoever holds the frame owns it and is responsible for releasing it;
/// ownership transfers explicitly at each handoff.
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    timestamp: i64,
    pool: Arc<PoolShared>,
    released: bool,
}

impl Frame {
    /// Monotonic, producer-assigned timestamp.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Return the buffer to the pool. Must be called exactly once per frame.
    pub fn release(mut self) {
        self.recycle();
    }

    fn recycle(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let data = mem::take(&mut self.data);
        self.pool.recycle(data);
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        if !self.released {
            log::warn!(
                "frame {} dropped without release; reclaiming buffer",
                self.timestamp
            );
            self.recycle();
        }
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("timestamp", &self.timestamp)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}
