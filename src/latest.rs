//! Keep-latest (non-blocking) delivery.
//!
//! Forwards frames to the analyzer but never waits for it: when the
//! analyzer is still busy with a previous frame, the new frame goes into a
//! single-slot cache, releasing whatever it supersedes. Once the analyzer
//! frees up, a drain worker re-submits the cached frame, unless a newer one
//! already overtook it, in which case the stale check discards it.
//!
//! The whole controller is one critical section: the cache slot, the
//! posted/finished timestamps and the closed flag are only touched under
//! `state`. Two timestamps rather than a busy boolean let the stale check
//! tell "older than what we already posted" (discard) apart from "newer,
//! analyzer just finished" (proceed) when a re-submitted cached frame races
//! a fresh arrival.
//!
//! Invariants: `finished <= posted` always; at most one frame is cached and
//! it is owned exclusively by the controller; the analyzer only ever sees
//! strictly increasing timestamps.

use anyhow::Result;
use crossbeam_channel::{unbounded, Sender};
use std::sync::{Arc, Mutex};

use crate::analyzer::{AnalyzerSlot, RotationCell};
use crate::dispatch::{post, spawn_worker, Dispatch, DrainCache};
use crate::frame::{Frame, NO_FRAME};
use crate::source::FrameSource;

/// Snapshot of the controller state, for health logging and tests.
#[derive(Clone, Copy, Debug)]
pub struct DeliveryStats {
    /// Timestamp of the last frame handed to the analyzer.
    pub posted: i64,
    /// Timestamp of the last frame whose analysis completed.
    pub finished: i64,
    pub cached: bool,
    pub closed: bool,
}

struct State {
    posted: i64,
    finished: i64,
    cached: Option<Frame>,
    closed: bool,
}

impl State {
    fn fresh() -> Self {
        Self {
            posted: NO_FRAME,
            finished: NO_FRAME,
            cached: None,
            closed: false,
        }
    }
}

/// Delivery controller for the keep-latest policy.
pub struct KeepLatestController {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<State>,
    analyzer: Arc<AnalyzerSlot>,
    rotation: Arc<RotationCell>,
    callback_tx: Sender<Dispatch>,
    drain_tx: Sender<DrainCache>,
}

impl KeepLatestController {
    pub fn new(analyzer: Arc<AnalyzerSlot>, rotation: Arc<RotationCell>) -> Result<Self> {
        let (callback_tx, callback_rx) = unbounded::<Dispatch>();
        let (drain_tx, drain_rx) = unbounded::<DrainCache>();
        let inner = Arc::new(Inner {
            state: Mutex::new(State::fresh()),
            analyzer,
            rotation,
            callback_tx,
            drain_tx,
        });
        spawn_worker("analysis-callback", &inner, callback_rx, Inner::run_dispatch)?;
        spawn_worker("analysis-drain", &inner, drain_rx, |inner, DrainCache| {
            inner.drain_cached();
        })?;
        Ok(Self { inner })
    }

    /// Source notification: grab the most recent frame and route it.
    pub fn on_frame_ready(&self, source: &dyn FrameSource) {
        let Some(frame) = source.acquire_latest() else {
            return;
        };
        self.inner.deliver(frame);
    }

    /// Reset to a fresh, open state. Counters restart from the sentinel, so
    /// a re-opened controller is behaviorally identical to a new one.
    pub fn open(&self) {
        self.inner.open();
    }

    /// Stop delivering. Synchronous: any cached frame is released before
    /// this returns. In-flight dispatches still release their frame, but no
    /// longer touch the counters or re-trigger work.
    pub fn close(&self) {
        self.inner.close();
    }

    pub fn stats(&self) -> DeliveryStats {
        self.inner.stats()
    }
}

impl Inner {
    /// Route one frame. Guarantees the frame ends up released on every
    /// path: released here (closed, stale, superseded-in-cache), cached for
    /// later, or handed to the callback worker which finishes it.
    fn deliver(&self, frame: Frame) {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            drop(state);
            log::debug!("controller closed; releasing frame {}", frame.timestamp());
            frame.release();
            return;
        }
        if frame.timestamp() <= state.posted {
            // Out of order: a re-submitted cached frame lost the race
            // against a newer frame that was already posted.
            drop(state);
            log::debug!("discarding stale frame {}", frame.timestamp());
            frame.release();
            return;
        }
        if state.posted > state.finished {
            // Analyzer busy: keep only the freshest pending frame.
            let superseded = state.cached.replace(frame);
            drop(state);
            if let Some(old) = superseded {
                log::debug!("cache superseded; releasing frame {}", old.timestamp());
                old.release();
            }
            return;
        }
        state.posted = frame.timestamp();
        drop(state);
        if let Err(Dispatch { frame }) = post(&self.callback_tx, Dispatch { frame }) {
            // Callback thread is gone; finish inline so the busy flag does
            // not wedge waiting for a dispatch that will never run.
            log::error!(
                "callback thread rejected frame {}; finishing inline",
                frame.timestamp()
            );
            self.finish_frame(frame);
        }
    }

    /// Stage 1 of the dispatch chain: run the analyzer, finish the frame,
    /// then signal stage 2 (the drain worker) unconditionally.
    fn run_dispatch(&self, Dispatch { frame }: Dispatch) {
        if let Some(analyzer) = self.analyzer.get() {
            let rotation = self.rotation.get();
            if let Err(err) = analyzer.analyze(&frame, rotation) {
                log::warn!("analyzer failed on frame {}: {:#}", frame.timestamp(), err);
            }
        }
        self.finish_frame(frame);
        let _ = post(&self.drain_tx, DrainCache);
    }

    /// Record completion and release. When closed, the counters are left
    /// alone but the frame is still released.
    fn finish_frame(&self, frame: Frame) {
        {
            let mut state = self.state.lock().unwrap();
            if !state.closed {
                state.finished = frame.timestamp();
            }
        }
        frame.release();
    }

    /// Stage 2: take the cached frame, if any, and re-route it. The stale
    /// check in `deliver` catches the case where a newer frame was posted
    /// in the meantime.
    fn drain_cached(&self) {
        let cached = self.state.lock().unwrap().cached.take();
        if let Some(frame) = cached {
            self.deliver(frame);
        }
    }

    fn open(&self) {
        let stale = {
            let mut state = self.state.lock().unwrap();
            let stale = state.cached.take();
            state.posted = NO_FRAME;
            state.finished = NO_FRAME;
            state.closed = false;
            stale
        };
        if let Some(frame) = stale {
            frame.release();
        }
    }

    fn close(&self) {
        let cached = {
            let mut state = self.state.lock().unwrap();
            state.closed = true;
            state.cached.take()
        };
        if let Some(frame) = cached {
            log::debug!("closing; releasing cached frame {}", frame.timestamp());
            frame.release();
        }
    }

    fn stats(&self) -> DeliveryStats {
        let state = self.state.lock().unwrap();
        DeliveryStats {
            posted: state.posted,
            finished: state.finished,
            cached: state.cached.is_some(),
            closed: state.closed,
        }
    }
}
