//! Every-frame (blocking) delivery.
//!
//! Forwards every produced frame to the analyzer in acquisition order and
//! never drops. This controller applies no throttling of its own: when the
//! analyzer is slow the frame pool runs dry and the producer blocks or
//! skips upstream, which is the intended backpressure path.

use anyhow::Result;
use crossbeam_channel::{unbounded, Sender};
use std::sync::Arc;

use crate::analyzer::{AnalyzerSlot, RotationCell};
use crate::dispatch::{post, spawn_worker, Dispatch};
use crate::source::FrameSource;

/// Delivery controller for the every-frame policy.
pub struct BlockingController {
    inner: Arc<Inner>,
}

struct Inner {
    analyzer: Arc<AnalyzerSlot>,
    rotation: Arc<RotationCell>,
    callback_tx: Sender<Dispatch>,
}

impl BlockingController {
    pub fn new(analyzer: Arc<AnalyzerSlot>, rotation: Arc<RotationCell>) -> Result<Self> {
        let (callback_tx, callback_rx) = unbounded::<Dispatch>();
        let inner = Arc::new(Inner {
            analyzer,
            rotation,
            callback_tx,
        });
        spawn_worker("analysis-callback", &inner, callback_rx, Inner::run_dispatch)?;
        Ok(Self { inner })
    }

    /// Source notification: one newly available frame batch.
    pub fn on_frame_ready(&self, source: &dyn FrameSource) {
        let Some(frame) = source.acquire_next() else {
            return;
        };
        if let Err(Dispatch { frame }) = post(&self.inner.callback_tx, Dispatch { frame }) {
            // Callback thread is gone; release on the calling thread so the
            // pool does not stall.
            log::error!(
                "callback thread rejected frame {}; releasing inline",
                frame.timestamp()
            );
            frame.release();
        }
    }
}

impl Inner {
    fn run_dispatch(&self, Dispatch { frame }: Dispatch) {
        if let Some(analyzer) = self.analyzer.get() {
            let rotation = self.rotation.get();
            if let Err(err) = analyzer.analyze(&frame, rotation) {
                log::warn!("analyzer failed on frame {}: {:#}", frame.timestamp(), err);
            }
        }
        frame.release();
    }
}
