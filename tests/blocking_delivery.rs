//! End-to-end tests for the every-frame delivery policy, with real worker
//! threads.

use anyhow::Result;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use framepump::{
    Analyzer, AnalyzerSlot, BlockingController, Frame, FramePool, QueueSource, RotationCell,
};

struct Recording {
    seen: Mutex<Vec<(i64, i32)>>,
    cv: Condvar,
}

impl Recording {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            seen: Mutex::new(Vec::new()),
            cv: Condvar::new(),
        })
    }

    fn wait_for(&self, count: usize, timeout: Duration) -> Vec<(i64, i32)> {
        let guard = self.seen.lock().unwrap();
        let (guard, result) = self
            .cv
            .wait_timeout_while(guard, timeout, |seen| seen.len() < count)
            .unwrap();
        assert!(
            !result.timed_out(),
            "timed out waiting for {} frames, saw {:?}",
            count,
            *guard
        );
        guard.clone()
    }
}

impl Analyzer for Recording {
    fn analyze(&self, frame: &Frame, rotation_degrees: i32) -> Result<()> {
        self.seen
            .lock()
            .unwrap()
            .push((frame.timestamp(), rotation_degrees));
        self.cv.notify_all();
        Ok(())
    }
}

fn wait_for_drain(pool: &FramePool, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while pool.outstanding() != 0 {
        assert!(
            Instant::now() < deadline,
            "frames leaked: {} still outstanding",
            pool.outstanding()
        );
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn every_frame_is_analyzed_in_order() {
    let analyzer_slot = Arc::new(AnalyzerSlot::new());
    let analyzer = Recording::new();
    analyzer_slot.set(Some(analyzer.clone()));
    let controller =
        BlockingController::new(analyzer_slot, Arc::new(RotationCell::new(90))).unwrap();

    let pool = FramePool::new(8, 4, 4);
    let source = QueueSource::new();
    for ts in 1..=5 {
        source.publish(pool.acquire(ts).unwrap());
        controller.on_frame_ready(&source);
    }

    let seen = analyzer.wait_for(5, Duration::from_secs(5));
    assert_eq!(
        seen,
        vec![(1, 90), (2, 90), (3, 90), (4, 90), (5, 90)]
    );
    wait_for_drain(&pool, Duration::from_secs(5));
}

#[test]
fn frames_released_when_no_analyzer_registered() {
    let controller = BlockingController::new(
        Arc::new(AnalyzerSlot::new()),
        Arc::new(RotationCell::new(0)),
    )
    .unwrap();

    let pool = FramePool::new(4, 4, 4);
    let source = QueueSource::new();
    for ts in 1..=3 {
        source.publish(pool.acquire(ts).unwrap());
        controller.on_frame_ready(&source);
    }
    wait_for_drain(&pool, Duration::from_secs(5));
}

#[test]
fn slow_analyzer_backpressures_through_the_pool() {
    let (entered_tx, entered_rx) = crossbeam_channel::unbounded::<i64>();
    let (release_tx, release_rx) = crossbeam_channel::unbounded::<()>();

    struct Gated {
        entered_tx: crossbeam_channel::Sender<i64>,
        release_rx: crossbeam_channel::Receiver<()>,
    }
    impl Analyzer for Gated {
        fn analyze(&self, frame: &Frame, _rotation_degrees: i32) -> Result<()> {
            let _ = self.entered_tx.send(frame.timestamp());
            let _ = self.release_rx.recv();
            Ok(())
        }
    }

    let analyzer_slot = Arc::new(AnalyzerSlot::new());
    analyzer_slot.set(Some(Arc::new(Gated {
        entered_tx,
        release_rx,
    })));
    let controller =
        BlockingController::new(analyzer_slot, Arc::new(RotationCell::new(0))).unwrap();

    let pool = FramePool::new(2, 4, 4);
    let source = QueueSource::new();
    source.publish(pool.acquire(1).unwrap());
    controller.on_frame_ready(&source);
    assert_eq!(entered_rx.recv_timeout(Duration::from_secs(5)).unwrap(), 1);

    source.publish(pool.acquire(2).unwrap());
    controller.on_frame_ready(&source);

    // Both buffers are in flight; the producer is now blocked upstream.
    assert!(pool.acquire(3).is_err());

    release_tx.send(()).unwrap();
    release_tx.send(()).unwrap();
    assert_eq!(entered_rx.recv_timeout(Duration::from_secs(5)).unwrap(), 2);
    wait_for_drain(&pool, Duration::from_secs(5));
    assert!(pool.acquire(3).is_ok());
}

#[test]
fn analyzer_swap_takes_effect_on_next_dispatch() {
    let analyzer_slot = Arc::new(AnalyzerSlot::new());
    let first = Recording::new();
    analyzer_slot.set(Some(first.clone()));
    let controller =
        BlockingController::new(analyzer_slot.clone(), Arc::new(RotationCell::new(0))).unwrap();

    let pool = FramePool::new(4, 4, 4);
    let source = QueueSource::new();
    source.publish(pool.acquire(1).unwrap());
    controller.on_frame_ready(&source);
    first.wait_for(1, Duration::from_secs(5));

    let second = Recording::new();
    analyzer_slot.set(Some(second.clone()));
    source.publish(pool.acquire(2).unwrap());
    controller.on_frame_ready(&source);

    let seen = second.wait_for(1, Duration::from_secs(5));
    assert_eq!(seen, vec![(2, 0)]);
    assert_eq!(first.seen.lock().unwrap().len(), 1);
    wait_for_drain(&pool, Duration::from_secs(5));
}
