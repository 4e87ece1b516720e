//! framepump: frame delivery core for camera analysis pipelines.
//!
//! Delivers frames from a continuously-producing source to a single
//! registered analyzer under one of two policies:
//!
//! - [`BlockingController`]: every frame is analyzed, in order. The bounded
//!   frame pool backpressures the producer when the analyzer is slow.
//! - [`KeepLatestController`]: the analyzer never backs up the producer.
//!   While it is busy, newer frames coalesce into a single-slot cache and
//!   superseded frames are released unanalyzed.
//!
//! Frames are borrowed from a bounded [`FramePool`] and must be released
//! exactly once; ownership transfers explicitly at each handoff
//! (acquisition -> cache -> dispatch -> analyzer -> release). Both
//! controllers guarantee that every frame they acquire ends up released on
//! every path, including closed controllers, absent analyzers, analyzer
//! failures and rejected dispatch submissions.
//!
//! # Module structure
//!
//! - `frame`: frame buffers and the bounded pool
//! - `source`: the `FrameSource` trait, queue-backed source, synthetic feed
//! - `analyzer`: the `Analyzer` trait plus the analyzer/rotation slots
//! - `dispatch`: the per-controller worker threads
//! - `blocking` / `latest`: the two delivery controllers
//! - `config`: pumpd daemon configuration

pub mod analyzer;
pub mod blocking;
pub mod config;
mod dispatch;
pub mod frame;
pub mod latest;
pub mod source;

pub use analyzer::{Analyzer, AnalyzerSlot, RotationCell};
pub use blocking::BlockingController;
pub use config::{DeliveryPolicy, FeedSettings, PoolSettings, PumpdConfig};
pub use frame::{Frame, FramePool, NO_FRAME};
pub use latest::{DeliveryStats, KeepLatestController};
pub use source::{FeedStats, FrameSource, QueueSource, SyntheticFeed};
