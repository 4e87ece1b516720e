//! pumpd daemon configuration.
//!
//! Configuration comes from an optional JSON file named by `FRAMEPUMP_CONFIG`,
//! with individual env-var overrides applied afterwards, then validation.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

const DEFAULT_ROTATION_DEGREES: i32 = 0;
const DEFAULT_POOL_FRAMES: usize = 4;
const DEFAULT_FRAME_WIDTH: u32 = 640;
const DEFAULT_FRAME_HEIGHT: u32 = 480;
const DEFAULT_TARGET_FPS: u32 = 10;

/// Which delivery controller the daemon runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryPolicy {
    /// Every frame is analyzed; the pool backpressures the producer.
    EveryFrame,
    /// The analyzer never backs up the producer; stale frames are dropped.
    KeepLatest,
}

impl FromStr for DeliveryPolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "every_frame" | "blocking" => Ok(Self::EveryFrame),
            "keep_latest" | "non_blocking" => Ok(Self::KeepLatest),
            other => Err(anyhow!(
                "unknown delivery policy '{}' (expected every_frame or keep_latest)",
                other
            )),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct PumpdConfigFile {
    policy: Option<String>,
    rotation_degrees: Option<i32>,
    pool: Option<PoolConfigFile>,
    feed: Option<FeedConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct PoolConfigFile {
    frames: Option<usize>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct FeedConfigFile {
    target_fps: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct PumpdConfig {
    pub policy: DeliveryPolicy,
    pub rotation_degrees: i32,
    pub pool: PoolSettings,
    pub feed: FeedSettings,
}

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub frames: usize,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub target_fps: u32,
}

impl PumpdConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("FRAMEPUMP_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: PumpdConfigFile) -> Result<Self> {
        let policy = match file.policy {
            Some(raw) => raw.parse()?,
            None => DeliveryPolicy::KeepLatest,
        };
        let rotation_degrees = file.rotation_degrees.unwrap_or(DEFAULT_ROTATION_DEGREES);
        let pool = PoolSettings {
            frames: file
                .pool
                .as_ref()
                .and_then(|pool| pool.frames)
                .unwrap_or(DEFAULT_POOL_FRAMES),
            width: file
                .pool
                .as_ref()
                .and_then(|pool| pool.width)
                .unwrap_or(DEFAULT_FRAME_WIDTH),
            height: file
                .pool
                .and_then(|pool| pool.height)
                .unwrap_or(DEFAULT_FRAME_HEIGHT),
        };
        let feed = FeedSettings {
            target_fps: file
                .feed
                .and_then(|feed| feed.target_fps)
                .unwrap_or(DEFAULT_TARGET_FPS),
        };
        Ok(Self {
            policy,
            rotation_degrees,
            pool,
            feed,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(policy) = std::env::var("FRAMEPUMP_POLICY") {
            if !policy.trim().is_empty() {
                self.policy = policy.parse()?;
            }
        }
        if let Ok(rotation) = std::env::var("FRAMEPUMP_ROTATION_DEGREES") {
            self.rotation_degrees = rotation
                .parse()
                .map_err(|_| anyhow!("FRAMEPUMP_ROTATION_DEGREES must be an integer"))?;
        }
        if let Ok(frames) = std::env::var("FRAMEPUMP_POOL_FRAMES") {
            self.pool.frames = frames
                .parse()
                .map_err(|_| anyhow!("FRAMEPUMP_POOL_FRAMES must be an integer"))?;
        }
        if let Ok(fps) = std::env::var("FRAMEPUMP_TARGET_FPS") {
            self.feed.target_fps = fps
                .parse()
                .map_err(|_| anyhow!("FRAMEPUMP_TARGET_FPS must be an integer"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !matches!(self.rotation_degrees, 0 | 90 | 180 | 270) {
            return Err(anyhow!("rotation_degrees must be one of 0, 90, 180, 270"));
        }
        if self.pool.frames < 2 {
            return Err(anyhow!("pool.frames must be at least 2"));
        }
        if self.pool.width == 0 || self.pool.height == 0 {
            return Err(anyhow!("pool dimensions must be non-zero"));
        }
        if self.feed.target_fps == 0 {
            return Err(anyhow!("feed.target_fps must be at least 1"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<PumpdConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
