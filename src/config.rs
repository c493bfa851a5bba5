//! Configuration loading and management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::events::ButtonId;

/// How state run-bodies are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionModel {
    /// One worker thread per active state body, input on its own thread
    Threaded,
    /// The scheduler loop drives the active body inline and pumps input
    /// between frames
    Cooperative,
}

impl std::str::FromStr for ExecutionModel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "threaded" => Ok(Self::Threaded),
            "cooperative" => Ok(Self::Cooperative),
            other => anyhow::bail!("unknown execution model '{other}'"),
        }
    }
}

/// Protocol timings. All are measured on the monotonic clock.
#[derive(Debug, Clone)]
pub struct Timings {
    /// Pulses shorter than this are bounce
    pub min_pulse: Duration,
    pub hold_b1: Duration,
    pub hold_b2: Duration,
    /// Quiet time after the last release before a tap tally is decided
    pub tap_decision: Duration,
    pub chord_grace: Duration,
    pub chord_timeout: Duration,
    pub post_hold_suppress: Duration,
    pub post_chord_suppress: Duration,
    /// Raw level must disagree this long before resync acts
    pub resync_stability: Duration,
    pub resync_cooldown: Duration,
    /// Button-2 five-tap is ignored this soon after a button-2 hold
    pub hold_five_tap_guard: Duration,
    pub frame_period: Duration,
    /// Audio completion/interrupt polling granularity
    pub audio_chunk: Duration,
    /// Classifier intake wait per tick
    pub input_tick: Duration,
    pub scheduler_tick: Duration,
    pub idle_timeout: Duration,
    pub watchdog_period: Duration,
    pub sleep_settle: Duration,
    pub sleep_wake_window: Duration,
    pub dice_settle: Duration,
    pub teardown_grace: Duration,
}

impl Timings {
    pub fn hold_threshold(&self, button: ButtonId) -> Duration {
        match button {
            ButtonId::B1 => self.hold_b1,
            ButtonId::B2 => self.hold_b2,
        }
    }
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            min_pulse: Duration::from_millis(20),
            hold_b1: Duration::from_millis(800),
            hold_b2: Duration::from_millis(3000),
            tap_decision: Duration::from_millis(700),
            chord_grace: Duration::from_millis(180),
            chord_timeout: Duration::from_secs(1),
            post_hold_suppress: Duration::from_millis(1500),
            post_chord_suppress: Duration::from_millis(750),
            resync_stability: Duration::from_millis(30),
            resync_cooldown: Duration::from_millis(120),
            hold_five_tap_guard: Duration::from_secs(2),
            frame_period: Duration::from_millis(83),
            audio_chunk: Duration::from_millis(50),
            input_tick: Duration::from_millis(50),
            scheduler_tick: Duration::from_millis(10),
            idle_timeout: Duration::from_secs(300),
            watchdog_period: Duration::from_secs(5),
            sleep_settle: Duration::from_millis(500),
            sleep_wake_window: Duration::from_millis(600),
            dice_settle: Duration::from_millis(250),
            teardown_grace: Duration::from_secs(2),
        }
    }
}

/// Output volume presets toggled by a button-1 hold
#[derive(Debug, Clone, Copy)]
pub struct VolumePresets {
    pub high: u8,
    pub low: u8,
}

impl Default for VolumePresets {
    fn default() -> Self {
        Self {
            high: 255,
            low: 100,
        }
    }
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Use simulated display, audio and board backends
    pub sim: bool,

    pub execution: ExecutionModel,

    /// Root of the asset tree; audio clips live under `audio/`
    pub assets_dir: PathBuf,

    /// ALSA device handed to `aplay`
    pub aplay_device: String,

    /// Optional JSON-lines edge script used as the button source
    pub edge_script: Option<PathBuf>,

    /// Optional JSON-lines file receiving every classified gesture
    pub gesture_trace: Option<PathBuf>,

    /// Length of a simulated clip
    pub sim_clip: Duration,

    pub timings: Timings,
    pub volume: VolumePresets,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sim: true,
            execution: ExecutionModel::Cooperative,
            assets_dir: PathBuf::from("assets"),
            aplay_device: "default".to_string(),
            edge_script: None,
            gesture_trace: None,
            sim_clip: Duration::from_millis(1500),
            timings: Timings::default(),
            volume: VolumePresets::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();

        config.sim = lookup("PROP_SIM").is_some_and(|v| v.trim() == "1");
        config.execution = match lookup("PROP_EXECUTION") {
            Some(v) => v.parse().context("invalid PROP_EXECUTION")?,
            None if config.sim => ExecutionModel::Cooperative,
            None => ExecutionModel::Threaded,
        };

        if let Some(dir) = lookup("PROP_ASSETS_DIR") {
            config.assets_dir = PathBuf::from(dir);
        }
        if let Some(device) = lookup("PROP_APLAY_DEVICE") {
            config.aplay_device = device;
        }
        config.edge_script = lookup("PROP_EDGE_SCRIPT").map(PathBuf::from);
        config.gesture_trace = lookup("PROP_GESTURE_TRACE").map(PathBuf::from);

        if let Some(ms) = lookup("PROP_SIM_CLIP_MS") {
            let ms: u64 = ms.trim().parse().context("invalid PROP_SIM_CLIP_MS")?;
            config.sim_clip = Duration::from_millis(ms);
        }
        if let Some(secs) = lookup("PROP_IDLE_TIMEOUT_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .context("invalid PROP_IDLE_TIMEOUT_SECS")?;
            config.timings.idle_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Directory holding the audio clips
    pub fn audio_dir(&self) -> PathBuf {
        self.assets_dir.join("audio")
    }
}
