//! Fake backends and a context builder for unit tests

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::catalog::FrameRef;
use crate::config::{Config, ExecutionModel, Timings};
use crate::context::AppContext;
use crate::hw::{AudioBackend, AudioError, AudioStream, Board, DisplaySink, HardwareError};

/// Clip name relative to the audio directory
fn clip_name(path: &Path) -> String {
    let text = path.to_string_lossy();
    match text.split_once("audio/") {
        Some((_, name)) => name.to_string(),
        None => text.into_owned(),
    }
}

#[derive(Default)]
struct FakeAudioLog {
    started: Mutex<Vec<String>>,
    volumes: Mutex<Vec<u8>>,
    stops: AtomicUsize,
}

/// Audio backend whose clips last a fixed time
#[derive(Clone)]
pub struct FakeAudio {
    clip: Duration,
    missing: Vec<String>,
    log: Arc<FakeAudioLog>,
}

impl FakeAudio {
    pub fn new(clip: Duration) -> Self {
        Self {
            clip,
            missing: Vec::new(),
            log: Arc::default(),
        }
    }

    /// Report `name` as absent from the asset tree
    pub fn missing(mut self, name: &str) -> Self {
        self.missing.push(name.to_string());
        self
    }

    pub fn started(&self) -> Vec<String> {
        self.log.started.lock().unwrap().clone()
    }

    pub fn volumes(&self) -> Vec<u8> {
        self.log.volumes.lock().unwrap().clone()
    }

    pub fn stops(&self) -> usize {
        self.log.stops.load(Ordering::SeqCst)
    }
}

struct FakeStream {
    ends_at: Instant,
    stopped: bool,
    log: Arc<FakeAudioLog>,
}

impl AudioStream for FakeStream {
    fn is_finished(&mut self) -> bool {
        self.stopped || Instant::now() >= self.ends_at
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.log.stops.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl AudioBackend for FakeAudio {
    fn start(&self, path: &Path) -> Result<Box<dyn AudioStream>, AudioError> {
        let name = clip_name(path);
        if self.missing.contains(&name) {
            return Err(AudioError::NotFound(path.to_path_buf()));
        }
        self.log.started.lock().unwrap().push(name);
        Ok(Box::new(FakeStream {
            ends_at: Instant::now() + self.clip,
            stopped: false,
            log: Arc::clone(&self.log),
        }))
    }

    fn set_volume(&self, level: u8) -> Result<(), AudioError> {
        self.log.volumes.lock().unwrap().push(level);
        Ok(())
    }
}

/// Display that keeps every frame it was asked to show
#[derive(Default)]
pub struct RecordingDisplay {
    frames: Mutex<Vec<FrameRef>>,
    reinits: AtomicUsize,
    released: AtomicBool,
}

impl RecordingDisplay {
    pub fn frames(&self) -> Vec<FrameRef> {
        self.frames.lock().unwrap().clone()
    }

    pub fn reinits(&self) -> usize {
        self.reinits.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl DisplaySink for RecordingDisplay {
    fn show(&self, frame: FrameRef) -> Result<(), HardwareError> {
        self.frames.lock().unwrap().push(frame);
        Ok(())
    }

    fn reinit(&self) -> Result<(), HardwareError> {
        self.reinits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// Board that records pin activity
#[derive(Default)]
pub struct RecordingBoard {
    backlight: Mutex<Vec<bool>>,
    resets: AtomicUsize,
    power_offs: AtomicUsize,
}

impl RecordingBoard {
    pub fn backlight_history(&self) -> Vec<bool> {
        self.backlight.lock().unwrap().clone()
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    pub fn power_offs(&self) -> usize {
        self.power_offs.load(Ordering::SeqCst)
    }
}

impl Board for RecordingBoard {
    fn set_backlight(&self, on: bool) -> Result<(), HardwareError> {
        self.backlight.lock().unwrap().push(on);
        Ok(())
    }

    fn pulse_display_reset(&self) -> Result<(), HardwareError> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn power_off(&self) -> Result<(), HardwareError> {
        self.power_offs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn ensure_audio_clock(&self) -> Result<(), HardwareError> {
        Ok(())
    }
}

/// Protocol timings shrunk so state bodies finish in milliseconds
pub fn fast_timings() -> Timings {
    Timings {
        frame_period: Duration::from_millis(1),
        audio_chunk: Duration::from_millis(1),
        scheduler_tick: Duration::from_millis(1),
        input_tick: Duration::from_millis(1),
        sleep_settle: Duration::ZERO,
        dice_settle: Duration::ZERO,
        teardown_grace: Duration::from_millis(500),
        ..Timings::default()
    }
}

/// A context wired to recording fakes
pub struct TestRig {
    pub ctx: Arc<AppContext>,
    pub display: Arc<RecordingDisplay>,
    pub board: Arc<RecordingBoard>,
    pub audio: FakeAudio,
}

impl TestRig {
    pub fn new(model: ExecutionModel) -> Self {
        Self::with(model, fast_timings(), FakeAudio::new(Duration::from_millis(5)))
    }

    pub fn with(model: ExecutionModel, timings: Timings, audio: FakeAudio) -> Self {
        let config = Config {
            sim: true,
            execution: model,
            timings,
            ..Config::default()
        };
        let display = Arc::new(RecordingDisplay::default());
        let board = Arc::new(RecordingBoard::default());
        let display_sink: Arc<dyn DisplaySink> = display.clone();
        let board_sink: Arc<dyn Board> = board.clone();
        let ctx = AppContext::new(
            config,
            display_sink,
            board_sink,
            Box::new(audio.clone()),
            StdRng::seed_from_u64(7),
        )
        .expect("pools build from the static catalog");
        Self {
            ctx: Arc::new(ctx),
            display,
            board,
            audio,
        }
    }
}
