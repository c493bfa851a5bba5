//! Shared application context
//!
//! Everything a state, the dispatcher or the scheduler needs beyond its own
//! fields lives here and is handed around as `Arc<AppContext>`. There are no
//! process globals.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, info};

use crate::catalog::{clips, Assets, SheetId};
use crate::config::{Config, Timings};
use crate::events::EventQueue;
use crate::hw::{AudioBackend, Board, DisplaySink};
use crate::input::HoldStamps;
use crate::playback::{Animator, PlaybackCoordinator};
use crate::runtime::{Pacer, Signals};
use crate::selection::{SelectionError, ShufflerParams, WeightedShuffler};

/// History-weighted pools used by the performing states
pub struct Pools {
    pub songs: WeightedShuffler<&'static str>,
    pub quips: WeightedShuffler<&'static str>,
    pub quip_columns: WeightedShuffler<usize>,
    pub sing_columns: WeightedShuffler<usize>,
    first_song_done: bool,
}

impl Pools {
    pub fn new() -> Result<Self, SelectionError> {
        let columns = ShufflerParams {
            recent_window: 1,
            unheard_boost: 0.0,
            age_boost: 0.08,
            recent_penalty: 0.10,
            ..ShufflerParams::default()
        };
        Ok(Self {
            songs: WeightedShuffler::new(clips::SONGS.to_vec(), ShufflerParams::default())?,
            quips: WeightedShuffler::new(
                clips::QUIPS.to_vec(),
                ShufflerParams {
                    recent_window: 2,
                    unheard_boost: 1.5,
                    age_boost: 0.12,
                    recent_penalty: 0.10,
                    ..ShufflerParams::default()
                },
            )?,
            quip_columns: WeightedShuffler::new((0..SheetId::Active.columns()).collect(), columns)?,
            sing_columns: WeightedShuffler::new((0..SheetId::Sing.columns()).collect(), columns)?,
            first_song_done: false,
        })
    }

    /// Next song. The first call after start-up always returns the fixed
    /// opening song and records it as played.
    pub fn next_song(&mut self, rng: &mut impl Rng) -> Result<&'static str, SelectionError> {
        if !self.first_song_done {
            self.first_song_done = true;
            self.songs.observe(&clips::FIRST_SONG)?;
            debug!(song = clips::FIRST_SONG, "forced opening song");
            return Ok(clips::FIRST_SONG);
        }
        Ok(self.songs.next(rng))
    }
}

pub struct AppContext {
    pub config: Config,
    pub signals: Signals,
    pub queue: EventQueue,
    pub holds: HoldStamps,
    pub pacer: Arc<Pacer>,
    pub playback: PlaybackCoordinator,
    pub animator: Animator,
    pub board: Arc<dyn Board>,
    volume: AtomicU8,
    pools: Mutex<Pools>,
    rng: Mutex<StdRng>,
}

impl AppContext {
    pub fn new(
        config: Config,
        display: Arc<dyn DisplaySink>,
        board: Arc<dyn Board>,
        audio: Box<dyn AudioBackend>,
        rng: StdRng,
    ) -> Result<Self, SelectionError> {
        let signals = Signals::new();
        let timings = &config.timings;
        let pacer = Arc::new(Pacer::new(
            config.execution,
            signals.clone(),
            timings.scheduler_tick,
        ));
        let playback = PlaybackCoordinator::new(
            audio,
            Arc::clone(&board),
            Assets::new(config.assets_dir.clone()),
            Arc::clone(&pacer),
            timings.audio_chunk,
        );
        let animator = Animator::new(display, Arc::clone(&pacer), timings.frame_period);
        let volume = AtomicU8::new(config.volume.high);

        Ok(Self {
            signals,
            queue: EventQueue::new(),
            holds: HoldStamps::default(),
            pacer,
            playback,
            animator,
            board,
            volume,
            pools: Mutex::new(Pools::new()?),
            rng: Mutex::new(rng),
            config,
        })
    }

    pub fn timings(&self) -> &Timings {
        &self.config.timings
    }

    pub fn display(&self) -> &Arc<dyn DisplaySink> {
        self.animator.display()
    }

    pub fn pools(&self) -> MutexGuard<'_, Pools> {
        self.pools.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_rng<R>(&self, f: impl FnOnce(&mut StdRng) -> R) -> R {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut rng)
    }

    pub fn volume(&self) -> u8 {
        self.volume.load(Ordering::SeqCst)
    }

    /// Flip between the two volume presets and apply the new level
    pub fn toggle_volume(&self) -> u8 {
        let presets = self.config.volume;
        let next = if self.volume() == presets.high {
            presets.low
        } else {
            presets.high
        };
        self.volume.store(next, Ordering::SeqCst);
        info!(volume = next, "volume toggled");
        self.playback.set_volume(next);
        next
    }
}
