//! propctl: behaviour controller for a two-button animatronic prop
//!
//! Two momentary buttons drive a small set of behaviours (idle animation,
//! songs, quips, a story, a dice roller, sleep and power-off) on a display
//! and a speaker:
//! - Input pipeline classifying raw edges into taps, doubles, holds,
//!   five-taps and chords
//! - Dispatcher applying the global gesture rules
//! - State manager running one behaviour at a time, either on worker
//!   threads or inline on a cooperative scheduler
//!
//! Everything runs on real hardware through `aplay`/`amixer`/`pinctrl`, or
//! against simulated backends with `PROP_SIM=1`.

mod catalog;
mod config;
mod context;
mod dispatch;
mod events;
mod hw;
mod input;
mod lifecycle;
mod playback;
mod runtime;
mod selection;
mod state;
#[cfg(test)]
mod testing;

use std::sync::{Arc, Weak};

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::catalog::Assets;
use crate::config::{Config, ExecutionModel};
use crate::context::AppContext;
use crate::dispatch::Dispatcher;
use crate::hw::{
    AplayBackend, AudioBackend, Board, DisplaySink, GpioEdges, LogDisplay, PinctrlBoard, SimAudio,
    SimBoard,
};
use crate::input::{ButtonSource, CallbackButtons, GestureTrace, InputMonitor, ScriptedButtons};
use crate::lifecycle::{teardown, ShutdownSignal};
use crate::runtime::{Pump, Scheduler};
use crate::state::StateManager;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "propctl starting");

    let config = Config::load()?;
    info!(
        sim = config.sim,
        execution = ?config.execution,
        audio = ?config.audio_dir(),
        "configuration loaded"
    );

    // Backends
    let display: Arc<dyn DisplaySink> =
        Arc::new(LogDisplay::new(Assets::new(config.assets_dir.clone())));
    let (board, audio): (Arc<dyn Board>, Box<dyn AudioBackend>) = if config.sim {
        (
            Arc::new(SimBoard::new()),
            Box::new(SimAudio::new(config.sim_clip)),
        )
    } else {
        (
            Arc::new(PinctrlBoard::new()),
            Box::new(AplayBackend::new(config.aplay_device.clone())),
        )
    };

    let rng = StdRng::from_rng(&mut rand::rng());
    let ctx = Arc::new(
        AppContext::new(config.clone(), display, board, audio, rng)
            .context("failed to build selection pools")?,
    );
    ctx.playback.set_volume(ctx.volume());
    if let Err(e) = ctx.board.set_backlight(true) {
        warn!(error = %e, "backlight on failed");
    }

    let result = serve(Arc::clone(&ctx), &config).await;
    if let Err(e) = &result {
        error!(error = %e, "startup failed");
        teardown(&ctx, None).await;
    }

    info!("propctl stopped");

    result
}

/// Start input and the scheduler, then run until the scheduler exits or a
/// termination signal arrives
async fn serve(ctx: Arc<AppContext>, config: &Config) -> Result<()> {
    // Input
    let script = match &config.edge_script {
        Some(path) => Some(
            ScriptedButtons::load(path)
                .with_context(|| format!("failed to load edge script {}", path.display()))?,
        ),
        None => None,
    };
    let mut edge_sink = None;
    let mut monitor = InputMonitor::new(
        config.timings.clone(),
        ctx.holds.clone(),
        ctx.queue.clone(),
        |tx| match script {
            Some(script) => {
                info!("replaying edge script");
                Box::new(script) as Box<dyn ButtonSource>
            }
            None => {
                let (buttons, sink) = CallbackButtons::new(tx);
                edge_sink = Some(sink);
                Box::new(buttons)
            }
        },
    );
    let gpio = match edge_sink {
        Some(sink) if !config.sim => {
            Some(GpioEdges::start(sink).context("failed to start button edge monitor")?)
        }
        Some(_) => {
            warn!("simulation without an edge script, buttons stay inert");
            None
        }
        None => None,
    };
    if let Some(path) = &config.gesture_trace {
        match GestureTrace::create(path) {
            Ok(trace) => monitor = monitor.with_trace(trace),
            Err(e) => warn!(?path, error = %e, "gesture trace unavailable"),
        }
    }

    let (mut monitor_handle, inline_monitor) = match config.execution {
        ExecutionModel::Threaded => (
            Some(monitor.spawn(config.timings.input_tick, ctx.signals.shutdown_flag())?),
            None,
        ),
        ExecutionModel::Cooperative => (None, Some(monitor)),
    };

    // States, dispatch and the scheduler loop
    let manager = Arc::new(StateManager::new(Arc::clone(&ctx)));
    let dispatcher = Dispatcher::new(Arc::clone(&ctx), Arc::clone(&manager));
    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&ctx),
        manager,
        dispatcher,
        inline_monitor,
    ));
    let pump: Weak<dyn Pump> = Arc::downgrade(&scheduler) as Weak<dyn Pump>;
    ctx.pacer.attach_pump(pump);

    let shutdown = ShutdownSignal::new();
    let mut runner = {
        let scheduler = Arc::clone(&scheduler);
        tokio::task::spawn_blocking(move || scheduler.run())
    };

    info!("controller initialized, entering main loop");

    let scheduler_done = tokio::select! {
        result = &mut runner => {
            match result {
                Ok(()) => info!("scheduler exited"),
                Err(e) => error!(error = %e, "scheduler task failed"),
            }
            true
        }
        result = shutdown.wait() => {
            match result {
                Ok(signal) => info!(signal, "shutdown signal received"),
                Err(e) => error!(error = %e, "signal handler failed"),
            }
            false
        }
    };

    info!("shutting down...");
    teardown(&ctx, (!scheduler_done).then_some(runner)).await;
    if let Some(handle) = monitor_handle.as_mut() {
        debug!(running = handle.is_running(), "stopping input monitor");
        handle.stop();
    }
    drop(gpio);

    Ok(())
}
