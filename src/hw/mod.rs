//! Boundaries to the physical prop: display, audio output, board pins and
//! button edges
//!
//! Each boundary is a trait with a subprocess-backed implementation for the
//! real board and a simulated one that only logs.

mod audio;
mod board;
mod display;
mod gpio;

pub use audio::{AplayBackend, AudioBackend, AudioError, AudioStream, SimAudio};
pub use board::{Board, PinctrlBoard, SimBoard};
pub use display::{DisplaySink, LogDisplay};
pub use gpio::GpioEdges;

use std::process::{Command, ExitStatus};

/// Errors from the display or board boundary
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {status}")]
    Failed { command: String, status: ExitStatus },

    #[error("display unavailable: {0}")]
    Display(String),

    #[error("gpio: {0}")]
    Gpio(String),
}

/// Run a short helper command to completion
fn run_command(program: &str, args: &[&str]) -> Result<(), HardwareError> {
    let command = format!("{program} {}", args.join(" "));
    let status = Command::new(program)
        .args(args)
        .status()
        .map_err(|source| HardwareError::Spawn {
            command: command.clone(),
            source,
        })?;
    if status.success() {
        Ok(())
    } else {
        Err(HardwareError::Failed { command, status })
    }
}

/// Run a helper command and capture its stdout
fn command_output(program: &str, args: &[&str]) -> Result<String, HardwareError> {
    let command = format!("{program} {}", args.join(" "));
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| HardwareError::Spawn {
            command: command.clone(),
            source,
        })?;
    if !output.status.success() {
        return Err(HardwareError::Failed {
            command,
            status: output.status,
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
