//! Button edges from `gpiomon`
//!
//! Both buttons sit on pulled-up inputs, so a falling edge is a press.
//! `gpiomon` reports edges as they happen; a reader thread turns each line
//! into a level change on the [`EdgeSink`].

use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::events::ButtonId;
use crate::input::EdgeSink;

use super::{run_command, HardwareError};

const CHIP: &str = "gpiochip0";
const BUTTON_PINS: [(ButtonId, u32); 2] = [(ButtonId::B1, 17), (ButtonId::B2, 27)];

/// Parse one `%o %e` line into the button and its new pressed level
fn parse_event(line: &str) -> Option<(ButtonId, bool)> {
    let mut fields = line.split_whitespace();
    let offset: u32 = fields.next()?.parse().ok()?;
    let rising = match fields.next()? {
        "1" => true,
        "0" => false,
        _ => return None,
    };
    let (button, _) = BUTTON_PINS.iter().find(|(_, pin)| *pin == offset)?;
    Some((*button, !rising))
}

/// Running `gpiomon` child feeding an [`EdgeSink`]. Dropping it stops the
/// child and its reader thread.
pub struct GpioEdges {
    child: Child,
    reader: Option<JoinHandle<()>>,
}

impl GpioEdges {
    pub fn start(sink: EdgeSink) -> Result<Self, HardwareError> {
        for (_, pin) in BUTTON_PINS {
            run_command("pinctrl", &["set", &pin.to_string(), "ip", "pu"])?;
        }

        let mut args = vec!["--format=%o %e".to_string(), CHIP.to_string()];
        args.extend(BUTTON_PINS.iter().map(|(_, pin)| pin.to_string()));
        let command = format!("gpiomon {}", args.join(" "));

        let mut child = Command::new("gpiomon")
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| HardwareError::Spawn {
                command: command.clone(),
                source,
            })?;
        let Some(stdout) = child.stdout.take() else {
            kill(&mut child);
            return Err(HardwareError::Gpio(format!("{command}: no stdout")));
        };

        let spawned = thread::Builder::new()
            .name("gpio-edges".to_string())
            .spawn(move || {
                for line in BufReader::new(stdout).lines() {
                    let Ok(line) = line else {
                        break;
                    };
                    match parse_event(&line) {
                        Some((button, pressed)) => sink.level_changed(button, pressed),
                        None => debug!(line = %line, "unrecognised gpiomon line"),
                    }
                }
                info!("gpio edge stream ended");
            });
        match spawned {
            Ok(reader) => {
                info!(chip = CHIP, "gpio edge monitor started");
                Ok(Self {
                    child,
                    reader: Some(reader),
                })
            }
            Err(source) => {
                kill(&mut child);
                Err(HardwareError::Spawn {
                    command: "gpio-edges reader thread".to_string(),
                    source,
                })
            }
        }
    }
}

fn kill(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!(?e, "gpiomon already exited");
    }
    if let Err(e) = child.wait() {
        warn!(?e, "failed to reap gpiomon");
    }
}

impl Drop for GpioEdges {
    fn drop(&mut self) {
        kill(&mut self.child);
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                warn!("gpio edge reader panicked");
            }
        }
    }
}
