//! Board pins and power

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{command_output, run_command, HardwareError};

const BACKLIGHT_PIN: &str = "23";
const DISPLAY_RESET_PIN: &str = "24";
const I2S_BCLK_PIN: &str = "18";
const RESET_PULSE: Duration = Duration::from_millis(100);

/// Board-level outputs other than the panel itself
pub trait Board: Send + Sync {
    fn set_backlight(&self, on: bool) -> Result<(), HardwareError>;

    /// Drive the display reset line low briefly to blank the panel
    fn pulse_display_reset(&self) -> Result<(), HardwareError>;

    /// Ask the operating system to power down
    fn power_off(&self) -> Result<(), HardwareError>;

    /// Make sure the I2S bit clock pin is routed to the audio block
    fn ensure_audio_clock(&self) -> Result<(), HardwareError>;
}

/// Raspberry Pi board driven through `pinctrl` and `shutdown`
#[derive(Debug, Default)]
pub struct PinctrlBoard;

impl PinctrlBoard {
    pub fn new() -> Self {
        Self
    }

    fn drive(pin: &str, high: bool) -> Result<(), HardwareError> {
        let level = if high { "dh" } else { "dl" };
        run_command("pinctrl", &["set", pin, "op", level])
    }
}

impl Board for PinctrlBoard {
    fn set_backlight(&self, on: bool) -> Result<(), HardwareError> {
        debug!(on, "backlight");
        Self::drive(BACKLIGHT_PIN, on)
    }

    fn pulse_display_reset(&self) -> Result<(), HardwareError> {
        Self::drive(DISPLAY_RESET_PIN, false)?;
        thread::sleep(RESET_PULSE);
        Self::drive(DISPLAY_RESET_PIN, true)?;
        info!("display reset pulsed");
        Ok(())
    }

    fn power_off(&self) -> Result<(), HardwareError> {
        info!("executing system shutdown");
        run_command("sudo", &["shutdown", "now"])
    }

    fn ensure_audio_clock(&self) -> Result<(), HardwareError> {
        let current = command_output("pinctrl", &["get", I2S_BCLK_PIN])?;
        if current.to_ascii_lowercase().contains("a0") {
            return Ok(());
        }
        run_command("pinctrl", &["set", I2S_BCLK_PIN, "a0"])?;
        warn!(pin = I2S_BCLK_PIN, "audio bit clock pin was not in ALT0, restored");
        Ok(())
    }
}

/// Board stand-in that remembers what it was asked to do
#[derive(Debug)]
pub struct SimBoard {
    backlight: AtomicBool,
    power_offs: AtomicUsize,
}

impl Default for SimBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl SimBoard {
    pub fn new() -> Self {
        Self {
            backlight: AtomicBool::new(true),
            power_offs: AtomicUsize::new(0),
        }
    }

    pub fn backlight(&self) -> bool {
        self.backlight.load(Ordering::SeqCst)
    }

    pub fn power_offs(&self) -> usize {
        self.power_offs.load(Ordering::SeqCst)
    }
}

impl Board for SimBoard {
    fn set_backlight(&self, on: bool) -> Result<(), HardwareError> {
        if self.backlight.swap(on, Ordering::SeqCst) != on {
            info!(on, "sim backlight");
        }
        Ok(())
    }

    fn pulse_display_reset(&self) -> Result<(), HardwareError> {
        info!("sim display reset pulse");
        Ok(())
    }

    fn power_off(&self) -> Result<(), HardwareError> {
        self.power_offs.fetch_add(1, Ordering::SeqCst);
        info!("sim power off");
        Ok(())
    }

    fn ensure_audio_clock(&self) -> Result<(), HardwareError> {
        Ok(())
    }
}
