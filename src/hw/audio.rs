//! Audio output boundary
//!
//! A backend starts one clip and hands back a stream handle. Serialising
//! sessions is the playback coordinator's job, not the backend's.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

/// Errors from starting clips or changing volume
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("audio clip not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to start player for {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("volume change failed: {0}")]
    Volume(String),
}

/// A clip that is playing
pub trait AudioStream: Send {
    fn is_finished(&mut self) -> bool;

    /// Stop playback now. Safe to call more than once.
    fn stop(&mut self);
}

pub trait AudioBackend: Send + Sync {
    fn start(&self, path: &Path) -> Result<Box<dyn AudioStream>, AudioError>;

    fn set_volume(&self, level: u8) -> Result<(), AudioError>;
}

fn check_exists(path: &Path) -> Result<(), AudioError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(AudioError::NotFound(path.to_path_buf()))
    }
}

/// ALSA playback through `aplay`, volume through `amixer`
#[derive(Debug, Clone)]
pub struct AplayBackend {
    device: String,
}

impl AplayBackend {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }
}

struct AplayStream {
    child: Child,
    done: bool,
}

impl AudioStream for AplayStream {
    fn is_finished(&mut self) -> bool {
        if self.done {
            return true;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                if !status.success() {
                    debug!(?status, "aplay exited with failure");
                }
                self.done = true;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(?e, "failed to poll aplay");
                self.done = true;
            }
        }
        self.done
    }

    fn stop(&mut self) {
        if self.done {
            return;
        }
        if let Err(e) = self.child.kill() {
            debug!(?e, "aplay already gone");
        }
        let _ = self.child.wait();
        self.done = true;
    }
}

impl Drop for AplayStream {
    fn drop(&mut self) {
        self.stop();
    }
}

impl AudioBackend for AplayBackend {
    fn start(&self, path: &Path) -> Result<Box<dyn AudioStream>, AudioError> {
        check_exists(path)?;
        info!(device = %self.device, ?path, "aplay");
        let child = Command::new("aplay")
            .arg("-D")
            .arg(&self.device)
            .arg(path)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| AudioError::Spawn {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Box::new(AplayStream { child, done: false }))
    }

    fn set_volume(&self, level: u8) -> Result<(), AudioError> {
        let status = Command::new("amixer")
            .args(["-c", "0", "sset", "PCM", &level.to_string()])
            .stdout(Stdio::null())
            .status()
            .map_err(|e| AudioError::Volume(e.to_string()))?;
        if !status.success() {
            return Err(AudioError::Volume(format!("amixer exited with {status}")));
        }
        info!(level, "PCM volume set");
        Ok(())
    }
}

/// Silent backend whose clips last a fixed time
#[derive(Debug, Clone)]
pub struct SimAudio {
    clip: Duration,
}

impl SimAudio {
    pub fn new(clip: Duration) -> Self {
        Self { clip }
    }
}

struct SimStream {
    ends_at: Instant,
    stopped: bool,
}

impl AudioStream for SimStream {
    fn is_finished(&mut self) -> bool {
        self.stopped || Instant::now() >= self.ends_at
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}

impl AudioBackend for SimAudio {
    fn start(&self, path: &Path) -> Result<Box<dyn AudioStream>, AudioError> {
        check_exists(path)?;
        info!(?path, clip_ms = self.clip.as_millis() as u64, "sim audio");
        Ok(Box::new(SimStream {
            ends_at: Instant::now() + self.clip,
            stopped: false,
        }))
    }

    fn set_volume(&self, level: u8) -> Result<(), AudioError> {
        info!(level, "sim volume");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_clip_is_reported() {
        let backend = SimAudio::new(Duration::from_millis(10));
        let err = backend
            .start(Path::new("/definitely/not/here.wav"))
            .err()
            .unwrap();
        assert!(matches!(err, AudioError::NotFound(_)));
    }

    #[test]
    fn test_sim_stream_finishes_or_stops() {
        let mut stream = SimStream {
            ends_at: Instant::now() + Duration::from_secs(60),
            stopped: false,
        };
        assert!(!stream.is_finished());
        stream.stop();
        assert!(stream.is_finished());

        let mut elapsed = SimStream {
            ends_at: Instant::now(),
            stopped: false,
        };
        assert!(elapsed.is_finished());
    }
}
