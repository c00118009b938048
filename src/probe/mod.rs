//! Media duration probing
//!
//! The scheduler treats a probe as a pure function of path: given a media
//! file, return its intrinsic playable duration. The real implementation
//! shells out to ffprobe; tests use a fixed map.

use async_trait::async_trait;
use chrono::Duration;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Mutex;
use tokio::process::Command;
use tracing::debug;

use crate::errors::ScheduleError;
use crate::utils::time::duration_from_secs;

/// Capability the expander needs from a prober.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    /// Intrinsic playable duration of the media at `path`.
    async fn duration(&self, path: &str) -> Result<Duration, ScheduleError>;
}

/// ffprobe-backed prober with a per-path cache. Durations never change for
/// the process lifetime, so cache entries are never evicted.
pub struct FfprobeMediaProbe {
    ffprobe_command: String,
    probe_timeout: std::time::Duration,
    cache: Mutex<HashMap<String, Duration>>,
}

impl FfprobeMediaProbe {
    pub fn new(ffprobe_command: Option<String>) -> Self {
        Self {
            ffprobe_command: ffprobe_command.unwrap_or_else(|| "ffprobe".to_string()),
            probe_timeout: std::time::Duration::from_secs(10),
            cache: Mutex::new(HashMap::new()),
        }
    }

    async fn probe(&self, path: &str) -> Result<Duration, ScheduleError> {
        debug!("Probing media duration: {}", path);

        let mut cmd = Command::new(&self.ffprobe_command);
        cmd.args(["-v", "quiet", "-print_format", "json", "-show_format", path]);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let output = tokio::time::timeout(self.probe_timeout, cmd.output())
            .await
            .map_err(|_| {
                ScheduleError::unreadable_media(
                    path,
                    format!("ffprobe timeout after {:?}", self.probe_timeout),
                )
            })?
            .map_err(|e| {
                ScheduleError::unreadable_media(path, format!("failed to execute ffprobe: {}", e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScheduleError::unreadable_media(
                path,
                format!("ffprobe failed: {}", stderr.trim()),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let data: serde_json::Value = serde_json::from_str(&stdout).map_err(|e| {
            ScheduleError::unreadable_media(path, format!("unparsable ffprobe output: {}", e))
        })?;

        let seconds: f64 = data["format"]["duration"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ScheduleError::unreadable_media(path, "no duration in ffprobe output"))?;

        Ok(duration_from_secs(seconds))
    }
}

#[async_trait]
impl MediaProbe for FfprobeMediaProbe {
    async fn duration(&self, path: &str) -> Result<Duration, ScheduleError> {
        if let Ok(cache) = self.cache.lock() {
            if let Some(cached) = cache.get(path) {
                return Ok(*cached);
            }
        }

        let probed = self.probe(path).await?;

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(path.to_string(), probed);
        }
        Ok(probed)
    }
}

/// Fixed-duration prober for tests and dry runs: unknown paths are
/// unreadable.
#[derive(Debug, Default)]
pub struct StaticMediaProbe {
    durations: HashMap<String, Duration>,
}

impl StaticMediaProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: &str, duration: Duration) -> Self {
        self.durations.insert(path.to_string(), duration);
        self
    }
}

#[async_trait]
impl MediaProbe for StaticMediaProbe {
    async fn duration(&self, path: &str) -> Result<Duration, ScheduleError> {
        self.durations
            .get(path)
            .copied()
            .ok_or_else(|| ScheduleError::unreadable_media(path, "unknown media path"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_probe() {
        tokio_test::block_on(async {
            let probe = StaticMediaProbe::new().with("a.mp4", Duration::seconds(10));
            assert_eq!(
                probe.duration("a.mp4").await.unwrap(),
                Duration::seconds(10)
            );
            assert!(probe.duration("missing.mp4").await.is_err());
        });
    }
}
