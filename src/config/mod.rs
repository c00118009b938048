use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::errors::ScheduleError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub scheduling: SchedulingConfig,
    pub player: PlayerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Glob of plan files to compile
    pub path: String,
    /// Directory receiving the timeline artifacts
    pub out_dir: PathBuf,
    /// Priority cutoff for the filtered artifacts
    pub out_priority_level: i32,
    /// Driver tick interval, in seconds
    pub polling_time: f64,
    /// Override for the ffprobe binary
    #[serde(default)]
    pub ffprobe: Option<String>,
}

impl SchedulingConfig {
    pub fn polling_interval(&self) -> std::time::Duration {
        if self.polling_time > 0.0 {
            std::time::Duration::from_secs_f64(self.polling_time)
        } else {
            std::time::Duration::from_millis(500)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Launch the player ourselves; false attaches to a running instance
    pub start: bool,
    pub host: String,
    pub port: u16,
    pub password: String,
    /// Extra player interfaces to enable alongside HTTP
    #[serde(default)]
    pub extraintf: Vec<String>,
    /// Extra command-line flags passed through to the player
    #[serde(default)]
    pub options: Vec<String>,
    pub path: PlayerPathConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerPathConfig {
    pub linux: String,
    pub win: String,
    pub darwin: String,
}

impl PlayerConfig {
    pub fn binary_for_host(&self) -> &str {
        if cfg!(target_os = "windows") {
            &self.path.win
        } else if cfg!(target_os = "macos") {
            &self.path.darwin
        } else {
            &self.path.linux
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scheduling: SchedulingConfig {
                path: "schedules/*.yaml".to_string(),
                out_dir: PathBuf::from("./out"),
                out_priority_level: 100,
                polling_time: 0.5,
                ffprobe: None,
            },
            player: PlayerConfig {
                start: true,
                host: "localhost".to_string(),
                port: 9999,
                password: "vlcplayout".to_string(),
                extraintf: Vec::new(),
                options: Vec::new(),
                path: PlayerPathConfig {
                    linux: "vlc".to_string(),
                    win: "C:\\Program Files\\VideoLAN\\VLC\\vlc.exe".to_string(),
                    darwin: "/Applications/VLC.app/Contents/MacOS/VLC".to_string(),
                },
            },
        }
    }
}

impl Config {
    /// Load the process configuration from `CONFIG_FILE` (default
    /// `config.yaml`), writing a default file when none exists yet.
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.yaml".to_string());

        if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(&config_file)?;
            let config: Config = serde_yaml::from_str(&contents)
                .map_err(|e| ScheduleError::bad_config(format!("{}: {}", config_file, e)))?;
            Ok(config)
        } else {
            let default_config = Self::default();
            let contents = serde_yaml::to_string(&default_config)
                .map_err(|e| ScheduleError::bad_config(e.to_string()))?;
            std::fs::create_dir_all("./schedules")?;
            std::fs::create_dir_all(&default_config.scheduling.out_dir)?;
            std::fs::write(&config_file, contents)?;
            Ok(default_config)
        }
    }
}
