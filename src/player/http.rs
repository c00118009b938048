//! VLC HTTP interface client
//!
//! Every command is a GET against `/requests/status.json` with a `command`
//! query parameter and HTTP basic auth (empty username, configured
//! password). VLC's loop and repeat commands toggle rather than set, so the
//! setters first read the current flag and only toggle on mismatch.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{PlayerClient, PlayerState, PlayerStatus};
use crate::errors::PlayerError;

pub struct VlcHttpClient {
    status_url: String,
    password: String,
    http: reqwest::Client,
    request_timeout: Duration,
}

/// The slice of VLC's status payload the scheduler cares about.
#[derive(Debug, Deserialize)]
struct VlcStatusPayload {
    state: String,
    #[serde(default)]
    time: f64,
    #[serde(default, rename = "loop")]
    loop_enabled: bool,
    #[serde(default)]
    repeat: bool,
}

impl VlcHttpClient {
    pub fn new(host: &str, port: u16, password: &str) -> Self {
        Self {
            status_url: format!("http://{}:{}/requests/status.json", host, port),
            password: password.to_string(),
            http: reqwest::Client::new(),
            request_timeout: Duration::from_secs(5),
        }
    }

    async fn request(&self, params: &[(&str, String)]) -> Result<VlcStatusPayload, PlayerError> {
        let response = self
            .http
            .get(&self.status_url)
            .basic_auth("", Some(&self.password))
            .query(params)
            .timeout(self.request_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlayerError::BadStatus {
                status: status.as_u16(),
            });
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn command(&self, params: &[(&str, String)]) -> Result<(), PlayerError> {
        debug!("Player command: {:?}", params);
        self.request(params).await?;
        Ok(())
    }
}

#[async_trait]
impl PlayerClient for VlcHttpClient {
    async fn enqueue(&self, path: &str) -> Result<(), PlayerError> {
        self.command(&[
            ("command", "in_enqueue".to_string()),
            ("input", path.to_string()),
        ])
        .await
    }

    async fn play(&self, playlist_id: i64) -> Result<(), PlayerError> {
        self.command(&[
            ("command", "pl_play".to_string()),
            ("id", playlist_id.to_string()),
        ])
        .await
    }

    async fn seek(&self, seconds: i64) -> Result<(), PlayerError> {
        self.command(&[
            ("command", "seek".to_string()),
            ("val", seconds.to_string()),
        ])
        .await
    }

    async fn pause(&self) -> Result<(), PlayerError> {
        self.command(&[("command", "pl_pause".to_string())]).await
    }

    async fn stop(&self) -> Result<(), PlayerError> {
        self.command(&[("command", "pl_stop".to_string())]).await
    }

    async fn set_loop(&self, enabled: bool) -> Result<(), PlayerError> {
        let current = self.request(&[]).await?;
        if current.loop_enabled != enabled {
            self.command(&[("command", "pl_loop".to_string())]).await?;
        }
        Ok(())
    }

    async fn set_repeat(&self, enabled: bool) -> Result<(), PlayerError> {
        let current = self.request(&[]).await?;
        if current.repeat != enabled {
            self.command(&[("command", "pl_repeat".to_string())]).await?;
        }
        Ok(())
    }

    async fn status(&self) -> Result<PlayerStatus, PlayerError> {
        let payload = self.request(&[]).await?;
        Ok(PlayerStatus {
            state: PlayerState::from_label(&payload.state),
            time: payload.time.round() as i64,
        })
    }
}
