//! VLC process supervision
//!
//! Spawns the player with its HTTP interface enabled and watches for the
//! process dying, which is fatal for the playout driver. The child is killed
//! on drop so an aborted run never leaks a player.

use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::config::PlayerConfig;
use crate::errors::PlayerError;

pub struct VlcLauncher {
    config: PlayerConfig,
    child: Option<Child>,
}

impl VlcLauncher {
    pub fn new(config: PlayerConfig) -> Self {
        Self {
            config,
            child: None,
        }
    }

    /// Spawn the player binary for the host OS with the HTTP interface up.
    pub async fn launch(&mut self) -> Result<(), PlayerError> {
        let binary = self.config.binary_for_host();
        info!("Launching player: {}", binary);

        let mut cmd = Command::new(binary);
        cmd.arg("--intf")
            .arg("http")
            .arg("--http-host")
            .arg(&self.config.host)
            .arg("--http-port")
            .arg(self.config.port.to_string())
            .arg("--http-password")
            .arg(&self.config.password);
        for intf in &self.config.extraintf {
            cmd.arg("--extraintf").arg(intf);
        }
        for option in &self.config.options {
            cmd.arg(option);
        }
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());
        cmd.kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| PlayerError::launch(format!("cannot spawn '{}': {}", binary, e)))?;
        debug!("Player process started (pid {:?})", child.id());
        self.child = Some(child);
        Ok(())
    }

    /// Resolve when the player process exits. Never resolves when nothing
    /// was launched.
    pub async fn watch_exit(&mut self) -> Option<std::process::ExitStatus> {
        match &mut self.child {
            Some(child) => child.wait().await.ok(),
            None => std::future::pending().await,
        }
    }

    /// Kill the player process, if one was launched and still runs.
    pub async fn shutdown(&mut self) {
        if let Some(child) = &mut self.child {
            debug!("Stopping player process");
            let _ = child.kill().await;
        }
    }
}
