//! Real-time playout
//!
//! The driver walks the compiled timeline against the wall clock, commanding
//! the player to start, seek, loop and stop clips at the right moments.
//! Player commands are best-effort: a failed command is logged and the tick
//! moves on. Two cooperative loops run during playout: the driver tick and
//! the launcher watch; the first one to finish (or Ctrl-C) ends the run,
//! always followed by a final stop command.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::errors::PlayerError;
use crate::persist::{TimelinePersistor, TimelineRecord};
use crate::player::{PlayerClient, PlayerState, PlaylistRegistry, VlcHttpClient, VlcLauncher};

/// A timeline row bound to its playlist entry in the player.
#[derive(Debug, Clone)]
struct PendingClip {
    record: TimelineRecord,
    playlist_id: i64,
}

pub struct PlayoutDriver<C> {
    client: C,
    registry: PlaylistRegistry,
    records: Vec<TimelineRecord>,
    pending: VecDeque<PendingClip>,
    on_air: Option<PendingClip>,
    polling_time: std::time::Duration,
}

impl<C: PlayerClient> PlayoutDriver<C> {
    pub fn new(client: C, records: Vec<TimelineRecord>, polling_time: std::time::Duration) -> Self {
        Self {
            client,
            registry: PlaylistRegistry::new(),
            records,
            pending: VecDeque::new(),
            on_air: None,
            polling_time,
        }
    }

    /// Reset player flags and enqueue every distinct media path, binding
    /// each timeline row to its playlist id.
    pub async fn prepare(&mut self) {
        if let Err(e) = self.client.set_loop(false).await {
            warn!("Player loop reset failed: {}", e);
        }
        if let Err(e) = self.client.set_repeat(false).await {
            warn!("Player repeat reset failed: {}", e);
        }

        let records = std::mem::take(&mut self.records);
        for record in records {
            let (playlist_id, new) = self.registry.assign(&record.path);
            if new {
                debug!("Enqueue {} as playlist entry {}", record.path, playlist_id);
                if let Err(e) = self.client.enqueue(&record.path).await {
                    warn!("Player enqueue failed for {}: {}", record.path, e);
                }
            }
            self.pending.push_back(PendingClip {
                record,
                playlist_id,
            });
        }
    }

    /// One scheduling step at instant `now`. Returns false once the timeline
    /// is exhausted and nothing is on air.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> bool {
        // drop pending clips whose window already closed
        while let Some(head) = self.pending.front() {
            if head.record.end_at < now {
                debug!(
                    "Discard clip: {} ends at {}",
                    head.record.path, head.record.end_at
                );
                self.pending.pop_front();
            } else {
                break;
            }
        }

        // end the on-air window
        if let Some(on_air) = &self.on_air {
            if now >= on_air.record.end_at {
                debug!("Stop clip: {}", on_air.record.path);
                if let Err(e) = self.client.stop().await {
                    warn!("Player stop failed: {}", e);
                }
                self.on_air = None;
            }
        }

        // a stopped player before the window closes means the media ran out;
        // with loop set the player restarts it on its own, otherwise the
        // remainder of the window stays silent and expires in the step above
        if let Some(on_air) = &self.on_air {
            match self.client.status().await {
                Ok(status) => {
                    if status.state == PlayerState::Stopped && !on_air.record.loop_media {
                        debug!(
                            "Media exhausted before window end: {}",
                            on_air.record.path
                        );
                    }
                }
                Err(e) => debug!("Status poll failed: {}", e),
            }
        }

        // start the next clip once its window opens
        if let Some(head) = self.pending.front() {
            if head.record.start_at <= now {
                if let Some(clip) = self.pending.pop_front() {
                    self.start_clip(clip, now).await;
                }
            }
        }

        !(self.pending.is_empty() && self.on_air.is_none())
    }

    async fn start_clip(&mut self, clip: PendingClip, now: DateTime<Utc>) {
        let seek = seek_seconds(&clip.record, now);
        if seek > clip.record.duration.num_seconds() {
            warn!(
                "Seek {}s is beyond the media duration of {}",
                seek, clip.record.path
            );
        }
        info!("Play clip: {} seek={}", clip.record.path, seek);
        if let Err(e) = self.client.play(clip.playlist_id).await {
            warn!("Player play failed: {}", e);
        }
        if let Err(e) = self.client.seek(seek).await {
            warn!("Player seek failed: {}", e);
        }
        if let Err(e) = self.client.set_loop(clip.record.loop_media).await {
            warn!("Player loop failed: {}", e);
        }
        self.on_air = Some(clip);
    }

    /// Command a final stop; used on every exit path.
    pub async fn stop_player(&self) {
        if let Err(e) = self.client.stop().await {
            warn!("Player stop failed: {}", e);
        }
    }

    /// Drive the timeline to completion in real time.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        self.prepare().await;
        while self.tick(Utc::now()).await {
            tokio::time::sleep(self.polling_time).await;
        }
        info!("No more clips to air");
        self.stop_player().await;
        Ok(())
    }
}

/// Where to enter the media: the instance cursor plus however late the tick
/// caught the window, rounded to whole seconds.
fn seek_seconds(record: &TimelineRecord, now: DateTime<Utc>) -> i64 {
    let offset = record.cursor_start_at + (now - record.start_at);
    (offset.num_milliseconds() as f64 / 1000.0).round() as i64
}

/// Reload the persisted timeline and drive the player through it.
pub async fn run_playout(config: &Config) -> anyhow::Result<()> {
    let persistor = TimelinePersistor::new(
        config.scheduling.out_dir.clone(),
        config.scheduling.out_priority_level,
    );
    let records = persistor.load()?;
    if records.is_empty() {
        info!("Timeline is empty, nothing to air");
        return Ok(());
    }

    let mut launcher = if config.player.start {
        let mut launcher = VlcLauncher::new(config.player.clone());
        launcher.launch().await?;
        Some(launcher)
    } else {
        None
    };

    let client = VlcHttpClient::new(
        &config.player.host,
        config.player.port,
        &config.player.password,
    );
    wait_until_ready(&client).await?;

    let mut driver = PlayoutDriver::new(client, records, config.scheduling.polling_interval());

    info!("Start scheduling");
    let result = tokio::select! {
        result = driver.run() => result,
        _ = watch_launcher(&mut launcher) => {
            error!("Player process exited");
            Err(anyhow::anyhow!("player process exited"))
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
            Ok(())
        }
    };
    // the driver stops the player on its own exit path; the other two arms
    // interrupt it mid-tick, so always run the cleanup stop
    driver.stop_player().await;
    if let Some(launcher) = &mut launcher {
        launcher.shutdown().await;
    }
    info!("Stop scheduling");
    result
}

async fn watch_launcher(launcher: &mut Option<VlcLauncher>) {
    match launcher {
        Some(launcher) => {
            let _ = launcher.watch_exit().await;
        }
        None => std::future::pending().await,
    }
}

/// Poll the player until its HTTP interface answers.
async fn wait_until_ready<C: PlayerClient>(client: &C) -> Result<(), PlayerError> {
    for _ in 0..20 {
        if client.status().await.is_ok() {
            return Ok(());
        }
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    }
    Err(PlayerError::launch("player never became reachable"))
}
