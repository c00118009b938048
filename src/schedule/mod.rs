//! Schedule compilation
//!
//! `ScheduleBuilder` discovers plan files, resolves their windows and time
//! literals, expands every source into clip instances and finally resolves
//! conflicts into the playout timeline. A broken plan file aborts only its
//! own load; the remaining files still compile.

use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::errors::ScheduleError;
use crate::models::{ClipInstance, IdGen, Plan, PlanFile, Source, SourceSpec, Timeline};
use crate::probe::MediaProbe;
use crate::utils::time::{to_duration, to_instant};

pub mod expander;
pub mod resolver;

pub struct ScheduleBuilder<P> {
    probe: P,
    ids: IdGen,
    queue: BinaryHeap<Reverse<ClipInstance>>,
}

impl<P: MediaProbe> ScheduleBuilder<P> {
    pub fn new(probe: P) -> Self {
        Self {
            probe,
            ids: IdGen::new(),
            queue: BinaryHeap::new(),
        }
    }

    /// Load every plan file matching `pattern`. Returns how many loaded;
    /// files that fail to load are logged and skipped.
    pub async fn load_plan_files(
        &mut self,
        pattern: &str,
        now: DateTime<Utc>,
    ) -> Result<usize, ScheduleError> {
        info!("Load schedules from {}", pattern);
        let paths = glob::glob(pattern)
            .map_err(|e| ScheduleError::bad_config(format!("bad scheduling path glob: {}", e)))?;

        let mut loaded = 0;
        for entry in paths {
            let path = match entry {
                Ok(p) => p,
                Err(e) => {
                    warn!("Skip unreadable path: {}", e);
                    continue;
                }
            };
            if !path.is_file() {
                continue;
            }
            match self.load_plan_path(&path, now).await {
                Ok(()) => loaded += 1,
                Err(e) => warn!("Load failed: {}", e),
            }
        }
        Ok(loaded)
    }

    /// Load one plan file.
    pub async fn load_plan_path(
        &mut self,
        path: &Path,
        now: DateTime<Utc>,
    ) -> Result<(), ScheduleError> {
        let origin = path.display().to_string();
        let text = std::fs::read_to_string(path)?;
        self.load_plan_str(&text, &origin, now).await
    }

    /// Load one plan from YAML text. `origin` names it in errors and logs.
    pub async fn load_plan_str(
        &mut self,
        text: &str,
        origin: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ScheduleError> {
        if text.trim().is_empty() {
            debug!("Plan {} is empty", origin);
            return Ok(());
        }
        let file: PlanFile = serde_yaml::from_str(text)
            .map_err(|e| ScheduleError::bad_plan(origin, e.to_string()))?;
        info!("Load plan {}", origin);

        let plan = self.resolve_plan(file, origin, now)?;
        for source in &plan.sources {
            debug!("Add source {}", source.pattern);
            let emitted =
                expander::expand_source(source, &self.probe, &mut self.ids, &mut self.queue)
                    .await?;
            debug!("Source {} expanded into {} clips", source.pattern, emitted);
        }
        Ok(())
    }

    /// Resolve the plan's and each source's window and time fields.
    fn resolve_plan(
        &mut self,
        file: PlanFile,
        origin: &str,
        now: DateTime<Utc>,
    ) -> Result<Plan, ScheduleError> {
        let plan_start = to_instant(file.start_at.as_ref(), now, Some(now))?.unwrap_or(now);
        let plan_end = to_instant(file.end_at.as_ref(), plan_start, None)?;

        let mut sources = Vec::with_capacity(file.sources.len());
        for spec in &file.sources {
            sources.push(self.resolve_source(spec, origin, plan_start, plan_end)?);
        }

        Ok(Plan {
            start_at: plan_start,
            end_at: plan_end,
            sources,
        })
    }

    fn resolve_source(
        &mut self,
        spec: &SourceSpec,
        origin: &str,
        plan_start: DateTime<Utc>,
        plan_end: Option<DateTime<Utc>>,
    ) -> Result<Source, ScheduleError> {
        let mut start_at =
            to_instant(spec.start_at.as_ref(), plan_start, Some(plan_start))?.unwrap_or(plan_start);
        let mut end_at = to_instant(spec.end_at.as_ref(), start_at, plan_end)?;

        // the source window never escapes the plan window
        start_at = start_at.max(plan_start);
        if let Some(plan_end) = plan_end {
            end_at = Some(end_at.map_or(plan_end, |e| e.min(plan_end)));
        }

        let clip_repeat_interval = to_duration(spec.clip_repeat_interval.as_ref(), start_at, None)?;
        let clip_play_duration = to_duration(spec.clip_play_duration.as_ref(), start_at, None)?;

        let clip_paths = expand_media_glob(&spec.source, origin)?;

        Ok(Source {
            id: self.ids.next_id(),
            pattern: spec.source.clone(),
            clip_paths,
            priority: spec.priority,
            start_at,
            end_at,
            clip_play_duration,
            clip_repeat_interval,
            loop_source: spec.loop_source,
            clip_loop: spec.clip_loop,
            policy: spec.preemption_policy(),
            cursor_continuity: spec.cursor_continuity(),
        })
    }

    /// Resolve every queued instance into the final timeline.
    pub fn compile(mut self) -> Result<Timeline, ScheduleError> {
        let timeline = resolver::resolve(self.queue, &mut self.ids)?;
        info!("Compiled timeline with {} clip instances", timeline.len());
        Ok(timeline)
    }
}

/// Expand a source's media glob into lexicographically sorted file paths.
fn expand_media_glob(pattern: &str, origin: &str) -> Result<Vec<String>, ScheduleError> {
    let paths = glob::glob(pattern).map_err(|e| {
        ScheduleError::bad_plan(origin, format!("bad source glob '{}': {}", pattern, e))
    })?;
    let mut files: Vec<String> = paths
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .map(|p| p.display().to_string())
        .collect();
    files.sort();
    Ok(files)
}
