use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::utils::time::{fmod_duration, TimeLiteral};

/// Raw plan file as authored, one per YAML file. Time fields stay literal
/// until the loader resolves them against the load instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanFile {
    #[serde(default)]
    pub start_at: Option<TimeLiteral>,
    #[serde(default)]
    pub end_at: Option<TimeLiteral>,
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
}

/// Raw source declaration inside a plan file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSpec {
    /// Glob of media files, expanded and lexicographically sorted at load
    pub source: String,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default)]
    pub start_at: Option<TimeLiteral>,
    #[serde(default)]
    pub end_at: Option<TimeLiteral>,
    /// Replay the clip list until `end_at` closes the window
    #[serde(default, rename = "loop")]
    pub loop_source: bool,
    #[serde(default)]
    pub clip_play_duration: Option<TimeLiteral>,
    /// Start-to-start cadence; absent means sequential flow
    #[serde(default)]
    pub clip_repeat_interval: Option<TimeLiteral>,
    #[serde(default)]
    pub clip_loop: bool,
    #[serde(default)]
    pub clip_stop_if_interrupted: Option<bool>,
    #[serde(default)]
    pub clip_restart_after_interruption: bool,
    #[serde(default)]
    pub clip_continue_after_interruption: bool,
    #[serde(default)]
    pub clip_skip_time_after_interruption: bool,
}

fn default_priority() -> i32 {
    100
}

impl SourceSpec {
    /// The single effective preemption response, precedence
    /// restart > continue > skip > stop. With no flag set at all the source
    /// crops-and-continues, which is also what same-priority cadence overlap
    /// relies on.
    pub fn preemption_policy(&self) -> PreemptionPolicy {
        if self.clip_restart_after_interruption {
            PreemptionPolicy::Restart
        } else if self.clip_continue_after_interruption {
            PreemptionPolicy::Continue
        } else if self.clip_skip_time_after_interruption {
            PreemptionPolicy::Skip
        } else if self.clip_stop_if_interrupted == Some(true) {
            PreemptionPolicy::Stop
        } else {
            PreemptionPolicy::Continue
        }
    }

    /// How a looping source carries the media cursor from one pass to the
    /// next. Unlike the preemption response this keys off the explicit
    /// flags only: with neither set, every pass starts the media over.
    pub fn cursor_continuity(&self) -> CursorContinuity {
        if self.clip_continue_after_interruption {
            CursorContinuity::Continue
        } else if self.clip_skip_time_after_interruption {
            CursorContinuity::Skip
        } else {
            CursorContinuity::Reset
        }
    }
}

/// Cursor carry-over between loop passes of one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorContinuity {
    /// Start the media from zero on every pass
    Reset,
    /// Resume from the last emitted cursor
    Continue,
    /// Resume as if the media had kept playing during the gap
    Skip,
}

/// What happens to a clip instance when a conflict crops or splits it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreemptionPolicy {
    /// Re-enter at the original cursor (tails restart from zero)
    Restart,
    /// Resume where playback left off
    Continue,
    /// Resume as if the media kept playing during the interruption
    Skip,
    /// Give up the remainder entirely
    Stop,
}

/// A plan with its window resolved against the load instant.
#[derive(Debug, Clone)]
pub struct Plan {
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub sources: Vec<Source>,
}

/// A source with windows, cadence and clip list fully resolved.
#[derive(Debug, Clone)]
pub struct Source {
    pub id: u64,
    pub pattern: String,
    /// Media paths from the glob, lexicographically sorted
    pub clip_paths: Vec<String>,
    /// Lower integer = higher precedence
    pub priority: i32,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    /// How long each clip plays; `None` means the full media duration
    pub clip_play_duration: Option<Duration>,
    /// Start-to-start cadence; `None` means sequential flow
    pub clip_repeat_interval: Option<Duration>,
    pub loop_source: bool,
    pub clip_loop: bool,
    pub policy: PreemptionPolicy,
    pub cursor_continuity: CursorContinuity,
}

/// One concrete scheduled playback of one media file: the unit of the
/// compiled timeline. Created by the expander, mutated only by the resolver
/// (crop/split), frozen at persist time.
#[derive(Debug, Clone)]
pub struct ClipInstance {
    pub id: u64,
    pub source_id: u64,
    pub path: String,
    pub priority: i32,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    /// Intrinsic media duration from the probe
    pub duration: Duration,
    /// Scheduled window length, `end_at - start_at`
    pub play_duration: Duration,
    /// Media offset where playback enters, in `[0, duration]`
    pub cursor_start_at: Duration,
    /// Media offset where playback leaves, in `[0, duration]`
    pub cursor_end_at: Duration,
    /// Tell the player to loop the media when the window outlives it
    pub loop_media: bool,
    /// Embedded copy of the owning source's preemption response
    pub policy: PreemptionPolicy,
}

impl ClipInstance {
    /// Crop the front by `delta`, advancing the cursor with it (the media
    /// resumes where it would have been).
    pub fn crop_front(&mut self, delta: Duration) {
        let delta = delta.max(Duration::zero());
        self.start_at = (self.start_at + delta).min(self.end_at);
        self.play_duration = self.play_duration.min(self.end_at - self.start_at);
        self.cursor_start_at = fmod_duration(
            (self.cursor_start_at + delta).min(self.cursor_end_at),
            self.duration,
        );
        self.cursor_end_at = fmod_duration(self.cursor_start_at + self.play_duration, self.duration);
    }

    /// Crop the front by `delta` without touching the entry cursor (the
    /// media re-enters at the original offset).
    pub fn crop_front_keep_cursor(&mut self, delta: Duration) {
        let delta = delta.max(Duration::zero());
        self.start_at = (self.start_at + delta).min(self.end_at);
        self.play_duration = self.play_duration.min(self.end_at - self.start_at);
        self.cursor_end_at = fmod_duration(self.cursor_start_at + self.play_duration, self.duration);
    }

    /// Pull the end back to `new_end` (never before the start).
    pub fn crop_end_to(&mut self, new_end: DateTime<Utc>) {
        self.end_at = new_end.max(self.start_at);
        self.play_duration = self.play_duration.min(self.end_at - self.start_at);
        self.cursor_end_at = fmod_duration(self.cursor_start_at + self.play_duration, self.duration);
    }

    /// Re-point the entry cursor, keeping the window.
    pub fn set_cursor_start(&mut self, cursor: Duration) {
        self.cursor_start_at = fmod_duration(cursor, self.duration);
        self.cursor_end_at = fmod_duration(self.cursor_start_at + self.play_duration, self.duration);
    }

    /// True when cropping has consumed the whole window.
    pub fn is_empty(&self) -> bool {
        self.play_duration <= Duration::zero()
    }
}

// Heap ordering: (start_at, priority, id). The monotonic id keeps ties
// deterministic; equality mirrors the ordering key.
impl PartialEq for ClipInstance {
    fn eq(&self, other: &Self) -> bool {
        self.start_at == other.start_at && self.priority == other.priority && self.id == other.id
    }
}

impl Eq for ClipInstance {}

impl PartialOrd for ClipInstance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ClipInstance {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.start_at, self.priority, self.id).cmp(&(other.start_at, other.priority, other.id))
    }
}

/// Monotonic id supply shared by sources and clip instances.
#[derive(Debug, Default)]
pub struct IdGen {
    next: u64,
}

impl IdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// The final, resolved, totally-ordered list of clip instances.
#[derive(Debug, Default)]
pub struct Timeline {
    entries: Vec<ClipInstance>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, instance: ClipInstance) {
        self.entries.push(instance);
    }

    pub fn entries(&self) -> &[ClipInstance] {
        &self.entries
    }

    pub fn last_mut(&mut self) -> Option<&mut ClipInstance> {
        self.entries.last_mut()
    }

    pub fn pop(&mut self) -> Option<ClipInstance> {
        self.entries.pop()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Instances at or above the given cutoff (priority <= cutoff).
    pub fn filtered(&self, cutoff: i32) -> impl Iterator<Item = &ClipInstance> {
        self.entries.iter().filter(move |c| c.priority <= cutoff)
    }
}
