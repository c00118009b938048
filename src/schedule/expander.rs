//! Source expansion
//!
//! Turns one source declaration into zero or more concrete clip instances,
//! honoring cadence, sequential flow, the source window and loop-to-end-at.
//! Instances land in the shared priority queue; conflicts between them are
//! the resolver's business.

use chrono::{DateTime, Duration, Utc};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use tracing::{debug, warn};

use crate::errors::ScheduleError;
use crate::models::{ClipInstance, CursorContinuity, IdGen, Source};
use crate::probe::MediaProbe;
use crate::utils::time::{fmod_duration, format_hms};

/// Cursor continuity state for one media path across loop passes.
struct CursorTrack {
    cursor_end: Duration,
    end_at: DateTime<Utc>,
}

/// Expand `source` into clip instances and push them onto the queue.
/// Returns the number of instances emitted.
pub async fn expand_source<P>(
    source: &Source,
    probe: &P,
    ids: &mut IdGen,
    queue: &mut BinaryHeap<Reverse<ClipInstance>>,
) -> Result<usize, ScheduleError>
where
    P: MediaProbe + ?Sized,
{
    if source.loop_source && source.end_at.is_none() {
        return Err(ScheduleError::bad_plan(
            &source.pattern,
            "a looping source requires end_at",
        ));
    }
    if source.clip_paths.is_empty() {
        debug!("Source {} matched no media files", source.pattern);
        return Ok(0);
    }

    let mut emitted = 0;
    let mut clip_start = source.start_at;
    let mut tracks: HashMap<String, CursorTrack> = HashMap::new();

    'passes: loop {
        let pass_begin = clip_start;

        for path in &source.clip_paths {
            if let Some(window_end) = source.end_at {
                if clip_start >= window_end {
                    break 'passes;
                }
            }

            let duration = match probe.duration(path).await {
                Ok(d) => d,
                Err(e) => {
                    warn!("Skip clip: {}", e);
                    continue;
                }
            };

            let play = source.clip_play_duration.unwrap_or(duration);
            if play <= Duration::zero() {
                warn!("Skip clip {}: non-positive play duration", path);
                continue;
            }

            let mut end_at = clip_start + play;
            if let Some(window_end) = source.end_at {
                end_at = end_at.min(window_end);
            }
            let effective_play = end_at - clip_start;

            // cursor continuity across interruptions, per media path
            let raw_cursor = match tracks.get(path) {
                Some(track) => match source.cursor_continuity {
                    CursorContinuity::Continue => track.cursor_end,
                    CursorContinuity::Skip => track.cursor_end + (clip_start - track.end_at),
                    CursorContinuity::Reset => Duration::zero(),
                },
                None => Duration::zero(),
            };
            if raw_cursor > duration {
                warn!(
                    "Cursor {} beyond media duration {} for {}, wrapping",
                    format_hms(raw_cursor),
                    format_hms(duration),
                    path
                );
            }
            let cursor_start = fmod_duration(raw_cursor, duration);
            let cursor_end = fmod_duration(cursor_start + effective_play, duration);
            let loop_media = source.clip_loop || cursor_start + effective_play > duration;

            let instance = ClipInstance {
                id: ids.next_id(),
                source_id: source.id,
                path: path.clone(),
                priority: source.priority,
                start_at: clip_start,
                end_at,
                duration,
                play_duration: effective_play,
                cursor_start_at: cursor_start,
                cursor_end_at: cursor_end,
                loop_media,
                policy: source.policy,
            };
            debug!(
                "Add clip {} [{} - {}]",
                instance.path, instance.start_at, instance.end_at
            );
            tracks.insert(
                path.clone(),
                CursorTrack {
                    cursor_end,
                    end_at,
                },
            );
            queue.push(Reverse(instance));
            emitted += 1;

            match source.clip_repeat_interval {
                None => clip_start = clip_start + play,
                Some(interval) => {
                    if interval < play {
                        warn!(
                            "Clip repeat interval {} < clip play duration {}",
                            format_hms(interval),
                            format_hms(play)
                        );
                    }
                    clip_start = clip_start + interval;
                }
            }
        }

        if !source.loop_source {
            break;
        }
        if clip_start <= pass_begin {
            warn!(
                "Source {} made no progress in a loop pass, stop expanding",
                source.pattern
            );
            break;
        }
    }

    Ok(emitted)
}
