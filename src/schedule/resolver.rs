//! Conflict resolution
//!
//! Drains the priority queue in (start, priority, id) order and produces the
//! final timeline. Overlaps are settled by cropping the weaker instance's
//! front, or by splitting the weaker instance around a stronger one; the
//! split-off tail goes back onto the queue so later conflicts against it are
//! resolved through the same case analysis.

use chrono::{DateTime, Duration, Utc};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use tracing::debug;

use crate::errors::ScheduleError;
use crate::models::{ClipInstance, IdGen, PreemptionPolicy, Timeline};

/// Resolve all queued instances into a sorted, non-overlapping timeline.
pub fn resolve(
    mut queue: BinaryHeap<Reverse<ClipInstance>>,
    ids: &mut IdGen,
) -> Result<Timeline, ScheduleError> {
    let mut timeline = Timeline::new();
    // queue key (start at pop time) of each appended instance; cropping moves
    // an instance's start, and the ordering invariant is about the key
    let mut queued_starts: Vec<DateTime<Utc>> = Vec::new();

    while let Some(Reverse(mut next)) = queue.pop() {
        if next.is_empty() {
            continue;
        }
        let next_queued_start = next.start_at;

        // compare against the last appended instance; displacing a fully
        // preempted predecessor re-runs the comparison one element back
        loop {
            let (prev_start, prev_end, prev_priority) = match timeline.entries().last() {
                Some(prev) => (prev.start_at, prev.end_at, prev.priority),
                None => {
                    timeline.push(next);
                    queued_starts.push(next_queued_start);
                    break;
                }
            };

            // strictly after: no conflict
            if next.start_at >= prev_end {
                timeline.push(next);
                queued_starts.push(next_queued_start);
                break;
            }

            // overlap, next weaker or equal
            if next.priority >= prev_priority {
                if next.start_at == prev_start {
                    debug!("Drop clip {}: slot already taken", next.path);
                    break;
                }
                if next.end_at <= prev_end {
                    debug!("Drop clip {}: shadowed by a stronger clip", next.path);
                    break;
                }
                match next.policy {
                    PreemptionPolicy::Stop => {
                        debug!("Drop clip {}: interrupted and set to stop", next.path);
                        break;
                    }
                    PreemptionPolicy::Restart => {
                        next.crop_front_keep_cursor(prev_end - next.start_at)
                    }
                    PreemptionPolicy::Continue | PreemptionPolicy::Skip => {
                        next.crop_front(prev_end - next.start_at)
                    }
                }
                if !next.is_empty() {
                    timeline.push(next);
                    queued_starts.push(next_queued_start);
                }
                break;
            }

            // overlap, next stronger. A stronger clip sharing the weaker
            // one's queue key must have been popped first.
            if queued_starts.last() == Some(&next_queued_start) {
                return Err(ScheduleError::OutOfOrder {
                    path: next.path,
                    start_at: next.start_at,
                });
            }

            // landing inside prev: split prev around it
            if next.start_at > prev_start {
                let mut tail = None;
                if let Some(prev) = timeline.last_mut() {
                    let original = prev.clone();
                    prev.crop_end_to(next.start_at);
                    tail = make_tail(
                        &original,
                        prev.play_duration,
                        next.play_duration,
                        next.end_at,
                        ids,
                    );
                }
                timeline.push(next);
                queued_starts.push(next_queued_start);
                if let Some(tail) = tail {
                    queue.push(Reverse(tail));
                }
                break;
            }

            // at or before prev's (already cropped) start: prev never airs
            if let Some(displaced) = timeline.pop() {
                queued_starts.pop();
                debug!("Drop clip {}: fully preempted", displaced.path);
                if let Some(tail) = make_tail(
                    &displaced,
                    Duration::zero(),
                    next.play_duration,
                    next.end_at,
                    ids,
                ) {
                    queue.push(Reverse(tail));
                }
            }
        }
    }

    Ok(timeline)
}

/// Build the re-emitted remainder of an interrupted instance, resuming at
/// `resume_at`. `head_play` is how much of it aired before the interruption.
/// Returns `None` when the policy discards tails or nothing remains.
fn make_tail(
    original: &ClipInstance,
    head_play: Duration,
    interrupter_play: Duration,
    resume_at: DateTime<Utc>,
    ids: &mut IdGen,
) -> Option<ClipInstance> {
    if original.policy == PreemptionPolicy::Stop {
        debug!(
            "Discard tail of {}: interrupted and set to stop",
            original.path
        );
        return None;
    }
    if original.end_at <= resume_at {
        return None;
    }

    let mut tail = original.clone();
    tail.id = ids.next_id();
    tail.start_at = resume_at;
    tail.play_duration = tail.end_at - tail.start_at;
    match original.policy {
        PreemptionPolicy::Restart => tail.set_cursor_start(Duration::zero()),
        PreemptionPolicy::Continue => tail.set_cursor_start(original.cursor_start_at + head_play),
        PreemptionPolicy::Skip => {
            tail.set_cursor_start(original.cursor_start_at + head_play + interrupter_play)
        }
        // handled above
        PreemptionPolicy::Stop => return None,
    }
    Some(tail)
}
