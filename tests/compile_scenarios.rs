//! End-to-end compilation scenarios: plan YAML in, resolved timeline out.

use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;

use vlc_playout::models::Timeline;
use vlc_playout::probe::StaticMediaProbe;
use vlc_playout::schedule::ScheduleBuilder;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

fn at(secs: i64) -> DateTime<Utc> {
    t0() + Duration::seconds(secs)
}

/// Create empty media files and return (dir, sorted paths, glob pattern).
fn media_dir(names: &[&str]) -> (TempDir, Vec<String>, String) {
    let dir = tempfile::tempdir().unwrap();
    let mut paths = Vec::new();
    for name in names {
        let path = dir.path().join(name);
        std::fs::write(&path, b"").unwrap();
        paths.push(path.display().to_string());
    }
    paths.sort();
    let pattern = dir.path().join("*.mp4").display().to_string();
    (dir, paths, pattern)
}

async fn compile(plan: &str, probe: StaticMediaProbe) -> Timeline {
    let mut builder = ScheduleBuilder::new(probe);
    builder.load_plan_str(plan, "test-plan", t0()).await.unwrap();
    builder.compile().unwrap()
}

/// The §8 invariants every compiled timeline must satisfy.
fn assert_invariants(timeline: &Timeline) {
    let entries = timeline.entries();
    for pair in entries.windows(2) {
        assert!(pair[0].start_at <= pair[1].start_at, "sorted by start");
        assert!(pair[0].end_at <= pair[1].start_at, "non-overlapping");
        assert!(
            pair[0].start_at != pair[1].start_at,
            "no two instances share a start"
        );
    }
    for clip in entries {
        assert!(clip.start_at <= clip.end_at);
        assert_eq!(clip.end_at - clip.start_at, clip.play_duration);
        assert!(clip.cursor_start_at >= Duration::zero());
        assert!(clip.cursor_start_at <= clip.duration);
        assert!(clip.cursor_end_at >= Duration::zero());
        assert!(clip.cursor_end_at <= clip.duration);
    }
}

#[tokio::test]
async fn sequential_source_with_no_conflicts() {
    let (_dir, paths, pattern) = media_dir(&["a.mp4", "b.mp4"]);
    let probe = StaticMediaProbe::new()
        .with(&paths[0], Duration::seconds(10))
        .with(&paths[1], Duration::seconds(10));

    let plan = format!(
        "start_at: \"2024-06-01T00:00:00Z\"\nsources:\n  - source: \"{}\"\n",
        pattern
    );
    let timeline = compile(&plan, probe).await;
    assert_invariants(&timeline);

    let entries = timeline.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].start_at, at(0));
    assert_eq!(entries[0].end_at, at(10));
    assert_eq!(entries[1].start_at, at(10));
    assert_eq!(entries[1].end_at, at(20));
    for clip in entries {
        assert_eq!(clip.cursor_start_at, Duration::zero());
        assert_eq!(clip.cursor_end_at, Duration::seconds(10));
    }
}

#[tokio::test]
async fn cadence_shorter_than_play_duration_front_crops() {
    let (_dir, paths, pattern) = media_dir(&["a.mp4", "b.mp4", "c.mp4"]);
    let mut probe = StaticMediaProbe::new();
    for path in &paths {
        probe = probe.with(path, Duration::seconds(5));
    }

    let plan = format!(
        concat!(
            "start_at: \"2024-06-01T00:00:00Z\"\n",
            "sources:\n",
            "  - source: \"{}\"\n",
            "    clip_play_duration: 5\n",
            "    clip_repeat_interval: 3\n",
        ),
        pattern
    );
    let timeline = compile(&plan, probe).await;
    assert_invariants(&timeline);

    let entries = timeline.entries();
    assert_eq!(entries.len(), 3);
    assert_eq!((entries[0].start_at, entries[0].end_at), (at(0), at(5)));
    assert_eq!((entries[1].start_at, entries[1].end_at), (at(5), at(8)));
    assert_eq!((entries[2].start_at, entries[2].end_at), (at(8), at(11)));
}

#[tokio::test]
async fn preemption_with_stop_discards_the_tail() {
    let (_dir_a, paths_a, pattern_a) = media_dir(&["long.mp4"]);
    let (_dir_b, paths_b, pattern_b) = media_dir(&["strong.mp4"]);
    let probe = StaticMediaProbe::new()
        .with(&paths_a[0], Duration::seconds(30))
        .with(&paths_b[0], Duration::seconds(10));

    let plan = format!(
        concat!(
            "start_at: \"2024-06-01T00:00:00Z\"\n",
            "sources:\n",
            "  - source: \"{}\"\n",
            "    clip_stop_if_interrupted: true\n",
            "  - source: \"{}\"\n",
            "    priority: 10\n",
            "    start_at: 10\n",
        ),
        pattern_a, pattern_b
    );
    let timeline = compile(&plan, probe).await;
    assert_invariants(&timeline);

    let entries = timeline.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!((entries[0].start_at, entries[0].end_at), (at(0), at(10)));
    assert_eq!(entries[1].priority, 10);
    assert_eq!((entries[1].start_at, entries[1].end_at), (at(10), at(20)));
}

#[tokio::test]
async fn preemption_with_continue_resumes_the_cursor() {
    let (_dir_a, paths_a, pattern_a) = media_dir(&["long.mp4"]);
    let (_dir_b, paths_b, pattern_b) = media_dir(&["strong.mp4"]);
    let probe = StaticMediaProbe::new()
        .with(&paths_a[0], Duration::seconds(30))
        .with(&paths_b[0], Duration::seconds(10));

    let plan = format!(
        concat!(
            "start_at: \"2024-06-01T00:00:00Z\"\n",
            "sources:\n",
            "  - source: \"{}\"\n",
            "    clip_continue_after_interruption: true\n",
            "  - source: \"{}\"\n",
            "    priority: 10\n",
            "    start_at: 10\n",
        ),
        pattern_a, pattern_b
    );
    let timeline = compile(&plan, probe).await;
    assert_invariants(&timeline);

    let entries = timeline.entries();
    assert_eq!(entries.len(), 3);
    assert_eq!((entries[0].start_at, entries[0].end_at), (at(0), at(10)));
    assert_eq!(entries[0].cursor_start_at, Duration::zero());
    assert_eq!(entries[0].cursor_end_at, Duration::seconds(10));
    assert_eq!((entries[1].start_at, entries[1].end_at), (at(10), at(20)));
    assert_eq!((entries[2].start_at, entries[2].end_at), (at(20), at(30)));
    assert_eq!(entries[2].cursor_start_at, Duration::seconds(10));
    assert_eq!(entries[2].cursor_end_at, Duration::seconds(20));
}

#[tokio::test]
async fn preemption_with_restart_rewinds_the_tail() {
    let (_dir_a, paths_a, pattern_a) = media_dir(&["long.mp4"]);
    let (_dir_b, paths_b, pattern_b) = media_dir(&["strong.mp4"]);
    let probe = StaticMediaProbe::new()
        .with(&paths_a[0], Duration::seconds(30))
        .with(&paths_b[0], Duration::seconds(10));

    let plan = format!(
        concat!(
            "start_at: \"2024-06-01T00:00:00Z\"\n",
            "sources:\n",
            "  - source: \"{}\"\n",
            "    clip_restart_after_interruption: true\n",
            "  - source: \"{}\"\n",
            "    priority: 10\n",
            "    start_at: 10\n",
        ),
        pattern_a, pattern_b
    );
    let timeline = compile(&plan, probe).await;
    assert_invariants(&timeline);

    let entries = timeline.entries();
    assert_eq!(entries.len(), 3);
    assert_eq!((entries[2].start_at, entries[2].end_at), (at(20), at(30)));
    assert_eq!(entries[2].cursor_start_at, Duration::zero());
    assert_eq!(entries[2].cursor_end_at, Duration::seconds(10));
}

#[tokio::test]
async fn looping_source_fills_its_window() {
    let (_dir, paths, pattern) = media_dir(&["short.mp4"]);
    let probe = StaticMediaProbe::new().with(&paths[0], Duration::seconds(4));

    let plan = format!(
        concat!(
            "start_at: \"2024-06-01T00:00:00Z\"\n",
            "sources:\n",
            "  - source: \"{}\"\n",
            "    loop: true\n",
            "    end_at: 10\n",
        ),
        pattern
    );
    let timeline = compile(&plan, probe).await;
    assert_invariants(&timeline);

    let entries = timeline.entries();
    assert_eq!(entries.len(), 3);
    assert_eq!((entries[0].start_at, entries[0].end_at), (at(0), at(4)));
    assert_eq!((entries[1].start_at, entries[1].end_at), (at(4), at(8)));
    assert_eq!((entries[2].start_at, entries[2].end_at), (at(8), at(10)));
    assert_eq!(entries[2].play_duration, Duration::seconds(2));
    assert_eq!(entries[2].cursor_start_at, Duration::zero());
    assert_eq!(entries[2].cursor_end_at, Duration::seconds(2));
}

#[tokio::test]
async fn malformed_plan_is_isolated() {
    let (_dir, paths, pattern) = media_dir(&["a.mp4"]);
    let probe = StaticMediaProbe::new().with(&paths[0], Duration::seconds(10));

    let mut builder = ScheduleBuilder::new(probe);
    let bad = "sources:\n  - source: \"x\"\n    no_such_field: 1\n";
    assert!(builder.load_plan_str(bad, "bad-plan", t0()).await.is_err());

    // a good plan still compiles afterwards
    let good = format!(
        "start_at: \"2024-06-01T00:00:00Z\"\nsources:\n  - source: \"{}\"\n",
        pattern
    );
    builder.load_plan_str(&good, "good-plan", t0()).await.unwrap();
    let timeline = builder.compile().unwrap();
    assert_eq!(timeline.len(), 1);
}

#[tokio::test]
async fn bad_time_literal_is_rejected() {
    let probe = StaticMediaProbe::new();
    let mut builder = ScheduleBuilder::new(probe);
    let plan = "start_at: \"sometime soon\"\nsources: []\n";
    assert!(builder.load_plan_str(plan, "bad-times", t0()).await.is_err());
}

#[tokio::test]
async fn source_window_is_clipped_to_the_plan_window() {
    let (_dir, paths, pattern) = media_dir(&["a.mp4"]);
    let probe = StaticMediaProbe::new().with(&paths[0], Duration::seconds(60));

    // plan ends at +30, the source would run to +60
    let plan = format!(
        concat!(
            "start_at: \"2024-06-01T00:00:00Z\"\n",
            "end_at: 30\n",
            "sources:\n",
            "  - source: \"{}\"\n",
        ),
        pattern
    );
    let timeline = compile(&plan, probe).await;
    assert_invariants(&timeline);

    let entries = timeline.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].end_at, at(30));
    assert_eq!(entries[0].play_duration, Duration::seconds(30));
}
