//! Tests for the JSON-lines replay source: configure-time validation,
//! slicing of the replayed stream and the trailing heartbeat.

use datatypes::TriggerPrimitive;
use flow::{channel, ReplayError, ReplaySource, SetKind, SliceSet};
use serde_json::json;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

const RECV_TIMEOUT: Duration = Duration::from_secs(1);

fn replay_file(rows: &[u64]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for t in rows {
        writeln!(file, r#"{{"time_start": {t}, "channel": 4}}"#).unwrap();
    }
    file.flush().unwrap();
    file
}

#[tokio::test]
async fn replays_rows_as_sliced_sets_with_trailing_heartbeat() {
    let file = replay_file(&[10, 20, 150]);
    let (tx, mut rx) = channel::<SliceSet<TriggerPrimitive>>(16);

    let mut source = ReplaySource::new("replay");
    source.set_output(tx);
    source
        .configure(json!({
            "filename": file.path(),
            "slice_time": 100,
            "number_of_loops": 1,
            "sourceid": 9,
        }))
        .unwrap();
    assert_eq!(source.row_count(), 3);
    source.start().unwrap();

    let first = rx.recv_timeout(RECV_TIMEOUT).await.unwrap();
    assert_eq!(first.kind, SetKind::Payload);
    assert_eq!(first.time_range(), (0, 100));
    assert_eq!(
        first.objects.iter().map(|tp| tp.time_start).collect::<Vec<_>>(),
        vec![10, 20]
    );
    assert_eq!(first.seqno, 0);
    assert_eq!(first.origin.id(), 9);

    let second = rx.recv_timeout(RECV_TIMEOUT).await.unwrap();
    assert_eq!(second.time_range(), (100, 200));
    assert_eq!(second.objects.len(), 1);
    assert_eq!(second.seqno, 1);

    let heartbeat = rx.recv_timeout(RECV_TIMEOUT).await.unwrap();
    assert_eq!(heartbeat.kind, SetKind::Heartbeat);
    assert_eq!(heartbeat.time_range(), (200, 200));

    source.stop().await;
}

#[tokio::test]
async fn loops_repeat_the_stream() {
    let file = replay_file(&[10]);
    let (tx, mut rx) = channel::<SliceSet<TriggerPrimitive>>(16);

    let mut source = ReplaySource::new("replay_loops");
    source.set_output(tx);
    source
        .configure(json!({
            "filename": file.path(),
            "slice_time": 100,
            "number_of_loops": 2,
        }))
        .unwrap();
    source.start().unwrap();

    let mut kinds = Vec::new();
    for _ in 0..4 {
        let set = rx.recv_timeout(RECV_TIMEOUT).await.unwrap();
        kinds.push((set.kind, set.seqno));
    }
    assert_eq!(
        kinds,
        vec![
            (SetKind::Payload, 0),
            (SetKind::Heartbeat, 1),
            (SetKind::Payload, 2),
            (SetKind::Heartbeat, 3),
        ]
    );

    source.stop().await;
}

#[test]
fn unsorted_rows_are_time_ordered_on_load() {
    let file = replay_file(&[150, 10, 20]);
    let mut source = ReplaySource::new("replay_sort");
    source
        .configure(json!({"filename": file.path(), "slice_time": 100}))
        .unwrap();
    assert_eq!(source.row_count(), 3);
}

#[test]
fn malformed_row_fails_configure() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, r#"{{"time_start": 10, "channel": 4}}"#).unwrap();
    writeln!(file, "not json at all").unwrap();
    file.flush().unwrap();

    let mut source = ReplaySource::new("replay_bad");
    let err = source
        .configure(json!({"filename": file.path()}))
        .expect_err("malformed rows must refuse conf");
    match err {
        ReplayError::Malformed { line, .. } => assert_eq!(line, 2),
        other => panic!("expected Malformed, got {other}"),
    }
}

#[test]
fn missing_file_fails_configure() {
    let mut source = ReplaySource::new("replay_missing");
    let err = source
        .configure(json!({"filename": "/nonexistent/tps.jsonl"}))
        .expect_err("missing file must refuse conf");
    assert!(matches!(err, ReplayError::Io { .. }));
}

#[test]
fn zero_slice_time_fails_configure() {
    let file = replay_file(&[10]);
    let mut source = ReplaySource::new("replay_zero");
    let err = source
        .configure(json!({"filename": file.path(), "slice_time": 0}))
        .expect_err("zero slice width must refuse conf");
    assert!(matches!(err, ReplayError::InvalidConfig(_)));
}
