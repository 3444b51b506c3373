//! Tests for stream duplication across multiple outputs.

use datatypes::TriggerPrimitive;
use flow::{channel, RecordingReporter, SliceSet, StageEvent, Tee};
use std::time::Duration;

const RECV_TIMEOUT: Duration = Duration::from_secs(1);

fn tp(time_start: u64) -> TriggerPrimitive {
    TriggerPrimitive {
        time_start,
        channel: 1,
        ..Default::default()
    }
}

#[tokio::test]
async fn every_output_receives_every_set_in_order() {
    let (in_tx, in_rx) = channel(16);
    let (out_a_tx, mut out_a_rx) = channel(16);
    let (out_b_tx, mut out_b_rx) = channel(16);

    let mut tee = Tee::new("tee");
    tee.set_input(in_rx);
    tee.add_output(out_a_tx);
    tee.add_output(out_b_tx);
    assert!(tee.start());

    for start in [0u64, 100] {
        in_tx
            .send_timeout(
                SliceSet::payload(start, start + 100, vec![tp(start + 10)]),
                RECV_TIMEOUT,
            )
            .await
            .unwrap();
    }

    for rx in [&mut out_a_rx, &mut out_b_rx] {
        let first = rx.recv_timeout(RECV_TIMEOUT).await.unwrap();
        assert_eq!(first.time_range(), (0, 100));
        let second = rx.recv_timeout(RECV_TIMEOUT).await.unwrap();
        assert_eq!(second.time_range(), (100, 200));
    }

    tee.stop().await;
}

#[tokio::test]
async fn stalled_output_loses_only_its_own_copy() {
    let reporter = RecordingReporter::new();
    let (in_tx, in_rx) = channel(16);
    // One-slot channel with no consumer wedges after the first set.
    let (stalled_tx, _stalled_rx) = channel(1);
    let (live_tx, mut live_rx) = channel(16);

    let mut tee = Tee::new("tee_stall").with_reporter(reporter.clone());
    tee.set_input(in_rx);
    tee.add_output(stalled_tx);
    tee.add_output(live_tx);
    assert!(tee.start());

    for start in [0u64, 100] {
        in_tx
            .send_timeout(
                SliceSet::payload(start, start + 100, vec![tp(start + 10)]),
                RECV_TIMEOUT,
            )
            .await
            .unwrap();
    }

    // The live output still gets both copies.
    let first = live_rx.recv_timeout(RECV_TIMEOUT).await.unwrap();
    assert_eq!(first.time_range(), (0, 100));
    let second = live_rx.recv_timeout(RECV_TIMEOUT).await.unwrap();
    assert_eq!(second.time_range(), (100, 200));
    assert_eq!(reporter.count(|e| matches!(e, StageEvent::SendTimedOut)), 1);

    tee.stop().await;
}
