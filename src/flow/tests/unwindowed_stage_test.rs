//! Tests for the sliced-in, atomic-out strategy: slice reassembly with
//! immediate forwarding and no downstream heartbeats.

use datatypes::{TriggerActivity, TriggerPrimitive};
use flow::{
    channel, Algorithm, AlgorithmError, PipelineStage, RecordingReporter, RecvError, SliceSet,
    StageEvent,
};
use serde_json::json;
use std::time::Duration;

const RECV_TIMEOUT: Duration = Duration::from_secs(1);

fn tp(time_start: u64) -> TriggerPrimitive {
    TriggerPrimitive {
        time_start,
        channel: 1,
        ..Default::default()
    }
}

/// Wraps every primitive into a single-input activity.
struct ActivityPerPrimitive;

impl Algorithm for ActivityPerPrimitive {
    type In = TriggerPrimitive;
    type Out = TriggerActivity;

    fn process(
        &mut self,
        input: &TriggerPrimitive,
        out: &mut Vec<TriggerActivity>,
    ) -> Result<(), AlgorithmError> {
        out.push(TriggerActivity {
            time_start: input.time_start,
            time_end: input.time_start + input.time_over_threshold,
            inputs: vec![*input],
            ..Default::default()
        });
        Ok(())
    }
}

#[tokio::test]
async fn outputs_forward_without_windowing_or_heartbeats() {
    let mut stage = PipelineStage::unwindowed(
        "activity_maker",
        Box::new(|_| Ok(ActivityPerPrimitive)),
    );
    stage
        .configure(json!({"algorithm_name": "activity_per_primitive"}))
        .unwrap();

    let (in_tx, in_rx) = channel(16);
    let (out_tx, mut out_rx) = channel::<TriggerActivity>(16);
    stage.connect(in_rx, out_tx);
    stage.start().unwrap();

    in_tx
        .send_timeout(SliceSet::payload(0, 100, vec![tp(10), tp(20)]), RECV_TIMEOUT)
        .await
        .unwrap();
    // Completing the slice releases both elements at once.
    in_tx
        .send_timeout(SliceSet::heartbeat(100, 100), RECV_TIMEOUT)
        .await
        .unwrap();

    let first = out_rx.recv_timeout(RECV_TIMEOUT).await.unwrap();
    assert_eq!(first.time_start, 10);
    assert_eq!(first.inputs.len(), 1);
    let second = out_rx.recv_timeout(RECV_TIMEOUT).await.unwrap();
    assert_eq!(second.time_start, 20);

    // The heartbeat itself produces nothing downstream.
    assert!(matches!(
        out_rx.recv_timeout(Duration::from_millis(300)).await,
        Err(RecvError::Timeout)
    ));

    stage.stop().await.unwrap();
    assert_eq!(stage.received(), 2);
    assert_eq!(stage.sent(), 2);
}

/// A slice that extends past the heartbeat which flushed it is a fatal
/// ordering violation: the batch is dropped.
#[tokio::test]
async fn slice_past_heartbeat_is_dropped() {
    let reporter = RecordingReporter::new();
    let mut stage = PipelineStage::unwindowed(
        "tardy_slice",
        Box::new(|_| Ok(ActivityPerPrimitive)),
    )
    .with_reporter(reporter.clone());
    stage.configure(json!({})).unwrap();

    let (in_tx, in_rx) = channel(16);
    let (out_tx, mut out_rx) = channel::<TriggerActivity>(16);
    stage.connect(in_rx, out_tx);
    stage.start().unwrap();

    in_tx
        .send_timeout(SliceSet::payload(0, 100, vec![tp(10)]), RECV_TIMEOUT)
        .await
        .unwrap();
    // The heartbeat claims no more data before 50, but the held slice ends
    // at 100.
    in_tx
        .send_timeout(SliceSet::heartbeat(50, 50), RECV_TIMEOUT)
        .await
        .unwrap();

    assert!(matches!(
        out_rx.recv_timeout(Duration::from_millis(300)).await,
        Err(RecvError::Timeout)
    ));
    assert_eq!(
        reporter.count(|e| matches!(
            e,
            StageEvent::SliceBeyondHeartbeat {
                slice_end: 100,
                heartbeat: 50
            }
        )),
        1
    );

    stage.stop().await.unwrap();
    assert_eq!(stage.sent(), 0);
}

/// Residual input is driven at stop, and the results are dropped.
#[tokio::test]
async fn drain_on_stop_drops_residual_outputs() {
    let mut stage = PipelineStage::unwindowed(
        "drain_drop",
        Box::new(|_| Ok(ActivityPerPrimitive)),
    );
    stage.configure(json!({})).unwrap();

    let (in_tx, in_rx) = channel(16);
    let (out_tx, mut out_rx) = channel::<TriggerActivity>(16);
    stage.connect(in_rx, out_tx);
    stage.start().unwrap();

    in_tx
        .send_timeout(SliceSet::payload(0, 100, vec![tp(10)]), RECV_TIMEOUT)
        .await
        .unwrap();
    stage.stop().await.unwrap();

    assert_eq!(stage.received(), 1);
    assert_eq!(stage.sent(), 0);
    assert!(matches!(
        out_rx.recv_timeout(Duration::from_millis(300)).await,
        Err(RecvError::Timeout)
    ));
}
