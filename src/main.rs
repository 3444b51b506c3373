use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use datatypes::TriggerPrimitive;
use flow::{ChannelHub, Identity, PipelineStage, RecvError, ReplaySource, SliceSet};
use serde_json::json;

const TPSET_INPUT: &str = "tpsets_in";
const TPSET_OUTPUT: &str = "tpsets_out";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let boot = pulseflow::bootstrap::default_init()?;
    let _logging_guard = boot.logging_guard;

    let Some(replay_file) = boot.replay_file else {
        eprintln!("Usage: pulseflow [--config <path>] <replay-file.jsonl>");
        process::exit(1);
    };

    let channel_cfg = &boot.config.channel;
    let hub = ChannelHub::new();
    hub.create::<SliceSet<TriggerPrimitive>>(TPSET_INPUT, channel_cfg.capacity)?;
    hub.create::<SliceSet<TriggerPrimitive>>(TPSET_OUTPUT, channel_cfg.capacity)?;

    // Replay source feeding recorded primitives into the stage input.
    let mut source = ReplaySource::new("tp_replay");
    source.set_output(hub.sender(TPSET_INPUT)?);
    source.configure(json!({
        "filename": replay_file,
        "number_of_loops": 1,
        "send_interval_ms": 100,
        "sourceid": 1,
    }))?;

    // Windowed identity stage: re-slices the replayed stream into fixed
    // windows, which is enough to see the core at work end to end.
    let mut stage = PipelineStage::windowed(
        "tp_window",
        Box::new(|_conf| Ok(Identity::<TriggerPrimitive>::new())),
    )
    .with_queue_timeout(channel_cfg.queue_timeout());
    stage.configure(json!({
        "input": TPSET_INPUT,
        "output": TPSET_OUTPUT,
        "sourceid": 2,
        "algorithm_name": "identity",
    }))?;
    stage.attach(&hub)?;

    // Sink: log every window that comes out the far end.
    let mut sink_rx = hub.take_receiver::<SliceSet<TriggerPrimitive>>(TPSET_OUTPUT)?;
    let sink_timeout = channel_cfg.queue_timeout();
    let window_count = Arc::new(AtomicU64::new(0));
    let sink_count = Arc::clone(&window_count);
    let sink = tokio::spawn(async move {
        loop {
            match sink_rx.recv_timeout(sink_timeout).await {
                Ok(set) => {
                    sink_count.fetch_add(1, Ordering::Relaxed);
                    tracing::info!(
                        kind = ?set.kind,
                        start_time = set.start_time,
                        end_time = set.end_time,
                        objects = set.objects.len(),
                        seqno = set.seqno,
                        "window received"
                    );
                }
                Err(RecvError::Timeout) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    stage.start()?;
    source.start()?;
    println!(
        "Replaying {} through stage {}. Press Ctrl+C to terminate.",
        source.row_count(),
        stage.name()
    );

    tokio::signal::ctrl_c().await?;
    println!("Stopping pipeline...");
    source.stop().await;
    stage.stop().await?;
    sink.abort();
    println!(
        "Stage received {} sets, sent {} windows; sink saw {}.",
        stage.received(),
        stage.sent(),
        window_count.load(Ordering::Relaxed)
    );
    Ok(())
}
