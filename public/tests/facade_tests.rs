use batchlog::prelude::*;
use batchlog::sink::output::MemoryOutput;
use std::time::Duration;

#[tokio::test]
async fn prelude_covers_a_full_session() {
    let output = MemoryOutput::shared();
    let guard = PipelineGuardBuilder::default()
        .with_config(PipelineConfig::default())
        .with_flush_rate(Duration::from_millis(50))
        .with_output(output.clone())
        .build()
        .unwrap();
    let context = LogContext::default().with_value("request_id", "r-1");
    guard
        .pipeline()
        .entry()
        .with_context(context)
        .warn("slow request");
    let stats = guard.shutdown().await;
    assert_eq!(stats.blobs_written, 1);

    let lines = output.lock().unwrap().lines();
    let record: Value = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(record["level"], "WARN");
    assert_eq!(record["message"], "slow request");
}
