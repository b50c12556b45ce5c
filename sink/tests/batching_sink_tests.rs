use batchlog_pipeline::hook::Hook;
use batchlog_sink::batching_sink::{BatchingSink, SinkState};
use batchlog_sink::output::{MemoryOutput, SharedOutput};
use bytes::Bytes;
use std::collections::HashSet;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

fn blob(i: usize) -> Bytes {
    Bytes::from(format!("{{\"n\":{i}}}"))
}

#[tokio::test(start_paused = true)]
async fn capacity_flush_happens_exactly_at_max_batch() {
    let output = MemoryOutput::shared();
    let sink = BatchingSink::new(Duration::from_secs(60), 5, output.clone()).unwrap();

    for i in 0..4 {
        sink.publish(&blob(i));
    }
    assert_eq!(sink.stats().flushes, 0);
    assert_eq!(sink.len(), 4);

    sink.publish(&blob(4));
    assert_eq!(sink.stats().flushes, 1);
    assert_eq!(sink.len(), 0);
    assert_eq!(sink.state(), SinkState::Empty);

    for i in 5..11 {
        sink.publish(&blob(i));
    }
    assert_eq!(sink.stats().flushes, 2);
    assert_eq!(sink.len(), 1);

    sink.stop().await;
    let stats = sink.stats();
    assert_eq!(stats.flushes, 3);
    assert_eq!(stats.blobs_written, 11);
    let lines = output.lock().unwrap().lines();
    let expected: Vec<String> = (0..11).map(|i| format!("{{\"n\":{i}}}")).collect();
    assert_eq!(lines, expected);
}

#[tokio::test(start_paused = true)]
async fn timer_flushes_a_partial_batch() {
    let output = MemoryOutput::shared();
    let sink = BatchingSink::new(Duration::from_secs(1), 10, output.clone()).unwrap();
    settle().await;

    for i in 0..3 {
        sink.publish(&blob(i));
    }
    tokio::time::advance(Duration::from_millis(500)).await;
    settle().await;
    assert_eq!(sink.stats().flushes, 0);
    assert_eq!(sink.len(), 3);

    tokio::time::advance(Duration::from_millis(500)).await;
    settle().await;
    assert_eq!(sink.stats().flushes, 1);
    assert_eq!(sink.len(), 0);

    // the next tick has nothing to do
    tokio::time::advance(Duration::from_secs(1)).await;
    settle().await;
    assert_eq!(sink.stats().flushes, 1);

    sink.stop().await;
    assert_eq!(output.lock().unwrap().lines().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn stop_drains_pending_records_once() {
    let output = MemoryOutput::shared();
    let sink = BatchingSink::new(Duration::from_secs(30), 100, output.clone()).unwrap();
    for i in 0..42 {
        sink.publish(&blob(i));
    }
    sink.stop().await;
    assert_eq!(sink.state(), SinkState::Stopped);
    assert_eq!(sink.in_flight(), 0);
    assert_eq!(output.lock().unwrap().lines().len(), 42);

    sink.stop().await;
    sink.publish(&blob(99));
    assert_eq!(sink.flush(), 0);
    sink.stop().await;
    assert_eq!(output.lock().unwrap().lines().len(), 42);
    assert_eq!(sink.stats().blobs_written, 42);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_publishers_lose_and_duplicate_nothing() {
    const PUBLISHERS: usize = 100;
    const PER_PUBLISHER: usize = 50;

    let output = MemoryOutput::shared();
    let sink = BatchingSink::new(Duration::from_millis(5), 37, output.clone()).unwrap();

    let mut tasks = Vec::with_capacity(PUBLISHERS);
    for p in 0..PUBLISHERS {
        let sink = sink.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..PER_PUBLISHER {
                sink.publish(&Bytes::from(format!("{p}-{i}")));
                if i % 10 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    sink.stop().await;

    let lines = output.lock().unwrap().lines();
    assert_eq!(lines.len(), PUBLISHERS * PER_PUBLISHER);
    let unique: HashSet<&String> = lines.iter().collect();
    assert_eq!(unique.len(), PUBLISHERS * PER_PUBLISHER);
    assert_eq!(
        sink.stats().blobs_written,
        (PUBLISHERS * PER_PUBLISHER) as u64
    );
    assert_eq!(sink.stats().write_errors, 0);
}

struct BrokenOutput {
    attempts: usize,
}

impl Write for BrokenOutput {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        self.attempts += 1;
        Err(io::Error::other("disk on fire"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn write_errors_are_absorbed() {
    let broken = Arc::new(std::sync::Mutex::new(BrokenOutput { attempts: 0 }));
    let output: SharedOutput = broken.clone();
    let sink = BatchingSink::new(Duration::from_secs(1), 2, output).unwrap();
    for i in 0..5 {
        sink.publish(&blob(i));
    }
    sink.stop().await;

    let stats = sink.stats();
    assert_eq!(stats.flushes, 3);
    assert_eq!(stats.write_errors, 3);
    assert_eq!(stats.blobs_written, 0);
    // each batch is abandoned at its first failure
    assert_eq!(broken.lock().unwrap().attempts, 3);
}

#[tokio::test]
async fn output_stays_usable_after_stop() {
    let output = MemoryOutput::shared();
    let sink = BatchingSink::new(Duration::from_secs(1), 4, output.clone()).unwrap();
    sink.publish(&blob(0));
    sink.stop().await;
    drop(sink);

    output.lock().unwrap().write_all(b"after\n").unwrap();
    assert_eq!(output.lock().unwrap().lines(), vec!["{\"n\":0}", "after"]);
}

/// sleeps on every record delimiter
struct SlowOutput {
    delay: Duration,
    records: usize,
}

impl Write for SlowOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf == b"\n" {
            std::thread::sleep(self.delay);
            self.records += 1;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_stops_all_wait_for_the_drain() {
    let slow = Arc::new(std::sync::Mutex::new(SlowOutput {
        delay: Duration::from_millis(20),
        records: 0,
    }));
    let output: SharedOutput = slow.clone();
    let sink = BatchingSink::new(Duration::from_secs(30), 100, output).unwrap();
    for i in 0..10 {
        sink.publish(&blob(i));
    }

    let first = {
        let sink = sink.clone();
        tokio::spawn(async move { sink.stop().await })
    };
    tokio::time::sleep(Duration::from_millis(5)).await;
    sink.stop().await;

    assert_eq!(sink.in_flight(), 0);
    assert_eq!(sink.stats().blobs_written, 10);
    assert_eq!(slow.lock().unwrap().records, 10);
    first.await.unwrap();
}
