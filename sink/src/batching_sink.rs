//! Catch-all hook accumulating rendered records and writing them out in batches
//!
//! A batch is flushed when it reaches `max_batch` records or when the flush scheduler
//! ticks, whichever comes first. Flushing swaps the batch for an empty one under the
//! lock and hands the detached batch to the writer task; the output is only touched by
//! the writer, outside of the lock, so a slow output never blocks publishers.
use crate::errors::Result;
use crate::output::SharedOutput;
use crate::scheduler::FlushScheduler;
use batchlog_pipeline::config::{DEFAULT_FLUSH_RATE, PipelineConfig};
use batchlog_pipeline::hook::Hook;
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const DELIMITER: &[u8] = b"\n";
pub const SINK_NAME: &str = "batching_sink";

type Batch = Vec<Bytes>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    Empty,
    Accumulating,
    /// no further records are accepted
    Stopped,
}

/// Point-in-time snapshot of the sink counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    /// batches handed to the writer
    pub flushes: u64,
    pub blobs_written: u64,
    /// batches abandoned because the output failed, their remaining records are lost
    pub write_errors: u64,
}

#[derive(Default)]
struct Counters {
    flushes: AtomicU64,
    blobs_written: AtomicU64,
    write_errors: AtomicU64,
    in_flight: AtomicUsize,
}

struct BatchState {
    batch: Batch,
    // None once stopped
    sender: Option<mpsc::UnboundedSender<Batch>>,
}

impl BatchState {
    /// Swap and send. Returns the number of records detached.
    fn detach(&mut self, max_batch: usize, counters: &Counters) -> usize {
        if self.batch.is_empty() {
            return 0;
        }
        let Some(sender) = &self.sender else {
            return 0;
        };
        let batch = std::mem::replace(&mut self.batch, Vec::with_capacity(max_batch));
        let len = batch.len();
        counters.in_flight.fetch_add(1, Ordering::SeqCst);
        if sender.send(batch).is_err() {
            // writer is gone, nothing left to write to
            counters.in_flight.fetch_sub(1, Ordering::SeqCst);
            return 0;
        }
        counters.flushes.fetch_add(1, Ordering::Relaxed);
        len
    }
}

pub struct BatchingSink {
    max_batch: usize,
    flush_rate: Duration,
    state: Mutex<BatchState>,
    counters: Arc<Counters>,
    scheduler: tokio::sync::Mutex<Option<FlushScheduler>>,
    writer: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl BatchingSink {
    /// Starts the writer and the flush scheduler on the current tokio runtime.
    pub fn new(flush_rate: Duration, max_batch: usize, output: SharedOutput) -> Result<Arc<Self>> {
        let runtime = Handle::try_current()?;
        let max_batch = max_batch.max(1);
        let flush_rate = if flush_rate.is_zero() {
            DEFAULT_FLUSH_RATE
        } else {
            flush_rate
        };
        let (sender, receiver) = mpsc::unbounded_channel::<Batch>();
        let counters = Arc::new(Counters::default());
        let writer = runtime.spawn(Self::writer_proc(receiver, output, counters.clone()));
        let sink = Arc::new(Self {
            max_batch,
            flush_rate,
            state: Mutex::new(BatchState {
                batch: Vec::with_capacity(max_batch),
                sender: Some(sender),
            }),
            counters,
            scheduler: tokio::sync::Mutex::new(None),
            writer: tokio::sync::Mutex::new(Some(writer)),
        });

        let weak: Weak<Self> = Arc::downgrade(&sink);
        let scheduler = FlushScheduler::spawn(&runtime, flush_rate, move || {
            match weak.upgrade() {
                Some(sink) => {
                    sink.flush();
                    true
                }
                None => false,
            }
        });
        if let Ok(mut slot) = sink.scheduler.try_lock() {
            *slot = Some(scheduler);
        }
        Ok(sink)
    }

    pub fn from_config(config: &PipelineConfig, output: SharedOutput) -> Result<Arc<Self>> {
        Self::new(config.flush_rate, config.max_batch, output)
    }

    pub fn max_batch(&self) -> usize {
        self.max_batch
    }

    pub fn flush_rate(&self) -> Duration {
        self.flush_rate
    }

    /// records waiting in the current batch
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn state(&self) -> SinkState {
        let state = self.state.lock().unwrap();
        if state.sender.is_none() {
            SinkState::Stopped
        } else if state.batch.is_empty() {
            SinkState::Empty
        } else {
            SinkState::Accumulating
        }
    }

    /// batches detached but not yet written
    pub fn in_flight(&self) -> usize {
        self.counters.in_flight.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> SinkStats {
        SinkStats {
            flushes: self.counters.flushes.load(Ordering::Relaxed),
            blobs_written: self.counters.blobs_written.load(Ordering::Relaxed),
            write_errors: self.counters.write_errors.load(Ordering::Relaxed),
        }
    }

    /// Detaches the current batch if it's not empty, returns the number of records handed
    /// to the writer.
    pub fn flush(&self) -> usize {
        let mut state = self.state.lock().unwrap();
        state.detach(self.max_batch, &self.counters)
    }

    /// Stops the scheduler, flushes what is left and waits for the writer to be done.
    ///
    /// Calling it more than once is harmless. Once it returns the output is not touched
    /// again.
    pub async fn stop(&self) {
        if let Some(scheduler) = self.scheduler.lock().await.take() {
            scheduler.stop().await;
        }
        {
            let mut state = self.state.lock().unwrap();
            state.detach(self.max_batch, &self.counters);
            // closing the channel lets the writer exit once it has drained it
            state.sender = None;
        }
        // the guard is held until the writer is done so concurrent callers wait too
        let mut writer = self.writer.lock().await;
        if let Some(handle) = writer.take()
            && let Err(e) = handle.await
        {
            tracing::warn!("batching sink writer failed: {e}");
        }
    }

    async fn writer_proc(
        mut receiver: mpsc::UnboundedReceiver<Batch>,
        output: SharedOutput,
        counters: Arc<Counters>,
    ) {
        while let Some(batch) = receiver.recv().await {
            let output = output.clone();
            let task_counters = counters.clone();
            let written = tokio::task::spawn_blocking(move || {
                Self::write_batch(&output, &batch, &task_counters)
            })
            .await;
            if written.is_err() {
                counters.write_errors.fetch_add(1, Ordering::Relaxed);
            }
            counters.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Write errors are not retried and not reported, the rest of the batch is dropped.
    fn write_batch(output: &SharedOutput, batch: &[Bytes], counters: &Counters) {
        let Ok(mut out) = output.lock() else {
            counters.write_errors.fetch_add(1, Ordering::Relaxed);
            return;
        };
        for blob in batch {
            if out
                .write_all(blob)
                .and_then(|()| out.write_all(DELIMITER))
                .is_err()
            {
                counters.write_errors.fetch_add(1, Ordering::Relaxed);
                return;
            }
            counters.blobs_written.fetch_add(1, Ordering::Relaxed);
        }
        if out.flush().is_err() {
            counters.write_errors.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Hook for BatchingSink {
    fn name(&self) -> &str {
        SINK_NAME
    }

    /// The record goes into the current batch; the batch is flushed as soon as it holds
    /// `max_batch` records, so it never rests at capacity.
    fn publish(&self, bytes: &Bytes) {
        let mut state = self.state.lock().unwrap();
        if state.sender.is_none() {
            return;
        }
        state.batch.push(bytes.clone());
        if state.batch.len() >= self.max_batch {
            state.detach(self.max_batch, &self.counters);
        }
    }
}

impl Drop for BatchingSink {
    fn drop(&mut self) {
        // best effort when stop() was never awaited: hand the leftovers to the writer,
        // which exits after draining the channel
        if let Ok(state) = self.state.get_mut() {
            state.detach(self.max_batch, &self.counters);
            state.sender = None;
        }
        if let Some(scheduler) = self.scheduler.get_mut() {
            scheduler.cancel();
        }
    }
}
