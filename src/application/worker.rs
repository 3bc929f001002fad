use super::processor::StatusProcessor;
use crate::domain::ports::EventQueueRef;
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 200;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub batch_size: usize,
    /// Sleep between polls when the queue is empty or unreachable.
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

/// Feeds queue batches to the [`StatusProcessor`] and acknowledges what succeeded.
pub struct StatusWorker {
    queue: EventQueueRef,
    processor: Arc<StatusProcessor>,
    config: WorkerConfig,
}

impl StatusWorker {
    pub fn new(
        queue: EventQueueRef,
        processor: Arc<StatusProcessor>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            processor,
            config,
        }
    }

    /// Receives one batch and processes it. Returns how many messages were received.
    ///
    /// Failed items are left unacknowledged so the queue delivers them again.
    pub async fn poll_once(&self) -> Result<usize> {
        let messages = self.queue.receive(self.config.batch_size).await?;
        if messages.is_empty() {
            return Ok(0);
        }

        let response = self.processor.process_batch(&messages).await;
        for message in &messages {
            if !response.is_failed(&message.message_id) {
                self.queue.ack(&message.message_id).await?;
            }
        }

        tracing::debug!(
            received = messages.len(),
            failed = response.batch_item_failures.len(),
            "Processed batch"
        );
        Ok(messages.len())
    }

    /// Polls until a receive comes back empty.
    ///
    /// Messages that keep failing are hidden by the visibility timeout, so this
    /// terminates even when some items cannot be processed.
    pub async fn drain(&self) -> Result<usize> {
        let mut total = 0;
        loop {
            match self.poll_once().await? {
                0 => return Ok(total),
                n => total += n,
            }
        }
    }

    /// Polls forever. Errors are logged and retried after the poll interval.
    pub async fn run(&self) {
        tracing::info!(
            batch_size = self.config.batch_size,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Status worker started"
        );
        loop {
            match self.poll_once().await {
                Ok(0) => tokio::time::sleep(self.config.poll_interval).await,
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(error = %e, "Failed to poll event queue");
                    tokio::time::sleep(self.config.poll_interval).await;
                }
            }
        }
    }
}
