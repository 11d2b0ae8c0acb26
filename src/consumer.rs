//! # Consumer Loop
//!
//! Drains one partition and reports throughput until told to stop.
//!
//! ## States
//!
//! ```text
//! Starting --subscribed--> Running --shutdown token--> Draining --> Stopped
//!     |                       |
//!     +--subscribe failed-----+--too many errors / stream closed--> Failed
//! ```
//!
//! - **Starting** happens inside [`ConsumerLoop::start`]. A failed subscription is
//!   returned to the caller as [`ConsumerError::Connect`]; nothing is spawned.
//! - **Running** is a single spawned task. It multiplexes the shutdown token and the
//!   subscription with a biased `select!`, so one event is handled at a time and no
//!   locking is needed. Every record bumps the counter and is logged; delivery
//!   errors are logged and skipped (degraded mode) unless
//!   [`ConsumerConfig::max_consecutive_errors`] is set.
//! - **Draining** starts when the token is cancelled. A record that is already being
//!   handled finishes; nothing new is started. The outcome goes out on the done
//!   channel and the subscription is dropped.
//!
//! Records arrive in partition order. No offsets are stored, so a restart replays
//! everything from the configured [`StartOffset`](crate::config::StartOffset).

use crate::broker::{Broker, Subscription};
use crate::config::ConsumerConfig;
use crate::error::{BrokerError, ConsumerError};
use crate::model::ConsumedRecord;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Lifecycle position of a consumer loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Starting,
    Running,
    Draining,
    Stopped,
    Failed,
}

/// Totals reported when the loop exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConsumerReport {
    pub delivered: u64,
    pub errors: u64,
}

/// Hook invoked by the loop after its own logging.
///
/// `()` is the no-op handler used by the `order-consumer` binary.
#[async_trait]
pub trait RecordHandler: Send + 'static {
    async fn on_record(&mut self, count: u64, record: &ConsumedRecord);

    async fn on_error(&mut self, _error: &BrokerError) {}
}

#[async_trait]
impl RecordHandler for () {
    async fn on_record(&mut self, _count: u64, _record: &ConsumedRecord) {}
}

/// Forwards every record, paired with its counter value, to another task.
///
/// Use it to hand records to downstream processing without blocking the loop. Once
/// the receiver is gone, records are dropped and the loop carries on.
#[async_trait]
impl RecordHandler for mpsc::UnboundedSender<(u64, ConsumedRecord)> {
    async fn on_record(&mut self, count: u64, record: &ConsumedRecord) {
        let _ = self.send((count, record.clone()));
    }
}

/// A not-yet-started consumer. See the [module documentation](self).
pub struct ConsumerLoop<B: Broker, H: RecordHandler = ()> {
    broker: Arc<B>,
    topic: String,
    partition: i32,
    config: ConsumerConfig,
    handler: H,
}

impl<B: Broker> ConsumerLoop<B, ()> {
    pub fn new(
        broker: B,
        topic: impl Into<String>,
        partition: i32,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            broker: Arc::new(broker),
            topic: topic.into(),
            partition,
            config,
            handler: (),
        }
    }
}

impl<B: Broker, H: RecordHandler> ConsumerLoop<B, H> {
    /// Replaces the record handler.
    pub fn with_handler<H2: RecordHandler>(self, handler: H2) -> ConsumerLoop<B, H2> {
        ConsumerLoop {
            broker: self.broker,
            topic: self.topic,
            partition: self.partition,
            config: self.config,
            handler,
        }
    }

    /// Subscribes and spawns the running loop. Cancelling `shutdown` drains it.
    pub async fn start(
        self,
        shutdown: CancellationToken,
    ) -> Result<RunningConsumer, ConsumerError> {
        let (state_tx, state_rx) = watch::channel(ConsumerState::Starting);
        info!(
            topic = %self.topic,
            partition = self.partition,
            start = ?self.config.start,
            "Consumer starting"
        );

        let subscription = match self
            .broker
            .subscribe(&self.topic, self.partition, self.config.start)
            .await
        {
            Ok(subscription) => subscription,
            Err(e) => {
                error!(
                    topic = %self.topic,
                    partition = self.partition,
                    error = %e,
                    "Subscription failed"
                );
                return Err(ConsumerError::Connect(e));
            }
        };

        state_tx.send_replace(ConsumerState::Running);
        let (done_tx, done_rx) = oneshot::channel();
        let drain = Drain {
            topic: self.topic,
            max_consecutive_errors: self.config.max_consecutive_errors,
            handler: self.handler,
            state: state_tx,
        };
        let task = tokio::spawn(async move {
            let outcome = drain.run(subscription, shutdown).await;
            let _ = done_tx.send(outcome);
        });

        Ok(RunningConsumer {
            done: done_rx,
            state: state_rx,
            task,
        })
    }

    /// Starts the loop and waits for it to stop.
    pub async fn run(self, shutdown: CancellationToken) -> Result<ConsumerReport, ConsumerError> {
        self.start(shutdown).await?.stopped().await
    }
}

/// Handle on a spawned consumer loop.
pub struct RunningConsumer {
    done: oneshot::Receiver<Result<ConsumerReport, ConsumerError>>,
    state: watch::Receiver<ConsumerState>,
    task: JoinHandle<()>,
}

impl RunningConsumer {
    pub fn state(&self) -> ConsumerState {
        *self.state.borrow()
    }

    /// Waits for the done signal. Once this returns the subscription has been released.
    pub async fn stopped(self) -> Result<ConsumerReport, ConsumerError> {
        let outcome = self.done.await.unwrap_or(Err(ConsumerError::Aborted));
        if let Err(e) = self.task.await {
            error!(error = %e, "Consumer task failed");
            return Err(ConsumerError::Aborted);
        }
        outcome
    }
}

/// State owned by the running task.
struct Drain<H: RecordHandler> {
    topic: String,
    max_consecutive_errors: Option<u32>,
    handler: H,
    state: watch::Sender<ConsumerState>,
}

impl<H: RecordHandler> Drain<H> {
    async fn run<S: Subscription>(
        mut self,
        subscription: S,
        shutdown: CancellationToken,
    ) -> Result<ConsumerReport, ConsumerError> {
        info!(topic = %self.topic, "Consumer started");

        let outcome = self.drain(subscription, &shutdown).await;
        // `drain` owned the subscription, so it is released by now.
        match &outcome {
            Ok(report) => {
                self.state.send_replace(ConsumerState::Stopped);
                info!(delivered = report.delivered, errors = report.errors, "Consumer stopped");
            }
            Err(e) => {
                self.state.send_replace(ConsumerState::Failed);
                error!(error = %e, "Consumer failed");
            }
        }
        outcome
    }

    async fn drain<S: Subscription>(
        &mut self,
        mut subscription: S,
        shutdown: &CancellationToken,
    ) -> Result<ConsumerReport, ConsumerError> {
        let mut report = ConsumerReport::default();
        let mut consecutive_errors = 0u32;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    self.state.send_replace(ConsumerState::Draining);
                    info!(delivered = report.delivered, "Interruption detected, draining");
                    return Ok(report);
                }

                event = subscription.next_event() => match event {
                    Some(Ok(record)) => {
                        consecutive_errors = 0;
                        report.delivered += 1;
                        info!(
                            count = report.delivered,
                            topic = %record.topic,
                            partition = record.partition,
                            offset = record.offset,
                            message = %record.payload_lossy(),
                            "Received message"
                        );
                        self.handler.on_record(report.delivered, &record).await;
                    }
                    Some(Err(e)) => {
                        report.errors += 1;
                        consecutive_errors += 1;
                        warn!(error = %e, consecutive_errors, "Delivery error");
                        self.handler.on_error(&e).await;
                        if let Some(limit) = self.max_consecutive_errors {
                            if consecutive_errors >= limit {
                                return Err(ConsumerError::TooManyErrors {
                                    consecutive: consecutive_errors,
                                    last: e,
                                });
                            }
                        }
                    }
                    None => return Err(ConsumerError::SubscriptionClosed),
                },
            }
        }
    }
}
