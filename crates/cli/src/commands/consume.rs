//! Long-running consumer loop
//!
//! Receives a batch, hands each message to a callback and deletes it.
//! Receive failures are retried after a delay, delete failures are logged
//! and skipped (the message reappears after its visibility timeout).
//! Cancellation ends the loop at the next await point.

use std::time::Duration;

use ak_core::{CancellationToken, Message, MessageQueue, ReceiveOptions, Result};
use clap::Args;
use serde::Serialize;

use super::sqs::print_message;
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Seconds to wait after a failed receive when --retry-delay is not given
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 5;

#[derive(Args, Debug)]
pub struct ConsumeArgs {
    /// Queue name
    pub queue: String,

    /// Messages per receive (1-10)
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(i32).range(1..=10))]
    pub max: i32,

    /// Long-poll wait in seconds (0-20)
    #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(i32).range(0..=20))]
    pub wait: i32,

    /// Seconds to wait before retrying a failed receive
    #[arg(long, default_value_t = DEFAULT_RETRY_DELAY_SECS)]
    pub retry_delay: u64,

    /// Stop after this many messages
    #[arg(long)]
    pub limit: Option<usize>,

    /// Leave messages on the queue instead of deleting them
    #[arg(long)]
    pub keep: bool,
}

/// Loop settings
#[derive(Debug, Clone, Copy)]
pub struct ConsumeOptions {
    pub receive: ReceiveOptions,
    pub retry_delay: Duration,
    pub limit: Option<usize>,
    pub delete: bool,
}

impl ConsumeOptions {
    pub fn from_args(args: &ConsumeArgs) -> Result<Self> {
        Ok(Self {
            receive: ReceiveOptions::new(args.max, args.wait)?,
            retry_delay: Duration::from_secs(args.retry_delay),
            limit: args.limit,
            delete: !args.keep,
        })
    }
}

/// Counters reported when the loop ends
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConsumeStats {
    pub received: usize,
    pub deleted: usize,
    pub receive_failures: usize,
    pub delete_failures: usize,
}

/// Run the consumer until `options.limit` messages were handled or
/// `cancel` fires
pub async fn run_consumer<F>(
    queue: &dyn MessageQueue,
    options: ConsumeOptions,
    cancel: &CancellationToken,
    mut on_message: F,
) -> ConsumeStats
where
    F: FnMut(&Message),
{
    let mut stats = ConsumeStats::default();

    loop {
        let receive = match options.limit {
            Some(limit) if stats.received >= limit => break,
            Some(limit) => {
                let remaining = (limit - stats.received).min(options.receive.max_messages() as usize);
                // remaining is in 1..=max_messages, so this cannot fail
                ReceiveOptions::new(remaining as i32, options.receive.wait_time_seconds())
                    .unwrap_or(options.receive)
            }
            None => options.receive,
        };

        let messages = match queue.receive(receive, cancel).await {
            Ok(m) => m,
            Err(e) if e.is_cancelled() => break,
            Err(e) => {
                stats.receive_failures += 1;
                tracing::warn!(
                    error = %e,
                    retry_in_secs = options.retry_delay.as_secs(),
                    "receive failed, retrying"
                );
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(options.retry_delay) => {}
                }
                continue;
            }
        };

        for message in messages {
            stats.received += 1;
            on_message(&message);

            if !options.delete {
                continue;
            }
            match queue.delete(&message.deletion_token, cancel).await {
                Ok(()) => stats.deleted += 1,
                Err(e) if e.is_cancelled() => return stats,
                Err(e) => {
                    stats.delete_failures += 1;
                    tracing::warn!(
                        message_id = %message.id,
                        error = %e,
                        "delete failed, message will be redelivered"
                    );
                }
            }
        }
    }

    stats
}

/// Execute `ak sqs consume`
pub async fn execute(
    queue: &dyn MessageQueue,
    args: ConsumeArgs,
    formatter: &Formatter,
    cancel: &CancellationToken,
) -> ExitCode {
    let options = match ConsumeOptions::from_args(&args) {
        Ok(o) => o,
        Err(e) => return formatter.fail("Invalid consume options", &e),
    };

    tracing::info!(
        queue = %queue.queue_name(),
        max_messages = options.receive.max_messages(),
        wait_time_seconds = options.receive.wait_time_seconds(),
        limit = ?options.limit,
        "consuming messages"
    );

    let stats = run_consumer(queue, options, cancel, |message| {
        if formatter.is_json() {
            if !formatter.is_quiet() {
                formatter.json_line(message);
            }
        } else {
            print_message(formatter, message);
        }
    })
    .await;

    if formatter.is_json() {
        formatter.json_line(&serde_json::json!({ "summary": stats }));
    } else {
        formatter.println(&format!(
            "Received {}, deleted {}, {} receive failures, {} delete failures",
            stats.received, stats.deleted, stats.receive_failures, stats.delete_failures
        ));
    }

    if cancel.is_cancelled() {
        ExitCode::Interrupted
    } else {
        ExitCode::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ak_core::{DeletionToken, Error, MemoryQueue};
    use async_trait::async_trait;
    use mockall::{Sequence, mock};

    mock! {
        Queue {}

        #[async_trait]
        impl MessageQueue for Queue {
            fn queue_name(&self) -> &str;
            fn queue_url(&self) -> &str;
            async fn send(&self, body: &str, cancel: &CancellationToken) -> Result<String>;
            async fn receive(
                &self,
                options: ReceiveOptions,
                cancel: &CancellationToken,
            ) -> Result<Vec<Message>>;
            async fn delete(&self, token: &DeletionToken, cancel: &CancellationToken) -> Result<()>;
        }
    }

    fn message(n: usize) -> Message {
        Message {
            id: format!("m{n}"),
            body: format!("body {n}"),
            deletion_token: DeletionToken::new(format!("r{n}")),
        }
    }

    fn options(limit: Option<usize>) -> ConsumeOptions {
        ConsumeOptions {
            receive: ReceiveOptions::new(10, 0).unwrap(),
            retry_delay: Duration::from_secs(5),
            limit,
            delete: true,
        }
    }

    #[tokio::test]
    async fn test_consumes_and_deletes_every_message() {
        let queue = MemoryQueue::new("orders");
        let cancel = CancellationToken::new();
        for body in ["a", "b", "c"] {
            queue.send(body, &cancel).await.unwrap();
        }

        let mut bodies = Vec::new();
        let stats = run_consumer(&queue, options(Some(3)), &cancel, |m| {
            bodies.push(m.body.clone())
        })
        .await;

        assert_eq!(bodies, vec!["a", "b", "c"]);
        assert_eq!(stats.received, 3);
        assert_eq!(stats.deleted, 3);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_limit_caps_batch_size() {
        let queue = MemoryQueue::new("orders");
        let cancel = CancellationToken::new();
        for n in 0..5 {
            queue.send(&format!("m{n}"), &cancel).await.unwrap();
        }

        let stats = run_consumer(&queue, options(Some(2)), &cancel, |_| {}).await;

        assert_eq!(stats.received, 2);
        assert_eq!(queue.len(), 3);
    }

    #[tokio::test]
    async fn test_keep_leaves_messages_in_flight() {
        let queue = MemoryQueue::new("orders");
        let cancel = CancellationToken::new();
        queue.send("keep me", &cancel).await.unwrap();

        let mut opts = options(Some(1));
        opts.delete = false;
        let stats = run_consumer(&queue, opts, &cancel, |_| {}).await;

        assert_eq!(stats.received, 1);
        assert_eq!(stats.deleted, 0);
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_idle_consumer() {
        let queue = MemoryQueue::new("orders");
        let cancel = CancellationToken::new();
        let opts = ConsumeOptions {
            receive: ReceiveOptions::new(10, 20).unwrap(),
            ..options(None)
        };

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(45)).await;
            trigger.cancel();
        });

        let stats = run_consumer(&queue, opts, &cancel, |_| {}).await;
        assert_eq!(stats, ConsumeStats::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_failure_is_retried_after_delay() {
        let mut queue = MockQueue::new();
        let mut seq = Sequence::new();

        queue
            .expect_receive()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(Error::queue("receive", "orders", "connection reset", None)));
        queue
            .expect_receive()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(vec![message(1)]));
        queue
            .expect_delete()
            .withf(|token, _| token.as_str() == "r1")
            .times(1)
            .returning(|_, _| Ok(()));

        let started = tokio::time::Instant::now();
        let stats = run_consumer(&queue, options(Some(1)), &CancellationToken::new(), |_| {}).await;

        assert!(started.elapsed() >= Duration::from_secs(5));
        assert_eq!(
            stats,
            ConsumeStats {
                received: 1,
                deleted: 1,
                receive_failures: 1,
                delete_failures: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_delete_failure_does_not_stop_batch() {
        let mut queue = MockQueue::new();

        queue
            .expect_receive()
            .times(1)
            .returning(|_, _| Ok(vec![message(1), message(2)]));
        queue
            .expect_delete()
            .withf(|token, _| token.as_str() == "r1")
            .times(1)
            .returning(|_, _| {
                Err(Error::queue(
                    "delete",
                    "orders",
                    "stale",
                    Some("ReceiptHandleIsInvalid".into()),
                ))
            });
        queue
            .expect_delete()
            .withf(|token, _| token.as_str() == "r2")
            .times(1)
            .returning(|_, _| Ok(()));

        let stats = run_consumer(&queue, options(Some(2)), &CancellationToken::new(), |_| {}).await;

        assert_eq!(stats.received, 2);
        assert_eq!(stats.deleted, 1);
        assert_eq!(stats.delete_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_retry_delay() {
        let mut queue = MockQueue::new();
        queue
            .expect_receive()
            .times(1)
            .returning(|_, _| Err(Error::queue("receive", "orders", "throttled", None)));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let stats = run_consumer(&queue, options(None), &cancel, |_| {}).await;
        assert_eq!(stats.receive_failures, 1);
        assert_eq!(stats.received, 0);
    }

    #[test]
    fn test_options_from_args() {
        let args = ConsumeArgs {
            queue: "orders".into(),
            max: 10,
            wait: 20,
            retry_delay: 2,
            limit: Some(7),
            keep: true,
        };
        let opts = ConsumeOptions::from_args(&args).unwrap();
        assert_eq!(opts.receive.max_messages(), 10);
        assert_eq!(opts.retry_delay, Duration::from_secs(2));
        assert_eq!(opts.limit, Some(7));
        assert!(!opts.delete);
    }
}
