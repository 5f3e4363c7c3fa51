//! SQS client implementation
//!
//! Wraps aws-sdk-sqs and implements the MessageQueue trait from ak-core.
//! The queue URL is looked up by name once, at construction, and kept for
//! the life of the client. Send and delete handle exactly one message.

use ak_core::{
    CancellationToken, ClientConfig, DeletionToken, Error, Message, MessageQueue,
    ReceiveOptions, ResolvedEndpoint, Result, Service, with_cancellation,
};
use async_trait::async_trait;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use tracing::{Instrument, Span};

use crate::sdk::{describe_failure, load_sdk_config};

/// SQS client bound to one queue
pub struct SqsClient {
    inner: aws_sdk_sqs::Client,
    queue_name: String,
    queue_url: String,
    region: String,
    endpoint: ResolvedEndpoint,
    span: Span,
}

impl SqsClient {
    /// Create a new SQS client for `config.resource` (the queue name).
    ///
    /// Resolves the queue URL with one `GetQueueUrl` call; a missing queue
    /// surfaces as a queue error with a not-found code.
    pub async fn new(config: ClientConfig, cancel: &CancellationToken) -> Result<Self> {
        let loaded = load_sdk_config(&config, Service::Queue).await?;
        let inner = aws_sdk_sqs::Client::new(&loaded.sdk);

        let span = tracing::info_span!(
            "sqs_client",
            queue = %config.resource,
            region = %config.region,
            endpoint = %loaded.endpoint.url,
            queue_url = tracing::field::Empty,
        );

        let queue_url = with_cancellation(
            cancel,
            "get_queue_url",
            &config.resource,
            lookup_queue_url(&inner, &config.resource),
        )
        .instrument(span.clone())
        .await?;

        span.record("queue_url", queue_url.as_str());
        span.in_scope(|| {
            tracing::info!(source = ?loaded.endpoint.source, "SQS client initialized");
        });

        Ok(Self {
            inner,
            queue_name: config.resource,
            queue_url,
            region: config.region,
            endpoint: loaded.endpoint,
            span,
        })
    }

    /// Get the underlying aws-sdk-sqs client
    pub fn inner(&self) -> &aws_sdk_sqs::Client {
        &self.inner
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Endpoint decision this client was built with
    pub fn endpoint(&self) -> &ResolvedEndpoint {
        &self.endpoint
    }

    async fn send_one(&self, body: &str) -> Result<String> {
        tracing::debug!(size = body.len(), "sending message");

        let response = self
            .inner
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| queue_failure("send", &self.queue_name, &e))?;

        let id = response.message_id().unwrap_or_default().to_string();
        tracing::info!(message_id = %id, "message sent");
        Ok(id)
    }

    async fn receive_batch(&self, options: ReceiveOptions) -> Result<Vec<Message>> {
        tracing::debug!(
            max_messages = options.max_messages(),
            wait_time_seconds = options.wait_time_seconds(),
            "waiting for messages"
        );

        let response = self
            .inner
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(options.max_messages())
            .wait_time_seconds(options.wait_time_seconds())
            .send()
            .await
            .map_err(|e| queue_failure("receive", &self.queue_name, &e))?;

        let received = response.messages.unwrap_or_default();
        let mut messages = Vec::with_capacity(received.len());
        for msg in received {
            let id = msg.message_id().unwrap_or_default().to_string();
            let token = msg.receipt_handle().ok_or_else(|| {
                Error::queue(
                    "receive",
                    &self.queue_name,
                    format!("message {id} arrived without a receipt handle"),
                    None,
                )
            })?;

            messages.push(Message {
                deletion_token: DeletionToken::new(token),
                body: msg.body().unwrap_or_default().to_string(),
                id,
            });
        }

        if messages.is_empty() {
            tracing::debug!("no messages within the wait window");
        } else {
            tracing::info!(count = messages.len(), "messages received");
        }
        Ok(messages)
    }

    async fn delete_one(&self, token: &DeletionToken) -> Result<()> {
        tracing::debug!(token = ?token, "deleting message");

        self.inner
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(token.as_str())
            .send()
            .await
            .map_err(|e| queue_failure("delete", &self.queue_name, &e))?;

        tracing::info!(token = ?token, "message deleted");
        Ok(())
    }
}

async fn lookup_queue_url(client: &aws_sdk_sqs::Client, queue_name: &str) -> Result<String> {
    let response = client
        .get_queue_url()
        .queue_name(queue_name)
        .send()
        .await
        .map_err(|e| queue_failure("get_queue_url", queue_name, &e))?;

    response
        .queue_url()
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            Error::queue(
                "get_queue_url",
                queue_name,
                "service returned no queue URL",
                None,
            )
        })
}

#[async_trait]
impl MessageQueue for SqsClient {
    fn queue_name(&self) -> &str {
        &self.queue_name
    }

    fn queue_url(&self) -> &str {
        &self.queue_url
    }

    async fn send(&self, body: &str, cancel: &CancellationToken) -> Result<String> {
        with_cancellation(cancel, "send", &self.queue_name, self.send_one(body))
            .instrument(self.span.clone())
            .await
    }

    async fn receive(
        &self,
        options: ReceiveOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<Message>> {
        with_cancellation(cancel, "receive", &self.queue_name, self.receive_batch(options))
            .instrument(self.span.clone())
            .await
    }

    async fn delete(&self, token: &DeletionToken, cancel: &CancellationToken) -> Result<()> {
        with_cancellation(cancel, "delete", &self.queue_name, self.delete_one(token))
            .instrument(self.span.clone())
            .await
    }
}

fn queue_failure<E>(operation: &'static str, queue: &str, err: &E) -> Error
where
    E: ProvideErrorMetadata + std::error::Error,
{
    let (message, code) = describe_failure(err);
    let err = Error::queue(operation, queue, message, code);
    tracing::error!(error = %err, "SQS request failed");
    err
}
