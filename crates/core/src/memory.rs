//! In-memory backends for testing and offline development.
//!
//! Both types follow the service semantics callers depend on:
//! - `MemoryObjectStore` overwrites on upload and lists keys in
//!   lexicographic order, filtering by prefix
//! - `MemoryQueue` issues one deletion token per delivery, hides delivered
//!   messages for the visibility timeout, wakes long-polls on send and
//!   rejects stale tokens

use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::cancel::{CancellationToken, with_cancellation};
use crate::error::{Error, Result};
use crate::traits::{
    DeletionToken, Message, MessageQueue, ObjectStore, ObjectSummary, ReceiveOptions,
    UploadResult,
};

/// Visibility timeout SQS applies to queues created with defaults
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

struct StoredObject {
    data: Vec<u8>,
    etag: String,
    last_modified: jiff::Timestamp,
}

/// Thread-safe object store holding one bucket
pub struct MemoryObjectStore {
    bucket: String,
    objects: RwLock<BTreeMap<String, StoredObject>>,
}

impl MemoryObjectStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    fn resource(&self, key: &str) -> String {
        format!("{}/{}", self.bucket, key)
    }

    fn list_matching(&self, prefix: &str) -> Result<Vec<ObjectSummary>> {
        let objects = self
            .objects
            .read()
            .map_err(|_| Error::storage("list", &self.bucket, "store lock poisoned", None))?;

        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, object)| ObjectSummary {
                key: key.clone(),
                size: object.data.len() as u64,
                last_modified: Some(object.last_modified),
                etag: Some(object.etag.clone()),
            })
            .collect())
    }
}

fn content_tag(data: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    data.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<UploadResult> {
        let location = self.resource(key);
        with_cancellation(cancel, "upload", &location, async {
            let etag = content_tag(&data);
            let mut objects = self.objects.write().map_err(|_| {
                Error::storage("upload", &location, "store lock poisoned", None)
            })?;
            objects.insert(
                key.to_string(),
                StoredObject {
                    data,
                    etag: etag.clone(),
                    last_modified: jiff::Timestamp::now(),
                },
            );
            tracing::debug!(bucket = %self.bucket, key, "stored object in memory");

            Ok(UploadResult {
                location: location.clone(),
                etag: Some(etag),
                version_id: None,
            })
        })
        .await
    }

    async fn list_all(&self, cancel: &CancellationToken) -> Result<Vec<ObjectSummary>> {
        with_cancellation(cancel, "list", &self.bucket, async { self.list_matching("") }).await
    }

    async fn list_by_prefix(
        &self,
        prefix: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ObjectSummary>> {
        with_cancellation(cancel, "list", &self.bucket, async {
            self.list_matching(prefix)
        })
        .await
    }

    async fn get(&self, key: &str, cancel: &CancellationToken) -> Result<Vec<u8>> {
        let resource = self.resource(key);
        with_cancellation(cancel, "get", &resource, async {
            let objects = self
                .objects
                .read()
                .map_err(|_| Error::storage("get", &resource, "store lock poisoned", None))?;
            objects
                .get(key)
                .map(|object| object.data.clone())
                .ok_or_else(|| {
                    Error::storage(
                        "get",
                        &resource,
                        "the specified key does not exist",
                        Some("NoSuchKey".into()),
                    )
                })
        })
        .await
    }
}

struct StoredMessage {
    id: String,
    body: String,
    visible_at: Instant,
    receipt: Option<String>,
}

#[derive(Default)]
struct QueueState {
    next_id: u64,
    next_receipt: u64,
    messages: Vec<StoredMessage>,
}

/// Thread-safe queue with visibility timeouts and long polling
pub struct MemoryQueue {
    name: String,
    url: String,
    visibility_timeout: Duration,
    state: Mutex<QueueState>,
    arrivals: Notify,
}

impl MemoryQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_visibility_timeout(name, DEFAULT_VISIBILITY_TIMEOUT)
    }

    pub fn with_visibility_timeout(name: impl Into<String>, visibility_timeout: Duration) -> Self {
        let name = name.into();
        Self {
            url: format!("memory://queue/{name}"),
            name,
            visibility_timeout,
            state: Mutex::new(QueueState::default()),
            arrivals: Notify::new(),
        }
    }

    /// Messages not yet deleted, visible or in flight
    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.messages.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self, operation: &'static str) -> Result<MutexGuard<'_, QueueState>> {
        self.state
            .lock()
            .map_err(|_| Error::queue(operation, &self.name, "queue lock poisoned", None))
    }

    /// Deliver up to `max` visible messages; also report when the next
    /// hidden message becomes visible
    fn take_visible(&self, max: usize) -> Result<(Vec<Message>, Option<Instant>)> {
        let now = Instant::now();
        let mut state = self.lock("receive")?;
        let QueueState {
            next_receipt,
            messages,
            ..
        } = &mut *state;

        let mut delivered = Vec::new();
        for stored in messages.iter_mut() {
            if delivered.len() == max {
                break;
            }
            if stored.visible_at > now {
                continue;
            }
            *next_receipt += 1;
            let receipt = format!("{}#{}", stored.id, next_receipt);
            stored.receipt = Some(receipt.clone());
            stored.visible_at = now + self.visibility_timeout;
            delivered.push(Message {
                id: stored.id.clone(),
                body: stored.body.clone(),
                deletion_token: DeletionToken::new(receipt),
            });
        }

        let next_visible = messages
            .iter()
            .map(|m| m.visible_at)
            .filter(|at| *at > now)
            .min();

        Ok((delivered, next_visible))
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    fn queue_name(&self) -> &str {
        &self.name
    }

    fn queue_url(&self) -> &str {
        &self.url
    }

    async fn send(&self, body: &str, cancel: &CancellationToken) -> Result<String> {
        with_cancellation(cancel, "send", &self.name, async {
            let id = {
                let mut state = self.lock("send")?;
                state.next_id += 1;
                let id = format!("msg-{:08}", state.next_id);
                state.messages.push(StoredMessage {
                    id: id.clone(),
                    body: body.to_string(),
                    visible_at: Instant::now(),
                    receipt: None,
                });
                id
            };
            self.arrivals.notify_waiters();
            tracing::debug!(queue = %self.name, message_id = %id, "enqueued message in memory");
            Ok(id)
        })
        .await
    }

    async fn receive(
        &self,
        options: ReceiveOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<Message>> {
        let max = options.max_messages() as usize;
        let deadline =
            Instant::now() + Duration::from_secs(options.wait_time_seconds() as u64);

        with_cancellation(cancel, "receive", &self.name, async {
            loop {
                let arrival = self.arrivals.notified();
                tokio::pin!(arrival);
                arrival.as_mut().enable();

                let (batch, next_visible) = self.take_visible(max)?;
                if !batch.is_empty() || Instant::now() >= deadline {
                    return Ok(batch);
                }

                let wake_at = next_visible.map_or(deadline, |at| at.min(deadline));
                tokio::select! {
                    _ = &mut arrival => {}
                    _ = tokio::time::sleep_until(wake_at) => {}
                }
            }
        })
        .await
    }

    async fn delete(&self, token: &DeletionToken, cancel: &CancellationToken) -> Result<()> {
        with_cancellation(cancel, "delete", &self.name, async {
            let now = Instant::now();
            let mut state = self.lock("delete")?;
            let position = state.messages.iter().position(|m| {
                m.receipt.as_deref() == Some(token.as_str()) && m.visible_at > now
            });

            match position {
                Some(index) => {
                    let removed = state.messages.remove(index);
                    tracing::debug!(queue = %self.name, message_id = %removed.id, "deleted message from memory");
                    Ok(())
                }
                None => Err(Error::queue(
                    "delete",
                    &self.name,
                    "the receipt handle is stale or unknown",
                    Some("ReceiptHandleIsInvalid".into()),
                )),
            }
        })
        .await
    }
}
