//! Client traits and the values they exchange
//!
//! `ObjectStore` and `MessageQueue` decouple callers from the AWS SDK. The
//! SDK adapters and the in-memory backends both implement them.

use std::fmt;

use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::cancel::CancellationToken;
use crate::error::{Error, Result};

/// Largest batch a single receive may return
pub const MAX_RECEIVE_MESSAGES: i32 = 10;

/// Longest server-side long-poll wait, in seconds
pub const MAX_WAIT_TIME_SECONDS: i32 = 20;

/// Outcome of a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    /// `bucket/key` of the written object
    pub location: String,

    /// Integrity tag reported by the service, without quotes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    /// Version ID when the bucket is versioned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
}

/// One entry of a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSummary {
    pub key: String,

    /// Size in bytes
    pub size: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<Timestamp>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl ObjectSummary {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            last_modified: None,
            etag: None,
        }
    }
}

/// Opaque token acknowledging one delivery of a message
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeletionToken(String);

impl DeletionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for DeletionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Receipt handles run to hundreds of characters
        let shown: String = self.0.chars().take(16).collect();
        if shown.len() < self.0.len() {
            write!(f, "DeletionToken({shown}...)")
        } else {
            write!(f, "DeletionToken({shown})")
        }
    }
}

impl From<String> for DeletionToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for DeletionToken {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

/// A received message.
///
/// The service keeps it hidden from other receivers until it is deleted
/// with its token or the visibility timeout expires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub body: String,
    pub deletion_token: DeletionToken,
}

/// Validated receive parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveOptions {
    max_messages: i32,
    wait_time_seconds: i32,
}

impl ReceiveOptions {
    /// `max_messages` must be in `1..=10`, `wait_time_seconds` in `0..=20`
    pub fn new(max_messages: i32, wait_time_seconds: i32) -> Result<Self> {
        if !(1..=MAX_RECEIVE_MESSAGES).contains(&max_messages) {
            return Err(Error::InvalidArgument(format!(
                "max messages must be between 1 and {MAX_RECEIVE_MESSAGES}, got {max_messages}"
            )));
        }
        if !(0..=MAX_WAIT_TIME_SECONDS).contains(&wait_time_seconds) {
            return Err(Error::InvalidArgument(format!(
                "wait time must be between 0 and {MAX_WAIT_TIME_SECONDS} seconds, got {wait_time_seconds}"
            )));
        }
        Ok(Self {
            max_messages,
            wait_time_seconds,
        })
    }

    pub const fn max_messages(&self) -> i32 {
        self.max_messages
    }

    pub const fn wait_time_seconds(&self) -> i32 {
        self.wait_time_seconds
    }
}

impl Default for ReceiveOptions {
    /// One message, longest long-poll
    fn default() -> Self {
        Self {
            max_messages: 1,
            wait_time_seconds: MAX_WAIT_TIME_SECONDS,
        }
    }
}

/// Object storage bound to one bucket.
///
/// Every call is a single request; nothing is retried or paginated.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Name of the bound bucket
    fn bucket(&self) -> &str;

    /// Write `data` under `key` in one buffered request, overwriting any
    /// existing object
    async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<UploadResult>;

    /// First page of the bucket listing
    async fn list_all(&self, cancel: &CancellationToken) -> Result<Vec<ObjectSummary>>;

    /// First page of keys starting with `prefix`, filtered server-side
    async fn list_by_prefix(
        &self,
        prefix: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ObjectSummary>>;

    /// Whole object body, buffered in memory
    async fn get(&self, key: &str, cancel: &CancellationToken) -> Result<Vec<u8>>;
}

/// Message queue bound to one resolved queue address
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Name the queue was looked up by
    fn queue_name(&self) -> &str;

    /// Address resolved at construction
    fn queue_url(&self) -> &str;

    /// Enqueue one message, returning its id
    async fn send(&self, body: &str, cancel: &CancellationToken) -> Result<String>;

    /// Long-poll for up to `options.max_messages()` messages. An empty
    /// vector means nothing arrived within the wait window.
    async fn receive(
        &self,
        options: ReceiveOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<Message>>;

    /// Acknowledge one delivery
    async fn delete(&self, token: &DeletionToken, cancel: &CancellationToken) -> Result<()>;
}
