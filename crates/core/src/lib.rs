//! ak-core: Core library for the awskit clients
//!
//! This crate provides the SDK-independent parts of awskit, including:
//! - Client configuration and validation
//! - Endpoint and credential resolution
//! - ObjectStore and MessageQueue traits
//! - Cancellation helpers
//! - Configuration file and profile management
//! - In-memory backends for tests
//!
//! Nothing here depends on the AWS SDK, so callers can be tested against
//! the in-memory backends without network access.

pub mod cancel;
pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod memory;
pub mod profile;
pub mod traits;

pub use cancel::{CancellationToken, Deadline, with_cancellation, with_deadline};
pub use client::ClientConfig;
pub use config::{Config, ConfigManager};
pub use endpoint::{
    CredentialSource, EndpointSource, ResolvedEndpoint, Service, StaticCredentials,
    resolve_credentials, resolve_endpoint,
};
pub use error::{Error, Result};
pub use memory::{MemoryObjectStore, MemoryQueue};
pub use profile::{Profile, ProfileManager};
pub use traits::{
    DeletionToken, Message, MessageQueue, ObjectStore, ObjectSummary, ReceiveOptions,
    UploadResult,
};
