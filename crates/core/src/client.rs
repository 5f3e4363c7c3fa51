//! Client construction parameters
//!
//! A single explicit configuration structure for both the storage and the
//! queue client. It is immutable once a client has been built from it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::endpoint::{
    CredentialSource, ResolvedEndpoint, Service, resolve_credentials, resolve_endpoint,
};
use crate::error::{Error, Result};

/// Connection settings for one bucket or one queue
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Bucket name (storage) or queue name (queue)
    pub resource: String,

    /// Target service region
    pub region: String,

    /// Override endpoint, e.g. `http://localhost:4566` for LocalStack
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,

    /// Access key ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,

    /// Secret access key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,

    /// Session token for temporary credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

impl ClientConfig {
    /// Create a configuration for `resource` in `region` using the
    /// production endpoint and ambient credentials
    pub fn new(resource: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            region: region.into(),
            ..Default::default()
        }
    }

    /// Route every request to `url`
    pub fn with_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }

    /// Sign requests with a static key pair
    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    /// Attach a session token to the static key pair
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Resolve the endpoint these settings select for `service`
    pub fn endpoint(&self, service: Service) -> Result<ResolvedEndpoint> {
        resolve_endpoint(service, &self.region, self.endpoint_url.as_deref())
    }

    /// Resolve how requests made with these settings are signed
    pub fn credentials(&self) -> Result<CredentialSource> {
        resolve_credentials(
            self.access_key.as_deref(),
            self.secret_key.as_deref(),
            self.session_token.as_deref(),
        )
    }

    /// Validate every field, returning the endpoint and credential decisions
    pub fn resolve(&self, service: Service) -> Result<(ResolvedEndpoint, CredentialSource)> {
        if self.resource.trim().is_empty() {
            let what = match service {
                Service::Storage => "bucket name",
                Service::Queue => "queue name",
            };
            return Err(Error::Configuration(format!("{what} cannot be empty")));
        }

        Ok((self.endpoint(service)?, self.credentials()?))
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("resource", &self.resource)
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}
