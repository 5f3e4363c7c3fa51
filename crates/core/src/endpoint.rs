//! Endpoint and credential resolution
//!
//! Pure functions that decide where requests for a service go and how they
//! are signed. Nothing here touches the network or the AWS SDK, so the SDK
//! adapter only has to apply the decisions.

use std::fmt;

use url::Url;

use crate::error::{Error, Result};

/// Backend service a client talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    /// Object storage (S3)
    Storage,
    /// Message queue (SQS)
    Queue,
}

impl Service {
    /// Service identifier used in endpoint host names and signing
    pub const fn id(self) -> &'static str {
        match self {
            Service::Storage => "s3",
            Service::Queue => "sqs",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Where a resolved endpoint came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointSource {
    /// Production endpoint, resolved by the SDK's default chain
    Default,
    /// Caller-supplied override URL
    Custom,
}

/// Endpoint decision for one service and region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    pub service: Service,
    /// Endpoint URL; nominal for [`EndpointSource::Default`]
    pub url: String,
    pub signing_region: String,
    pub source: EndpointSource,
    /// The host must not be rewritten (no virtual-hosted bucket prefix)
    pub hostname_immutable: bool,
    /// Object paths are `endpoint/bucket/key`
    pub path_style: bool,
}

impl ResolvedEndpoint {
    /// Whether requests are forced to a caller-supplied URL
    pub fn is_custom(&self) -> bool {
        self.source == EndpointSource::Custom
    }
}

/// Resolve the endpoint for `service` in `region`.
///
/// A `None` or blank `override_url` selects the production endpoint. Any
/// other value forces every request to that URL, keeps its host fixed and,
/// for storage, switches to path-style addressing so local emulators can
/// route the request.
pub fn resolve_endpoint(
    service: Service,
    region: &str,
    override_url: Option<&str>,
) -> Result<ResolvedEndpoint> {
    validate_region(region)?;

    let override_url = override_url.map(str::trim).filter(|u| !u.is_empty());

    match override_url {
        None => Ok(ResolvedEndpoint {
            service,
            url: default_endpoint_url(service, region),
            signing_region: region.to_string(),
            source: EndpointSource::Default,
            hostname_immutable: false,
            path_style: false,
        }),
        Some(raw) => Ok(ResolvedEndpoint {
            service,
            url: normalize_override_url(raw)?,
            signing_region: region.to_string(),
            source: EndpointSource::Custom,
            hostname_immutable: true,
            path_style: service == Service::Storage,
        }),
    }
}

/// Production endpoint URL for a service and region
pub fn default_endpoint_url(service: Service, region: &str) -> String {
    let suffix = if region.starts_with("cn-") {
        "amazonaws.com.cn"
    } else {
        "amazonaws.com"
    };
    format!("https://{}.{region}.{suffix}", service.id())
}

/// Check that a region name is well formed (e.g. `us-east-1`)
pub fn validate_region(region: &str) -> Result<()> {
    if region.is_empty() {
        return Err(Error::Configuration("region cannot be empty".into()));
    }

    let well_formed = region
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !region.starts_with('-')
        && !region.ends_with('-');

    if !well_formed {
        return Err(Error::Configuration(format!(
            "malformed region '{region}'"
        )));
    }

    Ok(())
}

fn normalize_override_url(raw: &str) -> Result<String> {
    let with_scheme = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else if raw.contains("://") {
        return Err(Error::Configuration(format!(
            "endpoint URL '{raw}' must use http or https"
        )));
    } else {
        format!("https://{raw}")
    };

    let parsed = Url::parse(&with_scheme)
        .map_err(|e| Error::Configuration(format!("invalid endpoint URL '{raw}': {e}")))?;

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(Error::Configuration(format!(
            "endpoint URL '{raw}' has no host"
        )));
    }

    Ok(with_scheme.trim_end_matches('/').to_string())
}

/// Static access key pair used to sign requests
#[derive(Clone, PartialEq, Eq)]
pub struct StaticCredentials {
    pub access_key: String,
    pub secret_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// How requests will be signed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Explicit key pair; takes precedence over anything ambient
    Static(StaticCredentials),
    /// Environment, profile files, instance metadata, ...
    Ambient,
}

/// Decide the credential source from an optional key pair.
///
/// Key and secret are both-or-neither; an empty string counts as absent.
pub fn resolve_credentials(
    access_key: Option<&str>,
    secret_key: Option<&str>,
    session_token: Option<&str>,
) -> Result<CredentialSource> {
    fn present(v: Option<&str>) -> Option<&str> {
        v.map(str::trim).filter(|s| !s.is_empty())
    }

    match (present(access_key), present(secret_key)) {
        (Some(access_key), Some(secret_key)) => {
            Ok(CredentialSource::Static(StaticCredentials {
                access_key: access_key.to_string(),
                secret_key: secret_key.to_string(),
                session_token: present(session_token).map(str::to_string),
            }))
        }
        (None, None) => Ok(CredentialSource::Ambient),
        (Some(_), None) => Err(Error::Configuration(
            "access key given without a secret key".into(),
        )),
        (None, Some(_)) => Err(Error::Configuration(
            "secret key given without an access key".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoint_when_no_override() {
        let endpoint = resolve_endpoint(Service::Storage, "us-east-1", None).unwrap();
        assert_eq!(endpoint.source, EndpointSource::Default);
        assert_eq!(endpoint.url, "https://s3.us-east-1.amazonaws.com");
        assert!(!endpoint.hostname_immutable);
        assert!(!endpoint.path_style);
        assert!(!endpoint.is_custom());
    }

    #[test]
    fn test_blank_override_is_default() {
        let endpoint = resolve_endpoint(Service::Queue, "eu-west-1", Some("  ")).unwrap();
        assert_eq!(endpoint.source, EndpointSource::Default);
        assert_eq!(endpoint.url, "https://sqs.eu-west-1.amazonaws.com");
    }

    #[test]
    fn test_china_partition_suffix() {
        assert_eq!(
            default_endpoint_url(Service::Storage, "cn-north-1"),
            "https://s3.cn-north-1.amazonaws.com.cn"
        );
    }

    #[test]
    fn test_storage_override_forces_path_style() {
        let endpoint =
            resolve_endpoint(Service::Storage, "us-east-1", Some("http://localhost:4566/"))
                .unwrap();
        assert_eq!(endpoint.source, EndpointSource::Custom);
        assert_eq!(endpoint.url, "http://localhost:4566");
        assert_eq!(endpoint.signing_region, "us-east-1");
        assert!(endpoint.hostname_immutable);
        assert!(endpoint.path_style);
    }

    #[test]
    fn test_queue_override_keeps_host_without_path_style() {
        let endpoint =
            resolve_endpoint(Service::Queue, "us-east-1", Some("http://localhost:4566")).unwrap();
        assert!(endpoint.is_custom());
        assert!(endpoint.hostname_immutable);
        assert!(!endpoint.path_style);
    }

    #[test]
    fn test_override_without_scheme_gets_https() {
        let endpoint =
            resolve_endpoint(Service::Storage, "us-east-1", Some("minio.internal:9000")).unwrap();
        assert_eq!(endpoint.url, "https://minio.internal:9000");
    }

    #[test]
    fn test_override_with_unsupported_scheme() {
        let err = resolve_endpoint(Service::Storage, "us-east-1", Some("ftp://host")).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_malformed_region_rejected() {
        for region in ["", "US-EAST-1", "us east 1", "-us-east-1", "us-east-1-"] {
            let err = resolve_endpoint(Service::Queue, region, None).unwrap_err();
            assert!(matches!(err, Error::Configuration(_)), "region {region:?}");
        }
    }

    #[test]
    fn test_static_credentials_take_precedence() {
        let source = resolve_credentials(Some("test"), Some("test"), None).unwrap();
        match source {
            CredentialSource::Static(creds) => {
                assert_eq!(creds.access_key, "test");
                assert_eq!(creds.secret_key, "test");
                assert!(creds.session_token.is_none());
            }
            CredentialSource::Ambient => panic!("expected static credentials"),
        }
    }

    #[test]
    fn test_no_credentials_is_ambient() {
        assert_eq!(
            resolve_credentials(None, None, None).unwrap(),
            CredentialSource::Ambient
        );
        assert_eq!(
            resolve_credentials(Some(""), Some(""), Some("token")).unwrap(),
            CredentialSource::Ambient
        );
    }

    #[test]
    fn test_partial_credentials_rejected() {
        assert!(resolve_credentials(Some("key"), None, None).is_err());
        assert!(resolve_credentials(None, Some("secret"), None).is_err());
        assert!(resolve_credentials(Some("key"), Some(""), None).is_err());
    }

    #[test]
    fn test_credentials_are_trimmed() {
        let source = resolve_credentials(Some(" AKID "), Some("secret\n"), Some("  ")).unwrap();
        let CredentialSource::Static(creds) = source else {
            panic!("expected static credentials");
        };
        assert_eq!(creds.access_key, "AKID");
        assert_eq!(creds.secret_key, "secret");
        assert!(creds.session_token.is_none());
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let creds = StaticCredentials {
            access_key: "AKIDEXAMPLE".into(),
            secret_key: "very-secret".into(),
            session_token: Some("token".into()),
        };
        let debug = format!("{creds:?}");
        assert!(debug.contains("AKIDEXAMPLE"));
        assert!(!debug.contains("very-secret"));
        assert!(!debug.contains("token\""));
    }
}
