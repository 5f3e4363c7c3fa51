//! Shared AWS SDK configuration
//!
//! Applies the endpoint and credential decisions from ak-core to an
//! `aws_config` loader. Both service clients are built from the result.

use ak_core::{
    ClientConfig, CredentialSource, ResolvedEndpoint, Result, Service, StaticCredentials,
};
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;
use aws_smithy_types::error::display::DisplayErrorContext;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;

/// Provider name attached to caller-supplied credentials
const STATIC_PROVIDER_NAME: &str = "ak-static-credentials";

/// SDK configuration plus the endpoint decision it was built from
pub(crate) struct LoadedConfig {
    pub sdk: SdkConfig,
    pub endpoint: ResolvedEndpoint,
}

/// Validate `config` and load the SDK configuration for `service`.
///
/// Without an override URL the SDK's default endpoint and credential chains
/// stay in charge. With one, every request goes to that URL. Static
/// credentials always win over ambient ones, which keeps requests signed
/// even against emulators that accept any key.
pub(crate) async fn load_sdk_config(
    config: &ClientConfig,
    service: Service,
) -> Result<LoadedConfig> {
    let (endpoint, credentials) = config.resolve(service).inspect_err(|e| {
        tracing::error!(
            service = %service,
            resource = %config.resource,
            region = %config.region,
            error = %e,
            "invalid client configuration"
        );
    })?;

    let mut loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));

    if let CredentialSource::Static(creds) = &credentials {
        loader = loader.credentials_provider(static_credentials(creds));
    }

    if endpoint.is_custom() {
        loader = loader.endpoint_url(&endpoint.url);
    }

    let sdk = loader.load().await;

    tracing::debug!(
        service = %service,
        region = %endpoint.signing_region,
        endpoint = %endpoint.url,
        source = ?endpoint.source,
        static_credentials = matches!(credentials, CredentialSource::Static(_)),
        "loaded SDK configuration"
    );

    Ok(LoadedConfig { sdk, endpoint })
}

fn static_credentials(creds: &StaticCredentials) -> Credentials {
    Credentials::new(
        &creds.access_key,
        &creds.secret_key,
        creds.session_token.clone(),
        None, // expiry
        STATIC_PROVIDER_NAME,
    )
}

/// Full error chain and service error code of an SDK failure
pub(crate) fn describe_failure<E>(err: &E) -> (String, Option<String>)
where
    E: ProvideErrorMetadata + std::error::Error,
{
    (
        DisplayErrorContext(err).to_string(),
        err.code().map(str::to_string),
    )
}
