//! Credential lookup through the SDK provider chain: environment first,
//! then the `[default]` profile of the shared credentials file.

use aws_config::environment::credentials::EnvironmentVariableCredentialsProvider;
use aws_config::meta::credentials::CredentialsProviderChain;
use aws_config::profile::ProfileFileCredentialsProvider;
use aws_credential_types::provider::ProvideCredentials;
use aws_credential_types::Credentials;
use aws_sdk_s3::error::DisplayErrorContext;
use tracing::debug;

use crate::error::{TransportError, TransportResult};

pub const DEFAULT_PROFILE: &str = "default";

const NOT_FOUND: &str = "AWS credentials not found in environment or ~/.aws/credentials";

/// `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` / `AWS_SESSION_TOKEN`,
/// then the `[default]` section of `~/.aws/credentials`.
pub fn default_chain() -> CredentialsProviderChain {
    CredentialsProviderChain::first_try("env", EnvironmentVariableCredentialsProvider::new()).or_else(
        "profile",
        ProfileFileCredentialsProvider::builder()
            .profile_name(DEFAULT_PROFILE)
            .build(),
    )
}

/// Load credentials once from `provider`.
///
/// Any provider failure is reported as [`TransportError::Authentication`];
/// the underlying cause is only logged.
pub async fn resolve(provider: &impl ProvideCredentials) -> TransportResult<Credentials> {
    match provider.provide_credentials().await {
        Ok(credentials) => {
            debug!(access_key = credentials.access_key_id(), "resolved AWS credentials");
            Ok(credentials)
        }
        Err(e) => {
            debug!(error = %DisplayErrorContext(&e), "no AWS credentials");
            Err(TransportError::Authentication(NOT_FOUND.into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_credential_types::provider::error::CredentialsError;
    use aws_credential_types::provider::future;
    use embr_types::Status;

    #[derive(Debug)]
    struct NoCredentials;

    impl ProvideCredentials for NoCredentials {
        fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
        where
            Self: 'a,
        {
            future::ProvideCredentials::ready(Err(CredentialsError::not_loaded("nothing configured")))
        }
    }

    fn static_creds(key: &str) -> Credentials {
        Credentials::new(key, "secret", Some("tok".into()), None, "test")
    }

    #[tokio::test]
    async fn static_provider_resolves() {
        let creds = resolve(&static_creds("AKIA")).await.unwrap();
        assert_eq!(creds.access_key_id(), "AKIA");
        assert_eq!(creds.session_token(), Some("tok"));
    }

    #[tokio::test]
    async fn chain_falls_through_to_the_next_provider() {
        let chain = CredentialsProviderChain::first_try("env", NoCredentials).or_else("profile", static_creds("PROFILE"));
        let creds = resolve(&chain).await.unwrap();
        assert_eq!(creds.access_key_id(), "PROFILE");
    }

    #[tokio::test]
    async fn missing_everywhere_is_authentication_error() {
        let chain = CredentialsProviderChain::first_try("env", NoCredentials).or_else("profile", NoCredentials);
        let err = resolve(&chain).await.unwrap_err();
        assert_eq!(err.status(), Status::Authentication);
        assert_eq!(err.to_string(), NOT_FOUND);
    }

    #[test]
    fn debug_redacts_secrets() {
        let shown = format!("{:?}", static_creds("AKIA"));
        assert!(!shown.contains("secret\""));
    }
}
