use tracing::{error, warn};

use crate::cache::token::Token;
use crate::config::settings::ReauthConfig;
use crate::sources::auth::TokenProvider;
use crate::sources::error::{ExporterError, FetchResult};

/// Retry policy for calls that answer 401 once the token has expired.
#[derive(Debug, Clone, Copy)]
pub struct ReauthPolicy {
    /// `None`: keep refreshing as long as the provider answers 401.
    pub max_attempts: Option<u32>,
}

impl Default for ReauthPolicy {
    fn default() -> Self {
        Self { max_attempts: Some(1) }
    }
}

impl From<&ReauthConfig> for ReauthPolicy {
    fn from(cfg: &ReauthConfig) -> Self {
        Self {
            max_attempts: (cfg.max_attempts > 0).then_some(cfg.max_attempts),
        }
    }
}

impl ReauthPolicy {
    /// Run `operation` with the current token; on `AuthExpired` request a new
    /// token and run it again, up to `max_attempts` refreshes. A refused token
    /// request ends the loop with its fatal error.
    pub async fn run_with_reauth<F, Fut, T>(&self, tokens: &TokenProvider, mut operation: F) -> FetchResult<T>
    where
        F: FnMut(Token) -> Fut,
        Fut: std::future::Future<Output = FetchResult<T>>,
    {
        let mut token = tokens.current_token().await?;
        let mut refreshes: u32 = 0;

        loop {
            match operation(token).await {
                Err(ExporterError::AuthExpired) => {
                    if self.max_attempts.is_some_and(|max| refreshes >= max) {
                        error!("token still expired after {} refresh attempts", refreshes);
                        return Err(ExporterError::ReauthExhausted(refreshes));
                    }
                    warn!("Token seems to be expired, requesting a new one and retrying");
                    token = tokens.request_token().await?;
                    refreshes += 1;
                }
                result => return result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use httpmock::Method::POST;
    use httpmock::MockServer;
    use reqwest::Client;
    use serde_json::json;

    use crate::cache::credential_store::MemoryCredentialStore;

    fn token_provider(server: &MockServer) -> TokenProvider {
        TokenProvider::new(
            Client::new(),
            server.url("/v3/auth/tokens"),
            json!({"auth": {}}),
            Arc::new(MemoryCredentialStore::new(Some(Token::new("old")))),
        )
    }

    #[test]
    fn zero_attempts_means_unbounded() {
        let policy = ReauthPolicy::from(&ReauthConfig { max_attempts: 0 });
        assert_eq!(policy.max_attempts, None);

        let policy = ReauthPolicy::from(&ReauthConfig { max_attempts: 3 });
        assert_eq!(policy.max_attempts, Some(3));
    }

    #[tokio::test]
    async fn unbounded_policy_refreshes_until_the_call_succeeds() {
        let server = MockServer::start_async().await;
        let token_mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v3/auth/tokens");
                then.status(201).header("x-subject-token", "new");
            })
            .await;
        let tokens = token_provider(&server);
        let policy = ReauthPolicy::from(&ReauthConfig { max_attempts: 0 });

        let mut calls = 0;
        let result = policy
            .run_with_reauth(&tokens, |_token| {
                calls += 1;
                let call = calls;
                async move {
                    if call <= 5 {
                        Err(ExporterError::AuthExpired)
                    } else {
                        Ok(call)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 6);
        token_mock.assert_calls_async(5).await;
    }

    #[tokio::test]
    async fn bounded_policy_gives_up_after_max_attempts() {
        let server = MockServer::start_async().await;
        let token_mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v3/auth/tokens");
                then.status(201).header("x-subject-token", "new");
            })
            .await;
        let tokens = token_provider(&server);
        let policy = ReauthPolicy::from(&ReauthConfig { max_attempts: 2 });

        let result: FetchResult<()> = policy
            .run_with_reauth(&tokens, |_token| async { Err(ExporterError::AuthExpired) })
            .await;

        assert!(matches!(result, Err(ExporterError::ReauthExhausted(2))));
        token_mock.assert_calls_async(2).await;
    }
}
