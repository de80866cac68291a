use std::sync::Arc;

use reqwest::{Client, StatusCode};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::cache::credential_store::CredentialStore;
use crate::cache::token::Token;
use crate::helpers::time::get_instant;
use crate::observability::metrics::get_metrics;
use crate::sources::error::{ExporterError, FetchResult};
use crate::utils::constants::SUBJECT_TOKEN_HEADER;

/// Holds the process-wide token and trades the configured credentials for a
/// new one whenever it expires.
pub struct TokenProvider {
    client: Client,
    request_token_url: String,
    payload: serde_json::Value,
    store: Arc<dyn CredentialStore>,
    token: RwLock<Option<Token>>,
}

impl TokenProvider {
    pub fn new(
        client: Client,
        request_token_url: impl Into<String>,
        payload: serde_json::Value,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            client,
            request_token_url: request_token_url.into(),
            payload,
            store,
            token: RwLock::new(None),
        }
    }

    /// Cached token, else the persisted one, else a freshly requested one.
    pub async fn current_token(&self) -> FetchResult<Token> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }

        match self.store.load() {
            Ok(Some(token)) => {
                info!("using persisted token");
                *self.token.write().await = Some(token.clone());
                return Ok(token);
            }
            Ok(None) => {}
            Err(err) => warn!("cannot load persisted token: {:#}", err),
        }

        self.request_token().await
    }

    /// Request a new token and persist it. Any answer but `201 Created` is
    /// fatal for the exporter.
    pub async fn request_token(&self) -> FetchResult<Token> {
        let metrics = get_metrics().await;
        let start = get_instant();

        let response = self
            .client
            .post(&self.request_token_url)
            .json(&self.payload)
            .send()
            .await
            .map_err(|err| {
                error!("Request for token failed: {}", err);
                metrics.token_requests.with_label_values(&["error"]).inc();
                ExporterError::AuthUnavailable(err)
            })?;
        metrics.request_duration.with_label_values(&["token"]).observe(start.elapsed().as_secs_f64());

        let status = response.status();
        if status != StatusCode::CREATED {
            error!("Request for token got result code '{}'", status);
            metrics.token_requests.with_label_values(&["rejected"]).inc();
            return Err(ExporterError::AuthRejected(status));
        }

        let token = response
            .headers()
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(Token::new)
            .ok_or_else(|| {
                error!("token response has no '{}' header", SUBJECT_TOKEN_HEADER);
                metrics.token_requests.with_label_values(&["rejected"]).inc();
                ExporterError::MissingSubjectToken
            })?;

        *self.token.write().await = Some(token.clone());
        // the in-memory token keeps working even if it cannot be persisted
        if let Err(err) = self.store.save(&token) {
            error!("cannot persist new token: {:#}", err);
        }

        metrics.token_requests.with_label_values(&["ok"]).inc();
        info!("New token generated");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::credential_store::{FileCredentialStore, MemoryCredentialStore};
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;
    use std::io::Write;

    fn provider(server: &MockServer, store: Arc<dyn CredentialStore>) -> TokenProvider {
        TokenProvider::new(
            Client::new(),
            server.url("/v3/auth/tokens"),
            json!({"auth": {"identity": {"methods": ["password"]}}}),
            store,
        )
    }

    #[tokio::test]
    async fn created_token_is_persisted() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v3/auth/tokens")
                    .json_body(json!({"auth": {"identity": {"methods": ["password"]}}}));
                then.status(201).header("x-subject-token", "T");
            })
            .await;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"otc_credentials:\n  token: stale\n").unwrap();
        let store = Arc::new(FileCredentialStore::new(file.path()));

        let tokens = provider(&server, store.clone());
        let token = tokens.request_token().await.unwrap();

        assert_eq!(token.value(), "T");
        assert_eq!(store.load().unwrap(), Some(Token::new("T")));
        assert_eq!(tokens.current_token().await.unwrap(), Token::new("T"));
        mock.assert_calls_async(1).await;
    }

    #[tokio::test]
    async fn persisted_token_skips_authentication() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v3/auth/tokens");
                then.status(201).header("x-subject-token", "fresh");
            })
            .await;

        let store = Arc::new(MemoryCredentialStore::new(Some(Token::new("persisted"))));
        let tokens = provider(&server, store);

        assert_eq!(tokens.current_token().await.unwrap().value(), "persisted");
        mock.assert_calls_async(0).await;
    }

    #[tokio::test]
    async fn empty_store_requests_a_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v3/auth/tokens");
                then.status(201).header("x-subject-token", "fresh");
            })
            .await;

        let store = Arc::new(MemoryCredentialStore::default());
        let tokens = provider(&server, store.clone());

        assert_eq!(tokens.current_token().await.unwrap().value(), "fresh");
        assert_eq!(tokens.current_token().await.unwrap().value(), "fresh");
        assert_eq!(store.load().unwrap(), Some(Token::new("fresh")));
        mock.assert_calls_async(1).await;
    }

    #[tokio::test]
    async fn rejected_token_request_is_fatal() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v3/auth/tokens");
                then.status(401);
            })
            .await;

        let store = Arc::new(MemoryCredentialStore::default());
        let err = provider(&server, store.clone()).request_token().await.unwrap_err();

        assert!(matches!(err, ExporterError::AuthRejected(StatusCode::UNAUTHORIZED)));
        assert!(err.is_fatal());
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_subject_token_header_is_fatal() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v3/auth/tokens");
                then.status(201).body("{}");
            })
            .await;

        let err = provider(&server, Arc::new(MemoryCredentialStore::default()))
            .request_token()
            .await
            .unwrap_err();

        assert!(matches!(err, ExporterError::MissingSubjectToken));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn unpersistable_token_is_still_used() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v3/auth/tokens");
                then.status(201).header("x-subject-token", "T");
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileCredentialStore::new(dir.path().join("missing.yaml")));
        assert!(store.save(&Token::new("unused")).is_err());

        let tokens = provider(&server, store);

        assert_eq!(tokens.request_token().await.unwrap().value(), "T");
        assert_eq!(tokens.current_token().await.unwrap().value(), "T");
        mock.assert_calls_async(1).await;
    }
}
