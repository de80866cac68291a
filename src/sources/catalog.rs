use std::sync::Arc;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::cache::token::Token;
use crate::helpers::time::get_instant;
use crate::observability::metrics::get_metrics;
use crate::registry::descriptor::MetricDescriptor;
use crate::resilience::retry::ReauthPolicy;
use crate::sources::auth::TokenProvider;
use crate::sources::error::{ExporterError, FetchResult};
use crate::utils::constants::AUTH_TOKEN_HEADER;

#[derive(Debug, Deserialize)]
pub struct CatalogResponse {
    #[serde(default)]
    pub metrics: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
pub struct CatalogEntry {
    pub namespace: String,
    pub metric_name: String,
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
}

#[derive(Debug, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub value: String,
}

/// Lists the provider's metrics and keeps the configured namespaces.
pub struct CatalogFetcher {
    client: Client,
    url: String,
    wanted_namespaces: Vec<String>,
    tokens: Arc<TokenProvider>,
    policy: ReauthPolicy,
}

impl CatalogFetcher {
    pub fn new(
        client: Client,
        url: impl Into<String>,
        wanted_namespaces: Vec<String>,
        tokens: Arc<TokenProvider>,
        policy: ReauthPolicy,
    ) -> Self {
        Self { client, url: url.into(), wanted_namespaces, tokens, policy }
    }

    /// Descriptors for this cycle. Provider errors yield an empty catalog;
    /// only a refused token request is returned as an error.
    pub async fn fetch_catalog(&self) -> FetchResult<Vec<MetricDescriptor>> {
        match self
            .policy
            .run_with_reauth(&self.tokens, |token| self.fetch_with_token(token))
            .await
        {
            Ok(descriptors) => {
                info!("catalog lists {} wanted metrics", descriptors.len());
                Ok(descriptors)
            }
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                error!("Could not gather available metrics: {}", err);
                Ok(Vec::new())
            }
        }
    }

    async fn fetch_with_token(&self, token: Token) -> FetchResult<Vec<MetricDescriptor>> {
        let metrics = get_metrics().await;
        let start = get_instant();

        let result = self.request_catalog(&token).await;

        metrics.request_duration.with_label_values(&["catalog"]).observe(start.elapsed().as_secs_f64());
        let outcome = match &result {
            Ok(_) => "ok",
            Err(err) => err.reason(),
        };
        metrics.catalog_requests.with_label_values(&[outcome]).inc();
        result
    }

    async fn request_catalog(&self, token: &Token) -> FetchResult<Vec<MetricDescriptor>> {
        let response = self
            .client
            .get(&self.url)
            .header(AUTH_TOKEN_HEADER, token.value())
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body = response.text().await?;
                let catalog: CatalogResponse = serde_json::from_str(&body)?;
                Ok(self.filter(catalog))
            }
            StatusCode::UNAUTHORIZED => Err(ExporterError::AuthExpired),
            status => Err(ExporterError::Provider(status)),
        }
    }

    /// Keep entries of the wanted namespaces, reduced to their first dimension.
    pub fn filter(&self, catalog: CatalogResponse) -> Vec<MetricDescriptor> {
        catalog
            .metrics
            .into_iter()
            .filter(|entry| self.wanted_namespaces.contains(&entry.namespace))
            .filter_map(|entry| {
                let Some(dimension) = entry.dimensions.into_iter().next() else {
                    debug!("{}:{} lists no dimension, skipping", entry.namespace, entry.metric_name);
                    return None;
                };
                Some(MetricDescriptor {
                    namespace: entry.namespace,
                    metric_name: entry.metric_name,
                    dimension_name: dimension.name,
                    dimension_value: dimension.value,
                })
            })
            .collect()
    }
}
