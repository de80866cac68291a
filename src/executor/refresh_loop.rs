use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use prometheus::Registry;
use reqwest::Client;
use tokio::time::sleep;
use tracing::{error, info};

use crate::cache::credential_store::CredentialStore;
use crate::config::types::ServiceConfig;
use crate::helpers::time::{get_instant, now_i64};
use crate::observability::metrics::get_metrics;
use crate::registry::descriptor::MetricDescriptor;
use crate::registry::instruments::InstrumentRegistry;
use crate::resilience::retry::ReauthPolicy;
use crate::sources::auth::TokenProvider;
use crate::sources::catalog::CatalogFetcher;
use crate::sources::error::FetchResult;
use crate::sources::sampler::Sampler;

/// Catalog -> instruments -> samples -> sleep, forever.
pub struct RefreshLoop {
    tokens: Arc<TokenProvider>,
    catalog: CatalogFetcher,
    sampler: Sampler,
    instruments: InstrumentRegistry,
    refresh_interval: Duration,
}

impl RefreshLoop {
    pub fn new(
        tokens: Arc<TokenProvider>,
        catalog: CatalogFetcher,
        sampler: Sampler,
        instruments: InstrumentRegistry,
        refresh_interval: Duration,
    ) -> Self {
        Self { tokens, catalog, sampler, instruments, refresh_interval }
    }

    /// Wire the loop from configuration. Gauges are registered in `registry`.
    pub fn from_config(
        cfg: &ServiceConfig,
        client: Client,
        store: Arc<dyn CredentialStore>,
        registry: Registry,
    ) -> Result<Self> {
        let payload = cfg
            .json_request
            .token_payload()
            .map_err(|err| anyhow!("json_request.token is not valid JSON: {}", err))?;
        let refresh_interval = Duration::try_from_secs_f64(cfg.exporter_config.refresh_time)
            .map_err(|err| anyhow!("invalid refresh_time {}: {}", cfg.exporter_config.refresh_time, err))?;
        let policy = ReauthPolicy::from(&cfg.settings.reauth);

        let tokens = Arc::new(TokenProvider::new(
            client.clone(),
            cfg.otc_endpoints.request_token.as_str(),
            payload,
            store,
        ));
        let catalog = CatalogFetcher::new(
            client.clone(),
            cfg.otc_endpoints.available_metrics.as_str(),
            cfg.exporter_config.wanted_namespaces(),
            tokens.clone(),
            policy,
        );
        let sampler = Sampler::new(client, cfg.otc_endpoints.cloud_eye_base.as_str(), tokens.clone(), policy);

        Ok(Self::new(tokens, catalog, sampler, InstrumentRegistry::new(registry), refresh_interval))
    }

    pub fn instruments(&self) -> &InstrumentRegistry {
        &self.instruments
    }

    /// Make sure a token is available before anything else runs.
    pub async fn authenticate(&self) -> FetchResult<()> {
        self.tokens.current_token().await.map(|_| ())
    }

    /// Fetch the catalog and make sure every listed metric has a gauge.
    pub async fn register_catalog(&self) -> FetchResult<Vec<MetricDescriptor>> {
        let descriptors = self.catalog.fetch_catalog().await?;
        for descriptor in &descriptors {
            if let Err(err) = self.instruments.ensure_instrument(descriptor).await {
                error!("cannot register gauge for '{}': {}", descriptor.instrument_key(), err);
            }
        }

        let metrics = get_metrics().await;
        metrics.catalog_descriptors.set(descriptors.len() as i64);
        metrics.instruments.set(self.instruments.len().await as i64);
        Ok(descriptors)
    }

    /// One catalog and sampling pass.
    pub async fn run_cycle(&self) -> FetchResult<()> {
        let metrics = get_metrics().await;
        let start = get_instant();

        let descriptors = self.register_catalog().await?;
        self.sampler.sample_all(&descriptors, &self.instruments).await?;

        metrics.cycle_duration.observe(start.elapsed().as_secs_f64());
        metrics.last_cycle_unix.set(now_i64());
        info!(
            "poll cycle done: {} metrics in {:.3}s, next in {:?}",
            descriptors.len(),
            start.elapsed().as_secs_f64(),
            self.refresh_interval
        );
        Ok(())
    }

    /// Poll until a token request is refused; that error is returned.
    pub async fn run(&self) -> FetchResult<()> {
        self.register_catalog().await?;
        loop {
            self.run_cycle().await?;
            sleep(self.refresh_interval).await;
        }
    }
}
