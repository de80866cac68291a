use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::cache::token::Token;
use crate::helpers::time::{format_millis, get_instant, now_millis, sample_window};
use crate::observability::metrics::get_metrics;
use crate::registry::descriptor::{MetricDescriptor, Sample};
use crate::registry::instruments::{Instrument, InstrumentRegistry};
use crate::resilience::retry::ReauthPolicy;
use crate::sources::auth::TokenProvider;
use crate::sources::error::{ExporterError, FetchResult};
use crate::utils::constants::{AUTH_TOKEN_HEADER, SAMPLE_FILTER, SAMPLE_PERIOD_SECONDS};

#[derive(Debug, Deserialize)]
pub struct SampleResponse {
    #[serde(default)]
    pub datapoints: Vec<Sample>,
}

/// Outcome of one datapoint fetch that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleOutcome {
    Written(Sample),
    /// no datapoint in the window, the gauge keeps its last value
    Empty,
}

/// Fetches the latest datapoint per descriptor and writes it into its gauge.
pub struct Sampler {
    client: Client,
    base_url: String,
    tokens: Arc<TokenProvider>,
    policy: ReauthPolicy,
}

impl Sampler {
    pub fn new(client: Client, base_url: impl Into<String>, tokens: Arc<TokenProvider>, policy: ReauthPolicy) -> Self {
        Self { client, base_url: base_url.into(), tokens, policy }
    }

    /// Sample a whole catalog in order. A 401 refreshes the token and resumes
    /// at the descriptor that failed; descriptors sampled before it are not
    /// repeated. Only a refused token request is returned as an error.
    pub async fn sample_all(
        &self,
        descriptors: &[MetricDescriptor],
        instruments: &InstrumentRegistry,
    ) -> FetchResult<()> {
        let progress = AtomicUsize::new(0);
        let next = &progress;

        let result = self
            .policy
            .run_with_reauth(&self.tokens, move |token| {
                self.sample_from(token, descriptors, instruments, next)
            })
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                let done = progress.load(Ordering::SeqCst);
                error!(
                    "aborting sampling pass after {}/{} metrics: {}",
                    done,
                    descriptors.len(),
                    err
                );
                Ok(())
            }
        }
    }

    async fn sample_from(
        &self,
        token: Token,
        descriptors: &[MetricDescriptor],
        instruments: &InstrumentRegistry,
        next: &AtomicUsize,
    ) -> FetchResult<()> {
        let start = next.load(Ordering::SeqCst);
        for (index, descriptor) in descriptors.iter().enumerate().skip(start) {
            match instruments.ensure_instrument(descriptor).await {
                Ok(instrument) => match self.sample(&token, descriptor, &instrument).await {
                    Ok(_) => {}
                    Err(ExporterError::AuthExpired) => return Err(ExporterError::AuthExpired),
                    Err(err) => error!(
                        "Request for metric '{}' value failed: {}",
                        descriptor.instrument_key(),
                        err
                    ),
                },
                Err(err) => error!("no gauge for '{}': {}", descriptor.instrument_key(), err),
            }
            next.store(index + 1, Ordering::SeqCst);
        }
        Ok(())
    }

    /// Fetch the latest `average` of one descriptor and write it into
    /// `instrument` under `{unit, <dimension>}`.
    pub async fn sample(
        &self,
        token: &Token,
        descriptor: &MetricDescriptor,
        instrument: &Instrument,
    ) -> FetchResult<SampleOutcome> {
        let metrics = get_metrics().await;
        let start = get_instant();

        let result = self.request_sample(token, descriptor).await;

        metrics.request_duration.with_label_values(&["sample"]).observe(start.elapsed().as_secs_f64());
        let outcome = match &result {
            Ok(Some(_)) => "ok",
            Ok(None) => "empty",
            Err(err) => err.reason(),
        };
        metrics.sample_requests.with_label_values(&[outcome]).inc();

        match result? {
            Some(sample) => {
                debug!(
                    "{} for '{}={}' at {} : {}",
                    descriptor.instrument_key(),
                    descriptor.dimension_name,
                    descriptor.dimension_value,
                    format_millis(sample.timestamp),
                    sample.average
                );
                instrument.set(&sample.unit, &descriptor.dimension_value, sample.average);
                Ok(SampleOutcome::Written(sample))
            }
            None => Ok(SampleOutcome::Empty),
        }
    }

    async fn request_sample(&self, token: &Token, descriptor: &MetricDescriptor) -> FetchResult<Option<Sample>> {
        let (from, to) = sample_window(now_millis());
        let query = sample_query(descriptor, from, to);

        let response = self
            .client
            .get(&self.base_url)
            .header(AUTH_TOKEN_HEADER, token.value())
            .query(&query)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body = response.text().await?;
                let parsed: SampleResponse = serde_json::from_str(&body)?;
                Ok(parsed.datapoints.into_iter().next())
            }
            StatusCode::UNAUTHORIZED => {
                info!("sample request for '{}' rejected: token expired", descriptor.instrument_key());
                Err(ExporterError::AuthExpired)
            }
            status => Err(ExporterError::Provider(status)),
        }
    }
}

/// Query parameters of a datapoint request for the window `[from, to]`.
pub fn sample_query(descriptor: &MetricDescriptor, from: i64, to: i64) -> Vec<(&'static str, String)> {
    vec![
        ("namespace", descriptor.namespace.to_owned()),
        ("metric_name", descriptor.metric_name.to_owned()),
        ("dim.0", format!("{},{}", descriptor.dimension_name, descriptor.dimension_value)),
        ("from", from.to_string()),
        ("to", to.to_string()),
        ("period", SAMPLE_PERIOD_SECONDS.to_string()),
        ("filter", SAMPLE_FILTER.to_string()),
    ]
}
