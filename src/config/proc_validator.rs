//! Configuration validation with aggregated errors.
//! - Aggregates all issues into Vec<String>
//! - Checks poll loop, endpoint, token payload and settings invariants

use reqwest::Url;
use tracing::{error, info};

use crate::config::settings::SettingsConfig;
use crate::config::types::{ExporterConfig, JsonRequest, OtcEndpoints, ServiceConfig};

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_exporter(&cfg.exporter_config, &mut errors);
    validate_endpoints(&cfg.otc_endpoints, &mut errors);
    validate_json_request(&cfg.json_request, &mut errors);
    validate_settings(&cfg.settings, &mut errors);

    if errors.is_empty() {
        info!("config valid");
        Ok(())
    } else {
        error!("configuration validation errors ({}):", errors.len());
        for e in &errors {
            error!(" - {}", e);
        }
        Err(errors)
    }
}

fn validate_exporter(exporter: &ExporterConfig, errors: &mut Vec<String>) {
    if !exporter.refresh_time.is_finite() || exporter.refresh_time <= 0.0 {
        errors.push(format!(
            "exporter_config.refresh_time ({}) must be a positive number of seconds",
            exporter.refresh_time
        ));
    }
    if exporter.namespaces.is_empty() {
        errors.push("exporter_config.namespaces is empty; at least one namespace required".to_string());
    }
}

fn validate_endpoints(endpoints: &OtcEndpoints, errors: &mut Vec<String>) {
    let urls = [
        ("available_metrics", &endpoints.available_metrics),
        ("cloud_eye_base", &endpoints.cloud_eye_base),
        ("request_token", &endpoints.request_token),
    ];
    for (name, url) in urls {
        if let Err(err) = Url::parse(url) {
            errors.push(format!("otc_endpoints.{} '{}' is not a valid URL: {}", name, url, err));
        }
    }
}

fn validate_json_request(json_request: &JsonRequest, errors: &mut Vec<String>) {
    match json_request.token_payload() {
        Ok(payload) if payload.is_object() => {}
        Ok(_) => errors.push("json_request.token must be a JSON object".to_string()),
        Err(err) => errors.push(format!("json_request.token is not valid JSON: {}", err)),
    }
}

/// SETTINGS VALIDATION
fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    if settings.server.host.is_empty() {
        errors.push("settings.server.host must not be empty".to_string());
    }

    // metrics endpoint start with '/'
    if !settings.metrics.path.starts_with('/') {
        errors.push(format!(
            "settings.metrics.path '{}' must start with '/'",
            settings.metrics.path
        ));
    }

    if settings.http_timeout_ms == 0 {
        errors.push("settings.http_timeout_ms must be greater than 0".to_string());
    }

    // logging level
    if let Some(logging) = &settings.logging {
        let valid = ["trace", "debug", "info", "warn", "error"];
        if !valid.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' invalid; allowed: {:?}",
                logging.level, valid
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::OtcCredentials;

    fn valid_config() -> ServiceConfig {
        ServiceConfig {
            exporter_config: ExporterConfig {
                refresh_time: 60.0,
                namespaces: vec!["ECS".into()],
            },
            otc_endpoints: OtcEndpoints {
                available_metrics: "https://ces.example.com/V1.0/p/metrics".into(),
                cloud_eye_base: "https://ces.example.com/V1.0/p/metric-data".into(),
                request_token: "https://iam.example.com/v3/auth/tokens".into(),
            },
            otc_credentials: OtcCredentials::default(),
            json_request: JsonRequest { token: serde_json::json!({"auth": {}}) },
            settings: SettingsConfig::default(),
        }
    }

    #[test]
    fn accepts_valid_config() {
        assert!(validate_service_config(&valid_config()).is_ok());
    }

    #[test]
    fn aggregates_all_errors() {
        let mut cfg = valid_config();
        cfg.exporter_config.refresh_time = f64::NAN;
        cfg.exporter_config.namespaces.clear();
        cfg.otc_endpoints.cloud_eye_base = "not a url".into();
        cfg.json_request.token = serde_json::Value::String("{broken".into());
        cfg.settings.metrics.path = "metrics".into();

        let errors = validate_service_config(&cfg).unwrap_err();
        assert_eq!(errors.len(), 5, "{:?}", errors);
        assert!(errors.iter().any(|e| e.contains("cloud_eye_base")));
    }
}
