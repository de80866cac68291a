use std::{fs, path::Path};
use crate::config::proc_validator;
use crate::config::types::ServiceConfig;
use crate::observability::metrics::get_metrics;
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use tracing::{debug, error};

/// Load and validate config from YAML file
pub async fn file_to_config(path: &Path) -> Result<ServiceConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("cannot read config file '{}'", path.display()))?;

    let expanded = expand_env_vars(&content);
    parse_config(expanded).await
}

pub async fn parse_config(content: String) -> Result<ServiceConfig> {
    let metrics = get_metrics().await;
    let service_config: ServiceConfig = serde_yaml::from_str(&content)
        .inspect_err(|e| {
            error!("parse config error: {}", e);
            metrics.config_errors.inc();
        })?;

    debug!("validation config ...");
    proc_validator::validate_service_config(&service_config)
        .inspect_err(|_| metrics.config_errors.inc())
        .map_err(|errors| {
            anyhow!(
                "config is not valid, total errors: {}\n{}",
                errors.len(),
                errors.join("\n")
            )
        })?;

    Ok(service_config)
}

/// Replace `${VAR}` and `${VAR:default}` with values from the environment.
pub fn expand_env_vars(input: &str) -> String {
    let re = Regex::new(r"\$\{(\w+)(?::([^\}]+))?\}").expect("valid env var pattern");
    re.replace_all(input, |caps: &regex::Captures| {
        let var = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        std::env::var(var).unwrap_or_else(|_| default.to_string())
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const CONFIG: &str = r#"
exporter_config:
  refresh_time: 0.5
  namespaces: "ECS, EVS,"
otc_endpoints:
  available_metrics: http://${CE_TEST_HOST:localhost:9999}/V1.0/metrics
  cloud_eye_base: http://localhost:9999/V1.0/metric-data
  request_token: http://localhost:9999/v3/auth/tokens
json_request:
  token: '{"auth": {"identity": {"methods": ["password"]}}}'
"#;

    #[tokio::test]
    #[serial]
    async fn parses_csv_namespaces_and_defaults() {
        std::env::remove_var("CE_TEST_HOST");
        let cfg = parse_config(expand_env_vars(CONFIG)).await.unwrap();

        assert_eq!(cfg.exporter_config.namespaces, vec!["ECS", "EVS"]);
        assert_eq!(cfg.exporter_config.wanted_namespaces(), vec!["SYS.ECS", "SYS.EVS"]);
        assert_eq!(cfg.exporter_config.refresh_time, 0.5);
        assert_eq!(cfg.otc_endpoints.available_metrics, "http://localhost:9999/V1.0/metrics");
        assert!(cfg.otc_credentials.token.is_none());
        assert_eq!(cfg.settings.server.port, 8000);
        assert_eq!(cfg.settings.metrics.path, "/metrics");
        assert_eq!(cfg.settings.reauth.max_attempts, 1);

        let payload = cfg.json_request.token_payload().unwrap();
        assert_eq!(payload["auth"]["identity"]["methods"][0], "password");
    }

    #[tokio::test]
    #[serial]
    async fn env_vars_override_defaults() {
        std::env::set_var("CE_TEST_HOST", "ces.example.com");
        let cfg = parse_config(expand_env_vars(CONFIG)).await.unwrap();
        std::env::remove_var("CE_TEST_HOST");

        assert_eq!(cfg.otc_endpoints.available_metrics, "http://ces.example.com/V1.0/metrics");
    }

    #[tokio::test]
    #[serial]
    async fn namespaces_accept_a_list() {
        let content = CONFIG.replace("namespaces: \"ECS, EVS,\"", "namespaces: [ECS, RDS]");
        let cfg = parse_config(expand_env_vars(&content)).await.unwrap();
        assert_eq!(cfg.exporter_config.namespaces, vec!["ECS", "RDS"]);
    }

    #[tokio::test]
    #[serial]
    async fn rejects_invalid_config() {
        let content = CONFIG.replace("refresh_time: 0.5", "refresh_time: -1");
        let err = parse_config(expand_env_vars(&content)).await.unwrap_err();
        assert!(err.to_string().contains("refresh_time"));
    }
}
