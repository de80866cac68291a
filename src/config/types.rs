use serde::{Deserialize, Deserializer};

use crate::config::settings::SettingsConfig;
use crate::utils::constants::NAMESPACE_PREFIX;

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub exporter_config: ExporterConfig,
    pub otc_endpoints: OtcEndpoints,
    #[serde(default)]
    pub otc_credentials: OtcCredentials,
    pub json_request: JsonRequest,
    #[serde(default)]
    pub settings: SettingsConfig,
}

/// ================================
/// Poll loop
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ExporterConfig {
    /// seconds between two poll cycles, fractions allowed
    pub refresh_time: f64,
    /// short names, e.g. `ECS`, matched against `SYS.ECS`
    #[serde(deserialize_with = "csv_or_list")]
    pub namespaces: Vec<String>,
}

impl ExporterConfig {
    /// Namespaces as they appear in the provider's catalog.
    pub fn wanted_namespaces(&self) -> Vec<String> {
        self.namespaces
            .iter()
            .map(|name| format!("{}{}", NAMESPACE_PREFIX, name))
            .collect()
    }
}

/// ================================
/// Remote endpoints
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct OtcEndpoints {
    pub available_metrics: String,
    pub cloud_eye_base: String,
    pub request_token: String,
}

/// Shape of the `otc_credentials` section. The exporter reads and writes the
/// live token through `FileCredentialStore`, not through this struct.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct OtcCredentials {
    pub token: Option<String>,
}

/// Token request payload, either inline YAML or a JSON string.
#[derive(Debug, Deserialize, Clone)]
pub struct JsonRequest {
    pub token: serde_json::Value,
}

impl JsonRequest {
    pub fn token_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        match &self.token {
            serde_json::Value::String(raw) => serde_json::from_str(raw),
            value => Ok(value.to_owned()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CsvOrList {
    Csv(String),
    List(Vec<String>),
}

fn csv_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match CsvOrList::deserialize(deserializer)? {
        CsvOrList::Csv(raw) => raw.split(',').map(str::to_owned).collect(),
        CsvOrList::List(list) => list,
    };
    Ok(items
        .into_iter()
        .map(|item| item.trim().to_owned())
        .filter(|item| !item.is_empty())
        .collect())
}
