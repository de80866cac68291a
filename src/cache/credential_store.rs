use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use anyhow::{anyhow, Context, Result};
use serde_yaml::{Mapping, Value};
use tracing::{debug, info};

use crate::cache::token::Token;
use crate::config::proc_loader::expand_env_vars;

const CREDENTIALS_SECTION: &str = "otc_credentials";
const TOKEN_FIELD: &str = "token";

/// Durable home of the token, read on startup and rewritten on every refresh.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<Token>>;
    fn save(&self, token: &Token) -> Result<()>;
}

/// ================================
/// Config file backed store
/// ================================

/// Keeps the token in `otc_credentials.token` of the exporter's YAML config.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self, expand: bool) -> Result<Value> {
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("cannot read credentials from '{}'", self.path.display()))?;
        let content = if expand { expand_env_vars(&raw) } else { raw };
        let document: Value = serde_yaml::from_str(&content)?;
        Ok(document)
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<Token>> {
        let document = self.read_document(true)?;
        let token = document
            .get(CREDENTIALS_SECTION)
            .and_then(|section| section.get(TOKEN_FIELD))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(Token::new);
        debug!("persisted token present: {}", token.is_some());
        Ok(token)
    }

    fn save(&self, token: &Token) -> Result<()> {
        // placeholders stay unexpanded in the rewritten file
        let mut document = self.read_document(false)?;
        let root = document
            .as_mapping_mut()
            .ok_or_else(|| anyhow!("config '{}' is not a YAML mapping", self.path.display()))?;

        let has_section = root
            .get(CREDENTIALS_SECTION)
            .map(Value::is_mapping)
            .unwrap_or(false);
        if !has_section {
            root.insert(Value::from(CREDENTIALS_SECTION), Value::Mapping(Mapping::new()));
        }
        if let Some(section) = root.get_mut(CREDENTIALS_SECTION).and_then(Value::as_mapping_mut) {
            section.insert(Value::from(TOKEN_FIELD), Value::from(token.value()));
        }

        // atomic replace: tmp -> rename
        let content = serde_yaml::to_string(&document)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, content)
            .with_context(|| format!("cannot write '{}'", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("cannot replace '{}'", self.path.display()))?;

        info!("token persisted to '{}'", self.path.display());
        Ok(())
    }
}

/// ================================
/// In-process store
/// ================================
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    token: RwLock<Option<Token>>,
}

impl MemoryCredentialStore {
    pub fn new(token: Option<Token>) -> Self {
        Self { token: RwLock::new(token) }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<Token>> {
        self.token
            .read()
            .map(|guard| guard.clone())
            .map_err(|_| anyhow!("credential store lock poisoned"))
    }

    fn save(&self, token: &Token) -> Result<()> {
        let mut guard = self
            .token
            .write()
            .map_err(|_| anyhow!("credential store lock poisoned"))?;
        *guard = Some(token.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn config_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("tmp file");
        file.write_all(content.as_bytes()).expect("write tmp file");
        file
    }

    #[test]
    fn load_returns_none_without_token() {
        let file = config_file("exporter_config:\n  refresh_time: 10\n");
        let store = FileCredentialStore::new(file.path());
        assert!(store.load().unwrap().is_none());

        let file = config_file("otc_credentials:\n  token: \"\"\n");
        let store = FileCredentialStore::new(file.path());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_creates_section_and_keeps_placeholders() {
        let file = config_file(
            "otc_endpoints:\n  request_token: https://${IAM_HOST:iam.example.com}/v3/auth/tokens\n",
        );
        let store = FileCredentialStore::new(file.path());

        store.save(&Token::new("T-123")).unwrap();

        assert_eq!(store.load().unwrap(), Some(Token::new("T-123")));
        let raw = fs::read_to_string(file.path()).unwrap();
        assert!(raw.contains("${IAM_HOST:iam.example.com}"));
        assert!(!file.path().with_extension("tmp").exists());
    }

    #[test]
    fn save_overwrites_existing_token() {
        let file = config_file("otc_credentials:\n  token: old\n");
        let store = FileCredentialStore::new(file.path());
        assert_eq!(store.load().unwrap(), Some(Token::new("old")));

        store.save(&Token::new("new")).unwrap();
        assert_eq!(store.load().unwrap(), Some(Token::new("new")));
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryCredentialStore::default();
        assert!(store.load().unwrap().is_none());
        store.save(&Token::new("abc")).unwrap();
        assert_eq!(store.load().unwrap(), Some(Token::new("abc")));
    }
}
