use reqwest::StatusCode;
use thiserror::Error;

/// Failures of calls against the identity and Cloud Eye APIs.
#[derive(Debug, Error)]
pub enum ExporterError {
    /// 401 from the catalog or sample endpoint.
    #[error("token expired")]
    AuthExpired,
    #[error("token request got result code '{0}'")]
    AuthRejected(StatusCode),
    #[error("token response carries no 'x-subject-token' header")]
    MissingSubjectToken,
    #[error("token request failed: {0}")]
    AuthUnavailable(#[source] reqwest::Error),
    #[error("token still rejected after {0} refresh attempts")]
    ReauthExhausted(u32),
    #[error("provider returned result code '{0}'")]
    Provider(StatusCode),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("cannot decode provider response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ExporterError {
    /// Identity service refused or could not be reached: the exporter cannot
    /// authenticate and has to stop.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ExporterError::AuthRejected(_)
                | ExporterError::MissingSubjectToken
                | ExporterError::AuthUnavailable(_)
        )
    }

    /// Short label for the outcome counters.
    pub fn reason(&self) -> &'static str {
        match self {
            ExporterError::AuthExpired => "expired",
            ExporterError::AuthRejected(_)
            | ExporterError::MissingSubjectToken
            | ExporterError::AuthUnavailable(_) => "auth_failure",
            ExporterError::ReauthExhausted(_) => "reauth_exhausted",
            ExporterError::Provider(_) => "status",
            ExporterError::Transport(_) => "transport",
            ExporterError::Decode(_) => "decode",
        }
    }
}

pub type FetchResult<T> = std::result::Result<T, ExporterError>;
