//! Shared constants and invariants

pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_REAUTH_ATTEMPTS: u32 = 1;

pub const DEFAULT_SERVER_HOST: &str = "0.0.0.0";
pub const DEFAULT_SERVER_PORT: u16 = 8000;
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

/// Catalog namespaces are configured by short name and prefixed with this.
pub const NAMESPACE_PREFIX: &str = "SYS.";

pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";
pub const SUBJECT_TOKEN_HEADER: &str = "x-subject-token";

/// Width of the sample query window, `to - from`.
pub const SAMPLE_WINDOW_MS: i64 = 1000;
/// Aggregation period requested from the provider, in seconds.
pub const SAMPLE_PERIOD_SECONDS: u32 = 300;
pub const SAMPLE_FILTER: &str = "average";

/// Process exit status when the provider refuses to issue a token.
pub const AUTH_FAILURE_EXIT_CODE: i32 = 2;
