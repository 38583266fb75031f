use std::time::Duration;

use authenticheck_contracts::models::Capability;

use crate::util::{first_non_empty_env, non_empty_env};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DRYRUN_VERIFY_MODEL: &str = "dryrun-verify-1";
pub const DRYRUN_CHAT_MODEL: &str = "dryrun-chat-1";

const DEFAULT_REQUEST_TIMEOUT_S: f64 = 90.0;
const MIN_REQUEST_TIMEOUT_S: f64 = 5.0;
const MAX_REQUEST_TIMEOUT_S: f64 = 600.0;

/// Engine settings. Environment first; the CLI overrides individual fields.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub verify_model: Option<String>,
    pub chat_model: Option<String>,
    pub request_timeout: Duration,
    pub dryrun: bool,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self {
            api_base: non_empty_env("GEMINI_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            api_key: first_non_empty_env(&["GEMINI_API_KEY", "GOOGLE_API_KEY", "API_KEY"]),
            verify_model: non_empty_env("AUTHENTICHECK_VERIFY_MODEL"),
            chat_model: non_empty_env("AUTHENTICHECK_CHAT_MODEL"),
            request_timeout: parse_timeout(non_empty_env("AUTHENTICHECK_REQUEST_TIMEOUT").as_deref()),
            dryrun: false,
        }
    }

    /// Model name to ask the selector for. Dryrun mode pins the offline
    /// models regardless of what was configured.
    pub fn requested_model(&self, capability: Capability) -> Option<String> {
        match (self.dryrun, capability) {
            (true, Capability::Verify) => Some(DRYRUN_VERIFY_MODEL.to_string()),
            (true, Capability::Chat) => Some(DRYRUN_CHAT_MODEL.to_string()),
            (false, Capability::Verify) => self.verify_model.clone(),
            (false, Capability::Chat) => self.chat_model.clone(),
        }
    }
}

fn parse_timeout(raw: Option<&str>) -> Duration {
    let seconds = raw
        .and_then(|value| value.parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_S)
        .clamp(MIN_REQUEST_TIMEOUT_S, MAX_REQUEST_TIMEOUT_S);
    Duration::from_secs_f64(seconds)
}
