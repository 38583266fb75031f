mod dryrun;
mod gemini;
mod sse;

use std::sync::Arc;

use anyhow::{bail, Result};
use authenticheck_contracts::chat::ChatMessage;
use authenticheck_contracts::models::{Capability, ModelSelection, ModelSelector};
use authenticheck_contracts::{StreamError, VerificationError};

use crate::config::EngineConfig;
use crate::requests::VerificationRequest;

pub use dryrun::DryrunProvider;
pub use gemini::GeminiProvider;
pub use sse::SseTextStream;

/// Lazy, finite, ordered sequence of reply fragments.
pub type ChatStream = Box<dyn Iterator<Item = Result<String, StreamError>> + Send>;

/// Structured generation under the verification schema. Returns the raw
/// model text; validation belongs to the caller.
pub trait VerificationModel: Send + Sync {
    fn name(&self) -> &str;
    fn generate(&self, request: &VerificationRequest) -> Result<String, VerificationError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub system_instruction: String,
    /// Prior turns as the remote model has seen them.
    pub history: Vec<ChatMessage>,
    pub message: String,
}

pub trait ChatModel: Send + Sync {
    fn name(&self) -> &str;
    fn stream_reply(&self, request: &ChatRequest) -> Result<ChatStream, StreamError>;
}

pub fn build_verification_model(
    config: &EngineConfig,
    selector: &ModelSelector,
) -> Result<(Arc<dyn VerificationModel>, ModelSelection)> {
    let requested = config.requested_model(Capability::Verify);
    let selection = select(selector, requested.as_deref(), Capability::Verify)?;
    let model: Arc<dyn VerificationModel> = match selection.model.provider.as_str() {
        "dryrun" => Arc::new(DryrunProvider::new(&selection.model.name)),
        "gemini" => Arc::new(GeminiProvider::from_config(config, &selection.model.name)?),
        other => bail!("no verification provider registered for '{other}'"),
    };
    Ok((model, selection))
}

pub fn build_chat_model(
    config: &EngineConfig,
    selector: &ModelSelector,
) -> Result<(Arc<dyn ChatModel>, ModelSelection)> {
    let requested = config.requested_model(Capability::Chat);
    let selection = select(selector, requested.as_deref(), Capability::Chat)?;
    let model: Arc<dyn ChatModel> = match selection.model.provider.as_str() {
        "dryrun" => Arc::new(DryrunProvider::new(&selection.model.name)),
        "gemini" => Arc::new(GeminiProvider::from_config(config, &selection.model.name)?),
        other => bail!("no chat provider registered for '{other}'"),
    };
    Ok((model, selection))
}

fn select(
    selector: &ModelSelector,
    requested: Option<&str>,
    capability: Capability,
) -> Result<ModelSelection> {
    let selection = selector
        .select(requested, capability)
        .map_err(anyhow::Error::msg)?;
    if requested.is_some() {
        if let Some(reason) = selection.fallback_reason.as_deref() {
            tracing::warn!(model = %selection.model.name, "{reason}");
        }
    }
    Ok(selection)
}
