use authenticheck_contracts::chat::GREETING_INPUT;
use authenticheck_contracts::{StreamError, VerificationError};
use serde_json::json;
use sha2::{Digest, Sha256};

use super::{ChatModel, ChatRequest, ChatStream, VerificationModel};
use crate::requests::{
    VerificationKind, VerificationRequest, AUTHENTICITY_POINTERS_TITLE, BARCODE_LOOKUP_TITLE,
    OCR_REASON_TITLE,
};

const DRYRUN_GREETING: &str = "Hi there! I'm Luci. How can I help you today?";

/// Offline provider. Verdicts are derived from a digest of the request, so
/// the same input always yields the same schema-conforming answer.
#[derive(Debug, Clone)]
pub struct DryrunProvider {
    model: String,
}

impl DryrunProvider {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
        }
    }
}

impl VerificationModel for DryrunProvider {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate(&self, request: &VerificationRequest) -> Result<String, VerificationError> {
        tracing::debug!(model = %self.model, kind = request.kind.as_str(), "dryrun verification");
        let digest = request_digest(request);
        let authentic = digest[1] % 4 != 0;
        let status = if authentic { "Authentic" } else { "Counterfeit" };
        let reference = hex::encode(&digest[..3]).to_ascii_uppercase();

        let payload = match request.kind {
            VerificationKind::Barcode => json!({
                "status": status,
                "confidence": 30 + u64::from(digest[0] % 40),
                "brand": "Dryrun Goods",
                "model": format!("Catalog Item {reference}"),
                "reasons": [
                    {
                        "title": BARCODE_LOOKUP_TITLE,
                        "details": format!("Offline lookup matched catalog entry {reference}."),
                        "passed": authentic,
                    },
                    {
                        "title": AUTHENTICITY_POINTERS_TITLE,
                        "details": "Check the label print quality, seams and the packaging hologram.",
                        "passed": true,
                    },
                ],
            }),
            VerificationKind::Image => json!({
                "status": status,
                "confidence": 55 + u64::from(digest[0] % 45),
                "brand": "Dryrun Goods",
                "model": format!("Sample {reference}"),
                "reasons": [
                    {
                        "title": OCR_REASON_TITLE,
                        "details": "Label text is consistent and free of spelling errors.",
                        "passed": authentic,
                    },
                    {
                        "title": "Logo & Branding",
                        "details": "Logo placement matches reference proportions.",
                        "passed": true,
                    },
                ],
            }),
        };
        Ok(payload.to_string())
    }
}

impl ChatModel for DryrunProvider {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn stream_reply(&self, request: &ChatRequest) -> Result<ChatStream, StreamError> {
        let reply = if request.message == GREETING_INPUT {
            DRYRUN_GREETING.to_string()
        } else {
            format!(
                "You asked: \"{}\". I'm running offline, so here is a general tip: compare labels, stitching and packaging against the brand's official photos.",
                request.message.trim()
            )
        };
        let chunks: Vec<Result<String, StreamError>> = reply
            .split_inclusive(' ')
            .map(|chunk| Ok(chunk.to_string()))
            .collect();
        Ok(Box::new(chunks.into_iter()))
    }
}

fn request_digest(request: &VerificationRequest) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(request.kind.as_str().as_bytes());
    hasher.update(request.prompt.as_bytes());
    if let Some(image) = request.image.as_ref() {
        hasher.update(image.mime_type.as_bytes());
        hasher.update(image.data.as_bytes());
    }
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());
    digest
}
