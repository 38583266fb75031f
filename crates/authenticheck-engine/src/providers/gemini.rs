use std::io::BufReader;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use authenticheck_contracts::{StreamError, VerificationError};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Map, Value};

use super::sse::SseTextStream;
use super::{ChatModel, ChatRequest, ChatStream, VerificationModel};
use crate::config::EngineConfig;
use crate::requests::VerificationRequest;
use crate::util::{error_chain_text, truncate_text};

const ERROR_BODY_MAX_CHARS: usize = 512;

pub struct GeminiProvider {
    api_base: String,
    api_key: String,
    model: String,
    request_timeout: Duration,
    http: HttpClient,
}

impl GeminiProvider {
    pub fn from_config(config: &EngineConfig, model: &str) -> Result<Self> {
        let Some(api_key) = config.api_key.clone() else {
            bail!("GEMINI_API_KEY or GOOGLE_API_KEY not set");
        };
        Self::new(&config.api_base, api_key, model, config.request_timeout)
    }

    pub fn new(
        api_base: &str,
        api_key: impl Into<String>,
        model: &str,
        request_timeout: Duration,
    ) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(None::<Duration>)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            api_base: api_base.trim().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.to_string(),
            request_timeout,
            http,
        })
    }

    fn endpoint(&self, method: &str) -> String {
        let trimmed = self.model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:{}", self.api_base, model_path, method)
    }

    fn verification_payload(request: &VerificationRequest) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": request.parts(),
            }],
            "generationConfig": request.generation_config(),
        })
    }

    fn chat_payload(request: &ChatRequest) -> Value {
        let mut contents: Vec<Value> = request
            .history
            .iter()
            .filter_map(|message| serde_json::to_value(message).ok())
            .collect();
        contents.push(json!({
            "role": "user",
            "parts": [{ "text": request.message }],
        }));
        let mut payload = Map::new();
        if !request.system_instruction.trim().is_empty() {
            payload.insert(
                "systemInstruction".to_string(),
                json!({ "parts": [{ "text": request.system_instruction }] }),
            );
        }
        payload.insert("contents".to_string(), Value::Array(contents));
        Value::Object(payload)
    }

    fn post_generate(&self, payload: &Value) -> Result<Value> {
        let endpoint = self.endpoint("generateContent");
        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", self.api_key.as_str())])
            .timeout(self.request_timeout)
            .json(payload)
            .send()
            .with_context(|| format!("Gemini request failed ({endpoint})"))?;
        response_json_or_error(response)
    }

    fn open_stream(&self, payload: &Value) -> Result<HttpResponse> {
        let endpoint = self.endpoint("streamGenerateContent");
        let response = self
            .http
            .post(&endpoint)
            .query(&[("alt", "sse"), ("key", self.api_key.as_str())])
            .timeout(self.request_timeout)
            .json(payload)
            .send()
            .with_context(|| format!("Gemini stream request failed ({endpoint})"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!(
                "Gemini stream failed ({}): {}",
                status.as_u16(),
                truncate_text(&body, ERROR_BODY_MAX_CHARS)
            );
        }
        Ok(response)
    }
}

impl VerificationModel for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate(&self, request: &VerificationRequest) -> Result<String, VerificationError> {
        let payload = Self::verification_payload(request);
        tracing::debug!(model = %self.model, kind = request.kind.as_str(), "sending verification request");
        let response = self.post_generate(&payload).map_err(|err| {
            VerificationError::Request(error_chain_text(&err, ERROR_BODY_MAX_CHARS))
        })?;
        Ok(candidate_text(&response))
    }
}

impl ChatModel for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn stream_reply(&self, request: &ChatRequest) -> Result<ChatStream, StreamError> {
        let payload = Self::chat_payload(request);
        let response = self
            .open_stream(&payload)
            .map_err(|err| StreamError(error_chain_text(&err, ERROR_BODY_MAX_CHARS)))?;
        Ok(Box::new(SseTextStream::new(BufReader::new(response))))
    }
}

fn response_json_or_error(response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .context("Gemini response body read failed")?;
    if !status.is_success() {
        bail!(
            "Gemini request failed ({code}): {}",
            truncate_text(&body, ERROR_BODY_MAX_CHARS)
        );
    }
    let parsed: Value =
        serde_json::from_str(&body).context("Gemini returned invalid JSON payload")?;
    Ok(parsed)
}

/// Concatenated text parts of the first candidate. Thought parts are
/// skipped. Empty when the payload carries no text.
pub(crate) fn candidate_text(payload: &Value) -> String {
    payload
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter(|part| !part.get("thought").and_then(Value::as_bool).unwrap_or(false))
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use authenticheck_contracts::chat::ChatMessage;
    use serde_json::json;

    use super::{candidate_text, GeminiProvider};
    use crate::config::EngineConfig;
    use crate::media::EncodedImage;
    use crate::providers::{ChatRequest, VerificationModel};
    use crate::requests::VerificationRequest;

    fn provider(base: &str) -> anyhow::Result<GeminiProvider> {
        GeminiProvider::new(base, "test-key", "gemini-2.5-pro", Duration::from_secs(5))
    }

    #[test]
    fn endpoint_prefixes_model_path() -> anyhow::Result<()> {
        let gemini = provider("https://example.test/v1beta/")?;
        assert_eq!(
            gemini.endpoint("generateContent"),
            "https://example.test/v1beta/models/gemini-2.5-pro:generateContent"
        );
        Ok(())
    }

    #[test]
    fn configured_timeout_applies_to_every_call() -> anyhow::Result<()> {
        let config = EngineConfig {
            api_base: "https://example.test/v1beta".to_string(),
            api_key: Some("test-key".to_string()),
            verify_model: None,
            chat_model: None,
            request_timeout: Duration::from_secs(42),
            dryrun: false,
        };
        let gemini = GeminiProvider::from_config(&config, "gemini-2.5-flash")?;
        assert_eq!(gemini.request_timeout, Duration::from_secs(42));
        Ok(())
    }

    #[test]
    fn verification_payload_carries_parts_and_schema() {
        let request =
            VerificationRequest::for_image(EncodedImage::from_bytes(b"img", "image/png"));
        let payload = GeminiProvider::verification_payload(&request);
        assert_eq!(payload["contents"][0]["role"], json!("user"));
        assert_eq!(payload["contents"][0]["parts"].as_array().map(Vec::len), Some(2));
        assert_eq!(
            payload["generationConfig"]["responseMimeType"],
            json!("application/json")
        );
        assert_eq!(
            payload["generationConfig"]["responseSchema"]["type"],
            json!("OBJECT")
        );
    }

    #[test]
    fn chat_payload_appends_message_after_history() {
        let request = ChatRequest {
            system_instruction: "Be brief.".to_string(),
            history: vec![ChatMessage::user("Hello"), ChatMessage::model("Hi!")],
            message: "Is my bag real?".to_string(),
        };
        let payload = GeminiProvider::chat_payload(&request);
        assert_eq!(
            payload["systemInstruction"]["parts"][0]["text"],
            json!("Be brief.")
        );
        let contents = payload["contents"].as_array().cloned().unwrap_or_default();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], json!("model"));
        assert_eq!(contents[2]["parts"][0]["text"], json!("Is my bag real?"));
    }

    #[test]
    fn candidate_text_joins_parts_and_skips_thoughts() {
        let payload = json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "thinking...", "thought": true},
                    {"text": "{\"status\":"},
                    {"text": "\"Authentic\"}"}
                ]}
            }]
        });
        assert_eq!(candidate_text(&payload), "{\"status\":\"Authentic\"}");
        assert_eq!(candidate_text(&json!({"candidates": []})), "");
    }

    #[test]
    fn unreachable_endpoint_is_a_request_error() -> anyhow::Result<()> {
        let gemini = provider("http://127.0.0.1:9")?;
        let request = VerificationRequest::for_barcode("036000291452");
        let err = gemini.generate(&request).unwrap_err();
        assert!(err.is_request(), "{err}");
        Ok(())
    }
}
