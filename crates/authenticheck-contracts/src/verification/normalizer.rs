use serde_json::Value;

use super::result::VerificationVerdict;
use super::schema::{validate, verification_schema};
use crate::error::VerificationError;

pub const MIN_CONFIDENCE: f64 = 0.0;
pub const MAX_CONFIDENCE: f64 = 100.0;

/// Turns the model's raw structured output into a verdict.
///
/// The text must be a bare JSON object: no fences, no surrounding prose, no
/// repair. It is checked against the schema contract and the domain
/// invariants (confidence within 0..=100, at least one reason) before it is
/// trusted. Any deviation is a `MalformedResponse`.
pub fn normalize_verdict(raw: &str) -> Result<VerificationVerdict, VerificationError> {
    let parsed: Value = serde_json::from_str(raw.trim()).map_err(|err| {
        VerificationError::MalformedResponse(format!("response is not valid JSON ({err})"))
    })?;
    normalize_verdict_value(parsed)
}

pub fn normalize_verdict_value(payload: Value) -> Result<VerificationVerdict, VerificationError> {
    let violations = validate(&verification_schema(), &payload);
    if !violations.is_empty() {
        let summary = violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<String>>()
            .join("; ");
        return Err(VerificationError::MalformedResponse(format!(
            "response does not match schema: {summary}"
        )));
    }

    let verdict: VerificationVerdict = serde_json::from_value(payload).map_err(|err| {
        VerificationError::MalformedResponse(format!("response could not be decoded ({err})"))
    })?;

    if !verdict.confidence.is_finite()
        || verdict.confidence < MIN_CONFIDENCE
        || verdict.confidence > MAX_CONFIDENCE
    {
        return Err(VerificationError::MalformedResponse(format!(
            "confidence {} outside {MIN_CONFIDENCE}..={MAX_CONFIDENCE}",
            verdict.confidence
        )));
    }
    if verdict.reasons.is_empty() {
        return Err(VerificationError::MalformedResponse(
            "response contains no reasons".to_string(),
        ));
    }
    Ok(verdict)
}
