use std::fmt;

use serde::{Deserialize, Serialize};

pub const SHARE_TITLE: &str = "AuthentiCheck AI Result";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductStatus {
    #[serde(rename = "Authentic")]
    Authentic,
    #[serde(rename = "Counterfeit")]
    Counterfeit,
}

impl ProductStatus {
    pub const ALL: [ProductStatus; 2] = [ProductStatus::Authentic, ProductStatus::Counterfeit];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Authentic => "Authentic",
            Self::Counterfeit => "Counterfeit",
        }
    }
}

impl fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One itemized finding behind a verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reason {
    pub title: String,
    pub details: String,
    pub passed: bool,
}

/// The model's verdict before an image reference is attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationVerdict {
    pub status: ProductStatus,
    pub confidence: f64,
    pub brand: String,
    pub model: String,
    pub reasons: Vec<Reason>,
}

impl VerificationVerdict {
    pub fn reason(&self, title: &str) -> Option<&Reason> {
        self.reasons.iter().find(|reason| reason.title == title)
    }

    pub fn with_image_url(self, image_url: impl Into<String>) -> VerificationResult {
        VerificationResult {
            status: self.status,
            confidence: self.confidence,
            brand: self.brand,
            model: self.model,
            reasons: self.reasons,
            image_url: image_url.into(),
        }
    }
}

/// A completed verification. Immutable once built; history entries share
/// this exact shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub status: ProductStatus,
    pub confidence: f64,
    pub brand: String,
    pub model: String,
    pub reasons: Vec<Reason>,
    pub image_url: String,
}

pub type HistoryEntry = VerificationResult;

impl VerificationResult {
    pub fn passed_count(&self) -> usize {
        self.reasons.iter().filter(|reason| reason.passed).count()
    }

    /// Text handed to an OS share sheet.
    pub fn share_text(&self) -> String {
        format!(
            "My {} {} was verified as {} with {}% confidence by AuthentiCheck AI.",
            self.brand,
            self.model,
            self.status,
            format_confidence(self.confidence)
        )
    }
}

pub fn format_confidence(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        let text = format!("{value:.2}");
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample() -> VerificationResult {
        VerificationResult {
            status: ProductStatus::Authentic,
            confidence: 87.0,
            brand: "Acme".to_string(),
            model: "Widget X".to_string(),
            reasons: vec![Reason {
                title: "Logo & Branding".to_string(),
                details: "Crisp logo".to_string(),
                passed: true,
            }],
            image_url: "file:///tmp/widget.png".to_string(),
        }
    }

    #[test]
    fn result_serializes_with_camel_case_image_url() -> anyhow::Result<()> {
        let value = serde_json::to_value(sample())?;
        assert_eq!(value["imageUrl"], json!("file:///tmp/widget.png"));
        assert_eq!(value["status"], json!("Authentic"));
        assert!(value.get("image_url").is_none());
        Ok(())
    }

    #[test]
    fn share_text_mentions_brand_model_and_confidence() {
        assert_eq!(
            sample().share_text(),
            "My Acme Widget X was verified as Authentic with 87% confidence by AuthentiCheck AI."
        );
    }

    #[test]
    fn passed_count_ignores_failed_reasons() {
        let mut result = sample();
        result.reasons.push(Reason {
            title: "Stitching".to_string(),
            details: "Uneven seams".to_string(),
            passed: false,
        });
        assert_eq!(result.passed_count(), 1);
    }

    #[test]
    fn fractional_confidence_is_trimmed() {
        assert_eq!(format_confidence(72.5), "72.5");
        assert_eq!(format_confidence(100.0), "100");
        assert_eq!(format_confidence(33.333), "33.33");
    }

    #[test]
    fn status_rejects_uppercase_wire_value() {
        let parsed = serde_json::from_value::<ProductStatus>(json!("AUTHENTIC"));
        assert!(parsed.is_err());
    }
}
