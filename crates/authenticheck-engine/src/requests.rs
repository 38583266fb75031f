use authenticheck_contracts::verification::verification_schema;
use authenticheck_contracts::VerificationError;
use serde_json::{json, Value};

use crate::media::EncodedImage;
use crate::providers::VerificationModel;

pub const BARCODE_LOOKUP_TITLE: &str = "Barcode Lookup";
pub const AUTHENTICITY_POINTERS_TITLE: &str = "Authenticity Pointers";
pub const OCR_REASON_TITLE: &str = "OCR & Text Analysis";

const IMAGE_PROMPT: &str = r#"You are an expert in authenticating products. Analyze the provided image to determine if the product is authentic or counterfeit. Your analysis must be thorough and follow these steps:

1.  **Product Identification:** First, identify the product's brand and model from the image.
2.  **Visual Authenticity Check:** Carefully examine key physical markers. This includes the quality and placement of the logo, stitching patterns, material texture and color, and overall build quality.
3.  **In-depth OCR Analysis:** Perform Optical Character Recognition (OCR) on all visible text on the product, its label, and packaging.
    - Extract every piece of text, including brand name, model, serial numbers, country of origin, and any descriptive text.
    - Critically compare the extracted text against known authentic product details. Pay close attention to:
        - **Typography:** Does the font match the brand's official font? Are the letter shapes, weight, and kerning correct?
        - **Spelling and Grammar:** Are there any spelling mistakes or grammatical errors? Counterfeits often have typos.
        - **Consistency:** Is the information consistent across the product?
4.  **Final Verdict:** Based on the combined visual and OCR analysis, provide a final verification status ('Authentic' or 'Counterfeit') and a confidence score (0-100).
5.  **Detailed Reasoning:** Formulate your response as a JSON object. The 'reasons' array must include specific, distinct points from your analysis. At least one of these reasons must be dedicated to the "OCR & Text Analysis," detailing your findings regarding the text, and whether this check passed or failed. Other reasons should cover visual aspects like "Logo & Branding" or "Material Quality".

Return ONLY the JSON object that conforms to the provided schema. Do not include any other text or markdown formatting."#;

const BARCODE_PROMPT_TEMPLATE: &str = r#"You are an expert product authenticator. A user has provided a barcode number: "{barcode}". Analyze this barcode to identify the product and assess its likely authenticity. Your analysis must be thorough and follow these steps:

1.  **Product Identification:** First, identify the product's brand and model associated with this barcode number. Use your knowledge base to determine what product this barcode corresponds to. If the barcode is invalid or doesn't correspond to a known product, state that clearly in your reasoning.
2.  **Authenticity Assessment:** Based on the identified product, provide an assessment. Since you don't have an image, your reasoning should be based on what a user should look for on the real product.
3.  **Final Verdict:** Provide a final verification status ('Authentic' or 'Counterfeit') and a confidence score (0-100). This score should be conservative, reflecting the lack of visual data. If you cannot identify the product, lean towards 'Counterfeit' or a low-confidence 'Authentic' status.
4.  **Detailed Reasoning:** Formulate your response as a JSON object. The 'reasons' array must include specific points. Exactly one reason must be titled "Barcode Lookup", detailing the product you identified (or failed to identify). Exactly one reason must be titled "Authenticity Pointers", giving the user tips on what to check for visually on the physical product (e.g., "Check for high-quality stitching on the logo").

Return ONLY the JSON object that conforms to the provided schema. Do not include any other text or markdown formatting."#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationKind {
    Image,
    Barcode,
}

impl VerificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Barcode => "barcode",
        }
    }
}

/// One schema-constrained generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationRequest {
    pub kind: VerificationKind,
    pub prompt: String,
    pub image: Option<EncodedImage>,
    pub response_schema: Value,
}

impl VerificationRequest {
    pub fn for_image(image: EncodedImage) -> Self {
        Self {
            kind: VerificationKind::Image,
            prompt: IMAGE_PROMPT.to_string(),
            image: Some(image),
            response_schema: verification_schema(),
        }
    }

    /// The barcode is interpolated verbatim.
    pub fn for_barcode(barcode: &str) -> Self {
        Self {
            kind: VerificationKind::Barcode,
            prompt: BARCODE_PROMPT_TEMPLATE.replace("{barcode}", barcode),
            image: None,
            response_schema: verification_schema(),
        }
    }

    /// Prompt part first, then the image part when present.
    pub fn parts(&self) -> Vec<Value> {
        let mut parts = vec![json!({ "text": self.prompt })];
        if let Some(image) = self.image.as_ref() {
            parts.push(image.to_part());
        }
        parts
    }

    pub fn generation_config(&self) -> Value {
        json!({
            "responseMimeType": "application/json",
            "responseSchema": self.response_schema,
        })
    }
}

/// Sends the image variant and returns the model's raw, unvalidated output.
pub fn verify_by_image(
    model: &dyn VerificationModel,
    image: EncodedImage,
) -> Result<String, VerificationError> {
    model.generate(&VerificationRequest::for_image(image))
}

/// Sends the barcode variant and returns the model's raw, unvalidated output.
pub fn verify_by_barcode(
    model: &dyn VerificationModel,
    barcode: &str,
) -> Result<String, VerificationError> {
    model.generate(&VerificationRequest::for_barcode(barcode))
}
