mod normalizer;
mod result;
mod schema;

pub use normalizer::{normalize_verdict, normalize_verdict_value, MAX_CONFIDENCE, MIN_CONFIDENCE};
pub use result::{
    format_confidence, HistoryEntry, ProductStatus, Reason, VerificationResult,
    VerificationVerdict, SHARE_TITLE,
};
pub use schema::{validate, verification_schema, SchemaViolation};
