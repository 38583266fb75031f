//! Remote-model plumbing for AuthentiCheck: request shaping, providers,
//! the streaming chat session and the verification lifecycle.

pub mod config;
pub mod media;
pub mod orchestrator;
pub mod placeholder;
pub mod providers;
pub mod requests;
pub mod session;
mod util;

pub use config::EngineConfig;
pub use media::{encode_image_file, EncodedImage};
pub use orchestrator::{
    ImageSelection, InputMode, SubmitOutcome, Submission, VerificationForm, VerificationState,
    Verifier,
};
pub use providers::{
    build_chat_model, build_verification_model, ChatModel, ChatRequest, ChatStream,
    VerificationModel,
};
pub use requests::{verify_by_barcode, verify_by_image, VerificationKind, VerificationRequest};
pub use session::{ConversationSession, SessionState, TurnProgress};
