mod message;
mod persona;

pub use message::{ChatMessage, ChatPart, Role};
pub use persona::{APOLOGY_TEXT, ASSISTANT_INSTRUCTION, ASSISTANT_NAME, GREETING_INPUT};
