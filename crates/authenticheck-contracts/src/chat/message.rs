use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPart {
    pub text: String,
}

/// One transcript entry. Always carries exactly one text part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub parts: Vec<ChatPart>,
}

impl ChatMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![ChatPart { text: text.into() }],
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::new(Role::Model, text)
    }

    pub fn text(&self) -> &str {
        self.parts.first().map(|part| part.text.as_str()).unwrap_or("")
    }

    pub fn push_text(&mut self, chunk: &str) {
        match self.parts.first_mut() {
            Some(part) => part.text.push_str(chunk),
            None => self.parts.push(ChatPart {
                text: chunk.to_string(),
            }),
        }
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.parts = vec![ChatPart { text: text.into() }];
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ChatMessage, Role};

    #[test]
    fn serializes_in_wire_shape() -> anyhow::Result<()> {
        let value = serde_json::to_value(ChatMessage::model("Hi"))?;
        assert_eq!(value, json!({"role": "model", "parts": [{"text": "Hi"}]}));
        Ok(())
    }

    #[test]
    fn push_text_grows_single_part() {
        let mut message = ChatMessage::model("");
        message.push_text("Hi");
        message.push_text(" there");
        assert_eq!(message.parts.len(), 1);
        assert_eq!(message.text(), "Hi there");
        assert_eq!(message.role, Role::Model);
    }
}
