use std::sync::Arc;

use authenticheck_contracts::chat::{ChatMessage, APOLOGY_TEXT, ASSISTANT_INSTRUCTION, GREETING_INPUT};
use authenticheck_contracts::events::{emit_optional, EventKind, EventPayload, EventWriter};
use authenticheck_contracts::{ChatError, StreamError};
use serde_json::Value;

use crate::providers::{ChatModel, ChatRequest, ChatStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    GreetingInFlight,
    Idle,
    TurnInFlight,
}

/// What one `poll` did to the in-flight turn. `index` is the transcript
/// position of the model message, fixed for the whole turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnProgress {
    Chunk { index: usize, chunk: String },
    Finished { index: usize },
    Failed { index: usize, error: StreamError },
}

impl TurnProgress {
    pub fn index(&self) -> usize {
        match self {
            Self::Chunk { index, .. } | Self::Finished { index } | Self::Failed { index, .. } => {
                *index
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Chunk { .. })
    }
}

struct PendingTurn {
    index: usize,
    input: String,
    stream: Option<ChatStream>,
    open_error: Option<StreamError>,
    chunks: usize,
}

/// One open/close cycle of the chat assistant.
///
/// Opening sends a hidden "Hello" turn and shows the full greeting as one
/// message. Later turns stream into a placeholder model message that keeps
/// its transcript index while its text grows. Only one turn may be in
/// flight. Closing discards everything.
pub struct ConversationSession {
    model: Arc<dyn ChatModel>,
    instruction: String,
    transcript: Vec<ChatMessage>,
    remote_history: Vec<ChatMessage>,
    state: SessionState,
    pending: Option<PendingTurn>,
    events: Option<EventWriter>,
}

impl ConversationSession {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self::with_instruction(model, ASSISTANT_INSTRUCTION)
    }

    pub fn with_instruction(model: Arc<dyn ChatModel>, instruction: &str) -> Self {
        Self {
            model,
            instruction: instruction.to_string(),
            transcript: Vec::new(),
            remote_history: Vec::new(),
            state: SessionState::Uninitialized,
            pending: None,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    /// Constructs the session and waits for the whole greeting.
    pub fn open(model: Arc<dyn ChatModel>, events: Option<EventWriter>) -> Self {
        let mut session = Self::new(model);
        session.events = events;
        session.greet();
        session
    }

    /// Issues the synthetic first turn. No-op unless uninitialized.
    pub fn greet(&mut self) {
        if self.state != SessionState::Uninitialized {
            return;
        }
        self.state = SessionState::GreetingInFlight;
        let request = self.request_for(GREETING_INPUT);
        let greeting = self
            .model
            .stream_reply(&request)
            .and_then(|stream| stream.collect::<Result<String, StreamError>>());

        let mut payload = EventPayload::new();
        payload.insert("model".to_string(), Value::String(self.model.name().to_string()));
        match greeting {
            Ok(text) => {
                self.remote_history.push(ChatMessage::user(GREETING_INPUT));
                self.remote_history.push(ChatMessage::model(text.clone()));
                self.transcript = vec![ChatMessage::model(text)];
                payload.insert("greeting".to_string(), Value::Bool(true));
            }
            Err(err) => {
                tracing::warn!(error = %err, "chat greeting failed");
                self.transcript = vec![ChatMessage::model(APOLOGY_TEXT)];
                payload.insert("greeting".to_string(), Value::Bool(false));
                payload.insert("error".to_string(), Value::String(err.0));
            }
        }
        self.state = SessionState::Idle;
        emit_optional(self.events.as_ref(), EventKind::ChatOpened, payload);
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        matches!(
            self.state,
            SessionState::GreetingInFlight | SessionState::TurnInFlight
        )
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    /// Starts a turn: appends the user message and an empty model message
    /// and opens the reply stream. Returns the model message's index.
    pub fn submit(&mut self, input: &str) -> Result<usize, ChatError> {
        if self.state != SessionState::Idle {
            return Err(ChatError::Busy);
        }
        if input.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        self.transcript.push(ChatMessage::user(input));
        self.transcript.push(ChatMessage::model(""));
        let index = self.transcript.len() - 1;

        let request = self.request_for(input);
        let (stream, open_error) = match self.model.stream_reply(&request) {
            Ok(stream) => (Some(stream), None),
            Err(err) => (None, Some(err)),
        };
        self.pending = Some(PendingTurn {
            index,
            input: input.to_string(),
            stream,
            open_error,
            chunks: 0,
        });
        self.state = SessionState::TurnInFlight;
        Ok(index)
    }

    /// Applies the next fragment of the in-flight turn. `None` when no turn
    /// is in flight.
    pub fn poll(&mut self) -> Option<TurnProgress> {
        let pending = self.pending.as_mut()?;
        if let Some(err) = pending.open_error.take() {
            return Some(self.fail_turn(err));
        }
        let next = pending.stream.as_mut().and_then(Iterator::next);
        match next {
            Some(Ok(chunk)) => {
                pending.chunks += 1;
                let index = pending.index;
                if let Some(message) = self.transcript.get_mut(index) {
                    message.push_text(&chunk);
                }
                Some(TurnProgress::Chunk { index, chunk })
            }
            Some(Err(err)) => Some(self.fail_turn(err)),
            None => Some(self.finish_turn()),
        }
    }

    /// Drives a whole turn, handing every step to `observer` together with
    /// the model message as it currently reads.
    pub fn send<F>(&mut self, input: &str, mut observer: F) -> Result<TurnProgress, ChatError>
    where
        F: FnMut(&TurnProgress, &ChatMessage),
    {
        self.submit(input)?;
        loop {
            let Some(progress) = self.poll() else {
                return Err(ChatError::Busy);
            };
            if let Some(message) = self.transcript.get(progress.index()) {
                observer(&progress, message);
            }
            if progress.is_terminal() {
                return Ok(progress);
            }
        }
    }

    /// Ends the session and hands back its transcript.
    pub fn close(self) -> Vec<ChatMessage> {
        let mut payload = EventPayload::new();
        payload.insert(
            "messages".to_string(),
            Value::Number((self.transcript.len() as u64).into()),
        );
        emit_optional(self.events.as_ref(), EventKind::ChatClosed, payload);
        self.transcript
    }

    fn request_for(&self, message: &str) -> ChatRequest {
        ChatRequest {
            system_instruction: self.instruction.clone(),
            history: self.remote_history.clone(),
            message: message.to_string(),
        }
    }

    fn finish_turn(&mut self) -> TurnProgress {
        let Some(pending) = self.pending.take() else {
            self.state = SessionState::Idle;
            return TurnProgress::Finished { index: 0 };
        };
        let reply = self
            .transcript
            .get(pending.index)
            .map(|message| message.text().to_string())
            .unwrap_or_default();
        self.remote_history.push(ChatMessage::user(pending.input));
        self.remote_history.push(ChatMessage::model(reply));
        self.state = SessionState::Idle;

        let mut payload = EventPayload::new();
        payload.insert(
            "chunks".to_string(),
            Value::Number((pending.chunks as u64).into()),
        );
        emit_optional(self.events.as_ref(), EventKind::ChatTurnFinished, payload);
        TurnProgress::Finished {
            index: pending.index,
        }
    }

    fn fail_turn(&mut self, error: StreamError) -> TurnProgress {
        let index = self
            .pending
            .take()
            .map(|pending| pending.index)
            .unwrap_or_else(|| self.transcript.len().saturating_sub(1));
        tracing::warn!(error = %error, "chat turn failed");
        if let Some(message) = self.transcript.get_mut(index) {
            message.set_text(APOLOGY_TEXT);
        }
        self.state = SessionState::Idle;

        let mut payload = EventPayload::new();
        payload.insert("error".to_string(), Value::String(error.0.clone()));
        emit_optional(self.events.as_ref(), EventKind::ChatTurnFailed, payload);
        TurnProgress::Failed { index, error }
    }
}
