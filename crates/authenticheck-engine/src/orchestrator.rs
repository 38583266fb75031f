use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use authenticheck_contracts::events::{emit_optional, EventKind, EventPayload, EventWriter};
use authenticheck_contracts::history::{HistoryStore, KeyValueStore};
use authenticheck_contracts::verification::{normalize_verdict, HistoryEntry, VerificationResult};
use authenticheck_contracts::VerificationError;
use reqwest::Url;
use serde_json::Value;

use crate::media::encode_image_file;
use crate::placeholder::barcode_placeholder_url;
use crate::providers::VerificationModel;
use crate::requests::{verify_by_barcode, verify_by_image, VerificationKind};

pub const IMAGE_FAILURE_MESSAGE: &str = "Failed to get a valid response from the AI. Please try again.";
pub const BARCODE_FAILURE_MESSAGE: &str =
    "Failed to get a valid response from the AI for the barcode. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Image,
    Barcode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSelection {
    pub path: PathBuf,
    pub mime_type: Option<String>,
}

impl ImageSelection {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mime_type: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Image(ImageSelection),
    /// Trimmed, non-empty barcode text.
    Barcode(String),
}

impl Submission {
    pub fn kind(&self) -> VerificationKind {
        match self {
            Self::Image(_) => VerificationKind::Image,
            Self::Barcode(_) => VerificationKind::Barcode,
        }
    }
}

/// Input state owned by the caller. Values entered in one mode survive a
/// switch to the other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationForm {
    pub mode: InputMode,
    pub image: Option<ImageSelection>,
    pub barcode: String,
}

impl VerificationForm {
    pub fn select_image(&mut self, image: ImageSelection) {
        self.image = Some(image);
    }

    pub fn set_barcode(&mut self, barcode: impl Into<String>) {
        self.barcode = barcode.into();
    }

    pub fn set_mode(&mut self, mode: InputMode) {
        self.mode = mode;
    }

    /// The submission the active mode would send, if submitting is enabled.
    pub fn submission(&self) -> Option<Submission> {
        match self.mode {
            InputMode::Image => self.image.clone().map(Submission::Image),
            InputMode::Barcode => {
                let barcode = self.barcode.trim();
                if barcode.is_empty() {
                    None
                } else {
                    Some(Submission::Barcode(barcode.to_string()))
                }
            }
        }
    }

    pub fn can_submit(&self) -> bool {
        self.submission().is_some()
    }

    /// Clears entered values and returns to image mode.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VerificationState {
    Idle,
    Submitting,
    Succeeded(VerificationResult),
    Failed(String),
}

impl VerificationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Submitting => "submitting",
            Self::Succeeded(_) => "succeeded",
            Self::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The attempt ran to a terminal state, carried here.
    Completed(VerificationState),
    /// The machine was not idle; nothing changed.
    Ignored,
    /// A reset landed while the call was in flight; the outcome was dropped.
    Discarded,
}

struct Machine {
    state: VerificationState,
    generation: u64,
}

/// Per-attempt lifecycle: idle, submitting, then succeeded or failed until
/// an explicit reset. Shared across threads by reference.
pub struct Verifier {
    model: Arc<dyn VerificationModel>,
    history: Mutex<HistoryStore>,
    machine: Mutex<Machine>,
    events: Option<EventWriter>,
}

impl Verifier {
    pub fn new(model: Arc<dyn VerificationModel>, history: HistoryStore) -> Self {
        Self {
            model,
            history: Mutex::new(history),
            machine: Mutex::new(Machine {
                state: VerificationState::Idle,
                generation: 0,
            }),
            events: None,
        }
    }

    pub fn with_backend(
        model: Arc<dyn VerificationModel>,
        backend: impl KeyValueStore + 'static,
    ) -> Self {
        Self::new(model, HistoryStore::load(backend))
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn state(&self) -> VerificationState {
        self.machine().state.clone()
    }

    pub fn current_result(&self) -> Option<VerificationResult> {
        match &self.machine().state {
            VerificationState::Succeeded(result) => Some(result.clone()),
            _ => None,
        }
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self.machine().state, VerificationState::Submitting)
    }

    /// Runs one verification. Only accepted from idle; the remote call runs
    /// without holding any lock.
    pub fn submit(&self, submission: Submission) -> SubmitOutcome {
        let generation = {
            let mut machine = self.machine();
            if machine.state != VerificationState::Idle {
                tracing::debug!(state = machine.state.as_str(), "submission ignored");
                return SubmitOutcome::Ignored;
            }
            machine.state = VerificationState::Submitting;
            machine.generation += 1;
            machine.generation
        };

        let kind = submission.kind();
        let mut payload = EventPayload::new();
        payload.insert("kind".to_string(), Value::String(kind.as_str().to_string()));
        payload.insert(
            "model".to_string(),
            Value::String(self.model.name().to_string()),
        );
        emit_optional(self.events.as_ref(), EventKind::VerificationStarted, payload);

        let outcome = self.run(&submission);

        let mut machine = self.machine();
        if machine.generation != generation || machine.state != VerificationState::Submitting {
            tracing::info!(kind = kind.as_str(), "verification finished after reset; discarded");
            let mut payload = EventPayload::new();
            payload.insert("kind".to_string(), Value::String(kind.as_str().to_string()));
            emit_optional(self.events.as_ref(), EventKind::VerificationDiscarded, payload);
            return SubmitOutcome::Discarded;
        }

        machine.state = match outcome {
            Ok(result) => {
                self.history_store().append(result.clone());
                let mut payload = EventPayload::new();
                payload.insert("kind".to_string(), Value::String(kind.as_str().to_string()));
                payload.insert(
                    "status".to_string(),
                    Value::String(result.status.as_str().to_string()),
                );
                payload.insert("confidence".to_string(), Value::from(result.confidence));
                emit_optional(self.events.as_ref(), EventKind::VerificationSucceeded, payload);
                VerificationState::Succeeded(result)
            }
            Err(err) => {
                tracing::warn!(kind = kind.as_str(), error = %err, "verification failed");
                let mut payload = EventPayload::new();
                payload.insert("kind".to_string(), Value::String(kind.as_str().to_string()));
                payload.insert("error".to_string(), Value::String(err.to_string()));
                emit_optional(self.events.as_ref(), EventKind::VerificationFailed, payload);
                VerificationState::Failed(failure_message(kind, &err))
            }
        };
        SubmitOutcome::Completed(machine.state.clone())
    }

    /// Returns to idle from any state. An in-flight call keeps running but
    /// its outcome will be discarded.
    pub fn reset(&self) {
        let mut machine = self.machine();
        machine.generation += 1;
        machine.state = VerificationState::Idle;
    }

    pub fn history_entries(&self) -> Vec<HistoryEntry> {
        self.history_store().entries().to_vec()
    }

    pub fn clear_history(&self) {
        let mut history = self.history_store();
        let cleared = history.len();
        history.clear();
        let mut payload = EventPayload::new();
        payload.insert("entries".to_string(), Value::from(cleared as u64));
        emit_optional(self.events.as_ref(), EventKind::HistoryCleared, payload);
    }

    fn run(&self, submission: &Submission) -> Result<VerificationResult, VerificationError> {
        match submission {
            Submission::Image(selection) => {
                let image = encode_image_file(&selection.path, selection.mime_type.as_deref())?;
                let raw = verify_by_image(self.model.as_ref(), image)?;
                Ok(normalize_verdict(&raw)?.with_image_url(file_url(&selection.path)))
            }
            Submission::Barcode(barcode) => {
                let raw = verify_by_barcode(self.model.as_ref(), barcode)?;
                Ok(normalize_verdict(&raw)?.with_image_url(barcode_placeholder_url()))
            }
        }
    }

    fn machine(&self) -> MutexGuard<'_, Machine> {
        self.machine
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn history_store(&self) -> MutexGuard<'_, HistoryStore> {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn failure_message(kind: VerificationKind, err: &VerificationError) -> String {
    match (err, kind) {
        (VerificationError::Encoding(_), _) => err.to_string(),
        (_, VerificationKind::Image) => IMAGE_FAILURE_MESSAGE.to_string(),
        (_, VerificationKind::Barcode) => BARCODE_FAILURE_MESSAGE.to_string(),
    }
}

/// Displayable reference for an uploaded file.
fn file_url(path: &Path) -> String {
    let absolute = path
        .canonicalize()
        .unwrap_or_else(|_| path.to_path_buf());
    Url::from_file_path(&absolute)
        .map(String::from)
        .unwrap_or_else(|_| absolute.display().to_string())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    use authenticheck_contracts::history::{MemoryKeyValueStore, HISTORY_KEY};
    use authenticheck_contracts::verification::{HistoryEntry, ProductStatus};
    use authenticheck_contracts::VerificationError;
    use serde_json::json;

    use super::*;
    use crate::requests::VerificationRequest;

    struct StubModel {
        reply: Result<String, VerificationError>,
        prompts: Mutex<Vec<String>>,
    }

    impl StubModel {
        fn replying(reply: Result<String, VerificationError>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    impl VerificationModel for StubModel {
        fn name(&self) -> &str {
            "stub"
        }

        fn generate(&self, request: &VerificationRequest) -> Result<String, VerificationError> {
            if let Ok(mut prompts) = self.prompts.lock() {
                prompts.push(request.prompt.clone());
            }
            self.reply.clone()
        }
    }

    /// Signals when a call starts, then blocks until released.
    struct GatedModel {
        started: Mutex<Sender<()>>,
        release: Mutex<Receiver<()>>,
        reply: String,
    }

    impl VerificationModel for GatedModel {
        fn name(&self) -> &str {
            "gated"
        }

        fn generate(&self, _request: &VerificationRequest) -> Result<String, VerificationError> {
            if let Ok(started) = self.started.lock() {
                let _ = started.send(());
            }
            if let Ok(release) = self.release.lock() {
                let _ = release.recv_timeout(Duration::from_secs(10));
            }
            Ok(self.reply.clone())
        }
    }

    fn widget_verdict() -> String {
        json!({
            "status": "Authentic",
            "confidence": 87,
            "brand": "Acme",
            "model": "Widget X",
            "reasons": [
                {"title": "Barcode Lookup", "details": "Matches Acme catalog.", "passed": true},
                {"title": "Authenticity Pointers", "details": "Check the hologram.", "passed": true}
            ]
        })
        .to_string()
    }

    fn gated(reply: String) -> (Arc<GatedModel>, Receiver<()>, Sender<()>) {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let model = Arc::new(GatedModel {
            started: Mutex::new(started_tx),
            release: Mutex::new(release_rx),
            reply,
        });
        (model, started_rx, release_tx)
    }

    #[test]
    fn barcode_submission_ends_in_history_with_placeholder() -> anyhow::Result<()> {
        let model = StubModel::replying(Ok(widget_verdict()));
        let backend = MemoryKeyValueStore::new();
        let verifier = Verifier::with_backend(model.clone(), backend.clone());

        let outcome = verifier.submit(Submission::Barcode("036000291452".to_string()));
        let SubmitOutcome::Completed(VerificationState::Succeeded(result)) = outcome else {
            anyhow::bail!("unexpected outcome: {outcome:?}");
        };

        assert!(model.prompts.lock().map_err(|_| anyhow::anyhow!("poisoned"))?[0]
            .contains("\"036000291452\""));
        assert_eq!(result.status, ProductStatus::Authentic);
        assert_eq!(result.confidence, 87.0);
        assert_eq!(result.brand, "Acme");
        assert_eq!(result.model, "Widget X");
        assert!(result.image_url.starts_with("data:image/png;base64,"));
        assert_eq!(verifier.current_result(), Some(result.clone()));

        let history = verifier.history_entries();
        assert_eq!(history.first(), Some(&result));
        let stored = backend.raw(HISTORY_KEY).unwrap_or_default();
        let persisted: Vec<HistoryEntry> = serde_json::from_str(&stored)?;
        assert_eq!(persisted, vec![result]);
        Ok(())
    }

    #[test]
    fn malformed_reply_fails_and_leaves_history_alone() {
        let model = StubModel::replying(Ok("{not json".to_string()));
        let verifier = Verifier::with_backend(model, MemoryKeyValueStore::new());

        let outcome = verifier.submit(Submission::Barcode("12345".to_string()));
        assert_eq!(
            outcome,
            SubmitOutcome::Completed(VerificationState::Failed(
                BARCODE_FAILURE_MESSAGE.to_string()
            ))
        );
        assert!(verifier.history_entries().is_empty());
        assert!(verifier.current_result().is_none());
    }

    #[test]
    fn request_failure_on_image_uses_generic_message() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("bag.png");
        fs::write(&path, b"png-bytes")?;
        let model = StubModel::replying(Err(VerificationError::Request("503".to_string())));
        let verifier = Verifier::with_backend(model, MemoryKeyValueStore::new());

        verifier.submit(Submission::Image(ImageSelection::new(&path)));
        assert_eq!(
            verifier.state(),
            VerificationState::Failed(IMAGE_FAILURE_MESSAGE.to_string())
        );
        Ok(())
    }

    #[test]
    fn unreadable_image_shows_encoder_message() {
        let model = StubModel::replying(Ok(widget_verdict()));
        let verifier = Verifier::with_backend(model.clone(), MemoryKeyValueStore::new());

        verifier.submit(Submission::Image(ImageSelection::new("/no/such/photo.jpg")));
        let VerificationState::Failed(message) = verifier.state() else {
            panic!("expected failure, got {:?}", verifier.state());
        };
        assert!(message.starts_with("could not read image"), "{message}");
        assert!(model.prompts.lock().map(|p| p.is_empty()).unwrap_or(false));
    }

    #[test]
    fn image_submission_attaches_file_url() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("sneaker.jpg");
        fs::write(&path, b"jpeg-bytes")?;
        let model = StubModel::replying(Ok(widget_verdict()));
        let verifier = Verifier::with_backend(model, MemoryKeyValueStore::new());

        verifier.submit(Submission::Image(ImageSelection::new(&path)));
        let result = verifier
            .current_result()
            .ok_or_else(|| anyhow::anyhow!("no result"))?;
        assert!(result.image_url.starts_with("file://"));
        assert!(result.image_url.ends_with("sneaker.jpg"));
        Ok(())
    }

    #[test]
    fn terminal_states_need_reset_before_resubmitting() {
        let model = StubModel::replying(Ok(widget_verdict()));
        let verifier = Verifier::with_backend(model, MemoryKeyValueStore::new());

        verifier.submit(Submission::Barcode("1".to_string()));
        assert_eq!(
            verifier.submit(Submission::Barcode("2".to_string())),
            SubmitOutcome::Ignored
        );
        assert_eq!(verifier.history_entries().len(), 1);

        verifier.reset();
        assert_eq!(verifier.state(), VerificationState::Idle);
        verifier.submit(Submission::Barcode("2".to_string()));
        assert_eq!(verifier.history_entries().len(), 2);
    }

    #[test]
    fn duplicate_submission_while_in_flight_is_ignored() -> anyhow::Result<()> {
        let (model, started, release) = gated(widget_verdict());
        let verifier = Arc::new(Verifier::with_backend(model, MemoryKeyValueStore::new()));

        let worker = {
            let verifier = Arc::clone(&verifier);
            thread::spawn(move || verifier.submit(Submission::Barcode("1".to_string())))
        };
        started.recv_timeout(Duration::from_secs(10))?;
        assert!(verifier.is_submitting());
        assert_eq!(
            verifier.submit(Submission::Barcode("2".to_string())),
            SubmitOutcome::Ignored
        );
        assert_eq!(verifier.state(), VerificationState::Submitting);

        release.send(())?;
        let outcome = worker
            .join()
            .map_err(|_| anyhow::anyhow!("worker panicked"))?;
        assert!(matches!(
            outcome,
            SubmitOutcome::Completed(VerificationState::Succeeded(_))
        ));
        assert_eq!(verifier.history_entries().len(), 1);
        Ok(())
    }

    #[test]
    fn reset_while_in_flight_discards_late_result() -> anyhow::Result<()> {
        let (model, started, release) = gated(widget_verdict());
        let verifier = Arc::new(Verifier::with_backend(model, MemoryKeyValueStore::new()));

        let worker = {
            let verifier = Arc::clone(&verifier);
            thread::spawn(move || verifier.submit(Submission::Barcode("1".to_string())))
        };
        started.recv_timeout(Duration::from_secs(10))?;
        verifier.reset();
        release.send(())?;

        let outcome = worker
            .join()
            .map_err(|_| anyhow::anyhow!("worker panicked"))?;
        assert_eq!(outcome, SubmitOutcome::Discarded);
        assert_eq!(verifier.state(), VerificationState::Idle);
        assert!(verifier.history_entries().is_empty());
        Ok(())
    }

    #[test]
    fn clear_history_empties_store() {
        let model = StubModel::replying(Ok(widget_verdict()));
        let verifier = Verifier::with_backend(model, MemoryKeyValueStore::new());
        verifier.submit(Submission::Barcode("1".to_string()));
        verifier.clear_history();
        assert!(verifier.history_entries().is_empty());
    }

    #[test]
    fn form_reset_returns_to_image_mode() {
        let mut form = VerificationForm::default();
        form.set_mode(InputMode::Barcode);
        form.set_barcode("036000291452");
        form.reset();
        assert_eq!(form, VerificationForm::default());
        assert_eq!(form.mode, InputMode::Image);
    }

    #[test]
    fn form_only_submits_when_enabled() {
        let mut form = VerificationForm::default();
        assert!(!form.can_submit());

        form.set_mode(InputMode::Barcode);
        form.set_barcode("   ");
        assert!(form.submission().is_none());
        form.set_barcode("  0360 ");
        assert_eq!(form.submission(), Some(Submission::Barcode("0360".to_string())));

        form.set_mode(InputMode::Image);
        assert!(!form.can_submit());
        form.select_image(ImageSelection::new("bag.png").with_mime_type("image/png"));
        assert!(form.can_submit());

        form.set_mode(InputMode::Barcode);
        assert_eq!(form.barcode, "  0360 ");
        form.reset();
        assert_eq!(form.mode, InputMode::Image);
        assert!(form.image.is_none());
        assert!(form.barcode.is_empty());
    }
}
