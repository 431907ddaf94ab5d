//! Conversation session: log, preferences, draft input and the send cycle
//!
//! A send is split in two so a front end can run the network call on its own
//! task: [`Session::begin_send`] validates and records the user turn, and
//! [`Session::finish_send`] records whatever came back. [`Session::send`]
//! runs both around a [`ChatBackend`] call.

use std::sync::Arc;

use crate::ai::{ChatBackend, GeminiError, GenerateRequest, GenerateResponse};
use crate::history::LogStore;
use crate::preferences::Preferences;
use crate::speech::Speaker;
use crate::state::{AttachedImage, Role, Turn, TurnContent};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendPhase {
    Idle,
    Sending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejected {
    /// No text and no image
    Empty,
    /// A request is already in flight
    InFlight,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Rejected(Rejected),
    Succeeded(Turn),
    Failed(Turn),
}

pub fn error_text(err: &GeminiError) -> String {
    format!("An error occurred: {err}")
}

pub struct Session {
    log: LogStore,
    preferences: Preferences,
    speaker: Box<dyn Speaker>,
    draft: String,
    attachment: Option<AttachedImage>,
    phase: SendPhase,
}

impl Session {
    pub fn new(store: Arc<Store>, speaker: Box<dyn Speaker>) -> Self {
        Self {
            log: LogStore::load(store.clone()),
            preferences: Preferences::load(store),
            speaker,
            draft: String::new(),
            attachment: None,
            phase: SendPhase::Idle,
        }
    }

    pub fn log(&self) -> &LogStore {
        &self.log
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn speaker_mut(&mut self) -> &mut dyn Speaker {
        self.speaker.as_mut()
    }

    pub fn phase(&self) -> SendPhase {
        self.phase
    }

    pub fn is_sending(&self) -> bool {
        self.phase == SendPhase::Sending
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut String {
        &mut self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn attachment(&self) -> Option<&AttachedImage> {
        self.attachment.as_ref()
    }

    pub fn attach(&mut self, image: AttachedImage) {
        self.attachment = Some(image);
    }

    pub fn remove_attachment(&mut self) {
        self.attachment = None;
    }

    /// Validate the draft, record the user turn and build the request.
    pub fn begin_send(&mut self) -> Result<GenerateRequest, Rejected> {
        let prompt = self.draft.trim().to_string();
        if prompt.is_empty() && self.attachment.is_none() {
            return Err(Rejected::Empty);
        }
        if self.phase == SendPhase::Sending {
            return Err(Rejected::InFlight);
        }

        self.speaker.cancel();

        let content = TurnContent {
            text: prompt.clone(),
            image: self.attachment.as_ref().map(AttachedImage::data_url),
        };
        self.log.append(Role::User, content);

        self.phase = SendPhase::Sending;
        log::info!("Sending turn {} to model", self.log.len());
        Ok(GenerateRequest::new(&prompt, self.attachment.as_ref()))
    }

    /// Record the result of the request started by [`Session::begin_send`].
    pub fn finish_send(&mut self, result: Result<GenerateResponse, GeminiError>) -> SendOutcome {
        let outcome = match result {
            Ok(response) => {
                let text = response.text_or_fallback();
                let turn = self.log.append(Role::Model, TurnContent::text(text.clone()));
                if self.preferences.speech_enabled() {
                    self.speaker.speak(&text);
                }
                SendOutcome::Succeeded(turn)
            }
            Err(e) => {
                log::warn!("Request failed: {e}");
                let turn = self.log.append(Role::Model, TurnContent::text(error_text(&e)));
                SendOutcome::Failed(turn)
            }
        };

        self.draft.clear();
        self.attachment = None;
        self.phase = SendPhase::Idle;
        outcome
    }

    pub async fn send<B: ChatBackend + ?Sized>(&mut self, backend: &B) -> SendOutcome {
        let request = match self.begin_send() {
            Ok(request) => request,
            Err(reason) => return SendOutcome::Rejected(reason),
        };
        let result = backend.generate(&request).await;
        self.finish_send(result)
    }

    pub fn clear(&mut self) {
        self.speaker.cancel();
        self.log.clear();
    }

    pub fn set_dark_mode(&mut self, on: bool) {
        self.preferences.set_dark_mode(on);
    }

    pub fn set_speech_enabled(&mut self, on: bool) {
        self.preferences.set_speech_enabled(on);
        if !on {
            self.speaker.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::FALLBACK_RESPONSE;
    use crate::speech::SpeechEvent;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays a canned result and counts calls.
    struct FakeBackend {
        result: Box<dyn Fn() -> Result<GenerateResponse, GeminiError> + Send + Sync>,
        calls: AtomicUsize,
        last_request: Mutex<Option<GenerateRequest>>,
    }

    impl FakeBackend {
        fn replying(value: serde_json::Value) -> Self {
            Self::with(move || Ok(serde_json::from_value(value.clone()).unwrap()))
        }

        fn with(f: impl Fn() -> Result<GenerateResponse, GeminiError> + Send + Sync + 'static) -> Self {
            Self {
                result: Box::new(f),
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatBackend for FakeBackend {
        async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, GeminiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request.clone());
            (self.result)()
        }
    }

    #[derive(Default)]
    struct Calls {
        spoken: Vec<String>,
        cancels: usize,
    }

    struct RecordingSpeaker(Arc<Mutex<Calls>>);

    impl Speaker for RecordingSpeaker {
        fn speak(&mut self, text: &str) {
            self.0.lock().unwrap().spoken.push(text.to_string());
        }
        fn pause(&mut self) {}
        fn resume(&mut self) {}
        fn cancel(&mut self) {
            self.0.lock().unwrap().cancels += 1;
        }
        fn is_speaking(&mut self) -> bool {
            false
        }
        fn poll_events(&mut self) -> Vec<SpeechEvent> {
            Vec::new()
        }
    }

    fn session() -> (Session, Arc<Mutex<Calls>>) {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let store = Arc::new(Store::open_in_memory().unwrap());
        let session = Session::new(store, Box::new(RecordingSpeaker(calls.clone())));
        (session, calls)
    }

    fn texts(session: &Session) -> Vec<(Role, String)> {
        session
            .log()
            .all()
            .iter()
            .map(|t| (t.role, t.content.text.clone()))
            .collect()
    }

    fn hi() -> serde_json::Value {
        json!({"candidates": [{"content": {"parts": [{"text": "hi"}]}}]})
    }

    #[tokio::test]
    async fn test_empty_send_is_noop() {
        let (mut session, _) = session();
        let backend = FakeBackend::replying(hi());

        session.set_draft("   ");
        let outcome = session.send(&backend).await;

        assert_eq!(outcome, SendOutcome::Rejected(Rejected::Empty));
        assert_eq!(backend.calls(), 0);
        assert!(session.log().is_empty());
        assert_eq!(session.phase(), SendPhase::Idle);
    }

    #[tokio::test]
    async fn test_successful_send() {
        let (mut session, _) = session();
        let backend = FakeBackend::replying(hi());

        session.set_draft("hello");
        let outcome = session.send(&backend).await;

        assert!(matches!(outcome, SendOutcome::Succeeded(ref t) if t.content.text == "hi"));
        assert_eq!(
            texts(&session),
            vec![(Role::User, "hello".to_string()), (Role::Model, "hi".to_string())]
        );
        assert_eq!(backend.calls(), 1);
        assert_eq!(session.draft(), "");
        assert_eq!(session.phase(), SendPhase::Idle);
    }

    #[tokio::test]
    async fn test_prompt_is_trimmed() {
        let (mut session, _) = session();
        let backend = FakeBackend::replying(hi());

        session.set_draft("  hello \n");
        session.send(&backend).await;

        let request = backend.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"contents": [{"parts": [{"text": "hello"}]}]})
        );
        assert_eq!(session.log().all()[0].content.text, "hello");
    }

    #[tokio::test]
    async fn test_no_candidates_gives_fallback() {
        let (mut session, _) = session();
        let backend = FakeBackend::replying(json!({"candidates": []}));

        session.set_draft("x");
        session.send(&backend).await;

        assert_eq!(session.log().all()[1].content.text, FALLBACK_RESPONSE);
    }

    #[tokio::test]
    async fn test_api_error_becomes_model_turn() {
        let (mut session, calls) = session();
        session.set_speech_enabled(true);
        let backend = FakeBackend::with(|| {
            Err(GeminiError::Api {
                status: 429,
                message: "quota exceeded".to_string(),
            })
        });

        session.set_draft("x");
        let outcome = session.send(&backend).await;

        assert!(matches!(outcome, SendOutcome::Failed(_)));
        let last = session.log().all().last().unwrap();
        assert_eq!(last.role, Role::Model);
        assert_eq!(last.content.text, "An error occurred: quota exceeded");
        assert!(calls.lock().unwrap().spoken.is_empty());
        assert_eq!(session.phase(), SendPhase::Idle);
    }

    #[tokio::test]
    async fn test_failure_releases_lock_for_next_send() {
        let (mut session, _) = session();
        let failing = FakeBackend::with(|| Err(GeminiError::Network("connection refused".to_string())));
        let working = FakeBackend::replying(hi());

        session.set_draft("one");
        session.send(&failing).await;
        session.set_draft("two");
        let outcome = session.send(&working).await;

        assert!(matches!(outcome, SendOutcome::Succeeded(_)));
        assert_eq!(session.log().len(), 4);
        assert_eq!(session.log().all()[1].content.text, "An error occurred: connection refused");
    }

    #[tokio::test]
    async fn test_second_send_while_pending_is_ignored() {
        let (mut session, _) = session();
        let backend = FakeBackend::replying(hi());

        session.set_draft("first");
        let request = session.begin_send().unwrap();
        let len = session.log().len();

        session.set_draft("second");
        let outcome = session.send(&backend).await;

        assert_eq!(outcome, SendOutcome::Rejected(Rejected::InFlight));
        assert_eq!(session.log().len(), len);
        assert_eq!(backend.calls(), 0);

        let result = backend.generate(&request).await;
        session.finish_send(result);
        assert_eq!(session.log().len(), 2);
        assert_eq!(session.phase(), SendPhase::Idle);
    }

    #[tokio::test]
    async fn test_image_turn() {
        let (mut session, _) = session();
        let backend = FakeBackend::replying(hi());

        session.attach(AttachedImage::from_bytes("image/png", b"abc"));
        let outcome = session.send(&backend).await;

        assert!(matches!(outcome, SendOutcome::Succeeded(_)));
        let user = &session.log().all()[0];
        assert_eq!(user.content.text, "");
        assert_eq!(user.content.image.as_deref(), Some("data:image/png;base64,YWJj"));
        assert!(session.attachment().is_none());

        let request = backend.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.contents[0].parts.len(), 1);
    }

    #[tokio::test]
    async fn test_speaks_only_when_enabled() {
        let (mut session, calls) = session();
        let backend = FakeBackend::replying(hi());

        session.set_draft("quiet");
        session.send(&backend).await;
        assert!(calls.lock().unwrap().spoken.is_empty());

        session.set_speech_enabled(true);
        session.set_draft("loud");
        session.send(&backend).await;
        assert_eq!(calls.lock().unwrap().spoken, vec!["hi".to_string()]);
    }

    #[test]
    fn test_clear_cancels_speech() {
        let (mut session, calls) = session();
        session.set_draft("hello");
        session.begin_send().unwrap();
        session.finish_send(Ok(GenerateResponse::default()));

        let before = calls.lock().unwrap().cancels;
        session.clear();

        assert!(session.log().is_empty());
        assert_eq!(calls.lock().unwrap().cancels, before + 1);
    }

    #[test]
    fn test_disabling_speech_cancels() {
        let (mut session, calls) = session();
        session.set_speech_enabled(true);
        session.set_speech_enabled(false);
        assert_eq!(calls.lock().unwrap().cancels, 1);
        assert!(!session.preferences().speech_enabled());
    }
}
