use jeevaverse_core::{
    AttachedImage, Config, GeminiClient, Session, SpeechEvent, TurnContent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Single-line prompt shown over the chat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Popup {
    AttachPath,
    ApiKey,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub session: Session,
    pub client: GeminiClient,
    pub config: Config,

    // Input cursor (char index into the session draft)
    pub cursor: usize,

    // Chat view
    pub chat_scroll: u16,
    pub chat_height: u16, // Inner height of the chat area, for scroll calculations
    pub chat_width: u16,  // Inner width of the chat area, for wrap calculations
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // History panel
    pub show_history: bool,
    pub history_scroll: u16,

    // Speech controls are visible between Started and Ended/Failed
    pub speech_active: bool,

    // Popup input
    pub popup: Option<Popup>,
    pub popup_input: String,
    pub popup_cursor: usize,

    /// One-line notice in the footer, cleared on the next key press
    pub status: Option<String>,
}

impl App {
    pub fn new(config: Config, session: Session) -> Self {
        let client = config.gemini_client();

        Self {
            should_quit: false,
            input_mode: InputMode::Normal,
            session,
            client,
            config,

            cursor: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            animation_frame: 0,

            show_history: false,
            history_scroll: 0,

            speech_active: false,

            popup: None,
            popup_input: String::new(),
            popup_cursor: 0,

            status: None,
        }
    }

    pub fn toggle_dark_mode(&mut self) {
        let on = !self.session.preferences().dark_mode();
        self.session.set_dark_mode(on);
    }

    pub fn toggle_speech(&mut self) {
        let on = !self.session.preferences().speech_enabled();
        self.session.set_speech_enabled(on);
        if !on {
            self.speech_active = false;
        }
    }

    pub fn toggle_history(&mut self) {
        self.show_history = !self.show_history;
        self.history_scroll = 0;
    }

    pub fn clear_chat(&mut self) {
        // The pending reply would land in the cleared log without its prompt
        if self.session.is_sending() {
            self.status = Some("Wait for the reply before clearing".to_string());
            return;
        }
        self.session.clear();
        self.speech_active = false;
        self.chat_scroll = 0;
        self.history_scroll = 0;
        // Closing the panel mirrors the fresh, empty conversation
        self.show_history = false;
    }

    pub fn pause_speech(&mut self) {
        let speaker = self.session.speaker_mut();
        if speaker.is_speaking() {
            speaker.pause();
        } else {
            self.status = Some("Nothing is being spoken".to_string());
        }
    }

    pub fn resume_speech(&mut self) {
        let speaker = self.session.speaker_mut();
        if speaker.is_speaking() {
            speaker.resume();
        } else {
            self.status = Some("Nothing is being spoken".to_string());
        }
    }

    pub fn open_popup(&mut self, popup: Popup) {
        self.popup = Some(popup);
        self.popup_input.clear();
        self.popup_cursor = 0;
    }

    pub fn close_popup(&mut self) {
        self.popup = None;
        self.popup_input.clear();
        self.popup_cursor = 0;
    }

    pub fn attach_image(&mut self, path: &str) {
        let path = path.trim();
        match AttachedImage::from_path(shellexpand_home(path)) {
            Ok(image) => {
                log::info!("Attached {} ({})", path, image.mime_type);
                self.session.attach(image);
                self.status = Some(format!("Attached {}", path));
            }
            Err(e) => {
                log::warn!("Could not attach {}: {:#}", path, e);
                self.status = Some(format!("Could not attach image: {}", e));
            }
        }
    }

    pub fn remove_image(&mut self) {
        self.session.remove_attachment();
    }

    pub fn set_api_key(&mut self, key: &str) {
        let key = key.trim();
        if key.is_empty() {
            return;
        }
        if let Err(e) = Config::save_api_key(key) {
            log::warn!("Could not save API key: {:#}", e);
            self.status = Some(format!("Key not saved to config: {}", e));
        }
        self.config.api_key = Some(key.to_string());
        self.client = self.config.gemini_client();
    }

    /// Put the cursor at the end of the draft (the session owns the text).
    pub fn reset_cursor(&mut self) {
        self.cursor = self.session.draft().chars().count();
    }

    /// Tick animation frame and drain speech notifications (called by Tick event)
    pub fn on_tick(&mut self) {
        if self.session.is_sending() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }

        for event in self.session.speaker_mut().poll_events() {
            match event {
                SpeechEvent::Started => {
                    self.speech_active = self.session.preferences().speech_enabled();
                }
                SpeechEvent::Ended => self.speech_active = false,
                SpeechEvent::Failed(reason) => {
                    log::warn!("Speech failed: {}", reason);
                    self.speech_active = false;
                }
            }
        }
    }

    pub fn scroll_chat_down(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_add(1);
    }

    pub fn scroll_chat_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    /// Scroll chat to bottom so the newest turn (or "Thinking...") is visible
    pub fn scroll_chat_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;
        for turn in self.session.log().all() {
            total_lines = total_lines.saturating_add(content_lines(&turn.content, wrap_width));
        }

        if self.session.is_sending() {
            total_lines = total_lines.saturating_add(2); // label + "Thinking..."
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }
}

/// Rendered height of one turn: label, wrapped text, image marker, blank line.
pub fn content_lines(content: &TurnContent, wrap_width: usize) -> u16 {
    let wrap_width = wrap_width.max(1);
    let mut lines: usize = 2;
    for line in content.text.lines() {
        // Use character count, not byte length, for proper UTF-8 handling
        let char_count = line.chars().count();
        lines += char_count.max(1).div_ceil(wrap_width);
    }
    if content.image.is_some() {
        lines += 1;
    }
    u16::try_from(lines).unwrap_or(u16::MAX)
}

/// Expand a leading `~/` so pasted paths work.
fn shellexpand_home(path: &str) -> std::path::PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => std::path::PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jeevaverse_core::{SilentSpeaker, Store};
    use std::sync::Arc;

    fn app() -> App {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let session = Session::new(store, Box::new(SilentSpeaker));
        App::new(Config::new(), session)
    }

    #[test]
    fn test_content_lines() {
        assert_eq!(content_lines(&TurnContent::text("hi"), 10), 3);
        assert_eq!(content_lines(&TurnContent::text("a".repeat(25)), 10), 5);
        assert_eq!(content_lines(&TurnContent::text("a\n\nb"), 10), 5);

        let with_image = TurnContent {
            text: String::new(),
            image: Some("data:image/png;base64,".to_string()),
        };
        assert_eq!(content_lines(&with_image, 10), 3);
    }

    #[test]
    fn test_toggles_persist_through_session() {
        let mut app = app();
        app.toggle_dark_mode();
        app.toggle_speech();
        assert!(app.session.preferences().dark_mode());
        assert!(app.session.preferences().speech_enabled());

        app.toggle_speech();
        assert!(!app.session.preferences().speech_enabled());
        assert!(!app.speech_active);
    }

    #[test]
    fn test_attach_missing_file_sets_status() {
        let mut app = app();
        app.attach_image("/definitely/not/here.png");
        assert!(app.session.attachment().is_none());
        assert!(app.status.as_deref().unwrap_or("").starts_with("Could not attach image"));
    }

    #[test]
    fn test_attach_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cat.png");
        std::fs::write(&path, b"png").unwrap();

        let mut app = app();
        app.attach_image(path.to_str().unwrap());
        assert_eq!(app.session.attachment().map(|i| i.mime_type.as_str()), Some("image/png"));

        app.remove_image();
        assert!(app.session.attachment().is_none());
    }

    #[test]
    fn test_animation_only_while_sending() {
        let mut app = app();
        app.on_tick();
        assert_eq!(app.animation_frame, 0);

        app.session.set_draft("hello");
        app.session.begin_send().unwrap();
        app.on_tick();
        app.on_tick();
        assert_eq!(app.animation_frame, 2);
    }

    #[test]
    fn test_pause_without_speech_sets_status() {
        let mut app = app();
        app.pause_speech();
        assert_eq!(app.status.as_deref(), Some("Nothing is being spoken"));
    }
}
