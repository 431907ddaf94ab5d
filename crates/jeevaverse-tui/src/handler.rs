use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use jeevaverse_core::{ChatBackend, GeminiError, Rejected, SendOutcome};
use crate::app::{App, InputMode, Popup};
use crate::tui::{AppEvent, EventSender};

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent, events: &EventSender) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key, events),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.on_tick(),
        AppEvent::Reply(result) => {
            match app.session.finish_send(result) {
                SendOutcome::Succeeded(_) => log::info!("Reply received"),
                SendOutcome::Failed(turn) => log::info!("Recorded failure: {}", turn.content.text),
                SendOutcome::Rejected(_) => {}
            }
            app.reset_cursor();
            app.scroll_chat_to_bottom();
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent, events: &EventSender) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    app.status = None;

    if app.popup.is_some() {
        handle_popup(app, key);
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key, events),
        InputMode::Editing => handle_editing_mode(app, key, events),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent, events: &EventSender) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('i') | KeyCode::Enter | KeyCode::Tab => {
            app.input_mode = InputMode::Editing;
            app.reset_cursor();
        }
        KeyCode::Char('h') => app.toggle_history(),
        KeyCode::Char('d') => app.toggle_dark_mode(),
        KeyCode::Char('s') => app.toggle_speech(),
        KeyCode::Char('a') => app.open_popup(Popup::AttachPath),
        KeyCode::Char('x') => app.remove_image(),
        KeyCode::Char('C') => app.clear_chat(),
        KeyCode::Char('K') => app.open_popup(Popup::ApiKey),
        KeyCode::Char('p') => app.pause_speech(),
        KeyCode::Char('r') => app.resume_speech(),
        KeyCode::Char('S') => submit(app, events),
        KeyCode::Char('j') | KeyCode::Down => {
            if app.show_history {
                app.history_scroll = app.history_scroll.saturating_add(1);
            } else {
                app.scroll_chat_down();
            }
        }
        KeyCode::Char('k') | KeyCode::Up => {
            if app.show_history {
                app.history_scroll = app.history_scroll.saturating_sub(1);
            } else {
                app.scroll_chat_up();
            }
        }
        KeyCode::Char('G') | KeyCode::End => app.scroll_chat_to_bottom(),
        KeyCode::Esc => {
            if app.show_history {
                app.toggle_history();
            }
        }
        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent, events: &EventSender) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => submit(app, events),
        KeyCode::Backspace => {
            if app.cursor > 0 {
                app.cursor -= 1;
                let draft = app.session.draft_mut();
                let byte_pos = char_to_byte_index(draft, app.cursor);
                draft.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let cursor = app.cursor;
            let draft = app.session.draft_mut();
            if cursor < draft.chars().count() {
                let byte_pos = char_to_byte_index(draft, cursor);
                draft.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.cursor = app.cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.session.draft().chars().count();
            app.cursor = (app.cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.cursor = 0;
        }
        KeyCode::End => {
            app.cursor = app.session.draft().chars().count();
        }
        KeyCode::Char(c) => {
            let cursor = app.cursor;
            let draft = app.session.draft_mut();
            let byte_pos = char_to_byte_index(draft, cursor);
            draft.insert(byte_pos, c);
            app.cursor += 1;
        }
        _ => {}
    }
}

fn handle_popup(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.close_popup(),
        KeyCode::Enter => {
            let input = app.popup_input.clone();
            match app.popup {
                Some(Popup::AttachPath) => app.attach_image(&input),
                Some(Popup::ApiKey) => app.set_api_key(&input),
                None => {}
            }
            app.close_popup();
        }
        KeyCode::Backspace => {
            if app.popup_cursor > 0 {
                app.popup_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.popup_input, app.popup_cursor);
                app.popup_input.remove(byte_pos);
            }
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.popup_input, app.popup_cursor);
            app.popup_input.insert(byte_pos, c);
            app.popup_cursor += 1;
        }
        KeyCode::Left => {
            app.popup_cursor = app.popup_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.popup_input.chars().count();
            app.popup_cursor = (app.popup_cursor + 1).min(char_count);
        }
        _ => {}
    }
}

/// Start a request if the session accepts one; the reply arrives as `AppEvent::Reply`.
fn submit(app: &mut App, events: &EventSender) {
    if !app.config.has_credentials() {
        app.status = Some("Set a Gemini API key first".to_string());
        app.open_popup(Popup::ApiKey);
        return;
    }

    let request = match app.session.begin_send() {
        Ok(request) => request,
        Err(Rejected::Empty) | Err(Rejected::InFlight) => return,
    };

    app.speech_active = false;
    app.animation_frame = 0;
    app.input_mode = InputMode::Normal;

    // Scroll to bottom so "Thinking..." is visible
    app.scroll_chat_to_bottom();

    let client = app.client.clone();
    let tx = events.clone();
    tokio::spawn(async move {
        let call = tokio::spawn(async move { client.generate(&request).await });
        // A panicked call still has to release the session
        let result = match call.await {
            Ok(result) => result,
            Err(e) => Err(GeminiError::Interrupted(e.to_string())),
        };
        if tx.send(AppEvent::Reply(result)).is_err() {
            log::debug!("Reply arrived after shutdown");
        }
    });
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollDown => {
            if app.show_history {
                app.history_scroll = app.history_scroll.saturating_add(3);
            } else {
                app.chat_scroll = app.chat_scroll.saturating_add(3);
            }
        }
        MouseEventKind::ScrollUp => {
            if app.show_history {
                app.history_scroll = app.history_scroll.saturating_sub(3);
            } else {
                app.chat_scroll = app.chat_scroll.saturating_sub(3);
            }
        }
        _ => {}
    }
}
