use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use jeevaverse_core::transcript::{self, TranscriptEntry, GREETING};
use jeevaverse_core::Role;
use crate::app::{App, InputMode, Popup};
use crate::theme::Theme;

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            chars.next();

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;
            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                if !current_text.is_empty() {
                    spans.push(Span::raw(std::mem::take(&mut current_text)));
                }
                spans.push(Span::styled(
                    bold_text,
                    Style::default().add_modifier(Modifier::BOLD),
                ));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    Line::from(spans)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let theme = Theme::for_dark_mode(app.session.preferences().dark_mode());
    let area = frame.area();

    frame.render_widget(Block::default().style(theme.base()), area);

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, &theme, frame, header_area);

    if app.show_history {
        let [chat_area, history_area] = Layout::horizontal([
            Constraint::Percentage(60),
            Constraint::Percentage(40),
        ])
        .areas(body_area);
        render_chat(app, &theme, frame, chat_area);
        render_history(app, &theme, frame, history_area);
    } else {
        render_chat(app, &theme, frame, body_area);
    }

    render_footer(app, &theme, frame, footer_area);

    if let Some(popup) = app.popup {
        render_popup(app, popup, &theme, frame, area);
    }
}

fn render_header(app: &App, theme: &Theme, frame: &mut Frame, area: Rect) {
    let prefs = app.session.preferences();
    let flag = |on: bool| if on { "on" } else { "off" };

    let title = Line::from(vec![
        Span::styled(" JeevaVerse ", theme.label(theme.accent)),
        Span::styled(format!("{} ", app.client.model()), Style::default().fg(theme.text)),
        Span::styled(
            format!("dark:{} speech:{} ", flag(prefs.dark_mode()), flag(prefs.speech_enabled())),
            Style::default().fg(theme.text),
        ),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(theme.text),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(theme.bar));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, theme: &Theme, frame: &mut Frame, area: Rect) {
    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(area);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.muted))
        .title(" Chat ");

    let sending = app.session.is_sending();
    let mut lines: Vec<Line> = Vec::new();

    for entry in transcript::transcript(app.session.log().all(), sending) {
        match entry {
            TranscriptEntry::Greeting => {
                lines.push(Line::from(Span::styled(GREETING, Style::default().fg(theme.muted))));
            }
            TranscriptEntry::Turn(turn) => {
                let (label, color) = match turn.role {
                    Role::User => ("You:", theme.user),
                    Role::Model => ("JeevaVerse:", theme.model),
                };
                lines.push(Line::from(Span::styled(label, theme.label(color))));
                for line in turn.content.text.lines() {
                    lines.push(parse_markdown_line(line));
                }
                if let Some(image) = &turn.content.image {
                    lines.push(Line::from(Span::styled(
                        format!("[image: {}]", image_mime(image)),
                        Style::default().fg(theme.muted).add_modifier(Modifier::ITALIC),
                    )));
                }
                lines.push(Line::default());
            }
            TranscriptEntry::Pending => {
                lines.push(Line::from(Span::styled("JeevaVerse:", theme.label(theme.model))));
                // Animated ellipsis: cycles through ".", "..", "..."
                let dots = ".".repeat((app.animation_frame as usize) + 1);
                lines.push(Line::from(Span::styled(
                    format!("Thinking{}", dots),
                    Style::default().fg(theme.muted).add_modifier(Modifier::ITALIC),
                )));
            }
        }
    }

    let chat = Paragraph::new(Text::from(lines))
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, chat_area);

    render_input(app, theme, frame, input_area);
}

fn render_input(app: &App, theme: &Theme, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing { theme.model } else { theme.muted };

    let title = match app.session.attachment() {
        Some(image) => format!(" Ask [{} attached, x to remove] ", image.mime_type),
        None => " Ask (i to type, a to attach) ".to_string(),
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Calculate visible portion of input with horizontal scrolling
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app.session.draft()
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(theme.user))
        .block(input_block);
    frame.render_widget(input, area);

    // Show cursor when editing
    if editing && app.popup.is_none() {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_history(app: &App, theme: &Theme, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.accent))
        .title(" History (newest first, C to clear) ");

    let entries = transcript::history_entries(app.session.log(), app.config.utc_offset_minutes());
    let text = if entries.is_empty() {
        Text::from(Span::styled("No history yet.", Style::default().fg(theme.muted)))
    } else {
        let mut lines: Vec<Line> = Vec::new();
        for entry in entries {
            lines.push(Line::from(Span::styled(entry.speaker, theme.label(theme.accent))));
            lines.push(Line::from(entry.text));
            lines.push(Line::from(Span::styled(entry.when, Style::default().fg(theme.muted))));
            lines.push(Line::default());
        }
        Text::from(lines)
    };

    let history = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: true })
        .scroll((app.history_scroll, 0));
    frame.render_widget(history, area);
}

fn render_footer(app: &App, theme: &Theme, frame: &mut Frame, area: Rect) {
    let key_style = Style::default().bg(theme.bar).fg(theme.text);
    let label_style = Style::default().fg(theme.text);

    if let Some(status) = &app.status {
        let notice = Paragraph::new(Span::styled(format!(" {} ", status), Style::default().fg(theme.model)));
        frame.render_widget(notice, area);
        return;
    }

    let pairs: Vec<(&str, &str)> = match app.input_mode {
        InputMode::Editing => vec![("Enter", "send"), ("Esc", "done")],
        InputMode::Normal => {
            let mut pairs = vec![
                ("i", "type"),
                ("a", "image"),
                ("h", "history"),
                ("d", "dark"),
                ("s", "speech"),
                ("C", "clear"),
            ];
            if app.speech_active {
                pairs.extend([("p", "pause"), ("r", "resume")]);
            }
            pairs.extend([("K", "key"), ("q", "quit")]);
            pairs
        }
    };

    let mut spans = Vec::new();
    for (key, label) in pairs {
        spans.push(Span::styled(format!(" {} ", key), key_style));
        spans.push(Span::styled(format!(" {} ", label), label_style));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_popup(app: &App, popup: Popup, theme: &Theme, frame: &mut Frame, area: Rect) {
    let (title, instructions) = match popup {
        Popup::AttachPath => (" Attach Image ", "Path to an image file. Enter to attach, Esc to cancel."),
        Popup::ApiKey => (" Gemini API Key ", "Paste your API key below. Press Enter to save, Esc to cancel."),
    };

    // Calculate popup size and position (centered)
    let popup_width = 64.min(area.width.saturating_sub(4));
    let popup_height = 7;
    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;
    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.model))
        .style(theme.base())
        .title(title);
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let instructions_area = Rect::new(inner.x, inner.y, inner.width, 1);
    frame.render_widget(
        Paragraph::new(instructions).style(Style::default().fg(theme.muted)),
        instructions_area,
    );

    let display_text = match popup {
        Popup::AttachPath => app.popup_input.clone(),
        Popup::ApiKey => mask_secret(&app.popup_input),
    };

    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, 1);
    frame.render_widget(
        Paragraph::new(display_text).style(Style::default().fg(theme.user)),
        input_area,
    );

    let cursor_x = match popup {
        Popup::AttachPath => app.popup_cursor,
        Popup::ApiKey => mask_secret(&app.popup_input).chars().count(),
    };
    let cursor_x = cursor_x.min(input_area.width as usize) as u16;
    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));
}

/// Mask all but the last four characters of a secret
fn mask_secret(secret: &str) -> String {
    let len = secret.chars().count();
    if len <= 4 {
        return "*".repeat(len);
    }
    let masked_len = len - 4;
    let last_four: String = secret.chars().skip(masked_len).collect();
    format!("{}...{}", "*".repeat(masked_len.min(20)), last_four)
}

/// MIME type of a `data:` URL, for the image marker
fn image_mime(data_url: &str) -> &str {
    data_url
        .strip_prefix("data:")
        .and_then(|rest| rest.split(';').next())
        .filter(|mime| !mime.is_empty())
        .unwrap_or("image")
}
