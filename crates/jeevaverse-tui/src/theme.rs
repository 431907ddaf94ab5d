use ratatui::style::{Color, Modifier, Style};

/// Palette picked by the dark-mode preference
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    pub background: Color,
    pub text: Color,
    pub muted: Color,
    pub accent: Color,
    pub user: Color,
    pub model: Color,
    pub bar: Color,
}

impl Theme {
    pub fn dark() -> Self {
        Self {
            background: Color::Black,
            text: Color::White,
            muted: Color::DarkGray,
            accent: Color::Cyan,
            user: Color::Cyan,
            model: Color::Yellow,
            bar: Color::DarkGray,
        }
    }

    pub fn light() -> Self {
        Self {
            background: Color::White,
            text: Color::Black,
            muted: Color::Gray,
            accent: Color::Blue,
            user: Color::Blue,
            model: Color::Magenta,
            bar: Color::Gray,
        }
    }

    pub fn for_dark_mode(dark: bool) -> Self {
        if dark {
            Self::dark()
        } else {
            Self::light()
        }
    }

    pub fn base(&self) -> Style {
        Style::default().bg(self.background).fg(self.text)
    }

    pub fn label(&self, color: Color) -> Style {
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    }
}
