//! UI-agnostic conversation types
//!
//! These are shared by the session, the persisted log record and any front
//! end that renders a conversation.

use std::path::Path;

use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// The renderable payload of a turn
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TurnContent {
    #[serde(default)]
    pub text: String,
    /// `data:` URL of an attached image, if any
    #[serde(default)]
    pub image: Option<String>,
}

impl TurnContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image: None,
        }
    }
}

/// One message in the conversation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: TurnContent,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: Role, content: TurnContent) -> Self {
        Self {
            role,
            content,
            timestamp: Utc::now(),
        }
    }
}

/// An image waiting to be sent with the next turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedImage {
    pub mime_type: String,
    pub base64: String,
}

impl AttachedImage {
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            base64: STANDARD.encode(bytes),
        }
    }

    /// Read an image file, guessing its MIME type from the extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mime = mime_guess::from_path(path)
            .first()
            .ok_or_else(|| anyhow!("Unknown file type: {}", path.display()))?;

        if mime.type_().as_str() != "image" {
            return Err(anyhow!("Not an image ({}): {}", mime, path.display()));
        }

        let bytes = std::fs::read(path)?;
        Ok(Self::from_bytes(mime.essence_str(), &bytes))
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Model).unwrap(), "\"model\"");
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
    }

    #[test]
    fn test_data_url() {
        let image = AttachedImage::from_bytes("image/png", b"abc");
        assert_eq!(image.base64, "YWJj");
        assert_eq!(image.data_url(), "data:image/png;base64,YWJj");
    }

    #[test]
    fn test_from_path_reads_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        std::fs::File::create(&path).unwrap().write_all(b"\xff\xd8").unwrap();

        let image = AttachedImage::from_path(&path).unwrap();
        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(image.base64, "/9g=");
    }

    #[test]
    fn test_from_path_rejects_non_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();

        assert!(AttachedImage::from_path(&path).is_err());
    }

    #[test]
    fn test_content_without_image_field_parses() {
        let content: TurnContent = serde_json::from_str(r#"{"text":"hi"}"#).unwrap();
        assert_eq!(content, TurnContent::text("hi"));
    }
}
