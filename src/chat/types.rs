use base64::Engine;
use image::DynamicImage;
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

use crate::llm::Blob;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

/// An already-decoded image attached to a user message. Cloning shares the
/// pixel buffer.
#[derive(Clone)]
pub struct Attachment {
    image: Arc<DynamicImage>,
}

impl Attachment {
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image().width(), self.image().height())
    }

    /// PNG-encodes the image for the backend's `inlineData` part.
    pub fn to_inline_data(&self) -> Result<Blob, image::ImageError> {
        let mut png = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)?;

        Ok(Blob {
            mime_type: "image/png".to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(png),
        })
    }
}

impl PartialEq for Attachment {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.image, &other.image)
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (width, height) = self.dimensions();
        write!(f, "Attachment({}x{})", width, height)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: Option<String>,
    pub attachment: Option<Attachment>,
    /// Transient progress text, only meaningful while `content` is blank.
    pub hint: Option<String>,
}

impl Message {
    pub fn user(text: impl Into<String>, attachment: Option<Attachment>) -> Self {
        let text = text.into();
        Self {
            role: Role::User,
            content: (!text.trim().is_empty()).then_some(text),
            attachment,
            hint: None,
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            content: Some(content.into()),
            attachment: None,
            hint: None,
        }
    }

    /// Empty model message that holds the response slot while a turn runs.
    pub fn placeholder(hint: impl Into<String>) -> Self {
        Self {
            hint: Some(hint.into()),
            ..Self::model("")
        }
    }

    pub fn has_content(&self) -> bool {
        self.content.as_deref().is_some_and(|c| !c.trim().is_empty())
    }

    pub fn is_pending(&self) -> bool {
        self.hint.as_deref().is_some_and(|h| !h.is_empty())
    }

    /// What a message bubble shows: the content once there is any, otherwise
    /// the hint.
    pub fn display_text(&self) -> &str {
        match (&self.content, &self.hint) {
            (Some(content), _) if !content.trim().is_empty() => content.as_str(),
            (_, Some(hint)) => hint.as_str(),
            _ => "",
        }
    }

    pub fn with_appended_text(&self, delta: &str) -> Self {
        let mut content = self.content.clone().unwrap_or_default();
        content.push_str(delta);
        Self {
            content: Some(content),
            hint: None,
            ..self.clone()
        }
    }

    pub fn with_hint(&self, hint: impl Into<String>) -> Self {
        Self {
            hint: Some(hint.into()),
            ..self.clone()
        }
    }

    pub fn with_content(&self, content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            hint: None,
            ..self.clone()
        }
    }

    pub fn without_hint(&self) -> Self {
        Self {
            hint: None,
            ..self.clone()
        }
    }
}

/// Snapshot of the conversation published to observers. Never mutated in
/// place; every change produces a new value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationState {
    pub messages: Vec<Message>,
    pub is_streaming: bool,
}

impl ConversationState {
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn with_appended(&self, messages: impl IntoIterator<Item = Message>) -> Self {
        let mut next = self.messages.clone();
        next.extend(messages);
        Self {
            messages: next,
            is_streaming: self.is_streaming,
        }
    }

    /// Copy of this state with the last message replaced by `f(last)`.
    /// Returns `None` when there is no message to replace.
    pub fn with_last_replaced(&self, f: impl FnOnce(&Message) -> Message) -> Option<Self> {
        let (last, rest) = self.messages.split_last()?;
        let mut next = Vec::with_capacity(self.messages.len());
        next.extend_from_slice(rest);
        next.push(f(last));
        Some(Self {
            messages: next,
            is_streaming: self.is_streaming,
        })
    }

    pub fn with_streaming(&self, is_streaming: bool) -> Self {
        Self {
            is_streaming,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_user_message_blank_text_has_no_content() {
        let msg = Message::user("   ", None);
        assert_eq!(msg.role, Role::User);
        assert!(msg.content.is_none());

        let msg = Message::user("Hi", None);
        assert_eq!(msg.content.as_deref(), Some("Hi"));
    }

    #[test]
    fn test_placeholder() {
        let msg = Message::placeholder("Thinking...");
        assert_eq!(msg.role, Role::Model);
        assert_eq!(msg.content.as_deref(), Some(""));
        assert!(msg.is_pending());
        assert!(!msg.has_content());
        assert_eq!(msg.display_text(), "Thinking...");
    }

    #[test]
    fn test_appended_text_clears_hint() {
        let msg = Message::placeholder("Thinking...").with_appended_text("Hel");
        assert_eq!(msg.content.as_deref(), Some("Hel"));
        assert!(msg.hint.is_none());

        let msg = msg.with_appended_text("lo");
        assert_eq!(msg.display_text(), "Hello");
    }

    #[test]
    fn test_display_text_prefers_non_blank_content() {
        let msg = Message::placeholder("Thinking...").with_hint("Tool: Fetching weather...");
        assert_eq!(msg.display_text(), "Tool: Fetching weather...");

        let msg = Message {
            content: Some("  ".to_string()),
            ..msg
        };
        assert_eq!(msg.display_text(), "Tool: Fetching weather...");

        assert_eq!(Message::model("").display_text(), "");
    }

    #[test]
    fn test_with_last_replaced_is_copy_on_write() {
        let state = ConversationState::default()
            .with_appended([Message::user("Hi", None), Message::placeholder("Thinking...")]);

        let next = state
            .with_last_replaced(|m| m.with_appended_text("Hello"))
            .unwrap();

        assert_eq!(state.messages[1].content.as_deref(), Some(""));
        assert_eq!(next.messages[1].content.as_deref(), Some("Hello"));
        assert_eq!(next.messages[0], state.messages[0]);
        assert_eq!(next.messages.len(), 2);
    }

    #[test]
    fn test_with_last_replaced_on_empty_history() {
        let state = ConversationState::default();
        assert!(state.with_last_replaced(|m| m.clone()).is_none());
    }

    #[test]
    fn test_attachment_inline_data() {
        let attachment = Attachment::new(DynamicImage::ImageRgb8(RgbImage::new(2, 3)));
        assert_eq!(attachment.dimensions(), (2, 3));
        assert_eq!(format!("{:?}", attachment), "Attachment(2x3)");

        let blob = attachment.to_inline_data().unwrap();
        assert_eq!(blob.mime_type, "image/png");

        let png = base64::engine::general_purpose::STANDARD
            .decode(blob.data)
            .unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_attachment_equality_is_identity() {
        let a = Attachment::new(DynamicImage::ImageRgb8(RgbImage::new(1, 1)));
        let b = Attachment::new(DynamicImage::ImageRgb8(RgbImage::new(1, 1)));
        assert_eq!(a, a.clone());
        assert!(std::ptr::eq(a.image(), a.clone().image()));
        assert_ne!(a, b);
    }
}
