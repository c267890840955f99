use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// Content type given to every image picked in the composer.
pub const IMAGE_ATTACHMENT_CONTENT_TYPE: &str = "image/base64";

/// Author of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Inline attachment carried by a user message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub content_type: String,
    pub url: String,
}

impl Attachment {
    /// Wrap an already encoded image (data URL or bare base64).
    pub fn image(url: impl Into<String>) -> Self {
        Self {
            content_type: IMAGE_ATTACHMENT_CONTENT_TYPE.to_string(),
            url: url.into(),
        }
    }

    /// Encode raw image bytes as a `data:` URL.
    pub fn from_image_bytes(bytes: &[u8], mime: &str) -> Self {
        Self::image(format!("data:{};base64,{}", mime, STANDARD.encode(bytes)))
    }
}

/// One turn of a conversation.
///
/// `id` is the owning conversation's identifier, shared by every message of
/// that conversation. Attachments only ever appear on user messages and are
/// fixed at submission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
}

impl Message {
    pub fn user(content: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            id: conversation_id.into(),
            attachments: None,
        }
    }

    /// User message with image attachments; an empty list is stored as `None`.
    pub fn user_with_attachments(
        content: impl Into<String>,
        conversation_id: impl Into<String>,
        attachments: Vec<Attachment>,
    ) -> Self {
        let mut message = Self::user(content, conversation_id);
        if !attachments.is_empty() {
            message.attachments = Some(attachments);
        }
        message
    }

    pub fn assistant(content: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            id: conversation_id.into(),
            attachments: None,
        }
    }

    pub fn attachments(&self) -> &[Attachment] {
        self.attachments.as_deref().unwrap_or_default()
    }
}
