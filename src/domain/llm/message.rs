use serde::{Deserialize, Serialize};

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// Payload of an attached file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileContent {
    /// Extracted text (source files, markdown, csv, ...)
    Text { text: String },
    /// Raw bytes, base64 encoded (pdf and other binary documents)
    Base64 { data: String },
}

/// Content part for multimodal messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    ImageUrl {
        url: String,
    },
    ImageBase64 {
        data: String,
        media_type: String,
    },
    File {
        name: String,
        media_type: String,
        content: FileContent,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text { text } => text.trim().is_empty(),
            Self::ImageUrl { url } => url.is_empty(),
            Self::ImageBase64 { data, .. } => data.is_empty(),
            Self::File { content, .. } => match content {
                FileContent::Text { text } => text.is_empty(),
                FileContent::Base64 { data } => data.is_empty(),
            },
        }
    }

    /// Data URL form of an image part, as accepted by OpenAI-style APIs
    pub fn image_url(&self) -> Option<String> {
        match self {
            Self::ImageUrl { url } => Some(url.clone()),
            Self::ImageBase64 { data, media_type } => {
                Some(format!("data:{};base64,{}", media_type, data))
            }
            _ => None,
        }
    }
}

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Stable id, also used as the cancellation key of the request it triggers
    pub id: String,
    pub role: MessageRole,
    pub content: Vec<ContentPart>,
}

impl Message {
    pub fn new(role: MessageRole, content: Vec<ContentPart>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, vec![ContentPart::text(content)])
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, vec![ContentPart::text(content)])
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, vec![ContentPart::text(content)])
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Tool, vec![ContentPart::text(content)])
    }

    pub fn user_with_parts(parts: Vec<ContentPart>) -> Self {
        Self::new(MessageRole::User, parts)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// All text parts joined, with text files rendered inline
    pub fn content_text(&self) -> String {
        let mut out = String::new();
        for part in &self.content {
            let piece = match part {
                ContentPart::Text { text } => text.clone(),
                ContentPart::File {
                    name,
                    content: FileContent::Text { text },
                    ..
                } => format_file_text(name, text),
                _ => continue,
            };

            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&piece);
        }
        out
    }

    pub fn content_parts(&self) -> &[ContentPart] {
        &self.content
    }

    pub fn has_images(&self) -> bool {
        self.content
            .iter()
            .any(|p| matches!(p, ContentPart::ImageUrl { .. } | ContentPart::ImageBase64 { .. }))
    }

    /// A message with no meaningful content is never sent upstream
    pub fn is_empty(&self) -> bool {
        self.content.iter().all(ContentPart::is_empty)
    }
}

/// Text rendering of an attached text file
pub fn format_file_text(name: &str, text: &str) -> String {
    format!("file: {}\n\n{}", name, text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, MessageRole::User);
        assert_eq!(msg.content_text(), "Hello");
        assert!(!msg.id.is_empty());
    }

    #[test]
    fn test_message_serialization() {
        let msg = Message::assistant("Hi there!").with_id("m-1");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"role\":\"assistant\""));
        assert!(json.contains("\"id\":\"m-1\""));
        assert!(json.contains("\"text\":\"Hi there!\""));
    }

    #[test]
    fn test_content_text_includes_text_files() {
        let msg = Message::user_with_parts(vec![
            ContentPart::text("Summarize this"),
            ContentPart::File {
                name: "notes.md".to_string(),
                media_type: "text/markdown".to_string(),
                content: FileContent::Text {
                    text: "# Notes".to_string(),
                },
            },
            ContentPart::ImageUrl {
                url: "https://example.com/a.png".to_string(),
            },
        ]);

        assert_eq!(msg.content_text(), "Summarize this\nfile: notes.md\n\n# Notes");
        assert!(msg.has_images());
    }

    #[test]
    fn test_empty_detection() {
        assert!(Message::user("   ").is_empty());
        assert!(Message::user_with_parts(vec![]).is_empty());
        assert!(!Message::user_with_parts(vec![ContentPart::ImageBase64 {
            data: "aGk=".to_string(),
            media_type: "image/png".to_string(),
        }])
        .is_empty());
    }

    #[test]
    fn test_image_data_url() {
        let part = ContentPart::ImageBase64 {
            data: "aGk=".to_string(),
            media_type: "image/png".to_string(),
        };
        assert_eq!(part.image_url().unwrap(), "data:image/png;base64,aGk=");
        assert!(ContentPart::text("x").image_url().is_none());
    }
}
