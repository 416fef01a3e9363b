//! Outbound chat messages.
//!
//! Every message the bot delivers, whether it answers a command, reports a
//! periodic reading or announces a new file, is an [`OutboundEvent`]. The
//! dispatcher assigns the destination chat and releases any held payload once
//! the send attempt is over.

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Media payload of a photo, video or document message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    /// A file on disk, opened by the transport at send time.
    Path(PathBuf),
    /// Bytes already held in memory (e.g. a downloaded snapshot).
    Memory { file_name: String, data: Arc<[u8]> },
    /// Payload dropped by [`OutboundEvent::release`].
    Released,
}

impl Attachment {
    pub fn memory(file_name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self::Memory {
            file_name: file_name.into(),
            data: data.into(),
        }
    }

    pub fn is_released(&self) -> bool {
        matches!(self, Self::Released)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMessage {
    pub chat_id: Option<i64>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaMessage {
    pub chat_id: Option<i64>,
    pub attachment: Attachment,
    pub caption: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    Text(TextMessage),
    Photo(MediaMessage),
    Video(MediaMessage),
    Document(MediaMessage),
}

impl OutboundEvent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(TextMessage {
            chat_id: None,
            text: text.into(),
        })
    }

    pub fn photo(attachment: Attachment, caption: Option<String>) -> Self {
        Self::Photo(MediaMessage::new(attachment, caption))
    }

    pub fn video(attachment: Attachment, caption: Option<String>) -> Self {
        Self::Video(MediaMessage::new(attachment, caption))
    }

    pub fn document(attachment: Attachment, caption: Option<String>) -> Self {
        Self::Document(MediaMessage::new(attachment, caption))
    }

    /// Builds the announcement for a newly created file: images become photos,
    /// videos become videos, anything else a short text notice.
    pub fn for_new_file(path: &Path) -> Self {
        let caption = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        let Some(mime) = mime_guess::from_path(path).first() else {
            return Self::text(format!("file {} added", path.display()));
        };

        if mime.type_() == mime_guess::mime::IMAGE {
            Self::photo(Attachment::Path(path.to_path_buf()), caption)
        } else if mime.type_() == mime_guess::mime::VIDEO {
            Self::video(Attachment::Path(path.to_path_buf()), caption)
        } else {
            Self::text(format!("file {} added", path.display()))
        }
    }

    pub fn destination(&self) -> Option<i64> {
        match self {
            Self::Text(msg) => msg.chat_id,
            Self::Photo(msg) | Self::Video(msg) | Self::Document(msg) => msg.chat_id,
        }
    }

    pub fn set_destination(&mut self, chat_id: i64) {
        match self {
            Self::Text(msg) => msg.chat_id = Some(chat_id),
            Self::Photo(msg) | Self::Video(msg) | Self::Document(msg) => {
                msg.chat_id = Some(chat_id)
            }
        }
    }

    /// Drops held payload data. Idempotent; text messages hold nothing.
    pub fn release(&mut self) {
        match self {
            Self::Text(_) => {}
            Self::Photo(msg) | Self::Video(msg) | Self::Document(msg) => {
                msg.attachment = Attachment::Released;
            }
        }
    }

    pub fn is_released(&self) -> bool {
        match self {
            Self::Text(_) => false,
            Self::Photo(msg) | Self::Video(msg) | Self::Document(msg) => {
                msg.attachment.is_released()
            }
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Photo(_) => "photo",
            Self::Video(_) => "video",
            Self::Document(_) => "document",
        }
    }
}

impl MediaMessage {
    fn new(attachment: Attachment, caption: Option<String>) -> Self {
        Self {
            chat_id: None,
            attachment,
            caption,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_file_kind_follows_mime() {
        assert_eq!(
            OutboundEvent::for_new_file(Path::new("/cam/a/pic.JPG")).kind(),
            "photo"
        );
        assert_eq!(
            OutboundEvent::for_new_file(Path::new("/cam/clip.mP4")).kind(),
            "video"
        );

        let event = OutboundEvent::for_new_file(Path::new("/cam/notes.txt"));
        assert_eq!(event, OutboundEvent::text("file /cam/notes.txt added"));
    }

    #[test]
    fn test_set_destination() {
        let mut event = OutboundEvent::photo(Attachment::Path("/x.jpg".into()), None);
        assert_eq!(event.destination(), None);
        event.set_destination(42);
        assert_eq!(event.destination(), Some(42));
    }

    #[test]
    fn test_release_drops_payload_only_of_the_copy() {
        let original = OutboundEvent::photo(Attachment::memory("snap.jpg", vec![1u8, 2, 3]), None);
        let mut copy = original.clone();
        copy.release();
        copy.release();

        assert!(copy.is_released());
        assert!(!original.is_released());
        assert!(!OutboundEvent::text("hi").is_released());
    }
}
