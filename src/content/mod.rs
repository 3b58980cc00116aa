//! Content listings for dlna-explorer
//!
//! Media servers describe their catalog with DIDL-Lite documents. This module
//! holds the flat value types extracted from them and the category used to
//! choose playback policies.

pub mod didl;

pub use didl::parse_didl;

use std::{fmt, time::Duration};

/// Broad category of a content item, derived from its upnp class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentCategory {
    /// `object.item.videoItem` and its subclasses
    Movie,
    /// `object.item.audioItem` and its subclasses
    Music,
    /// `object.item.imageItem` and its subclasses
    Photo,
    /// Containers and anything else
    Other,
}

impl ContentCategory {
    /// Derives the category from a upnp class such as `object.item.audioItem.musicTrack`
    pub fn from_upnp_class(class: &str) -> Self {
        if class.starts_with("object.item.videoItem") {
            ContentCategory::Movie
        } else if class.starts_with("object.item.audioItem") {
            ContentCategory::Music
        } else if class.starts_with("object.item.imageItem") {
            ContentCategory::Photo
        } else {
            ContentCategory::Other
        }
    }

    /// Whether items of this category play over time
    pub fn has_duration(&self) -> bool {
        matches!(self, ContentCategory::Movie | ContentCategory::Music)
    }

    /// Whether items of this category are audio only
    pub fn is_audio(&self) -> bool {
        matches!(self, ContentCategory::Music)
    }
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ContentCategory::Movie => "movie",
            ContentCategory::Music => "music",
            ContentCategory::Photo => "photo",
            ContentCategory::Other => "other",
        };
        write!(f, "{name}")
    }
}

/// One entry of a ContentDirectory listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentItem {
    /// Object id, unique within the server
    pub id: String,
    /// Object id of the parent container
    pub parent_id: String,
    /// Display title
    pub title: String,
    /// upnp class, e.g. `object.item.videoItem`
    pub upnp_class: String,
    /// URI of the first resource
    pub uri: Option<String>,
    /// DLNA protocol info of the first resource
    pub protocol_info: Option<String>,
    /// Duration of the first resource, when advertised
    pub duration: Option<Duration>,
    /// Whether this entry is a container rather than an item
    pub is_container: bool,
}

impl ContentItem {
    /// Category of this entry
    pub fn category(&self) -> ContentCategory {
        ContentCategory::from_upnp_class(&self.upnp_class)
    }

    /// Whether this entry can be handed to a player
    pub fn is_playable(&self) -> bool {
        !self.is_container && self.uri.is_some()
    }

    /// MIME type taken from the protocol info (`http-get:*:video/mp4:*`)
    pub fn mime_type(&self) -> Option<&str> {
        self.protocol_info
            .as_deref()
            .and_then(|info| info.split(':').nth(2))
            .filter(|mime| !mime.is_empty() && *mime != "*")
    }
}

impl fmt::Display for ContentItem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_container {
            write!(f, "[{}] {}/", self.id, self.title)
        } else {
            write!(f, "[{}] {} ({})", self.id, self.title, self.category())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_upnp_class() {
        assert_eq!(
            ContentCategory::from_upnp_class("object.item.audioItem.musicTrack"),
            ContentCategory::Music
        );
        assert_eq!(
            ContentCategory::from_upnp_class("object.item.videoItem.movie"),
            ContentCategory::Movie
        );
        assert_eq!(
            ContentCategory::from_upnp_class("object.item.imageItem.photo"),
            ContentCategory::Photo
        );
        assert_eq!(
            ContentCategory::from_upnp_class("object.container.storageFolder"),
            ContentCategory::Other
        );
    }

    #[test]
    fn test_category_flags() {
        assert!(ContentCategory::Music.is_audio());
        assert!(!ContentCategory::Movie.is_audio());
        assert!(ContentCategory::Movie.has_duration());
        assert!(!ContentCategory::Photo.has_duration());
    }

    #[test]
    fn test_item_mime_type() {
        let item = ContentItem {
            protocol_info: Some("http-get:*:audio/flac:DLNA.ORG_OP=01".to_string()),
            ..Default::default()
        };
        assert_eq!(item.mime_type(), Some("audio/flac"));

        let item = ContentItem {
            protocol_info: Some("http-get:*:*:*".to_string()),
            ..Default::default()
        };
        assert_eq!(item.mime_type(), None);
    }

    #[test]
    fn test_item_playable() {
        let mut item = ContentItem {
            uri: Some("http://10.0.0.2/a.mp3".to_string()),
            ..Default::default()
        };
        assert!(item.is_playable());
        item.is_container = true;
        assert!(!item.is_playable());
    }
}
