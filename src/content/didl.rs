//! Flat DIDL-Lite extraction
//!
//! Only the handful of tags and attributes a control point needs are read:
//! object ids, title, class and the first resource of every entry.

use super::ContentItem;
use crate::utils::time_str_to_milliseconds;
use quick_xml::{Reader, escape::unescape, events::Event};
use std::time::Duration;

/// Child element of an entry whose text is being collected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Class,
    Res,
}

/// Parses a DIDL-Lite document into its items and containers, in document order
pub fn parse_didl(didl: &str) -> Result<Vec<ContentItem>, String> {
    let mut reader = Reader::from_str(didl);

    let mut entries = Vec::new();
    let mut current: Option<ContentItem> = None;
    let mut field: Option<Field> = None;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                name @ (b"item" | b"container") => {
                    current = Some(new_entry(name == b"container", attributes(&e)?));
                }
                b"title" if current.is_some() => field = Some(Field::Title),
                b"class" if current.is_some() => field = Some(Field::Class),
                b"res" => {
                    if let Some(entry) = current.as_mut().filter(|entry| entry.uri.is_none()) {
                        for (key, value) in attributes(&e)? {
                            match key.as_str() {
                                "protocolInfo" => entry.protocol_info = Some(value),
                                "duration" => entry.duration = parse_duration(&value),
                                _ => {}
                            }
                        }
                        field = Some(Field::Res);
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if let name @ (b"item" | b"container") = e.local_name().as_ref() {
                    entries.push(new_entry(name == b"container", attributes(&e)?));
                }
            }
            Ok(Event::Text(t)) => {
                if field.is_some() {
                    let raw = std::str::from_utf8(&t).map_err(|e| e.to_string())?;
                    text.push_str(&unescape(raw).map_err(|e| e.to_string())?);
                }
            }
            Ok(Event::GeneralRef(r)) => {
                if field.is_some() {
                    let name = std::str::from_utf8(&r).map_err(|e| e.to_string())?;
                    let reference = format!("&{name};");
                    text.push_str(&unescape(&reference).map_err(|e| e.to_string())?);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"item" | b"container" => {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                    field = None;
                }
                b"title" | b"class" | b"res" => {
                    if let (Some(entry), Some(done)) = (current.as_mut(), field.take()) {
                        let value = std::mem::take(&mut text).trim().to_string();
                        match done {
                            Field::Title => entry.title = value,
                            Field::Class => entry.upnp_class = value,
                            Field::Res => entry.uri = Some(value).filter(|uri| !uri.is_empty()),
                        }
                    }
                    text.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "invalid DIDL-Lite at position {}: {e}",
                    reader.error_position()
                ));
            }
            _ => {}
        }
    }

    Ok(entries)
}

fn new_entry(is_container: bool, attributes: Vec<(String, String)>) -> ContentItem {
    let mut entry = ContentItem {
        is_container,
        ..Default::default()
    };
    for (key, value) in attributes {
        match key.as_str() {
            "id" => entry.id = value,
            "parentID" => entry.parent_id = value,
            _ => {}
        }
    }
    entry
}

/// Collects the attributes of an element as unescaped `(local name, value)` pairs
fn attributes(element: &quick_xml::events::BytesStart) -> Result<Vec<(String, String)>, String> {
    let mut result = Vec::new();
    for attr in element.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = std::str::from_utf8(attr.key.local_name().as_ref())
            .map_err(|e| e.to_string())?
            .to_string();
        let raw = std::str::from_utf8(&attr.value).map_err(|e| e.to_string())?;
        let value = unescape(raw).map_err(|e| e.to_string())?.into_owned();
        result.push((key, value));
    }
    Ok(result)
}

/// DIDL durations look like `H+:MM:SS[.F+]`
fn parse_duration(value: &str) -> Option<Duration> {
    match time_str_to_milliseconds(value) {
        0 => None,
        ms => Some(Duration::from_millis(ms)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentCategory;

    const LISTING: &str = r#"<DIDL-Lite xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/">
<container id="1$4" parentID="1" childCount="12"><dc:title>Albums</dc:title><upnp:class>object.container.storageFolder</upnp:class></container>
<item id="1$7$1" parentID="1$7"><dc:title>Tom &amp; Jerry</dc:title><upnp:class>object.item.videoItem.movie</upnp:class><res protocolInfo="http-get:*:video/mp4:*" duration="0:03:25.000">http://192.168.1.10:8200/MediaItems/1.mp4</res><res protocolInfo="http-get:*:image/jpeg:*">http://192.168.1.10:8200/Thumb/1.jpg</res></item>
<item id="1$7$2" parentID="1$7"><dc:title>Intro</dc:title><upnp:class>object.item.audioItem.musicTrack</upnp:class><res protocolInfo="http-get:*:audio/mpeg:*">http://192.168.1.10:8200/MediaItems/2.mp3?a=1&amp;b=2</res></item>
</DIDL-Lite>"#;

    #[test]
    fn test_parse_listing_in_document_order() {
        let entries = parse_didl(LISTING).unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries[0].is_container);
        assert_eq!(entries[0].title, "Albums");
        assert_eq!(entries[1].id, "1$7$1");
        assert_eq!(entries[1].parent_id, "1$7");
        assert_eq!(entries[2].category(), ContentCategory::Music);
    }

    #[test]
    fn test_parse_keeps_first_resource_only() {
        let entries = parse_didl(LISTING).unwrap();
        let movie = &entries[1];
        assert_eq!(
            movie.uri.as_deref(),
            Some("http://192.168.1.10:8200/MediaItems/1.mp4")
        );
        assert_eq!(movie.mime_type(), Some("video/mp4"));
        assert_eq!(movie.duration, Some(Duration::from_secs(205)));
    }

    #[test]
    fn test_parse_unescapes_text() {
        let entries = parse_didl(LISTING).unwrap();
        assert_eq!(entries[1].title, "Tom & Jerry");
        assert_eq!(
            entries[2].uri.as_deref(),
            Some("http://192.168.1.10:8200/MediaItems/2.mp3?a=1&b=2")
        );
    }

    #[test]
    fn test_parse_empty_listing() {
        let entries = parse_didl(r#"<DIDL-Lite xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/"></DIDL-Lite>"#)
            .unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_parse_rejects_malformed_document() {
        assert!(parse_didl("<DIDL-Lite><item id=\"1\"></container></DIDL-Lite>").is_err());
    }
}
