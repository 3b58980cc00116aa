//! DLNA metadata generation for dlna-explorer
//!
//! This module builds the DIDL-Lite document describing the item handed to a
//! render, and the SetAVTransportURI payload carrying it.

use crate::{
    config::{DEFAULT_DLNA_TITLE, DLNA_INSTANCE_ID},
    content::ContentItem,
    error::{Error, Result},
};
use quick_xml::escape::escape;

/// Protocol info used when the server did not advertise one
const FALLBACK_PROTOCOL_INFO: &str = "http-get:*:*:*";

/// Builds the DIDL-Lite metadata of an item
///
/// The document is returned unescaped; [`build_setavtransporturi_payload`]
/// escapes it for embedding.
pub fn build_metadata(item: &ContentItem) -> Result<String> {
    let uri = item.uri.as_deref().ok_or_else(|| Error::PlaybackPrepareFailed {
        uri: item.id.clone(),
        reason: "Item has no resource".to_string(),
    })?;
    let title = if item.title.is_empty() {
        DEFAULT_DLNA_TITLE
    } else {
        item.title.as_str()
    };
    let protocol_info = item
        .protocol_info
        .as_deref()
        .unwrap_or(FALLBACK_PROTOCOL_INFO);

    let mut didl = String::from(
        r#"<DIDL-Lite xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/">"#,
    );
    didl.push_str(&format!(
        r#"<item id="{}" parentID="{}" restricted="1">"#,
        escape(&item.id),
        escape(&item.parent_id)
    ));
    didl.push_str(&format!("<dc:title>{}</dc:title>", escape(title)));
    didl.push_str(&format!(
        "<upnp:class>{}</upnp:class>",
        escape(&item.upnp_class)
    ));
    didl.push_str(&format!(
        r#"<res protocolInfo="{}">{}</res>"#,
        escape(protocol_info),
        escape(uri)
    ));
    didl.push_str("</item></DIDL-Lite>");

    Ok(didl)
}

/// Builds the SetAVTransportURI payload
pub fn build_setavtransporturi_payload(uri: &str, metadata: &str) -> String {
    format!(
        r#"
    <InstanceID>{DLNA_INSTANCE_ID}</InstanceID>
    <CurrentURI>{}</CurrentURI>
    <CurrentURIMetaData>{}</CurrentURIMetaData>
"#,
        escape(uri),
        escape(metadata)
    )
}
