//! # Notification Documents
//!
//! Per-delta Atom document: the original `<feed>` start tag, the feed-level
//! elements, and the delta entries each tagged with their `atom:source`.

use crate::domain::{FeedEntry, FeedHeader, FeedMetadata};

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n";

/// Build the body POSTed to every subscriber of a delta.
pub fn build_notification(header: &FeedHeader, entries: &[FeedEntry]) -> String {
    let mut doc = String::with_capacity(
        XML_DECLARATION.len()
            + header.root_open_tag.len()
            + header.head.len()
            + entries.iter().map(|e| e.raw.len() + 256).sum::<usize>()
            + 16,
    );
    doc.push_str(XML_DECLARATION);
    doc.push_str(&header.root_open_tag);
    doc.push_str(&header.head);
    for entry in entries {
        if entry.has_source {
            doc.push_str(&entry.raw);
        } else {
            doc.push_str(&inject_source(&entry.raw, &header.metadata));
        }
        doc.push('\n');
    }
    doc.push_str(&closing_tag(&header.root_open_tag));
    doc
}

/// `</feed>` matching the root start tag's prefix.
fn closing_tag(root_open_tag: &str) -> String {
    let name: String = root_open_tag
        .trim_start_matches('<')
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != '>' && *c != '/')
        .collect();
    if name.is_empty() {
        "</feed>".to_string()
    } else {
        format!("</{}>", name)
    }
}

/// Insert an `atom:source` element just before the entry's end tag.
///
/// Children use the same namespace prefix as the entry element itself.
pub fn inject_source(raw_entry: &str, metadata: &FeedMetadata) -> String {
    let Some(close_at) = raw_entry.rfind("</") else {
        return raw_entry.to_string();
    };
    let close_tag = &raw_entry[close_at + 2..];
    let prefix = match close_tag.find(':') {
        Some(colon) if colon < close_tag.find('>').unwrap_or(close_tag.len()) => {
            &close_tag[..=colon]
        }
        _ => "",
    };

    let mut source = format!("<{}source>", prefix);
    if let Some(id) = &metadata.id {
        source.push_str(&format!("<{p}id>{}</{p}id>", id, p = prefix));
    }
    if let Some(title) = &metadata.title {
        source.push_str(&format!("<{p}title>{}</{p}title>", title, p = prefix));
    }
    if let Some(updated) = &metadata.updated {
        source.push_str(&format!("<{p}updated>{}</{p}updated>", updated, p = prefix));
    }
    if let Some(href) = &metadata.self_link {
        source.push_str(&format!(
            "<{p}link rel=\"self\" href=\"{}\"/>",
            href,
            p = prefix
        ));
    }
    source.push_str(&format!("</{}source>", prefix));

    let mut out = String::with_capacity(raw_entry.len() + source.len());
    out.push_str(&raw_entry[..close_at]);
    out.push_str(&source);
    out.push_str(&raw_entry[close_at..]);
    out
}
