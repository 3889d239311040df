//! Atom Feed Adapter
//!
//! Implements `FeedParser` with `quick-xml`. The parser only locates byte
//! ranges: entries and the feed start tag are sliced straight out of the
//! source document, so ids and entry XML are reproduced exactly.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::domain::{FeedEntry, FeedError, FeedHeader, FeedMetadata, ParsedFeed};
use crate::ports::outbound::FeedParser;

/// Atom 1.0 parser.
#[derive(Clone, Copy, Debug, Default)]
pub struct AtomFeedParser;

impl AtomFeedParser {
    /// Create a parser.
    pub fn new() -> Self {
        Self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Field {
    FeedId,
    FeedTitle,
    FeedUpdated,
    EntryId,
    EntryUpdated,
}

#[derive(Debug)]
struct EntryState {
    start: usize,
    id: Option<String>,
    updated: Option<String>,
    has_source: bool,
}

#[derive(Debug)]
struct Capture {
    field: Field,
    depth: usize,
    text: String,
}

fn local_name(tag: &BytesStart<'_>) -> Vec<u8> {
    tag.local_name().as_ref().to_vec()
}

fn self_link(tag: &BytesStart<'_>) -> Option<String> {
    let mut rel = None;
    let mut href = None;
    for attr in tag.attributes().flatten() {
        match attr.key.local_name().as_ref() {
            b"rel" => rel = Some(String::from_utf8_lossy(&attr.value).into_owned()),
            b"href" => href = Some(String::from_utf8_lossy(&attr.value).into_owned()),
            _ => {}
        }
    }
    match rel.as_deref() {
        Some("self") => href,
        _ => None,
    }
}

impl FeedParser for AtomFeedParser {
    fn parse(&self, body: &[u8]) -> Result<ParsedFeed, FeedError> {
        let text = std::str::from_utf8(body).map_err(|_| FeedError::Encoding)?;
        let mut reader = Reader::from_str(text);

        let mut depth = 0usize;
        let mut root_open_tag: Option<String> = None;
        let mut head = String::new();
        let mut head_cursor = 0usize;
        let mut metadata = FeedMetadata::default();
        let mut entries = Vec::new();
        let mut entry: Option<EntryState> = None;
        let mut capture: Option<Capture> = None;
        let mut closed = false;

        loop {
            let before = reader.buffer_position() as usize;
            let event = reader
                .read_event()
                .map_err(|e| FeedError::Malformed(e.to_string()))?;
            let after = reader.buffer_position() as usize;

            match event {
                Event::Start(tag) => {
                    depth += 1;
                    let name = local_name(&tag);
                    match depth {
                        1 => {
                            if name != b"feed" {
                                return Err(FeedError::NotAFeed);
                            }
                            root_open_tag = Some(text[before..after].to_string());
                            head_cursor = after;
                        }
                        2 if name == b"entry" => {
                            head.push_str(&text[head_cursor..before]);
                            entry = Some(EntryState {
                                start: before,
                                id: None,
                                updated: None,
                                has_source: false,
                            });
                        }
                        2 => {
                            let field = match name.as_slice() {
                                b"id" => Some(Field::FeedId),
                                b"title" => Some(Field::FeedTitle),
                                b"updated" => Some(Field::FeedUpdated),
                                _ => None,
                            };
                            if let Some(link) = (name == b"link").then(|| self_link(&tag)).flatten() {
                                metadata.self_link = Some(link);
                            }
                            capture = field.map(|field| Capture {
                                field,
                                depth,
                                text: String::new(),
                            });
                        }
                        3 => {
                            if let Some(state) = entry.as_mut() {
                                match name.as_slice() {
                                    b"id" => {
                                        capture = Some(Capture {
                                            field: Field::EntryId,
                                            depth,
                                            text: String::new(),
                                        })
                                    }
                                    b"updated" => {
                                        capture = Some(Capture {
                                            field: Field::EntryUpdated,
                                            depth,
                                            text: String::new(),
                                        })
                                    }
                                    b"source" => state.has_source = true,
                                    _ => {}
                                }
                            }
                        }
                        _ => {}
                    }
                }
                Event::Empty(tag) => {
                    let name = local_name(&tag);
                    match depth + 1 {
                        1 => {
                            if name != b"feed" {
                                return Err(FeedError::NotAFeed);
                            }
                            // `<feed/>`: no children at all.
                            let raw = &text[before..after];
                            let open = raw.trim_end_matches('>').trim_end_matches('/');
                            root_open_tag = Some(format!("{}>", open.trim_end()));
                            closed = true;
                        }
                        2 if name == b"entry" => {
                            // An entry without an id cannot be tracked; drop it.
                            head.push_str(&text[head_cursor..before]);
                            head_cursor = after;
                        }
                        2 if name == b"link" => {
                            if let Some(link) = self_link(&tag) {
                                metadata.self_link = Some(link);
                            }
                        }
                        3 if name == b"source" => {
                            if let Some(state) = entry.as_mut() {
                                state.has_source = true;
                            }
                        }
                        _ => {}
                    }
                }
                Event::Text(_) | Event::CData(_) => {
                    if let Some(cap) = capture.as_mut() {
                        if cap.depth == depth {
                            cap.text.push_str(&text[before..after]);
                        }
                    }
                }
                Event::End(_) => {
                    let finished = capture.as_ref().is_some_and(|cap| cap.depth == depth);
                    let done = if finished { capture.take() } else { None };
                    if let Some(cap) = done {
                        let value = Some(cap.text);
                        match cap.field {
                            Field::FeedId => metadata.id = value,
                            Field::FeedTitle => metadata.title = value,
                            Field::FeedUpdated => metadata.updated = value,
                            Field::EntryId => {
                                if let Some(state) = entry.as_mut() {
                                    state.id = value;
                                }
                            }
                            Field::EntryUpdated => {
                                if let Some(state) = entry.as_mut() {
                                    state.updated = value;
                                }
                            }
                        }
                    }

                    match depth {
                        1 => {
                            head.push_str(&text[head_cursor..before]);
                            closed = true;
                        }
                        2 => {
                            if let Some(state) = entry.take() {
                                if let Some(id) = state.id {
                                    entries.push(FeedEntry {
                                        id,
                                        updated: state.updated,
                                        raw: text[state.start..after].to_string(),
                                        has_source: state.has_source,
                                    });
                                }
                                head_cursor = after;
                            }
                        }
                        _ => {}
                    }
                    depth = depth.saturating_sub(1);
                }
                Event::Eof => break,
                _ => {}
            }

            if closed {
                break;
            }
        }

        let root_open_tag = root_open_tag.ok_or(FeedError::NotAFeed)?;
        if !closed {
            return Err(FeedError::Malformed("unterminated <feed>".to_string()));
        }

        Ok(ParsedFeed {
            header: FeedHeader {
                root_open_tag,
                head,
                metadata,
            },
            entries,
        })
    }
}
