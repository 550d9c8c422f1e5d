//! Typed outline document and delimiter-based extraction from free-form model output

use crate::error::{Result, WeaverError};
use serde::de::DeserializeOwned;
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::{Deserialize, Serialize};

/// A document the fetcher can pull out of free-form text by its root element
pub trait StructuredDocument: DeserializeOwned + Send {
    const ROOT_TAG: &'static str;
}

/// Parsed response to the outliner call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "knowledge")]
pub struct Outline {
    pub topic: String,
    pub sections: SectionList,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionList {
    #[serde(rename = "section", default)]
    pub entries: Vec<SectionSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionSpec {
    pub title: String,
    #[serde(rename = "content", default)]
    pub content_hint: String,
}

impl StructuredDocument for Outline {
    const ROOT_TAG: &'static str = "knowledge";
}

impl Outline {
    pub fn sections(&self) -> &[SectionSpec] {
        &self.sections.entries
    }

    pub fn is_empty(&self) -> bool {
        self.sections.entries.is_empty()
    }
}

/// Slice from the first opening root tag through the last closing root tag.
///
/// Returns `None` when either marker is missing or the closing marker ends
/// before the opening one starts.
pub fn extract_payload<'a>(raw: &'a str, root_tag: &str) -> Option<&'a str> {
    let open = format!("<{}>", root_tag);
    let close = format!("</{}>", root_tag);

    let start = raw.find(&open)?;
    let end = raw.rfind(&close)? + close.len();
    if end < start + open.len() {
        return None;
    }
    Some(&raw[start..end])
}

/// Extract and decode a structured document, returning it with the exact slice that was parsed
pub fn parse_structured<T: StructuredDocument>(raw: &str) -> Result<(T, String)> {
    let payload = extract_payload(raw, T::ROOT_TAG).ok_or_else(|| WeaverError::MalformedOutline {
        message: format!("<{}> tags not found in the response", T::ROOT_TAG),
    })?;
    let document: T = quick_xml::de::from_str(payload)?;
    ensure_single_root(payload)?;
    Ok((document, payload.to_string()))
}

/// The payload must be exactly one element; anything but whitespace or
/// comments after the root closes is malformed.
fn ensure_single_root(payload: &str) -> Result<()> {
    let mut reader = Reader::from_str(payload);
    let mut depth = 0usize;
    let mut root_closed = false;

    loop {
        let event = reader.read_event().map_err(|e| WeaverError::MalformedOutline {
            message: format!("XML parsing failed: {}", e),
        })?;
        let junk = match event {
            Event::Eof => return Ok(()),
            Event::Start(_) => {
                depth += 1;
                root_closed
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                let junk = root_closed;
                root_closed = depth == 0;
                junk
            }
            Event::Empty(_) => {
                let junk = root_closed;
                root_closed = root_closed || depth == 0;
                junk
            }
            Event::Text(text) => root_closed && !text.iter().all(u8::is_ascii_whitespace),
            Event::CData(_) => root_closed,
            _ => false,
        };
        if junk {
            return Err(WeaverError::MalformedOutline {
                message: format!(
                    "content after the root element ends at byte {}",
                    reader.buffer_position()
                ),
            });
        }
    }
}
