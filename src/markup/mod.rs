//! Tokenizer and attribute parser for the post markup subset.

mod prepare;

use std::collections::{HashMap, HashSet};

use crate::model::Attachment;

pub use prepare::{ALLOWED_TAGS, decode_entities, prepare, strip_inter_tag_whitespace, strip_tags};

/// Attribute name (lower-cased) to raw value. A repeated name keeps the last value.
pub type AttributeMap = HashMap<String, String>;

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Text(String),
    Open { name: String, attrs: AttributeMap },
    Close(String),
}

impl Token {
    pub fn is_open(&self, tag: &str) -> bool {
        matches!(self, Token::Open { name, .. } if name == tag)
    }

    pub fn is_close(&self, tag: &str) -> bool {
        matches!(self, Token::Close(name) if name == tag)
    }
}

/// Splits markup at `<...>` boundaries. Even slots are text (possibly empty),
/// odd slots are tag interiors without the angle brackets. A tag never spans
/// a line break; a `<` with no `>` on the same line stays text.
pub fn split_raw(markup: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut text_start = 0;
    let mut search = 0;

    while let Some(rel) = markup[search..].find('<') {
        let lt = search + rel;
        let after = &markup[lt + 1..];
        let close = after.find(['>', '\n']);
        match close {
            Some(end) if after.as_bytes()[end] == b'>' => {
                out.push(&markup[text_start..lt]);
                out.push(&after[..end]);
                text_start = lt + 1 + end + 1;
                search = text_start;
            }
            _ => search = lt + 1,
        }
    }
    out.push(&markup[text_start..]);
    out
}

/// Splits the value of one `name=value` segment, where the value may open
/// with a quote and stops at the next quote.
fn parse_attribute(segment: &str) -> Option<(String, String)> {
    let (name, raw) = segment.split_once('=')?;
    let raw = raw.strip_prefix(['"', '\'']).unwrap_or(raw);
    let value = match raw.find(['"', '\'']) {
        Some(end) => &raw[..end],
        None => raw,
    };
    Some((name.to_lowercase(), value.to_string()))
}

/// Parses an open-tag interior: the first space-separated segment is the tag
/// name, later segments of the form `name=value` become attributes.
pub fn parse_open_tag(fragment: &str) -> (String, AttributeMap) {
    let mut segments = fragment.split(' ');
    let name = segments
        .next()
        .unwrap_or_default()
        .trim_end_matches('/')
        .to_string();
    let attrs = segments.filter_map(parse_attribute).collect();
    (name, attrs)
}

fn trim_text(text: &str) -> &str {
    text.trim_matches([' ', '\t', '\n', '\r', '\0', '\x0B'])
}

/// Typed tokens in document order. Text is trimmed and empty text dropped;
/// tag names are lower-cased.
pub fn tokenize(markup: &str) -> Vec<Token> {
    split_raw(markup)
        .into_iter()
        .enumerate()
        .filter_map(|(i, slot)| {
            if i % 2 == 0 {
                let text = trim_text(slot);
                return (!text.is_empty()).then(|| Token::Text(text.to_string()));
            }
            if let Some(closing) = slot.strip_prefix('/') {
                return Some(Token::Close(closing.trim().to_ascii_lowercase()));
            }
            let (name, attrs) = parse_open_tag(slot);
            (!name.is_empty()).then(|| Token::Open {
                name: name.to_ascii_lowercase(),
                attrs,
            })
        })
        .collect()
}

/// Prepares and tokenizes a post body, decoding character references in text
/// and attribute values.
pub fn parse(html: &str) -> Vec<Token> {
    tokenize(&prepare(html))
        .into_iter()
        .map(|token| match token {
            Token::Text(text) => Token::Text(decode_entities(&text)),
            Token::Open { name, attrs } => Token::Open {
                name,
                attrs: attrs
                    .into_iter()
                    .map(|(k, v)| (k, decode_entities(&v)))
                    .collect(),
            },
            close => close,
        })
        .collect()
}

fn lightbox_attachment(attrs: &AttributeMap) -> Option<u32> {
    if !attrs.contains_key("id") {
        return None;
    }
    attrs.get("data-lightboximage")?.trim().parse().ok()
}

fn is_attachment_thumbnail(token: &Token) -> bool {
    match token {
        Token::Open { name, attrs } if name == "img" => {
            attrs.get("class").is_some_and(|c| c.contains("bbc_img"))
                && attrs.get("src").is_some_and(|s| s.contains("dlattach"))
        }
        _ => false,
    }
}

/// Replaces inline attachment links (`<a id data-lightboximage=N>` around an
/// attachment thumbnail) with a plain `<img>` of the attachment file, and
/// records each attachment used this way in `used_inline`.
pub fn resolve_inline_attachments(
    tokens: Vec<Token>,
    attachments: &[Attachment],
    used_inline: &mut HashSet<u32>,
) -> Vec<Token> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;

    while i < tokens.len() {
        let replacement = match &tokens[i] {
            Token::Open { name, attrs } if name == "a" => lightbox_attachment(attrs)
                .and_then(|id| {
                    let end = tokens[i + 1..].iter().position(|t| t.is_close("a"))? + i + 1;
                    tokens[i + 1..end]
                        .iter()
                        .any(is_attachment_thumbnail)
                        .then_some((id, end))
                })
                .and_then(|(id, end)| {
                    attachments
                        .iter()
                        .find(|a| a.id == id)
                        .map(|attachment| (attachment, end))
                }),
            _ => None,
        };

        match replacement {
            Some((attachment, end)) => {
                log::debug!("inline attachment {} placed in text", attachment.id);
                used_inline.insert(attachment.id);
                let mut attrs = AttributeMap::new();
                attrs.insert("src".to_string(), attachment.file.clone());
                out.push(Token::Open {
                    name: "img".to_string(),
                    attrs,
                });
                i = end + 1;
            }
            None => {
                out.push(tokens[i].clone());
                i += 1;
            }
        }
    }
    out
}
