// YAML comment capture and re-attachment keyed by mapping path.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, ErrorKind};

/// Annotation key holding the captured comments of a decoded document, as JSON.
pub const PRESERVED_COMMENTS_ANNOTATION: &str = "scheme-codec.io/preserved-comments";

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct PreservedComments {
    /// Comment lines directly above a key.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub head: BTreeMap<String, Vec<String>>,
    /// Comment trailing a key's line.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inline: BTreeMap<String, String>,
    /// Comment lines after the last key.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub foot: Vec<String>,
}

impl PreservedComments {
    pub fn is_empty(&self) -> bool {
        self.head.is_empty() && self.inline.is_empty() && self.foot.is_empty()
    }

    pub fn to_annotation(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|err| {
            Error::new(ErrorKind::Malformed)
                .with_message("failed to encode preserved comments")
                .with_source(err)
        })
    }

    pub fn from_annotation(raw: &str) -> Result<Self, Error> {
        serde_json::from_str(raw).map_err(|err| {
            Error::new(ErrorKind::Malformed)
                .with_message(format!("invalid {PRESERVED_COMMENTS_ANNOTATION} annotation"))
                .with_source(err)
        })
    }
}

/// Collects comments from one YAML document. Comments that precede a non-key line
/// carry over to the next key.
pub fn capture(document: &str) -> PreservedComments {
    let mut tracker = PathTracker::default();
    let mut comments = PreservedComments::default();
    let mut pending: Vec<String> = Vec::new();

    for line in document.lines() {
        match tracker.classify(line) {
            Line::Blank | Line::Other => {}
            Line::Comment(text) => pending.push(text.to_string()),
            Line::Key { path, inline } => {
                if !pending.is_empty() {
                    comments.head.insert(path.clone(), std::mem::take(&mut pending));
                }
                if let Some(text) = inline {
                    comments.inline.insert(path, text.to_string());
                }
            }
        }
    }
    comments.foot = pending;
    comments
}

/// Re-attaches `comments` to a freshly printed YAML document by key path.
/// Comments whose key no longer exists are dropped.
pub fn apply(document: &[u8], comments: &PreservedComments) -> Vec<u8> {
    let text = String::from_utf8_lossy(document);
    let mut tracker = PathTracker::default();
    let mut out = String::with_capacity(text.len() + 64);

    for line in text.lines() {
        if let Line::Key { path, inline: None } = tracker.classify(line) {
            if let Some(head) = comments.head.get(&path) {
                let indent = indent_of(line);
                for comment in head {
                    out.push_str(&line[..indent]);
                    out.push_str(comment);
                    out.push('\n');
                }
            }
            out.push_str(line);
            if let Some(inline) = comments.inline.get(&path) {
                out.push(' ');
                out.push_str(inline);
            }
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }
    for comment in &comments.foot {
        out.push_str(comment);
        out.push('\n');
    }
    out.into_bytes()
}

enum Line<'a> {
    Blank,
    Comment(&'a str),
    Key {
        path: String,
        inline: Option<&'a str>,
    },
    Other,
}

struct Frame {
    indent: usize,
    segment: Segment,
}

enum Segment {
    Key(String),
    Item(usize),
}

/// Tracks the mapping path of each line by indentation. Flow collections and
/// multi-line scalars are treated as opaque values.
#[derive(Default)]
struct PathTracker {
    frames: Vec<Frame>,
    block_scalar_indent: Option<usize>,
}

impl PathTracker {
    fn classify<'a>(&mut self, line: &'a str) -> Line<'a> {
        let trimmed = line.trim();
        let mut indent = indent_of(line);

        if let Some(owner) = self.block_scalar_indent {
            if trimmed.is_empty() || indent > owner {
                return Line::Other;
            }
            self.block_scalar_indent = None;
        }
        if trimmed.is_empty() {
            return Line::Blank;
        }
        if trimmed.starts_with('#') {
            return Line::Comment(trimmed);
        }

        let mut content = &line[indent..];
        while let Some(rest) = strip_item_marker(content) {
            self.enter_item(indent);
            indent += content.len() - rest.len();
            content = rest;
        }

        let Some((key, value)) = split_key(content) else {
            return Line::Other;
        };
        self.frames.retain(|frame| frame.indent < indent);
        self.frames.push(Frame {
            indent,
            segment: Segment::Key(key),
        });

        let (value, inline) = split_inline_comment(value);
        let value = value.trim();
        if value.starts_with('|') || value.starts_with('>') {
            self.block_scalar_indent = Some(indent);
        }
        Line::Key {
            path: self.path(),
            inline,
        }
    }

    fn enter_item(&mut self, indent: usize) {
        self.frames.retain(|frame| frame.indent <= indent);
        let next = match self.frames.last() {
            Some(Frame {
                indent: top,
                segment: Segment::Item(index),
            }) if *top == indent => index + 1,
            _ => 0,
        };
        if next > 0 {
            self.frames.pop();
        }
        self.frames.push(Frame {
            indent,
            segment: Segment::Item(next),
        });
    }

    fn path(&self) -> String {
        let mut path = String::new();
        for frame in &self.frames {
            match &frame.segment {
                Segment::Key(key) => {
                    if !path.is_empty() {
                        path.push('.');
                    }
                    path.push_str(key);
                }
                Segment::Item(index) => path.push_str(&format!("[{index}]")),
            }
        }
        path
    }
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

fn strip_item_marker(content: &str) -> Option<&str> {
    if content == "-" {
        return Some("");
    }
    content
        .strip_prefix("- ")
        .map(|rest| rest.trim_start_matches(' '))
}

/// Splits `key: value` at the first unquoted `: ` (or trailing `:`).
fn split_key(content: &str) -> Option<(String, &str)> {
    if content.starts_with(['{', '[', '#', '|', '>', '&', '*', '!']) {
        return None;
    }
    let bytes = content.as_bytes();
    let mut quote: Option<u8> = None;
    for (pos, &byte) in bytes.iter().enumerate() {
        match quote {
            Some(open) if byte == open => quote = None,
            Some(_) => {}
            None if byte == b'"' || byte == b'\'' => quote = Some(byte),
            None if byte == b':' => {
                let next = bytes.get(pos + 1);
                if next.is_none() || next == Some(&b' ') {
                    let key = content[..pos].trim();
                    if key.is_empty() {
                        return None;
                    }
                    return Some((unquote(key).to_string(), &content[pos + 1..]));
                }
            }
            None => {}
        }
    }
    None
}

fn unquote(key: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = key
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    key
}

/// Separates a trailing `# comment` (preceded by whitespace, outside quotes) from a value.
fn split_inline_comment(value: &str) -> (&str, Option<&str>) {
    let bytes = value.as_bytes();
    let mut quote: Option<u8> = None;
    for (pos, &byte) in bytes.iter().enumerate() {
        match quote {
            Some(open) if byte == open => quote = None,
            Some(_) => {}
            None if byte == b'"' || byte == b'\'' => quote = Some(byte),
            None if byte == b'#' && (pos == 0 || bytes[pos - 1] == b' ') => {
                return (&value[..pos], Some(value[pos..].trim_end()));
            }
            None => {}
        }
    }
    (value, None)
}
