//! Purpose: Read domain objects from a frame stream.
//! Exports: `Decoder`, `DecodingOptions`, `DecodingOverride`, `ReadOutcome`, `PartialDecode`.
//! Role: Frame read, catalog parse, strict validation, defaulting and conversion per document.
//! Invariants: Defaulting runs on the external form, before any conversion to hub or internal.
//! Invariants: End-of-stream and frame-level errors close the reader; later calls report end-of-stream.
//! Invariants: A document that fails to decode leaves the reader at the next document.
//! Invariants: `decode_all` returns every object decoded before a failure alongside the error.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::core::codec::{CodecCatalog, decode_document, document_gvk};
use crate::core::comments::{self, PRESERVED_COMMENTS_ANNOTATION, PreservedComments};
use crate::core::convert::Converter;
use crate::core::error::{Error, ErrorKind};
use crate::core::frame::FrameReader;
use crate::core::meta::GroupVersionKind;
use crate::core::object::Object;

pub type DecodingOverride = Box<dyn FnOnce(&mut DecodingOptions)>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DecodingOptions {
    /// Reject unknown and duplicate fields.
    pub strict: bool,
    /// Apply the registry's defaulting for the document's version.
    pub default: bool,
    /// Return the hub (or internal) version instead of the document's version.
    pub convert_to_hub: bool,
    /// Let `decode_all` expand list documents into their elements.
    pub decode_list_elements: bool,
    pub preserve_comments: bool,
}

impl DecodingOptions {
    pub fn new() -> Self {
        Self {
            strict: true,
            default: false,
            convert_to_hub: false,
            decode_list_elements: true,
            preserve_comments: false,
        }
    }

    /// Defaults with each override applied in order.
    pub fn from_overrides(overrides: impl IntoIterator<Item = DecodingOverride>) -> Self {
        let mut options = Self::new();
        for apply in overrides {
            apply(&mut options);
        }
        options
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_default(mut self, default: bool) -> Self {
        self.default = default;
        self
    }

    pub fn with_convert_to_hub(mut self, convert: bool) -> Self {
        self.convert_to_hub = convert;
        self
    }

    pub fn with_decode_list_elements(mut self, split: bool) -> Self {
        self.decode_list_elements = split;
        self
    }

    pub fn with_preserve_comments(mut self, preserve: bool) -> Self {
        self.preserve_comments = preserve;
        self
    }
}

impl Default for DecodingOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReadOutcome {
    Decoded,
    EndOfStream,
}

/// Objects decoded before `decode_all` hit an error, and that error.
#[derive(Debug)]
pub struct PartialDecode {
    pub objects: Vec<Box<dyn Object>>,
    pub error: Error,
}

impl PartialDecode {
    pub fn into_parts(self) -> (Vec<Box<dyn Object>>, Error) {
        (self.objects, self.error)
    }
}

impl fmt::Display for PartialDecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (after {} decoded objects)",
            self.error,
            self.objects.len()
        )
    }
}

impl StdError for PartialDecode {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.error)
    }
}

struct Document {
    value: Value,
    comments: Option<PreservedComments>,
}

#[derive(Clone, Debug)]
pub struct Decoder {
    converter: Converter,
    catalog: Arc<CodecCatalog>,
    options: DecodingOptions,
}

impl Decoder {
    pub fn new(converter: Converter, catalog: Arc<CodecCatalog>, options: DecodingOptions) -> Self {
        Self {
            converter,
            catalog,
            options,
        }
    }

    pub fn options(&self) -> &DecodingOptions {
        &self.options
    }

    /// Decodes the next document; `None` once the stream is exhausted.
    pub fn decode(&self, reader: &mut dyn FrameReader) -> Result<Option<Box<dyn Object>>, Error> {
        self.read_document(reader)?
            .map(|document| self.finish(document))
            .transpose()
    }

    /// Decodes the next document and converts it into `into`, whatever version `into` is.
    /// `convert_to_hub` does not apply here.
    pub fn decode_into(
        &self,
        reader: &mut dyn FrameReader,
        into: &mut dyn Object,
    ) -> Result<ReadOutcome, Error> {
        self.decode_next_into(reader, into)
    }

    /// Decodes every remaining document. List documents are expanded into their
    /// elements when `decode_list_elements` is set. The first error stops the scan and
    /// closes the reader.
    pub fn decode_all(
        &self,
        reader: &mut dyn FrameReader,
    ) -> Result<Vec<Box<dyn Object>>, PartialDecode> {
        let mut objects = Vec::new();
        loop {
            match self.decode_next_batch(reader, &mut objects) {
                Ok(true) => {}
                Ok(false) => return Ok(objects),
                Err(error) => {
                    reader.close();
                    let error = error.with_index(objects.len());
                    return Err(PartialDecode { objects, error });
                }
            }
        }
    }

    fn decode_next_into(
        &self,
        reader: &mut dyn FrameReader,
        into: &mut dyn Object,
    ) -> Result<ReadOutcome, Error> {
        let Some(document) = self.read_document(reader)? else {
            return Ok(ReadOutcome::EndOfStream);
        };
        let decoded = self.decode_external(document.value)?;
        let decoded_gvk = decoded.carried_gvk();
        self.converter.convert(decoded.as_ref(), into)?;
        self.stamp_target(&decoded_gvk, into);
        attach_comments(into, document.comments)?;
        Ok(ReadOutcome::Decoded)
    }

    fn decode_next_batch(
        &self,
        reader: &mut dyn FrameReader,
        out: &mut Vec<Box<dyn Object>>,
    ) -> Result<bool, Error> {
        let Some(document) = self.read_document(reader)? else {
            return Ok(false);
        };
        if self.options.decode_list_elements {
            let gvk = document_gvk(&document.value)?;
            if self.converter.scheme().is_list_kind(&gvk) {
                for item in list_items(document.value)? {
                    out.push(self.finish(Document {
                        value: item,
                        comments: None,
                    })?);
                }
                return Ok(true);
            }
        }
        out.push(self.finish(document)?);
        Ok(true)
    }

    fn read_document(&self, reader: &mut dyn FrameReader) -> Result<Option<Document>, Error> {
        let content_type = reader.content_type();
        let pair = self.catalog.serializer_for(content_type)?;
        let frame = match reader.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return Ok(None),
            Err(err) => {
                // Framing is lost; nothing after this point can be trusted.
                reader.close();
                return Err(err);
            }
        };
        let value = pair.compact.decode_value(&frame, self.options.strict)?;

        let mut captured = None;
        if self.options.preserve_comments {
            if content_type.supports_comments() {
                let found = comments::capture(&String::from_utf8_lossy(&frame));
                if !found.is_empty() {
                    captured = Some(found);
                }
            } else {
                warn!(%content_type, "comment preservation is not supported; ignoring");
            }
        }
        Ok(Some(Document {
            value,
            comments: captured,
        }))
    }

    fn decode_external(&self, value: Value) -> Result<Box<dyn Object>, Error> {
        let mut obj = decode_document(self.converter.scheme(), value, self.options.strict)?;
        if self.options.default {
            self.converter.scheme().apply_defaults(obj.as_mut());
        }
        Ok(obj)
    }

    fn finish(&self, document: Document) -> Result<Box<dyn Object>, Error> {
        let mut obj = self.decode_external(document.value)?;
        if self.options.convert_to_hub {
            obj = self.converter.convert_to_hub(obj.as_ref())?;
        }
        attach_comments(obj.as_mut(), document.comments)?;
        Ok(obj)
    }

    /// Gives `into` the identifier its type is registered under for the decoded kind;
    /// internal targets carry none.
    fn stamp_target(&self, decoded: &GroupVersionKind, into: &mut dyn Object) {
        let Ok((kinds, _)) = self.converter.scheme().object_kinds(into) else {
            return;
        };
        let target = if kinds.contains(decoded) {
            Some(decoded.clone())
        } else {
            kinds.into_iter().find(|gvk| gvk.same_group_kind(decoded))
        };
        match target {
            Some(gvk) if gvk.is_internal() => {
                into.set_group_version_kind(&GroupVersionKind::default());
            }
            Some(gvk) => into.set_group_version_kind(&gvk),
            None => {}
        }
    }
}

fn list_items(value: Value) -> Result<Vec<Value>, Error> {
    let items = match value {
        Value::Object(mut map) => map.remove("items"),
        _ => None,
    };
    match items {
        Some(Value::Array(items)) => {
            debug!(count = items.len(), "splitting list document");
            Ok(items)
        }
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(_) => Err(Error::new(ErrorKind::Malformed).with_message("list items must be a sequence")),
    }
}

fn attach_comments(obj: &mut dyn Object, comments: Option<PreservedComments>) -> Result<(), Error> {
    let Some(comments) = comments else {
        return Ok(());
    };
    let raw = comments.to_annotation()?;
    match obj.annotations_mut() {
        Some(annotations) => {
            annotations.insert(PRESERVED_COMMENTS_ANNOTATION.to_string(), raw);
        }
        None => debug!(ty = obj.type_name(), "object has no annotations; dropping comments"),
    }
    Ok(())
}
