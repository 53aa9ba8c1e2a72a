//! Purpose: Write domain objects to a frame stream in their external form.
//! Exports: `Encoder`, `EncodingOptions`, `EncodingOverride`.
//! Role: Identifier resolution, version promotion, conversion and catalog serialization.
//! Invariants: Internal objects are written as their group's highest-priority version.
//! Invariants: A failing object never produces a partial frame; earlier frames stay written.
//! Invariants: Comment preservation only applies to content types that carry comments.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::codec::CodecCatalog;
use crate::core::comments::{self, PRESERVED_COMMENTS_ANNOTATION, PreservedComments};
use crate::core::convert::Converter;
use crate::core::error::Error;
use crate::core::frame::FrameWriter;
use crate::core::meta::GroupVersion;
use crate::core::object::Object;
use crate::core::resolve::{external_gvk_for_object, gvk_for_object};

pub type EncodingOverride = Box<dyn FnOnce(&mut EncodingOptions)>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EncodingOptions {
    pub pretty: bool,
    pub preserve_comments: bool,
}

impl EncodingOptions {
    pub fn new() -> Self {
        Self {
            pretty: true,
            preserve_comments: false,
        }
    }

    /// Defaults with each override applied in order.
    pub fn from_overrides(overrides: impl IntoIterator<Item = EncodingOverride>) -> Self {
        let mut options = Self::new();
        for apply in overrides {
            apply(&mut options);
        }
        options
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn with_preserve_comments(mut self, preserve: bool) -> Self {
        self.preserve_comments = preserve;
        self
    }
}

impl Default for EncodingOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct Encoder {
    converter: Converter,
    catalog: Arc<CodecCatalog>,
    options: EncodingOptions,
}

impl Encoder {
    pub fn new(converter: Converter, catalog: Arc<CodecCatalog>, options: EncodingOptions) -> Self {
        Self {
            converter,
            catalog,
            options,
        }
    }

    pub fn options(&self) -> &EncodingOptions {
        &self.options
    }

    /// Encodes each object as one document. Stops at the first failure; the error
    /// carries the index of the failing object.
    pub fn encode(&self, writer: &mut dyn FrameWriter, objects: &[&dyn Object]) -> Result<(), Error> {
        for (index, obj) in objects.iter().enumerate() {
            self.encode_one(writer, *obj)
                .map_err(|err| err.with_index(index))?;
        }
        Ok(())
    }

    /// Encodes `obj` as `group_version`, converting first when it is at another version.
    pub fn encode_for_group_version(
        &self,
        writer: &mut dyn FrameWriter,
        obj: &dyn Object,
        group_version: &GroupVersion,
    ) -> Result<(), Error> {
        let content_type = writer.content_type();
        let pair = self.catalog.serializer_for(content_type)?;
        let codec = self.catalog.specialize(
            pair.select(self.options.pretty),
            group_version.clone(),
            self.converter.clone(),
        );

        let mut stripped = None;
        let mut preserved = None;
        if self.options.preserve_comments {
            if content_type.supports_comments() {
                if let Some((copy, comments)) = take_comments(obj)? {
                    stripped = Some(copy);
                    preserved = Some(comments);
                }
            } else {
                warn!(%content_type, "comment preservation is not supported; ignoring");
            }
        }

        let source = stripped.as_deref().unwrap_or(obj);
        let mut document = codec.encode(source)?;
        if let Some(comments) = preserved {
            document = comments::apply(&document, &comments);
        }
        writer.write_frame(&document)
    }

    fn encode_one(&self, writer: &mut dyn FrameWriter, obj: &dyn Object) -> Result<(), Error> {
        let mut gvk = gvk_for_object(self.converter.scheme(), obj)?;
        if gvk.is_internal() {
            gvk = external_gvk_for_object(self.converter.scheme(), obj)?;
        }
        debug!(gvk = %gvk, "encoding object");
        self.encode_for_group_version(writer, obj, &gvk.group_version())
    }
}

/// Copy of `obj` without the preserved-comments annotation, plus the parsed comments.
/// Conversion may produce an object lacking annotations, so they are captured up front.
fn take_comments(obj: &dyn Object) -> Result<Option<(Box<dyn Object>, PreservedComments)>, Error> {
    let Some(raw) = obj
        .annotations()
        .and_then(|annotations| annotations.get(PRESERVED_COMMENTS_ANNOTATION))
    else {
        return Ok(None);
    };
    let comments = PreservedComments::from_annotation(raw)?;
    let mut copy = obj.deep_copy();
    if let Some(annotations) = copy.annotations_mut() {
        annotations.remove(PRESERVED_COMMENTS_ANNOTATION);
    }
    Ok(Some((copy, comments)))
}
