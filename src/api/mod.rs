//! Purpose: Define the stable public Rust API boundary.
//! Exports: Object model, registry, options, encoder/decoder and framing types.
//! Role: Public, additive-only surface over `core`.
//! Invariants: Everything a caller needs to set up a registry and move objects through
//! Invariants: streams is reachable from here.

mod serializer;

pub use crate::core::codec::{CodecCatalog, CodecPair, JsonCodec, ValueCodec, VersionedCodec, YamlCodec};
pub use crate::core::comments::{PRESERVED_COMMENTS_ANNOTATION, PreservedComments};
pub use crate::core::convert::Converter;
pub use crate::core::decode::{Decoder, DecodingOptions, DecodingOverride, PartialDecode, ReadOutcome};
pub use crate::core::encode::{Encoder, EncodingOptions, EncodingOverride};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{BoxError, ConversionCause, Error, ErrorKind};
pub use crate::core::frame::{
    ContentType, ContentTyped, DEFAULT_MAX_FRAME_BYTES, FrameLimits, FrameReader, FrameWriter,
    StreamFrameReader, StreamFrameWriter,
};
pub use crate::core::meta::{GroupKind, GroupVersion, GroupVersionKind, INTERNAL_VERSION, TypeMeta};
pub use crate::core::object::{Convertible, Hub, LIST_KIND, List, Object, ObjectData};
pub use crate::core::resolve::{external_gvk_for_object, gvk_for_object};
pub use crate::core::scheme::{Scheme, Scope};
pub use serializer::{ApiResult, Serializer};
