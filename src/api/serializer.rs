//! Purpose: Entry point bundling a registry and a codec catalog.
//! Exports: `Serializer`.
//! Role: Hands out encoders, decoders and converters sharing one read-only setup.
//! Invariants: The registry and catalog are never mutated after construction.

use std::sync::Arc;

use tracing::debug;

use crate::core::codec::CodecCatalog;
use crate::core::convert::Converter;
use crate::core::decode::{Decoder, DecodingOptions};
use crate::core::encode::{Encoder, EncodingOptions};
use crate::core::error::Error;
use crate::core::meta::GroupVersionKind;
use crate::core::object::Object;
use crate::core::resolve::external_gvk_for_object;
use crate::core::scheme::Scheme;

pub type ApiResult<T> = Result<T, Error>;

#[derive(Clone, Debug)]
pub struct Serializer {
    scheme: Arc<Scheme>,
    catalog: Arc<CodecCatalog>,
}

impl Serializer {
    /// Uses the default JSON and YAML catalog.
    pub fn new(scheme: Arc<Scheme>) -> Self {
        Self {
            scheme,
            catalog: Arc::new(CodecCatalog::default()),
        }
    }

    pub fn with_catalog(mut self, catalog: Arc<CodecCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn scheme(&self) -> &Arc<Scheme> {
        &self.scheme
    }

    pub fn catalog(&self) -> &Arc<CodecCatalog> {
        &self.catalog
    }

    pub fn converter(&self) -> Converter {
        Converter::new(Arc::clone(&self.scheme))
    }

    pub fn encoder(&self, options: EncodingOptions) -> Encoder {
        Encoder::new(self.converter(), Arc::clone(&self.catalog), options)
    }

    pub fn decoder(&self, options: DecodingOptions) -> Decoder {
        Decoder::new(self.converter(), Arc::clone(&self.catalog), options)
    }

    /// Fills an internal object with the defaults of its preferred external version:
    /// converts out, defaults, and converts back.
    pub fn default_internal(&self, obj: &mut dyn Object) -> ApiResult<()> {
        let external = external_gvk_for_object(&self.scheme, obj)?;
        let converter = self.converter();
        let mut defaulted = converter.convert_into_new(obj, &external)?;
        self.scheme.apply_defaults(defaulted.as_mut());
        converter.convert(defaulted.as_ref(), obj)?;
        obj.set_group_version_kind(&GroupVersionKind::default());
        debug!(external = %external, "defaulted internal object");
        Ok(())
    }
}
