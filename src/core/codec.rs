//! Purpose: Map content types to document (de)serializers and bind them to a version.
//! Exports: `ValueCodec`, `JsonCodec`, `YamlCodec`, `CodecPair`, `CodecCatalog`, `VersionedCodec`.
//! Role: Bytes <-> `serde_json::Value` per format; `Value` <-> typed objects via the registry.
//! Invariants: Codec output for one document always ends with a newline.
//! Invariants: YAML mappings are emitted with keys in byte order; JSON keeps field order.
//! Invariants: Strict mode rejects duplicate keys and fields the target type does not know.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeSeed;
use serde_json::{Map, Value};
use tracing::trace;

use crate::core::convert::Converter;
use crate::core::error::{Error, ErrorKind};
use crate::core::frame::ContentType;
use crate::core::meta::{GroupVersion, GroupVersionKind, TypeMeta};
use crate::core::object::Object;
use crate::core::resolve::gvk_for_object;
use crate::core::scheme::Scheme;
use crate::core::strict::{ValueSeed, unknown_fields};

/// Low-level serializer for one content type, working on untyped documents.
pub trait ValueCodec: fmt::Debug + Send + Sync {
    fn content_type(&self) -> ContentType;
    fn encode_value(&self, value: &Value) -> Result<Vec<u8>, Error>;
    /// Parses one document. Duplicate keys fail with `StrictDecoding` when `strict` is set;
    /// otherwise the last occurrence wins.
    fn decode_value(&self, data: &[u8], strict: bool) -> Result<Value, Error>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec {
    pub pretty: bool,
}

impl ValueCodec for JsonCodec {
    fn content_type(&self) -> ContentType {
        ContentType::Json
    }

    fn encode_value(&self, value: &Value) -> Result<Vec<u8>, Error> {
        let encoded = if self.pretty {
            serde_json::to_vec_pretty(value)
        } else {
            serde_json::to_vec(value)
        };
        let mut out = encoded.map_err(|err| {
            Error::new(ErrorKind::Malformed)
                .with_message("failed to encode JSON document")
                .with_source(err)
        })?;
        out.push(b'\n');
        Ok(out)
    }

    fn decode_value(&self, data: &[u8], strict: bool) -> Result<Value, Error> {
        let duplicates = RefCell::new(Vec::new());
        let mut de = serde_json::Deserializer::from_slice(data);
        let value = ValueSeed::new(&duplicates)
            .deserialize(&mut de)
            .and_then(|value| de.end().map(|()| value))
            .map_err(|err| {
                Error::new(ErrorKind::Malformed)
                    .with_message("invalid JSON document")
                    .with_source(err)
            })?;
        check_duplicates(duplicates.into_inner(), strict)?;
        Ok(value)
    }
}

/// YAML has a single human-oriented layout, so compact and pretty output are identical.
#[derive(Clone, Copy, Debug, Default)]
pub struct YamlCodec;

impl ValueCodec for YamlCodec {
    fn content_type(&self) -> ContentType {
        ContentType::Yaml
    }

    fn encode_value(&self, value: &Value) -> Result<Vec<u8>, Error> {
        let text = serde_yaml::to_string(&sorted_keys(value)).map_err(|err| {
            Error::new(ErrorKind::Malformed)
                .with_message("failed to encode YAML document")
                .with_source(err)
        })?;
        let mut out = text.into_bytes();
        if !out.ends_with(b"\n") {
            out.push(b'\n');
        }
        Ok(out)
    }

    fn decode_value(&self, data: &[u8], strict: bool) -> Result<Value, Error> {
        let duplicates = RefCell::new(Vec::new());
        let value = ValueSeed::new(&duplicates)
            .deserialize(serde_yaml::Deserializer::from_slice(data))
            .map_err(|err| {
                Error::new(ErrorKind::Malformed)
                    .with_message("invalid YAML document")
                    .with_source(err)
            })?;
        check_duplicates(duplicates.into_inner(), strict)?;
        Ok(value)
    }
}

fn check_duplicates(duplicates: Vec<String>, strict: bool) -> Result<(), Error> {
    if !strict || duplicates.is_empty() {
        return Ok(());
    }
    Err(Error::new(ErrorKind::StrictDecoding).with_message(format!(
        "duplicate field {}",
        quote_list(&duplicates)
    )))
}

fn quote_list(fields: &[String]) -> String {
    fields
        .iter()
        .map(|field| format!("{field:?}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn sorted_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> =
                map.iter().map(|(key, value)| (key, sorted_keys(value))).collect();
            let mut out = Map::new();
            for (key, value) in sorted {
                out.insert(key.clone(), value);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted_keys).collect()),
        other => other.clone(),
    }
}

#[derive(Clone, Debug)]
pub struct CodecPair {
    pub compact: Arc<dyn ValueCodec>,
    pub pretty: Arc<dyn ValueCodec>,
}

impl CodecPair {
    pub fn select(&self, pretty: bool) -> Arc<dyn ValueCodec> {
        if pretty {
            Arc::clone(&self.pretty)
        } else {
            Arc::clone(&self.compact)
        }
    }
}

/// Content type to codec pair lookup. `Default` registers JSON and YAML.
#[derive(Clone, Debug)]
pub struct CodecCatalog {
    pairs: HashMap<ContentType, CodecPair>,
}

impl CodecCatalog {
    /// Catalog with no registered content types.
    pub fn empty() -> Self {
        Self {
            pairs: HashMap::new(),
        }
    }

    pub fn register(&mut self, content_type: ContentType, pair: CodecPair) {
        self.pairs.insert(content_type, pair);
    }

    pub fn serializer_for(&self, content_type: ContentType) -> Result<&CodecPair, Error> {
        self.pairs.get(&content_type).ok_or_else(|| {
            Error::new(ErrorKind::UnsupportedContentType)
                .with_message(format!("no serializer registered for {content_type}"))
        })
    }

    /// Binds `codec` to `group_version`: encoded objects are converted to it first and
    /// decoded documents are converted to it when they name another version.
    pub fn specialize(
        &self,
        codec: Arc<dyn ValueCodec>,
        group_version: GroupVersion,
        converter: Converter,
    ) -> VersionedCodec {
        VersionedCodec {
            codec,
            group_version,
            converter,
        }
    }
}

impl Default for CodecCatalog {
    fn default() -> Self {
        let mut catalog = Self::empty();
        catalog.register(
            ContentType::Json,
            CodecPair {
                compact: Arc::new(JsonCodec { pretty: false }),
                pretty: Arc::new(JsonCodec { pretty: true }),
            },
        );
        let yaml: Arc<dyn ValueCodec> = Arc::new(YamlCodec);
        catalog.register(
            ContentType::Yaml,
            CodecPair {
                compact: Arc::clone(&yaml),
                pretty: yaml,
            },
        );
        catalog
    }
}

#[derive(Clone, Debug)]
pub struct VersionedCodec {
    codec: Arc<dyn ValueCodec>,
    group_version: GroupVersion,
    converter: Converter,
}

impl VersionedCodec {
    pub fn group_version(&self) -> &GroupVersion {
        &self.group_version
    }

    pub fn content_type(&self) -> ContentType {
        self.codec.content_type()
    }

    pub fn encode(&self, obj: &dyn Object) -> Result<Vec<u8>, Error> {
        let current = gvk_for_object(self.converter.scheme(), obj)?;
        let target = self.group_version.with_kind(current.kind.clone());
        let prepared = if current == target {
            let mut copy = obj.deep_copy();
            copy.set_group_version_kind(&target);
            copy
        } else {
            trace!(from = %current, to = %target, "converting before encode");
            self.converter.convert_into_new(obj, &target)?
        };
        let value = prepared.to_value().map_err(|err| {
            Error::new(ErrorKind::Malformed)
                .with_message("failed to serialize object")
                .with_gvk(target.clone())
                .with_source(err)
        })?;
        self.codec.encode_value(&value)
    }

    pub fn decode(&self, data: &[u8], strict: bool) -> Result<Box<dyn Object>, Error> {
        let value = self.codec.decode_value(data, strict)?;
        let obj = decode_document(self.converter.scheme(), value, strict)?;
        let gvk = obj.carried_gvk();
        if gvk.group_version() == self.group_version {
            return Ok(obj);
        }
        let target = self.group_version.with_kind(gvk.kind.clone());
        self.converter.convert_into_new(obj.as_ref(), &target)
    }
}

/// Identifier named by a parsed document; empty when it names none.
pub(crate) fn document_gvk(value: &Value) -> Result<GroupVersionKind, Error> {
    let field = |name: &str| {
        value
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    TypeMeta::new(field("apiVersion"), field("kind")).group_version_kind()
}

/// Instantiates the registered type a document names and loads it. Strict mode additionally
/// rejects fields the type does not read.
pub(crate) fn decode_document(
    scheme: &Scheme,
    value: Value,
    strict: bool,
) -> Result<Box<dyn Object>, Error> {
    let gvk = document_gvk(&value)?;
    if gvk.is_empty() {
        return Err(Error::new(ErrorKind::Malformed)
            .with_message("document does not set apiVersion and kind"));
    }
    let mut obj = scheme.new_object(&gvk)?;
    let input = strict.then(|| value.clone());
    obj.load_value(value).map_err(|err| {
        Error::new(ErrorKind::Malformed)
            .with_message("document does not match its declared type")
            .with_gvk(gvk.clone())
            .with_source(err)
    })?;

    if let Some(input) = input {
        let retained = obj.to_value().map_err(|err| {
            Error::new(ErrorKind::Malformed)
                .with_gvk(gvk.clone())
                .with_source(err)
        })?;
        let unknown = unknown_fields(&input, &retained, |candidate| {
            let mut fresh = scheme.new_object(&gvk).ok()?;
            fresh.load_value(candidate).ok()?;
            fresh.to_value().ok()
        });
        if !unknown.is_empty() {
            return Err(Error::new(ErrorKind::StrictDecoding)
                .with_message(format!("unknown field {}", quote_list(&unknown)))
                .with_gvk(gvk));
        }
    }

    obj.set_group_version_kind(&gvk);
    Ok(obj)
}
