// Shared fixture types and registry setup for integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use scheme_codec::api::{
    BoxError, ContentType, Convertible, GroupVersion, GroupVersionKind, Hub, Object, Scheme,
    Serializer, StreamFrameReader, StreamFrameWriter, TypeMeta,
};
use serde::{Deserialize, Serialize};

pub const GROUP: &str = "foogroup";
pub const WEBAPP: &str = "webapp";

pub const ONE_SIMPLE: &str = "apiVersion: foogroup/v1alpha1\nkind: Simple\ntestString: foo\n";
pub const SIMPLE_UNKNOWN_FIELD: &str =
    "apiVersion: foogroup/v1alpha1\nkind: Simple\ntestString: foo\nunknownField: bar\n";
pub const SIMPLE_DUPLICATE_FIELD: &str =
    "apiVersion: foogroup/v1alpha1\nkind: Simple\ntestString: foo\ntestString: bar\n";
pub const UNRECOGNIZED_VERSION: &str =
    "apiVersion: foogroup/v1alpha0\nkind: Simple\ntestString: foo\n";
pub const ONE_COMPLEX: &str =
    "Int64: 0\napiVersion: foogroup/v1alpha1\nbool: false\nint: 0\nkind: Complex\nstring: bar\n";
pub const TEST_LIST: &str = "\
apiVersion: v1
kind: List
items:
- apiVersion: foogroup/v1alpha1
  kind: Simple
  testString: foo
- apiVersion: foogroup/v1alpha1
  kind: Complex
  int: 5
- apiVersion: foogroup/v1alpha1
  kind: Simple
  testString: bar
";
pub const SIMPLE_JSON: &str =
    "{\"apiVersion\":\"foogroup/v1alpha1\",\"kind\":\"Simple\",\"testString\":\"foo\"}\n";
pub const COMPLEX_JSON: &str = "{\"apiVersion\":\"foogroup/v1alpha1\",\"kind\":\"Complex\",\"string\":\"bar\",\"int\":0,\"Int64\":0,\"bool\":false}\n";

pub fn simple_meta() -> TypeMeta {
    TypeMeta::new("foogroup/v1alpha1", "Simple")
}

pub fn complex_meta() -> TypeMeta {
    TypeMeta::new("foogroup/v1alpha1", "Complex")
}

macro_rules! impl_object {
    ($ty:ty) => {
        impl Object for $ty {
            fn type_meta(&self) -> &TypeMeta {
                &self.type_meta
            }

            fn type_meta_mut(&mut self) -> &mut TypeMeta {
                &mut self.type_meta
            }
        }
    };
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct InternalSimple {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    #[serde(rename = "testString", default)]
    pub test_string: String,
}

impl_object!(InternalSimple);

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ExternalSimple {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    #[serde(rename = "testString", default)]
    pub test_string: String,
}

impl_object!(ExternalSimple);

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct InternalComplex {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    #[serde(rename = "string", default)]
    pub string: String,
    #[serde(rename = "int", default)]
    pub integer: i64,
    #[serde(rename = "Integer64", default, skip_serializing_if = "is_zero")]
    pub integer64: i64,
    #[serde(rename = "Int64", default)]
    pub int64: i64,
    #[serde(rename = "bool", default)]
    pub flag: bool,
}

impl_object!(InternalComplex);

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ExternalComplex {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    #[serde(rename = "string", default)]
    pub string: String,
    #[serde(rename = "int", default)]
    pub integer: i64,
    #[serde(rename = "Integer64", default, skip_serializing_if = "is_zero")]
    pub integer64: i64,
    #[serde(rename = "Int64", default)]
    pub int64: i64,
    #[serde(rename = "bool", default)]
    pub flag: bool,
}

impl_object!(ExternalComplex);

fn is_zero(value: &i64) -> bool {
    *value == 0
}

/// Object carrying annotation storage, for comment preservation.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Annotated {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub replicas: i64,
}

impl Object for Annotated {
    fn type_meta(&self) -> &TypeMeta {
        &self.type_meta
    }

    fn type_meta_mut(&mut self) -> &mut TypeMeta {
        &mut self.type_meta
    }

    fn annotations(&self) -> Option<&BTreeMap<String, String>> {
        Some(&self.annotations)
    }

    fn annotations_mut(&mut self) -> Option<&mut BTreeMap<String, String>> {
        Some(&mut self.annotations)
    }
}

/// v1 keeps a single owner; converts through the v2 hub.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct GuestbookV1 {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub owner: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct GuestbookV2 {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub owners: Vec<String>,
}

/// Second hub-capable version, only registered by misconfigured schemes.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct GuestbookV3 {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    #[serde(default)]
    pub title: String,
}

impl Object for GuestbookV1 {
    fn type_meta(&self) -> &TypeMeta {
        &self.type_meta
    }

    fn type_meta_mut(&mut self) -> &mut TypeMeta {
        &mut self.type_meta
    }

    fn as_convertible(&self) -> Option<&dyn Convertible> {
        Some(self)
    }

    fn as_convertible_mut(&mut self) -> Option<&mut dyn Convertible> {
        Some(self)
    }
}

impl Convertible for GuestbookV1 {
    fn convert_to(&self, hub: &mut dyn Object) -> Result<(), BoxError> {
        if self.title.is_empty() {
            return Err("guestbook title is required".into());
        }
        let hub = hub
            .downcast_mut::<GuestbookV2>()
            .ok_or("hub is not a GuestbookV2")?;
        hub.title = self.title.clone();
        hub.owners = if self.owner.is_empty() {
            Vec::new()
        } else {
            vec![self.owner.clone()]
        };
        Ok(())
    }

    fn convert_from(&mut self, hub: &dyn Object) -> Result<(), BoxError> {
        let hub = hub
            .downcast_ref::<GuestbookV2>()
            .ok_or("hub is not a GuestbookV2")?;
        if hub.title.is_empty() {
            return Err("hub guestbook has no title".into());
        }
        self.title = hub.title.clone();
        self.owner = hub.owners.first().cloned().unwrap_or_default();
        Ok(())
    }
}

impl Object for GuestbookV2 {
    fn type_meta(&self) -> &TypeMeta {
        &self.type_meta
    }

    fn type_meta_mut(&mut self) -> &mut TypeMeta {
        &mut self.type_meta
    }

    fn as_hub(&self) -> Option<&dyn Hub> {
        Some(self)
    }
}

impl Hub for GuestbookV2 {}

impl Object for GuestbookV3 {
    fn type_meta(&self) -> &TypeMeta {
        &self.type_meta
    }

    fn type_meta_mut(&mut self) -> &mut TypeMeta {
        &mut self.type_meta
    }

    fn as_hub(&self) -> Option<&dyn Hub> {
        Some(self)
    }
}

impl Hub for GuestbookV3 {}

pub fn gvk(version: &str, kind: &str) -> GroupVersionKind {
    GroupVersionKind::new(GROUP, version, kind)
}

pub fn guestbook_gvk(version: &str) -> GroupVersionKind {
    GroupVersionKind::new(WEBAPP, version, "Guestbook")
}

/// Internal and two external versions of Simple/Complex, v1alpha1 preferred, plus the
/// Guestbook hub pair and the annotated fixture.
pub fn scheme() -> Scheme {
    let mut scheme = Scheme::new();
    scheme.add_known_type::<InternalSimple>(GroupVersion::internal(GROUP).with_kind("Simple"));
    scheme.add_known_type::<InternalComplex>(GroupVersion::internal(GROUP).with_kind("Complex"));
    for version in ["v1alpha1", "v1alpha2"] {
        scheme.add_known_type::<ExternalSimple>(gvk(version, "Simple"));
        scheme.add_known_type::<ExternalComplex>(gvk(version, "Complex"));
    }

    scheme.add_conversion_func(|input: &ExternalSimple, output: &mut InternalSimple, _| {
        output.test_string = input.test_string.clone();
        Ok(())
    });
    scheme.add_conversion_func(|input: &InternalSimple, output: &mut ExternalSimple, _| {
        output.test_string = input.test_string.clone();
        Ok(())
    });
    scheme.add_conversion_func(|input: &ExternalComplex, output: &mut InternalComplex, _| {
        output.string = input.string.clone();
        output.integer = input.integer;
        output.integer64 = input.integer64;
        output.int64 = input.int64;
        output.flag = input.flag;
        Ok(())
    });
    scheme.add_conversion_func(|input: &InternalComplex, output: &mut ExternalComplex, _| {
        output.string = input.string.clone();
        output.integer = input.integer;
        output.integer64 = input.integer64;
        output.int64 = input.int64;
        output.flag = input.flag;
        Ok(())
    });

    scheme.add_defaulting_func(gvk("v1alpha1", "Complex"), |obj: &mut ExternalComplex| {
        if obj.integer64 == 0 {
            obj.integer64 = 3;
        }
    });
    scheme.add_defaulting_func(gvk("v1alpha2", "Complex"), |obj: &mut ExternalComplex| {
        if obj.integer64 == 0 {
            obj.integer64 = 5;
        }
    });
    scheme.set_version_priority(&[GroupVersion::new(GROUP, "v1alpha1")]);

    scheme.add_known_type::<GuestbookV1>(guestbook_gvk("v1"));
    scheme.add_known_type::<GuestbookV2>(guestbook_gvk("v2"));
    scheme.add_known_type::<Annotated>(GroupVersionKind::new("apps", "v1", "Annotated"));
    scheme
}

pub fn serializer() -> Serializer {
    Serializer::new(Arc::new(scheme()))
}

pub fn yaml(input: &str) -> StreamFrameReader<std::io::Cursor<Vec<u8>>> {
    StreamFrameReader::from_bytes(ContentType::Yaml, input)
}

pub fn json(input: &str) -> StreamFrameReader<std::io::Cursor<Vec<u8>>> {
    StreamFrameReader::from_bytes(ContentType::Json, input)
}

pub fn written(writer: StreamFrameWriter<Vec<u8>>) -> String {
    String::from_utf8(writer.into_inner()).expect("utf8 output")
}
