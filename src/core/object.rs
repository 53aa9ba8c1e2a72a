//! Purpose: Define the domain object contract the registry, converter and codecs operate on.
//! Exports: `Object`, `ObjectData`, `Convertible`, `Hub`, `List`, `LIST_KIND`.
//! Role: Type-erased boundary so heterogeneous versions can travel as `Box<dyn Object>`.
//! Invariants: Capabilities (Convertible, Hub, annotations) are opt-in accessors, never supertraits.
//! Invariants: `ObjectData` is blanket-implemented; types only implement `Object`.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::error::BoxError;
use crate::core::meta::{GroupVersionKind, TypeMeta};

/// Erased serde, cloning and downcasting support, provided for every `Object`.
pub trait ObjectData: Any + Send + Sync + fmt::Debug + 'static {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn deep_copy(&self) -> Box<dyn Object>;
    fn type_name(&self) -> &'static str;
    fn to_value(&self) -> Result<Value, serde_json::Error>;
    /// Replaces the whole object with the decoded value.
    fn load_value(&mut self, value: Value) -> Result<(), serde_json::Error>;
}

impl<T> ObjectData for T
where
    T: Object + Clone + Serialize + DeserializeOwned,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn deep_copy(&self) -> Box<dyn Object> {
        Box::new(self.clone())
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn load_value(&mut self, value: Value) -> Result<(), serde_json::Error> {
        *self = serde_json::from_value(value)?;
        Ok(())
    }
}

pub trait Object: ObjectData + 'static {
    fn type_meta(&self) -> &TypeMeta;
    fn type_meta_mut(&mut self) -> &mut TypeMeta;

    fn as_convertible(&self) -> Option<&dyn Convertible> {
        None
    }

    fn as_convertible_mut(&mut self) -> Option<&mut dyn Convertible> {
        None
    }

    fn as_hub(&self) -> Option<&dyn Hub> {
        None
    }

    /// Storage for non-semantic annotations (preserved comments live here).
    fn annotations(&self) -> Option<&BTreeMap<String, String>> {
        None
    }

    fn annotations_mut(&mut self) -> Option<&mut BTreeMap<String, String>> {
        None
    }
}

impl dyn Object {
    pub fn is<T: Object>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Object>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Object>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }

    /// Identifier carried by the object itself; empty or unparsable metadata yields an empty one.
    pub fn carried_gvk(&self) -> GroupVersionKind {
        self.type_meta().group_version_kind().unwrap_or_default()
    }

    pub fn set_group_version_kind(&mut self, gvk: &GroupVersionKind) {
        self.type_meta_mut().set_group_version_kind(gvk);
    }
}

/// Marker capability: the canonical version of a kind that siblings convert through.
pub trait Hub {}

/// Capability of a version that only converts to and from its kind's hub.
pub trait Convertible {
    fn convert_to(&self, hub: &mut dyn Object) -> Result<(), BoxError>;
    fn convert_from(&mut self, hub: &dyn Object) -> Result<(), BoxError>;
}

pub const LIST_KIND: &str = "List";

/// Unversioned wrapper holding raw documents of any kind under `items`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct List {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    #[serde(default)]
    pub items: Vec<Value>,
}

impl List {
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            type_meta: TypeMeta::new("v1", LIST_KIND),
            items,
        }
    }
}

impl Object for List {
    fn type_meta(&self) -> &TypeMeta {
        &self.type_meta
    }

    fn type_meta_mut(&mut self) -> &mut TypeMeta {
        &mut self.type_meta
    }
}
