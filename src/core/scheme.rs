//! Purpose: Registry of known object types, their identifiers, conversions and defaulters.
//! Exports: `Scheme`, `Scope`.
//! Role: Explicitly constructed type registry; configured through `&mut self`, then shared read-only.
//! Invariants: One identifier maps to exactly one Rust type; one type may serve several versions.
//! Invariants: Known types iterate in sorted identifier order, so scans are deterministic.
//! Invariants: Re-registering an identifier with a different type is a setup bug and panics.

use std::any::TypeId;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use crate::core::error::{BoxError, Error, ErrorKind};
use crate::core::meta::{GroupKind, GroupVersion, GroupVersionKind};
use crate::core::object::{LIST_KIND, List, Object};
use crate::core::resolve;

type ObjectFactory = fn() -> Box<dyn Object>;
type ConversionFn =
    Box<dyn Fn(&dyn Object, &mut dyn Object, &Scope<'_>) -> Result<(), BoxError> + Send + Sync>;
type DefaultingFn = Box<dyn Fn(&mut dyn Object) + Send + Sync>;

struct KnownType {
    type_id: TypeId,
    type_name: &'static str,
    factory: ObjectFactory,
}

fn conversion_fn<F>(func: F) -> ConversionFn
where
    F: Fn(&dyn Object, &mut dyn Object, &Scope<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
{
    Box::new(func)
}

fn new_boxed<T: Object + Default>() -> Box<dyn Object> {
    Box::new(T::default())
}

pub(crate) fn type_id_of(obj: &dyn Object) -> TypeId {
    obj.as_any().type_id()
}

/// Handle passed to registered conversion functions for nested conversions.
pub struct Scope<'a> {
    scheme: &'a Scheme,
}

impl Scope<'_> {
    pub fn convert(&self, input: &dyn Object, output: &mut dyn Object) -> Result<(), Error> {
        self.scheme.convert(input, output)
    }

    pub fn scheme(&self) -> &Scheme {
        self.scheme
    }
}

pub struct Scheme {
    known: BTreeMap<GroupVersionKind, KnownType>,
    kinds_by_type: HashMap<TypeId, Vec<GroupVersionKind>>,
    unversioned: HashSet<TypeId>,
    conversions: HashMap<(TypeId, TypeId), ConversionFn>,
    defaulters: HashMap<GroupVersionKind, DefaultingFn>,
    version_priority: HashMap<String, Vec<String>>,
    observed_versions: Vec<GroupVersion>,
}

impl Scheme {
    /// Creates a registry that already knows the unversioned `v1, Kind=List` wrapper.
    pub fn new() -> Self {
        let mut scheme = Self {
            known: BTreeMap::new(),
            kinds_by_type: HashMap::new(),
            unversioned: HashSet::new(),
            conversions: HashMap::new(),
            defaulters: HashMap::new(),
            version_priority: HashMap::new(),
            observed_versions: Vec::new(),
        };
        scheme.add_unversioned_type::<List>(&GroupVersion::new("", "v1"), LIST_KIND);
        scheme
    }

    pub fn add_known_type<T: Object + Default>(&mut self, gvk: GroupVersionKind) {
        assert!(
            !gvk.kind.is_empty() && !gvk.version.is_empty(),
            "kind and version are required to register {}",
            std::any::type_name::<T>()
        );
        let type_id = TypeId::of::<T>();
        if let Some(existing) = self.known.get(&gvk) {
            assert!(
                existing.type_id == type_id,
                "double registration of different types for {gvk}: {} and {}",
                existing.type_name,
                std::any::type_name::<T>()
            );
            return;
        }

        self.known.insert(
            gvk.clone(),
            KnownType {
                type_id,
                type_name: std::any::type_name::<T>(),
                factory: new_boxed::<T>,
            },
        );
        self.kinds_by_type
            .entry(type_id)
            .or_default()
            .push(gvk.clone());

        let gv = gvk.group_version();
        if !gv.is_internal() && !self.observed_versions.contains(&gv) {
            self.observed_versions.push(gv);
        }
    }

    /// Registers a type that is valid at any version of any group (e.g. `List`).
    pub fn add_unversioned_type<T: Object + Default>(&mut self, gv: &GroupVersion, kind: &str) {
        self.add_known_type::<T>(gv.with_kind(kind));
        self.unversioned.insert(TypeId::of::<T>());
    }

    pub fn add_conversion_func<A, B, F>(&mut self, func: F)
    where
        A: Object,
        B: Object,
        F: Fn(&A, &mut B, &Scope<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.conversions.insert(
            (TypeId::of::<A>(), TypeId::of::<B>()),
            conversion_fn(move |input, output, scope| {
                let input = input
                    .downcast_ref::<A>()
                    .ok_or_else(|| BoxError::from("conversion input has an unexpected type"))?;
                let output = output
                    .downcast_mut::<B>()
                    .ok_or_else(|| BoxError::from("conversion output has an unexpected type"))?;
                func(input, output, scope)
            }),
        );
    }

    /// Registers defaulting for one external identifier; later registrations replace earlier ones.
    pub fn add_defaulting_func<T, F>(&mut self, gvk: GroupVersionKind, func: F)
    where
        T: Object,
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        let wrapped = move |obj: &mut dyn Object| {
            if let Some(obj) = obj.downcast_mut::<T>() {
                func(obj);
            }
        };
        self.defaulters.insert(gvk, Box::new(wrapped));
    }

    /// Sets the preferred versions of one group, highest priority first.
    pub fn set_version_priority(&mut self, versions: &[GroupVersion]) {
        let Some(first) = versions.first() else {
            return;
        };
        assert!(
            versions.iter().all(|gv| gv.group == first.group),
            "version priority must name a single group"
        );
        self.version_priority.insert(
            first.group.clone(),
            versions.iter().map(|gv| gv.version.clone()).collect(),
        );
    }

    /// External versions of `group`: explicit priorities first, then registration order.
    pub fn prioritized_versions_for_group(&self, group: &str) -> Vec<GroupVersion> {
        let mut versions: Vec<GroupVersion> = self
            .version_priority
            .get(group)
            .into_iter()
            .flatten()
            .map(|version| GroupVersion::new(group, version.clone()))
            .collect();
        for gv in &self.observed_versions {
            if gv.group == group && !versions.contains(gv) {
                versions.push(gv.clone());
            }
        }
        versions
    }

    /// All identifiers registered for the object's concrete type, plus whether it is unversioned.
    pub fn object_kinds(&self, obj: &dyn Object) -> Result<(Vec<GroupVersionKind>, bool), Error> {
        let type_id = type_id_of(obj);
        match self.kinds_by_type.get(&type_id) {
            Some(kinds) => Ok((kinds.clone(), self.unversioned.contains(&type_id))),
            None => Err(Error::new(ErrorKind::UnknownType).with_message(format!(
                "no kind is registered for the type {}",
                obj.type_name()
            ))),
        }
    }

    pub fn recognizes(&self, gvk: &GroupVersionKind) -> bool {
        self.known.contains_key(gvk)
    }

    pub fn is_unversioned(&self, obj: &dyn Object) -> bool {
        self.unversioned.contains(&type_id_of(obj))
    }

    pub fn is_list_kind(&self, gvk: &GroupVersionKind) -> bool {
        gvk.kind == LIST_KIND
            && self
                .known
                .get(gvk)
                .is_some_and(|known| known.type_id == TypeId::of::<List>())
    }

    /// Every registered identifier of one group/kind, in sorted order.
    pub fn known_kinds(&self, group_kind: &GroupKind) -> Vec<GroupVersionKind> {
        self.known
            .keys()
            .filter(|gvk| gvk.group == group_kind.group && gvk.kind == group_kind.kind)
            .cloned()
            .collect()
    }

    pub fn all_known_types(&self) -> impl Iterator<Item = &GroupVersionKind> {
        self.known.keys()
    }

    pub fn new_object(&self, gvk: &GroupVersionKind) -> Result<Box<dyn Object>, Error> {
        match self.known.get(gvk) {
            Some(known) => Ok((known.factory)()),
            None => Err(Error::new(ErrorKind::UnrecognizedType)
                .with_message(format!(
                    "no kind {:?} is registered for version {:?}",
                    gvk.kind,
                    gvk.group_version().api_version()
                ))
                .with_gvk(gvk.clone())),
        }
    }

    pub fn can_convert(&self, input: &dyn Object, output: &dyn Object) -> bool {
        let key = (type_id_of(input), type_id_of(output));
        key.0 == key.1 || self.conversions.contains_key(&key)
    }

    /// Generic field-mapping conversion; identical types are deep-copied.
    pub fn convert(&self, input: &dyn Object, output: &mut dyn Object) -> Result<(), Error> {
        let key = (type_id_of(input), type_id_of(output));
        if key.0 == key.1 {
            let value = input.to_value().map_err(|err| {
                Error::new(ErrorKind::Conversion)
                    .with_message("failed to copy object")
                    .with_source(err)
            })?;
            return output.load_value(value).map_err(|err| {
                Error::new(ErrorKind::Conversion)
                    .with_message("failed to copy object")
                    .with_source(err)
            });
        }

        let Some(func) = self.conversions.get(&key) else {
            return Err(Error::new(ErrorKind::Conversion).with_message(format!(
                "converting {} to {}: no conversion registered",
                input.type_name(),
                output.type_name()
            )));
        };
        func(input, output, &Scope { scheme: self }).map_err(|err| {
            Error::new(ErrorKind::Conversion)
                .with_message(format!(
                    "converting {} to {}",
                    input.type_name(),
                    output.type_name()
                ))
                .with_source(err)
        })
    }

    /// Converts to the internal version of the object's kind. Internal and unversioned
    /// objects come back as deep copies.
    pub fn convert_to_internal(&self, input: &dyn Object) -> Result<Box<dyn Object>, Error> {
        if self.is_unversioned(input) {
            return Ok(input.deep_copy());
        }
        let gvk = resolve::gvk_for_object(self, input)?;
        if gvk.is_internal() {
            let mut copy = input.deep_copy();
            copy.set_group_version_kind(&GroupVersionKind::default());
            return Ok(copy);
        }

        let internal = GroupVersion::internal(gvk.group.clone()).with_kind(gvk.kind.clone());
        let mut output = self.new_object(&internal)?;
        self.convert(input, output.as_mut())
            .map_err(|err| err.with_gvk(gvk))?;
        output.set_group_version_kind(&GroupVersionKind::default());
        Ok(output)
    }

    /// Applies the defaulter registered for the object's identifier, if any.
    pub fn apply_defaults(&self, obj: &mut dyn Object) {
        let gvk = match resolve::gvk_for_object(self, obj) {
            Ok(gvk) => gvk,
            Err(_) => return,
        };
        if let Some(func) = self.defaulters.get(&gvk) {
            func(obj);
        }
    }
}

impl Default for Scheme {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheme")
            .field("known", &self.known.keys().collect::<Vec<_>>())
            .field("conversions", &self.conversions.len())
            .field("defaulters", &self.defaulters.len())
            .field("version_priority", &self.version_priority)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::Scheme;
    use crate::core::error::ErrorKind;
    use crate::core::meta::{GroupVersion, GroupVersionKind, TypeMeta};
    use crate::core::object::{List, Object};
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
    struct Widget {
        #[serde(flatten)]
        type_meta: TypeMeta,
        #[serde(default)]
        size: i64,
    }

    impl Object for Widget {
        fn type_meta(&self) -> &TypeMeta {
            &self.type_meta
        }

        fn type_meta_mut(&mut self) -> &mut TypeMeta {
            &mut self.type_meta
        }
    }

    fn widget_gvk(version: &str) -> GroupVersionKind {
        GroupVersionKind::new("tools", version, "Widget")
    }

    #[test]
    fn priorities_lead_then_registration_order() {
        let mut scheme = Scheme::new();
        scheme.add_known_type::<Widget>(widget_gvk("v1"));
        scheme.add_known_type::<Widget>(widget_gvk("v2"));
        scheme.add_known_type::<Widget>(widget_gvk("v3"));
        scheme.set_version_priority(&[GroupVersion::new("tools", "v2")]);

        let versions: Vec<String> = scheme
            .prioritized_versions_for_group("tools")
            .into_iter()
            .map(|gv| gv.version)
            .collect();
        assert_eq!(versions, vec!["v2", "v1", "v3"]);
        assert!(scheme.prioritized_versions_for_group("other").is_empty());
    }

    #[test]
    fn object_kinds_reports_every_registration() {
        let mut scheme = Scheme::new();
        scheme.add_known_type::<Widget>(widget_gvk("v1"));
        scheme.add_known_type::<Widget>(widget_gvk("v2"));

        let (kinds, unversioned) = scheme.object_kinds(&Widget::default()).unwrap();
        assert_eq!(kinds, vec![widget_gvk("v1"), widget_gvk("v2")]);
        assert!(!unversioned);

        let (_, unversioned) = scheme.object_kinds(&List::default()).unwrap();
        assert!(unversioned);
    }

    #[test]
    fn unknown_identifiers_are_unrecognized() {
        let scheme = Scheme::new();
        let err = scheme.new_object(&widget_gvk("v9")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnrecognizedType);
        assert_eq!(err.gvk(), Some(&widget_gvk("v9")));

        let err = scheme.object_kinds(&Widget::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownType);
    }

    #[test]
    fn defaulting_is_keyed_by_version() {
        let mut scheme = Scheme::new();
        scheme.add_known_type::<Widget>(widget_gvk("v1"));
        scheme.add_known_type::<Widget>(widget_gvk("v2"));
        scheme.add_defaulting_func::<Widget, _>(widget_gvk("v1"), |w| w.size = 1);
        scheme.add_defaulting_func::<Widget, _>(widget_gvk("v2"), |w| w.size = 2);

        let mut w = Widget {
            type_meta: TypeMeta::new("tools/v2", "Widget"),
            size: 0,
        };
        scheme.apply_defaults(&mut w);
        assert_eq!(w.size, 2);
    }

    #[test]
    fn same_type_conversion_copies() {
        let scheme = Scheme::new();
        let input = Widget {
            type_meta: TypeMeta::new("tools/v1", "Widget"),
            size: 7,
        };
        let mut output = Widget::default();
        scheme.convert(&input, &mut output).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn missing_conversion_is_an_error() {
        let scheme = Scheme::new();
        let mut list = List::default();
        let err = scheme.convert(&Widget::default(), &mut list).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conversion);
    }

    #[test]
    #[should_panic(expected = "double registration")]
    fn conflicting_registration_panics() {
        let mut scheme = Scheme::new();
        scheme.add_known_type::<Widget>(widget_gvk("v1"));
        scheme.add_known_type::<List>(widget_gvk("v1"));
    }
}
