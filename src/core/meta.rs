//! Purpose: Identify schema versions of a type as group/version/kind triples.
//! Exports: `GroupVersion`, `GroupVersionKind`, `GroupKind`, `TypeMeta`, `INTERNAL_VERSION`.
//! Role: Shared vocabulary for the registry, the converter and the codecs.
//! Invariants: `INTERNAL_VERSION` never appears on the wire; encoders resolve it first.
//! Invariants: `apiVersion` strings are `group/version`, or a bare `version` for the core group.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, ErrorKind};

/// Reserved version marking the version-agnostic representation.
pub const INTERNAL_VERSION: &str = "__internal";

#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct GroupVersion {
    pub group: String,
    pub version: String,
}

impl GroupVersion {
    pub fn new(group: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
        }
    }

    pub fn internal(group: impl Into<String>) -> Self {
        Self::new(group, INTERNAL_VERSION)
    }

    pub fn parse(api_version: &str) -> Result<Self, Error> {
        match api_version.split_once('/') {
            None if api_version.is_empty() => Err(Error::new(ErrorKind::Malformed)
                .with_message("apiVersion is empty")),
            None => Ok(Self::new("", api_version)),
            Some((group, version)) if !version.is_empty() && !version.contains('/') => {
                Ok(Self::new(group, version))
            }
            Some(_) => Err(Error::new(ErrorKind::Malformed)
                .with_message(format!("unexpected apiVersion {api_version:?}"))),
        }
    }

    pub fn is_internal(&self) -> bool {
        self.version == INTERNAL_VERSION
    }

    pub fn with_kind(&self, kind: impl Into<String>) -> GroupVersionKind {
        GroupVersionKind::new(self.group.clone(), self.version.clone(), kind)
    }

    /// The `apiVersion` form: `group/version`, or `version` for the empty group.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for GroupVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.api_version())
    }
}

#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct GroupKind {
    pub group: String,
    pub kind: String,
}

#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct GroupVersionKind {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GroupVersionKind {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.group.is_empty() && self.version.is_empty() && self.kind.is_empty()
    }

    pub fn is_internal(&self) -> bool {
        self.version == INTERNAL_VERSION
    }

    pub fn group_version(&self) -> GroupVersion {
        GroupVersion::new(self.group.clone(), self.version.clone())
    }

    pub fn group_kind(&self) -> GroupKind {
        GroupKind {
            group: self.group.clone(),
            kind: self.kind.clone(),
        }
    }

    pub fn same_group_kind(&self, other: &GroupVersionKind) -> bool {
        self.group == other.group && self.kind == other.kind
    }
}

impl fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, Kind={}", self.group_version(), self.kind)
    }
}

/// The `apiVersion`/`kind` pair every document and object carries.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct TypeMeta {
    #[serde(rename = "apiVersion", default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
}

impl TypeMeta {
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.api_version.is_empty() && self.kind.is_empty()
    }

    /// Parses the pair into an identifier; an empty pair yields an empty identifier.
    pub fn group_version_kind(&self) -> Result<GroupVersionKind, Error> {
        if self.is_empty() {
            return Ok(GroupVersionKind::default());
        }
        if self.kind.is_empty() {
            return Err(Error::new(ErrorKind::Malformed).with_message("Object 'kind' is missing"));
        }
        if self.api_version.is_empty() {
            return Err(
                Error::new(ErrorKind::Malformed).with_message("Object 'apiVersion' is missing")
            );
        }
        Ok(GroupVersion::parse(&self.api_version)?.with_kind(self.kind.clone()))
    }

    pub fn set_group_version_kind(&mut self, gvk: &GroupVersionKind) {
        if gvk.is_empty() {
            self.api_version.clear();
            self.kind.clear();
        } else {
            self.api_version = gvk.group_version().api_version();
            self.kind = gvk.kind.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{GroupVersion, GroupVersionKind, INTERNAL_VERSION, TypeMeta};
    use crate::core::error::ErrorKind;

    #[test]
    fn parses_grouped_and_core_api_versions() {
        assert_eq!(
            GroupVersion::parse("foogroup/v1alpha1").unwrap(),
            GroupVersion::new("foogroup", "v1alpha1")
        );
        assert_eq!(GroupVersion::parse("v1").unwrap(), GroupVersion::new("", "v1"));
        assert_eq!(
            GroupVersion::parse("a/b/c").unwrap_err().kind(),
            ErrorKind::Malformed
        );
    }

    #[test]
    fn type_meta_round_trips_identifier() {
        let gvk = GroupVersionKind::new("foogroup", "v1alpha2", "Complex");
        let mut meta = TypeMeta::default();
        meta.set_group_version_kind(&gvk);
        assert_eq!(meta, TypeMeta::new("foogroup/v1alpha2", "Complex"));
        assert_eq!(meta.group_version_kind().unwrap(), gvk);

        meta.set_group_version_kind(&GroupVersionKind::default());
        assert!(meta.is_empty());
        assert!(meta.group_version_kind().unwrap().is_empty());
    }

    #[test]
    fn half_filled_type_meta_is_malformed() {
        let meta = TypeMeta::new("foogroup/v1alpha1", "");
        assert_eq!(
            meta.group_version_kind().unwrap_err().kind(),
            ErrorKind::Malformed
        );
    }

    #[test]
    fn internal_marker_is_detected() {
        let gv = GroupVersion::internal("foogroup");
        assert_eq!(gv.version, INTERNAL_VERSION);
        assert!(gv.with_kind("Simple").is_internal());
    }
}
