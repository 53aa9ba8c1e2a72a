// Identifier resolution: what an object is, and which external version it should become.
use tracing::debug;

use crate::core::error::{Error, ErrorKind};
use crate::core::meta::GroupVersionKind;
use crate::core::object::Object;
use crate::core::scheme::Scheme;

/// Current identifier of `obj`. Filled-in type metadata is trusted as-is; otherwise the
/// registry must know exactly one versioned identifier for the object's type.
pub fn gvk_for_object(scheme: &Scheme, obj: &dyn Object) -> Result<GroupVersionKind, Error> {
    let carried = obj.type_meta().group_version_kind()?;
    if !carried.is_empty() {
        return Ok(carried);
    }

    let (kinds, unversioned) = scheme.object_kinds(obj)?;
    match kinds.as_slice() {
        [gvk] if !unversioned => Ok(gvk.clone()),
        [] => Err(Error::new(ErrorKind::UnknownType).with_message(format!(
            "no kind is registered for the type {}",
            obj.type_name()
        ))),
        _ => Err(Error::new(ErrorKind::AmbiguousType).with_message(format!(
            "type {} maps to {} identifiers (unversioned: {unversioned}); set apiVersion and kind explicitly",
            obj.type_name(),
            kinds.len()
        ))),
    }
}

/// Preferred external identifier for an internal object: its group's highest-priority version.
pub fn external_gvk_for_object(
    scheme: &Scheme,
    obj: &dyn Object,
) -> Result<GroupVersionKind, Error> {
    let gvk = gvk_for_object(scheme, obj)?;
    if !gvk.is_internal() {
        return Err(Error::new(ErrorKind::NotInternal)
            .with_message("given object is not an internal version")
            .with_gvk(gvk));
    }

    let versions = scheme.prioritized_versions_for_group(&gvk.group);
    let Some(preferred) = versions.first() else {
        return Err(Error::new(ErrorKind::NoRegisteredVersion)
            .with_message(format!(
                "expected some version to be registered for group {:?}",
                gvk.group
            ))
            .with_gvk(gvk));
    };

    let external = preferred.with_kind(gvk.kind.clone());
    debug!(internal = %gvk, external = %external, "resolved preferred external version");
    Ok(external)
}
