//! Purpose: Convert objects between versions of one kind.
//! Exports: `Converter`.
//! Role: Picks the registry's field-mapping path or the hub-and-spoke path per object pair.
//! Invariants: `convert` never mutates `input`; results are written into `output` only.
//! Invariants: A convertible kind must have exactly one hub version; lookups fail otherwise.
//! Invariants: Hub conversions stamp the resolved identifier onto the produced object.

use std::sync::Arc;

use tracing::debug;

use crate::core::error::{ConversionCause, Error, ErrorKind};
use crate::core::meta::GroupVersionKind;
use crate::core::object::Object;
use crate::core::resolve::gvk_for_object;
use crate::core::scheme::{Scheme, type_id_of};

#[derive(Clone, Debug)]
pub struct Converter {
    scheme: Arc<Scheme>,
}

impl Converter {
    pub fn new(scheme: Arc<Scheme>) -> Self {
        Self { scheme }
    }

    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    /// Converts `input` into `output`, which should be a blank object of the target type.
    /// No defaulting is performed.
    pub fn convert(&self, input: &dyn Object, output: &mut dyn Object) -> Result<(), Error> {
        if self.scheme.can_convert(input, output) {
            debug!(
                from = input.type_name(),
                to = output.type_name(),
                "converting through registry"
            );
            return self.scheme.convert(input, output);
        }

        if input.as_convertible().is_some() {
            if output.as_hub().is_none() {
                return Err(Error::conversion(ConversionCause::InvalidArgs)
                    .with_message("if the input object is Convertible, the output must be a Hub"));
            }
            return self.convert_into_hub(input, output);
        }

        if output.as_convertible().is_some() {
            if input.as_hub().is_none() {
                return Err(Error::conversion(ConversionCause::InvalidArgs)
                    .with_message("if the output object is Convertible, the input must be a Hub"));
            }
            return self.convert_from_hub(input, output);
        }

        Err(Error::conversion(ConversionCause::InvalidArgs).with_message(format!(
            "no conversion path from {} to {}",
            input.type_name(),
            output.type_name()
        )))
    }

    /// Instantiates a blank object for `gvk` and converts `input` into it.
    pub fn convert_into_new(
        &self,
        input: &dyn Object,
        gvk: &GroupVersionKind,
    ) -> Result<Box<dyn Object>, Error> {
        let mut output = self.scheme.new_object(gvk)?;
        self.convert(input, output.as_mut())?;
        if gvk.is_internal() {
            output.set_group_version_kind(&GroupVersionKind::default());
        } else {
            output.set_group_version_kind(gvk);
        }
        Ok(output)
    }

    /// Converts to the internal version, or to the hub version for Convertible objects.
    /// Hubs and unversioned objects come back as deep copies.
    pub fn convert_to_hub(&self, input: &dyn Object) -> Result<Box<dyn Object>, Error> {
        if input.as_hub().is_some() {
            return Ok(input.deep_copy());
        }
        let Some(convertible) = input.as_convertible() else {
            return self.scheme.convert_to_internal(input);
        };

        let (current, hub_gvk) = self.validate_convertible(input)?;
        let mut hub = self.scheme.new_object(&hub_gvk).map_err(|err| {
            Error::conversion(ConversionCause::SchemeSetup)
                .with_gvk(hub_gvk.clone())
                .with_source(err)
        })?;
        debug!(from = %current, to = %hub_gvk, "converting convertible to hub");
        convertible.convert_to(hub.as_mut()).map_err(|err| {
            Error::conversion(ConversionCause::ConvertTo)
                .with_gvk(hub_gvk.clone())
                .with_source(err)
        })?;
        hub.set_group_version_kind(&hub_gvk);
        Ok(hub)
    }

    fn convert_into_hub(&self, input: &dyn Object, output: &mut dyn Object) -> Result<(), Error> {
        let (current, hub_gvk) = self.validate_convertible(input)?;
        self.require_hub_type(output, &hub_gvk)?;
        let Some(convertible) = input.as_convertible() else {
            return Err(Error::conversion(ConversionCause::InvalidArgs).with_gvk(current));
        };

        debug!(from = %current, to = %hub_gvk, "converting convertible into hub");
        convertible.convert_to(output).map_err(|err| {
            Error::conversion(ConversionCause::ConvertTo)
                .with_gvk(current.clone())
                .with_source(err)
        })?;
        output.set_group_version_kind(&hub_gvk);
        Ok(())
    }

    fn convert_from_hub(&self, input: &dyn Object, output: &mut dyn Object) -> Result<(), Error> {
        let (target, hub_gvk) = self.validate_convertible(output)?;
        self.require_hub_type(input, &hub_gvk)?;
        let Some(convertible) = output.as_convertible_mut() else {
            return Err(Error::conversion(ConversionCause::InvalidArgs).with_gvk(target));
        };

        debug!(from = %hub_gvk, to = %target, "converting hub into convertible");
        convertible.convert_from(input).map_err(|err| {
            Error::conversion(ConversionCause::ConvertFrom)
                .with_gvk(target.clone())
                .with_source(err)
        })?;
        output.set_group_version_kind(&target);
        Ok(())
    }

    /// Checks that the object's kind has exactly one hub version and that every other
    /// version is Convertible. Returns the object's identifier and the hub's.
    fn validate_convertible(
        &self,
        obj: &dyn Object,
    ) -> Result<(GroupVersionKind, GroupVersionKind), Error> {
        let current = gvk_for_object(&self.scheme, obj)?;

        let mut hubs = Vec::new();
        for sibling in self.scheme.known_kinds(&current.group_kind()) {
            if sibling.is_internal() || sibling.version == current.version {
                continue;
            }
            let candidate = self.scheme.new_object(&sibling)?;
            if candidate.as_hub().is_some() {
                hubs.push(sibling);
            } else if candidate.as_convertible().is_none() {
                return Err(Error::conversion(ConversionCause::SchemeSetup)
                    .with_message(format!(
                        "version {sibling} is neither a Hub nor Convertible"
                    ))
                    .with_gvk(current));
            }
        }

        match hubs.len() {
            1 => Ok((current, hubs.remove(0))),
            0 => Err(Error::new(ErrorKind::NoHubFound)
                .with_message(format!(
                    "no matching Hub target type for convertible of gvk {current}"
                ))
                .with_gvk(current)),
            _ => Err(Error::conversion(ConversionCause::SchemeSetup)
                .with_message(format!(
                    "multiple Hub versions registered for {}: {}",
                    current.kind,
                    hubs.iter()
                        .map(|gvk| gvk.version.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
                .with_gvk(current)),
        }
    }

    fn require_hub_type(&self, hub: &dyn Object, hub_gvk: &GroupVersionKind) -> Result<(), Error> {
        let expected = self.scheme.new_object(hub_gvk)?;
        if type_id_of(expected.as_ref()) != type_id_of(hub) {
            return Err(Error::conversion(ConversionCause::InvalidArgs)
                .with_message(format!(
                    "{} is not the Hub type registered for {hub_gvk}",
                    hub.type_name()
                ))
                .with_gvk(hub_gvk.clone()));
        }
        Ok(())
    }
}
