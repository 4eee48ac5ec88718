//! Pure checks on a descriptor and on a candidate parameter set.

use crate::error::{Result, StencilError};
use crate::model::params::{CORE_FIELDS, Fields};
use crate::template::descriptor::TemplateDescriptor;

pub fn validate_metadata(descriptor: &TemplateDescriptor) -> Result<()> {
    if descriptor.name.trim().is_empty() {
        return Err(StencilError::metadata("name must be a non-empty string"));
    }

    if descriptor.required_fields.is_empty() {
        return Err(StencilError::metadata("required_fields must not be empty"));
    }

    if let Some(missing) = CORE_FIELDS
        .iter()
        .find(|core| !descriptor.required_fields.iter().any(|field| field == *core))
    {
        return Err(StencilError::metadata(format!(
            "required_fields must include {missing}"
        )));
    }

    Ok(())
}

pub fn validate_params(descriptor: &TemplateDescriptor, fields: &Fields) -> Result<()> {
    for field in &descriptor.required_fields {
        match fields.get(field) {
            None => return Err(StencilError::params(format!("missing field: {field}"))),
            Some(value) if value.trim().is_empty() => {
                return Err(StencilError::params(format!("field is blank: {field}")));
            }
            Some(_) => {}
        }
    }

    if let Some(types) = descriptor.type_restriction() {
        let kind = fields.get("type").unwrap_or_default();
        if !types.iter().any(|supported| supported == kind) {
            return Err(StencilError::params(format!(
                "unsupported type {kind:?}, expected one of: {}",
                types.join(", ")
            )));
        }
    }

    Ok(())
}
