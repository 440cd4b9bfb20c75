//! Converters model: alias class <-> underlying type

use super::{GenerationModel, TypePaths};
use crate::classify::ClassSet;
use crate::error::{GenerationError, Result};
use crate::model::{ClassModel, Primitive, PropertyId, TypeRef};
use crate::utils::{field_ident, snake_case};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ConvertersModel {
    pub package: String,
    pub converters: Vec<ConverterEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConverterEntry {
    pub alias: String,
    pub alias_ident: String,
    pub alias_qualified: String,
    /// The alias class's single property
    pub property: String,
    pub field: String,
    /// Declared type name of that property
    pub underlying: String,
    pub underlying_type: String,
    pub underlying_is_alias: bool,
    /// Primitive at the end of the alias chain
    pub primitive: Primitive,
    pub primitive_type: String,
    pub to_underlying: String,
    pub from_underlying: String,
}

impl GenerationModel for ConvertersModel {
    const FAMILY: &'static str = "converters";

    fn entry_count(&self) -> usize {
        self.converters.len()
    }
}

pub fn generate_converters(
    model: &ClassModel,
    classes: &ClassSet,
    paths: &TypePaths,
) -> Result<ConvertersModel> {
    let converters = classes
        .alias_classes
        .iter()
        .map(|&id| converter(model, classes, paths, id))
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(converters = converters.len(), "converters model built");

    Ok(ConvertersModel {
        package: paths.package().to_string(),
        converters,
    })
}

fn converter(
    model: &ClassModel,
    classes: &ClassSet,
    paths: &TypePaths,
    id: PropertyId,
) -> Result<ConverterEntry> {
    let class = model.property(id);
    let property = class
        .properties
        .first()
        .ok_or_else(|| GenerationError::unresolved("<underlying type>", class.name.clone()))?;
    let referrer = || format!("{}.{}", class.name, property.name);

    let (underlying_type, underlying_is_alias) =
        match model.resolve_type(&property.type_name, referrer)? {
            TypeRef::Primitive(primitive) => (primitive.rust_type().to_string(), false),
            TypeRef::Property(target) if classes.is_alias(target) => {
                (paths.qualify(&model.property(target).name), true)
            }
            // Neither a primitive nor an alias: nothing to convert to
            TypeRef::Property(_) | TypeRef::Object(_) => {
                return Err(GenerationError::unresolved(&property.type_name, referrer()));
            }
        };
    let primitive = terminal_primitive(model, classes, id)?;

    let alias_ident = snake_case(&class.name);
    let underlying_ident = if underlying_is_alias {
        snake_case(&property.type_name)
    } else {
        primitive.name().to_string()
    };

    Ok(ConverterEntry {
        alias: class.name.clone(),
        alias_qualified: paths.qualify(&class.name),
        property: property.name.clone(),
        field: field_ident(&property.name),
        underlying: property.type_name.clone(),
        underlying_type,
        underlying_is_alias,
        primitive,
        primitive_type: primitive.rust_type().to_string(),
        to_underlying: format!("{alias_ident}_to_{underlying_ident}"),
        from_underlying: format!("{alias_ident}_from_{underlying_ident}"),
        alias_ident,
    })
}

/// Follow single-property aliases down to their primitive.
fn terminal_primitive(model: &ClassModel, classes: &ClassSet, start: PropertyId) -> Result<Primitive> {
    let mut current = start;
    // Alias chains are acyclic; the bound only guards a corrupt class set.
    for _ in 0..=model.property_classes().len() {
        let class = model.property(current);
        let Some(property) = class.properties.first() else {
            break;
        };
        match model.resolve_type(&property.type_name, || {
            format!("{}.{}", class.name, property.name)
        })? {
            TypeRef::Primitive(primitive) => return Ok(primitive),
            TypeRef::Property(next) if classes.is_alias(next) => current = next,
            _ => break,
        }
    }
    Err(GenerationError::unresolved(
        "<primitive>",
        model.property(start).name.clone(),
    ))
}
