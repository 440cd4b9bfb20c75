//! Derived Model Generators
//!
//! Each generator is a pure function from the class model, the classifier's
//! [`ClassSet`](crate::classify::ClassSet) and the
//! [`RelationsModel`](crate::relations::RelationsModel) to one flattened,
//! template-ready generation model:
//!
//! | generator        | consumes                                   |
//! |------------------|--------------------------------------------|
//! | custom mapping   | roots, nested classes, relations           |
//! | wrappers         | object classes, inner classes, relations   |
//! | finders          | non-alias nested classes, wrappers, relations |
//! | converters       | alias classes, property classes            |
//!
//! Every name, identifier and qualified type a template needs is computed
//! here; templates only iterate and interpolate.

pub mod converters;
pub mod finders;
pub mod mapping;
pub mod wrappers;

pub use converters::{ConverterEntry, ConvertersModel, generate_converters};
pub use finders::{FinderClass, FinderEntry, FinderStep, FindersModel, generate_finders};
pub use mapping::{CustomMappingModel, MappingEntry, generate_custom_mapping};
pub use wrappers::{Accessor, InnerClassEntry, WrapperEntry, WrappersModel, generate_wrappers};

use crate::error::{GenerationError, Result};
use crate::model::{ClassModel, Property, TypeRef};
use crate::relations::RelationsModel;
use indexmap::IndexMap;
use serde::Serialize;

/// A model that can be handed to the generator engine
pub trait GenerationModel: Serialize {
    /// Artifact family, used in logs and reports
    const FAMILY: &'static str;

    /// Number of top-level entries, for the run summary
    fn entry_count(&self) -> usize;
}

impl GenerationModel for RelationsModel {
    const FAMILY: &'static str = "relations";

    fn entry_count(&self) -> usize {
        self.edges.len()
    }
}

/// Qualifies generated type names with the target package
#[derive(Debug, Clone)]
pub struct TypePaths {
    package: String,
}

impl TypePaths {
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
        }
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn qualify(&self, name: &str) -> String {
        format!("{}::{}", self.package, name)
    }

    pub fn wrapper_name(&self, class_name: &str) -> String {
        format!("{class_name}Wrapper")
    }

    /// Rust type of a property: qualified class or primitive, wrapped in
    /// `Vec` for collections and `Option` when not required.
    pub fn field_type(&self, model: &ClassModel, owner: &str, property: &Property) -> Result<String> {
        let ty = model.resolve_type(&property.type_name, || {
            format!("{}.{}", owner, property.name)
        })?;
        let base = match ty {
            TypeRef::Primitive(primitive) => primitive.rust_type().to_string(),
            TypeRef::Property(id) => self.qualify(&model.property(id).name),
            TypeRef::Object(id) => self.qualify(&model.object(id).name),
        };
        let base = if property.collection {
            format!("Vec<{base}>")
        } else {
            base
        };
        Ok(if property.required || property.collection {
            base
        } else {
            format!("Option<{base}>")
        })
    }
}

/// Tracks identity keys that must be unique within one generation model
pub(crate) struct KeyRegistry {
    family: &'static str,
    seen: IndexMap<String, String>,
}

impl KeyRegistry {
    pub(crate) fn new(family: &'static str) -> Self {
        Self {
            family,
            seen: IndexMap::new(),
        }
    }

    /// Registry with `keys` already taken by `origin`.
    pub(crate) fn reserved<'k>(
        family: &'static str,
        keys: impl IntoIterator<Item = &'k str>,
        origin: &str,
    ) -> Self {
        let mut registry = Self::new(family);
        for key in keys {
            registry.seen.entry(key.to_string()).or_insert_with(|| origin.to_string());
        }
        registry
    }

    /// Register `key`, produced by `origin`; a second registration is fatal.
    pub(crate) fn claim(&mut self, key: &str, origin: impl Into<String>) -> Result<()> {
        let origin = origin.into();
        if let Some(first) = self.seen.get(key) {
            return Err(GenerationError::DuplicateKey {
                family: self.family,
                key: key.to_string(),
                first: first.clone(),
                second: origin,
            });
        }
        self.seen.insert(key.to_string(), origin);
        Ok(())
    }
}
