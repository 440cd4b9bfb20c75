//! Class Model
//!
//! Immutable descriptors of the two kinds of schema classes handed to the
//! generator:
//!
//! - **Property classes**: value types with no identity of their own
//! - **Object classes**: identity-bearing entities, optionally contained by a
//!   parent object class and linked to other object classes
//!
//! Classes live in an arena and are addressed by stable integer ids
//! ([`PropertyId`], [`ObjectId`]). Names are resolved once through the
//! [`ClassModel`] index; every later stage works on ids.

mod document;

pub use document::{ClassModelDocument, load_class_model};

use crate::error::{GenerationError, Result};
use crate::utils::{is_keyword, snake_case};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern valid"));

/// Index of a [`PropertyClass`] in its [`ClassModel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyId(pub usize);

/// Index of an [`ObjectClass`] in its [`ClassModel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub usize);

/// A typed property of a property class or object class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub collection: bool,
    #[serde(default)]
    pub required: bool,
}

impl Property {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            collection: false,
            required: false,
        }
    }

    pub fn collection(mut self) -> Self {
        self.collection = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Value type used as the type of some property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyClass {
    pub name: String,
    #[serde(default)]
    pub properties: Vec<Property>,
    /// Alias status the schema expects; checked against the structural rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<bool>,
}

impl PropertyClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            alias: None,
        }
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_alias(mut self, alias: bool) -> Self {
        self.alias = Some(alias);
        self
    }
}

/// Kind of an explicitly declared link between object classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Containment,
    Reference,
    #[serde(alias = "backReference", alias = "back-reference")]
    BackReference,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub target: String,
    pub kind: LinkKind,
}

/// Identity-bearing schema entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectClass {
    pub name: String,
    /// Containing object class; `None` for root classes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
}

impl ObjectClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            properties: Vec::new(),
            links: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_link(mut self, target: impl Into<String>, kind: LinkKind) -> Self {
        self.links.push(Link {
            target: target.into(),
            kind,
        });
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Built-in scalar types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Primitive {
    String,
    Integer,
    Long,
    Boolean,
    Double,
    DateTime,
    Uuid,
}

impl Primitive {
    /// Recognise a primitive type name, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        let primitive = match name.to_ascii_lowercase().as_str() {
            "string" | "str" => Primitive::String,
            "int" | "integer" | "i32" => Primitive::Integer,
            "long" | "i64" => Primitive::Long,
            "boolean" | "bool" => Primitive::Boolean,
            "double" | "float" | "f64" => Primitive::Double,
            "date" | "datetime" => Primitive::DateTime,
            "uuid" => Primitive::Uuid,
            _ => return None,
        };
        Some(primitive)
    }

    /// Rust type emitted for this primitive
    pub fn rust_type(&self) -> &'static str {
        match self {
            Primitive::String => "String",
            Primitive::Integer => "i32",
            Primitive::Long => "i64",
            Primitive::Boolean => "bool",
            Primitive::Double => "f64",
            Primitive::DateTime => "String",
            Primitive::Uuid => "String",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Integer => "integer",
            Primitive::Long => "long",
            Primitive::Boolean => "boolean",
            Primitive::Double => "double",
            Primitive::DateTime => "datetime",
            Primitive::Uuid => "uuid",
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named class in the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassRef {
    Property(PropertyId),
    Object(ObjectId),
}

/// Resolution of a property's type name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Primitive(Primitive),
    Property(PropertyId),
    Object(ObjectId),
}

/// Arena of property and object classes with a name index
#[derive(Debug, Clone)]
pub struct ClassModel {
    property_classes: Vec<PropertyClass>,
    object_classes: Vec<ObjectClass>,
    index: HashMap<String, ClassRef>,
}

impl ClassModel {
    /// Build the arena. Class names must be unique across both kinds, and
    /// every class and property name must be a plain identifier.
    pub fn new(
        property_classes: Vec<PropertyClass>,
        object_classes: Vec<ObjectClass>,
    ) -> Result<Self> {
        for class in &property_classes {
            check_class_name(&class.name, "property class")?;
            check_property_names(&class.name, &class.properties)?;
        }
        for class in &object_classes {
            check_class_name(&class.name, "object class")?;
            check_property_names(&class.name, &class.properties)?;
        }

        let mut index = HashMap::with_capacity(property_classes.len() + object_classes.len());

        for (i, class) in property_classes.iter().enumerate() {
            if index
                .insert(class.name.clone(), ClassRef::Property(PropertyId(i)))
                .is_some()
            {
                return Err(GenerationError::DuplicateClass(class.name.clone()));
            }
        }
        for (i, class) in object_classes.iter().enumerate() {
            if index
                .insert(class.name.clone(), ClassRef::Object(ObjectId(i)))
                .is_some()
            {
                return Err(GenerationError::DuplicateClass(class.name.clone()));
            }
        }

        Ok(Self {
            property_classes,
            object_classes,
            index,
        })
    }

    pub fn property_classes(&self) -> &[PropertyClass] {
        &self.property_classes
    }

    pub fn object_classes(&self) -> &[ObjectClass] {
        &self.object_classes
    }

    pub fn property(&self, id: PropertyId) -> &PropertyClass {
        &self.property_classes[id.0]
    }

    pub fn object(&self, id: ObjectId) -> &ObjectClass {
        &self.object_classes[id.0]
    }

    pub fn property_ids(&self) -> impl Iterator<Item = PropertyId> + '_ {
        (0..self.property_classes.len()).map(PropertyId)
    }

    pub fn object_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        (0..self.object_classes.len()).map(ObjectId)
    }

    pub fn lookup(&self, name: &str) -> Option<ClassRef> {
        self.index.get(name).copied()
    }

    pub fn object_id(&self, name: &str) -> Option<ObjectId> {
        match self.lookup(name) {
            Some(ClassRef::Object(id)) => Some(id),
            _ => None,
        }
    }

    pub fn property_id(&self, name: &str) -> Option<PropertyId> {
        match self.lookup(name) {
            Some(ClassRef::Property(id)) => Some(id),
            _ => None,
        }
    }

    /// Resolve a type name. Declared classes shadow primitive names.
    ///
    /// `referrer` names the owner in the error raised for an unknown type.
    pub fn resolve_type(&self, type_name: &str, referrer: impl FnOnce() -> String) -> Result<TypeRef> {
        match self.lookup(type_name) {
            Some(ClassRef::Property(id)) => Ok(TypeRef::Property(id)),
            Some(ClassRef::Object(id)) => Ok(TypeRef::Object(id)),
            None => Primitive::parse(type_name)
                .map(TypeRef::Primitive)
                .ok_or_else(|| GenerationError::unresolved(type_name, referrer())),
        }
    }

    /// Resolve a name that must denote an object class.
    pub fn resolve_object(&self, name: &str, referrer: impl FnOnce() -> String) -> Result<ObjectId> {
        self.object_id(name)
            .ok_or_else(|| GenerationError::unresolved(name, referrer()))
    }
}

fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name) && !snake_case(name).is_empty()
}

fn check_class_name(name: &str, kind: &str) -> Result<()> {
    if is_identifier(name) && !is_keyword(name) {
        return Ok(());
    }
    Err(GenerationError::InvalidName {
        name: name.to_string(),
        context: kind.to_string(),
    })
}

/// Property names only need to be identifiers; keywords are escaped on output.
fn check_property_names(owner: &str, properties: &[Property]) -> Result<()> {
    match properties.iter().find(|p| !is_identifier(&p.name)) {
        Some(property) => Err(GenerationError::InvalidName {
            name: property.name.clone(),
            context: format!("a property of `{owner}`"),
        }),
        None => Ok(()),
    }
}
