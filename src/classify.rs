//! Classifier
//!
//! Pure functions over the [`ClassModel`] computing the derived class subsets
//! every later stage works from:
//!
//! - **root classes**: object classes without a parent
//! - **nested classes**: property classes reachable as a property type
//! - **inner classes**: nested classes reachable from an object class through
//!   composition only, and never the target of an alias edge
//! - **alias / non-alias classes**: partition of the nested classes
//!
//! All traversals are arena-indexed with explicit visited sets, so property
//! type cycles terminate.

use crate::error::{AliasStatus, GenerationError, Result};
use crate::model::{ClassModel, ObjectId, PropertyId, TypeRef};
use std::collections::VecDeque;

/// Derived subsets of a class model; ids are in declaration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSet {
    pub root_classes: Vec<ObjectId>,
    pub nested_classes: Vec<PropertyId>,
    pub inner_classes: Vec<PropertyId>,
    pub alias_classes: Vec<PropertyId>,
    pub non_alias_classes: Vec<PropertyId>,
    alias: Vec<bool>,
    nested: Vec<bool>,
    inner: Vec<bool>,
}

impl ClassSet {
    /// Structural alias status of any property class, nested or not
    pub fn is_alias(&self, id: PropertyId) -> bool {
        self.alias[id.0]
    }

    pub fn is_nested(&self, id: PropertyId) -> bool {
        self.nested[id.0]
    }

    pub fn is_inner(&self, id: PropertyId) -> bool {
        self.inner[id.0]
    }

    pub fn names(model: &ClassModel, ids: &[PropertyId]) -> Vec<String> {
        ids.iter().map(|id| model.property(*id).name.clone()).collect()
    }

    pub fn root_names(&self, model: &ClassModel) -> Vec<String> {
        self.root_classes
            .iter()
            .map(|id| model.object(*id).name.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AliasState {
    Unvisited,
    InProgress,
    Resolved(bool),
}

/// Compute every derived subset, failing on the first unresolved type or
/// classification conflict.
pub fn classify(model: &ClassModel) -> Result<ClassSet> {
    let count = model.property_classes().len();

    let mut states = vec![AliasState::Unvisited; count];
    for id in model.property_ids() {
        resolve_alias(model, id, &mut states)?;
    }
    let alias: Vec<bool> = states
        .iter()
        .map(|state| matches!(state, AliasState::Resolved(true)))
        .collect();

    let (nested, first_path) = reachable_property_classes(model)?;

    for id in model.property_ids() {
        let class = model.property(id);
        if let Some(declared) = class.alias
            && declared != alias[id.0]
        {
            return Err(GenerationError::ClassificationConflict {
                class: class.name.clone(),
                path: first_path[id.0]
                    .clone()
                    .unwrap_or_else(|| "no owning class".to_string()),
                declared: AliasStatus::from_flag(declared),
                actual: AliasStatus::from_flag(alias[id.0]),
            });
        }
    }

    let inner = composed_property_classes(model, &alias)?;

    let nested_classes: Vec<PropertyId> = model.property_ids().filter(|id| nested[id.0]).collect();
    let inner_classes = model.property_ids().filter(|id| inner[id.0]).collect();
    let (alias_classes, non_alias_classes): (Vec<PropertyId>, Vec<PropertyId>) = nested_classes
        .iter()
        .copied()
        .partition(|id: &PropertyId| alias[id.0]);
    let root_classes = model
        .object_ids()
        .filter(|id| model.object(*id).is_root())
        .collect();

    Ok(ClassSet {
        root_classes,
        nested_classes,
        inner_classes,
        alias_classes,
        non_alias_classes,
        alias,
        nested,
        inner,
    })
}

/// An alias declares exactly one scalar property whose type is a primitive or
/// another alias. Cycles fail closed to non-alias.
fn resolve_alias(model: &ClassModel, id: PropertyId, states: &mut [AliasState]) -> Result<bool> {
    match states[id.0] {
        AliasState::Resolved(alias) => return Ok(alias),
        AliasState::InProgress => return Ok(false),
        AliasState::Unvisited => {}
    }
    states[id.0] = AliasState::InProgress;

    let class = model.property(id);
    let alias = match class.properties.as_slice() {
        [only] if !only.collection => {
            let ty = model.resolve_type(&only.type_name, || {
                format!("{}.{}", class.name, only.name)
            })?;
            match ty {
                TypeRef::Primitive(_) => true,
                TypeRef::Property(inner) => resolve_alias(model, inner, states)?,
                TypeRef::Object(_) => false,
            }
        }
        _ => false,
    };

    states[id.0] = AliasState::Resolved(alias);
    Ok(alias)
}

/// Property classes appearing as a property type anywhere, with the first
/// `Owner.property` path that reached each.
///
/// Every property class seeds the walk, reachable or not, so a type used
/// only by an orphan property class still counts as nested.
fn reachable_property_classes(model: &ClassModel) -> Result<(Vec<bool>, Vec<Option<String>>)> {
    let count = model.property_classes().len();
    let mut visited = vec![false; count];
    let mut first_path: Vec<Option<String>> = vec![None; count];
    let mut queue = VecDeque::new();

    for object in model.object_classes() {
        for property in &object.properties {
            let path = format!("{}.{}", object.name, property.name);
            let ty = model.resolve_type(&property.type_name, || path.clone())?;
            if let TypeRef::Property(target) = ty
                && !visited[target.0]
            {
                visited[target.0] = true;
                first_path[target.0] = Some(path);
                queue.push_back(target);
            }
        }
    }
    for owner in model.property_ids() {
        queue.push_back(owner);
    }

    let mut expanded = vec![false; count];
    while let Some(owner) = queue.pop_front() {
        if expanded[owner.0] {
            continue;
        }
        expanded[owner.0] = true;

        let class = model.property(owner);
        for property in &class.properties {
            let path = format!("{}.{}", class.name, property.name);
            let ty = model.resolve_type(&property.type_name, || path.clone())?;
            if let TypeRef::Property(target) = ty
                && !visited[target.0]
            {
                visited[target.0] = true;
                first_path[target.0] = Some(path);
                queue.push_back(target);
            }
        }
    }

    Ok((visited, first_path))
}

/// Property classes reachable from an object class through composition edges
/// only, excluding any class that is the target of an alias edge.
fn composed_property_classes(model: &ClassModel, alias: &[bool]) -> Result<Vec<bool>> {
    let count = model.property_classes().len();

    let mut alias_target = vec![false; count];
    for id in model.property_ids().filter(|id| alias[id.0]) {
        let class = model.property(id);
        for property in &class.properties {
            let ty = model.resolve_type(&property.type_name, || {
                format!("{}.{}", class.name, property.name)
            })?;
            if let TypeRef::Property(target) = ty {
                alias_target[target.0] = true;
            }
        }
    }

    let mut reached = vec![false; count];
    let mut stack = Vec::new();
    for object in model.object_classes() {
        for property in &object.properties {
            let ty = model.resolve_type(&property.type_name, || {
                format!("{}.{}", object.name, property.name)
            })?;
            if let TypeRef::Property(target) = ty
                && !reached[target.0]
            {
                reached[target.0] = true;
                stack.push(target);
            }
        }
    }

    while let Some(owner) = stack.pop() {
        // Alias owners contribute alias edges, not composition edges.
        if alias[owner.0] {
            continue;
        }
        let class = model.property(owner);
        for property in &class.properties {
            let ty = model.resolve_type(&property.type_name, || {
                format!("{}.{}", class.name, property.name)
            })?;
            if let TypeRef::Property(target) = ty
                && !reached[target.0]
            {
                reached[target.0] = true;
                stack.push(target);
            }
        }
    }

    Ok(reached
        .iter()
        .zip(&alias_target)
        .map(|(reached, aliased)| *reached && !aliased)
        .collect())
}
