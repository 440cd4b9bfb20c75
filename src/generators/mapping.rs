//! Custom-mapping model: dispatch entries keyed by (root class, nested class)

use super::{GenerationModel, KeyRegistry, TypePaths};
use crate::classify::ClassSet;
use crate::error::Result;
use crate::model::{ClassModel, ObjectId, PropertyId, TypeRef};
use crate::relations::{RelationKind, RelationsModel};
use crate::utils::{pascal_case, snake_case};
use serde::Serialize;
use std::collections::VecDeque;

#[derive(Debug, Clone, Serialize)]
pub struct CustomMappingModel {
    pub package: String,
    pub roots: Vec<MappedClass>,
    pub classes: Vec<MappedClass>,
    pub entries: Vec<MappingEntry>,
}

/// An object class with the root it ultimately belongs to
#[derive(Debug, Clone, Serialize)]
pub struct MappedClass {
    pub name: String,
    pub ident: String,
    pub qualified: String,
    pub parent: Option<String>,
    pub root: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MappingEntry {
    /// `snake(root)::snake(nested)`; unique within the model
    pub key: String,
    /// `MappingKey` variant, `Pascal(root)Pascal(nested)`; unique within the model
    pub variant: String,
    /// Hook and executor method suffix, `snake(root)_snake(nested)`
    pub hook: String,
    pub root: String,
    pub root_ident: String,
    pub root_qualified: String,
    pub nested: String,
    pub nested_ident: String,
    pub nested_qualified: String,
    /// Object class through which the nested class was first reached
    pub owner: String,
    pub owner_ident: String,
    /// Property path from the owner, e.g. `Project.quota.limits`
    pub path: String,
}

impl GenerationModel for CustomMappingModel {
    const FAMILY: &'static str = "custom mapping";

    fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

/// Build one mapping entry per (root, non-alias nested class) pair reachable
/// through relations.
pub fn generate_custom_mapping(
    model: &ClassModel,
    classes: &ClassSet,
    relations: &RelationsModel,
    paths: &TypePaths,
) -> Result<CustomMappingModel> {
    let mut keys = KeyRegistry::new("custom mapping");
    let mut variants = KeyRegistry::new("mapping variant");
    let mut entries = Vec::new();

    for &root in &classes.root_classes {
        let root_class = model.object(root);
        let mut nested_seen = vec![false; model.property_classes().len()];

        for owner in reachable_objects(model, relations, root) {
            let owner_class = model.object(owner);
            let mut stack: Vec<(PropertyId, String)> = Vec::new();
            for property in owner_class.properties.iter().rev() {
                let ty = model.resolve_type(&property.type_name, || {
                    format!("{}.{}", owner_class.name, property.name)
                })?;
                if let TypeRef::Property(id) = ty {
                    stack.push((id, format!("{}.{}", owner_class.name, property.name)));
                }
            }

            while let Some((id, path)) = stack.pop() {
                if nested_seen[id.0] {
                    continue;
                }
                nested_seen[id.0] = true;

                let nested = model.property(id);
                if classes.is_nested(id) && !classes.is_alias(id) {
                    let key = format!(
                        "{}::{}",
                        snake_case(&root_class.name),
                        snake_case(&nested.name)
                    );
                    let origin = format!("{}/{}", root_class.name, nested.name);
                    keys.claim(&key, origin.clone())?;
                    // Hook names are the variant's segments joined by `_`, so
                    // they collide only when variants do.
                    let variant =
                        format!("{}{}", pascal_case(&root_class.name), pascal_case(&nested.name));
                    variants.claim(&variant, origin)?;

                    let root_ident = snake_case(&root_class.name);
                    let nested_ident = snake_case(&nested.name);
                    entries.push(MappingEntry {
                        key,
                        variant,
                        hook: format!("{root_ident}_{nested_ident}"),
                        root: root_class.name.clone(),
                        root_ident,
                        root_qualified: paths.qualify(&root_class.name),
                        nested: nested.name.clone(),
                        nested_ident,
                        nested_qualified: paths.qualify(&nested.name),
                        owner: owner_class.name.clone(),
                        owner_ident: snake_case(&owner_class.name),
                        path: path.clone(),
                    });
                }

                for property in nested.properties.iter().rev() {
                    let ty = model.resolve_type(&property.type_name, || {
                        format!("{}.{}", nested.name, property.name)
                    })?;
                    if let TypeRef::Property(child) = ty
                        && !nested_seen[child.0]
                    {
                        stack.push((child, format!("{}.{}", path, property.name)));
                    }
                }
            }
        }
    }

    let mapped = |id: ObjectId| {
        let class = model.object(id);
        MappedClass {
            name: class.name.clone(),
            ident: snake_case(&class.name),
            qualified: paths.qualify(&class.name),
            parent: class.parent.clone(),
            root: model.object(root_of(relations, id)).name.clone(),
        }
    };

    tracing::debug!(entries = entries.len(), "custom mapping model built");

    Ok(CustomMappingModel {
        package: paths.package().to_string(),
        roots: classes.root_classes.iter().map(|id| mapped(*id)).collect(),
        classes: model.object_ids().map(mapped).collect(),
        entries,
    })
}

/// Object classes reachable from `root` through containment (downwards) and
/// outgoing references, breadth first, `root` included.
fn reachable_objects(model: &ClassModel, relations: &RelationsModel, root: ObjectId) -> Vec<ObjectId> {
    let mut visited = vec![false; model.object_classes().len()];
    let mut order = Vec::new();
    let mut queue = VecDeque::from([root]);
    visited[root.0] = true;

    while let Some(id) = queue.pop_front() {
        order.push(id);
        let children = relations.children_of(id);
        let references = relations
            .edges_from(id)
            .filter(|edge| edge.kind == RelationKind::Reference)
            .map(|edge| edge.target_id);
        for next in children.chain(references).collect::<Vec<_>>() {
            if !visited[next.0] {
                visited[next.0] = true;
                queue.push_back(next);
            }
        }
    }
    order
}

/// Top-most containing ancestor; parent chains are acyclic once relations
/// are built.
fn root_of(relations: &RelationsModel, mut id: ObjectId) -> ObjectId {
    while let Some(parent) = relations.parent_of(id) {
        id = parent;
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::error::GenerationError;
    use crate::model::{ObjectClass, Property, PropertyClass};
    use assert_matches::assert_matches;

    fn build(model: &ClassModel) -> Result<CustomMappingModel> {
        let classes = classify(model)?;
        let relations = RelationsModel::build(model)?;
        generate_custom_mapping(model, &classes, &relations, &TypePaths::new("gen"))
    }

    fn domain_model() -> ClassModel {
        ClassModel::new(
            vec![
                PropertyClass::new("Tag").with_property(Property::new("name", "string")),
                PropertyClass::new("Quota")
                    .with_property(Property::new("limit", "long"))
                    .with_property(Property::new("rules", "Rule").collection()),
                PropertyClass::new("Rule")
                    .with_property(Property::new("action", "string"))
                    .with_property(Property::new("priority", "int")),
            ],
            vec![
                ObjectClass::new("Domain"),
                ObjectClass::new("Project")
                    .with_parent("Domain")
                    .with_property(Property::new("quota", "Quota"))
                    .with_property(Property::new("tag", "Tag")),
                ObjectClass::new("Network")
                    .with_parent("Project")
                    .with_property(Property::new("policy", "Policy")),
                ObjectClass::new("Policy").with_property(Property::new("rule", "Rule")),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_entries_per_root_and_nested_pair() {
        let mapping = build(&domain_model()).unwrap();

        let keys: Vec<_> = mapping.entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["domain::quota", "domain::rule", "policy::rule"]
        );

        let rule = &mapping.entries[1];
        assert_eq!(rule.owner, "Project");
        assert_eq!(rule.path, "Project.quota.rules");
        assert_eq!(rule.nested_qualified, "gen::Rule");

        // Tag is an alias and never gets a dispatch entry
        assert!(mapping.entries.iter().all(|e| e.nested != "Tag"));
    }

    #[test]
    fn test_classes_know_their_root() {
        let mapping = build(&domain_model()).unwrap();
        let roots: Vec<_> = mapping.roots.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(roots, vec!["Domain", "Policy"]);

        let network = mapping.classes.iter().find(|c| c.name == "Network").unwrap();
        assert_eq!(network.root, "Domain");
        assert_eq!(network.parent.as_deref(), Some("Project"));
    }

    #[test]
    fn test_colliding_keys_are_fatal() {
        let model = ClassModel::new(
            vec![
                PropertyClass::new("IpamSubnet")
                    .with_property(Property::new("a", "string"))
                    .with_property(Property::new("b", "string")),
                PropertyClass::new("IPAMSubnet")
                    .with_property(Property::new("a", "string"))
                    .with_property(Property::new("b", "string")),
            ],
            vec![
                ObjectClass::new("Ipam")
                    .with_property(Property::new("one", "IpamSubnet"))
                    .with_property(Property::new("two", "IPAMSubnet")),
            ],
        )
        .unwrap();

        assert_matches!(
            build(&model),
            Err(GenerationError::DuplicateKey { key, .. }) if key == "ipam::ipam_subnet"
        );
    }

    #[test]
    fn test_variants_and_hooks_follow_names() {
        let mapping = build(&domain_model()).unwrap();
        let rule = &mapping.entries[1];
        assert_eq!(rule.variant, "DomainRule");
        assert_eq!(rule.hook, "domain_rule");
    }

    #[test]
    fn test_colliding_variants_are_fatal() {
        // `a_b::c` and `a::b_c` are distinct keys but both become `ABC`
        let model = ClassModel::new(
            vec![
                PropertyClass::new("C")
                    .with_property(Property::new("x", "string"))
                    .with_property(Property::new("y", "string")),
                PropertyClass::new("B_c")
                    .with_property(Property::new("x", "string"))
                    .with_property(Property::new("y", "string")),
            ],
            vec![
                ObjectClass::new("A_b").with_property(Property::new("c", "C")),
                ObjectClass::new("A").with_property(Property::new("bc", "B_c")),
            ],
        )
        .unwrap();

        assert_matches!(
            build(&model),
            Err(GenerationError::DuplicateKey { family: "mapping variant", key, first, second })
                if key == "ABC" && first == "A_b/C" && second == "A/B_c"
        );
    }

    #[test]
    fn test_root_without_nested_classes_has_no_entries() {
        let model = ClassModel::new(vec![], vec![ObjectClass::new("Solo")]).unwrap();
        let mapping = build(&model).unwrap();
        assert!(mapping.entries.is_empty());
        assert_eq!(mapping.roots.len(), 1);
        assert_eq!(mapping.classes[0].root, "Solo");
    }
}
