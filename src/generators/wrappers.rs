//! Wrappers model: one accessor wrapper per object class

use super::{GenerationModel, KeyRegistry, TypePaths};
use crate::classify::ClassSet;
use crate::error::Result;
use crate::model::{ClassModel, ObjectId, TypeRef};
use crate::relations::{RelationEdge, RelationKind, RelationsModel};
use crate::utils::{field_ident, snake_case};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct WrappersModel {
    pub package: String,
    pub wrappers: Vec<WrapperEntry>,
    pub inner_classes: Vec<InnerClassEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WrapperEntry {
    pub class_name: String,
    pub ident: String,
    pub wrapper_name: String,
    pub qualified: String,
    pub parent: Option<String>,
    pub parent_wrapper: Option<String>,
    /// One per property typed by an inner class; may be empty
    pub accessors: Vec<Accessor>,
    /// Relation edges with this class as source or target
    pub relations: Vec<WrapperRelation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Accessor {
    pub property: String,
    pub field: String,
    pub method: String,
    pub inner_class: String,
    pub inner_wrapper: String,
    pub rust_type: String,
    pub collection: bool,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct WrapperRelation {
    pub kind: RelationKind,
    pub outgoing: bool,
    /// The class at the other end of the edge
    pub other: String,
    pub other_wrapper: String,
    pub method: String,
    pub explicit: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct InnerClassEntry {
    pub name: String,
    pub ident: String,
    pub wrapper_name: String,
    pub qualified: String,
    pub fields: Vec<InnerField>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InnerField {
    pub property: String,
    pub field: String,
    pub rust_type: String,
    pub collection: bool,
    pub required: bool,
}

impl GenerationModel for WrappersModel {
    const FAMILY: &'static str = "wrappers";

    fn entry_count(&self) -> usize {
        self.wrappers.len()
    }
}

/// Members every generated wrapper declares itself
pub const WRAPPER_MEMBERS: [&str; 3] = ["new", "get", "CLASS"];

/// Members every generated inner class wrapper declares itself
pub const INNER_WRAPPER_MEMBERS: [&str; 2] = ["new", "get"];

const GENERATED_MEMBER: &str = "generated wrapper member";

impl WrapperEntry {
    /// Every associated item the wrapper's own `impl` block declares
    pub fn member_names(&self) -> impl Iterator<Item = &str> + '_ {
        WRAPPER_MEMBERS
            .into_iter()
            .chain(self.accessors.iter().map(|a| a.method.as_str()))
            .chain(self.relations.iter().map(|r| r.method.as_str()))
    }
}

impl WrappersModel {
    pub fn wrapper(&self, class_name: &str) -> Option<&WrapperEntry> {
        self.wrappers.iter().find(|w| w.class_name == class_name)
    }
}

pub fn generate_wrappers(
    model: &ClassModel,
    classes: &ClassSet,
    relations: &RelationsModel,
    paths: &TypePaths,
) -> Result<WrappersModel> {
    let mut wrappers = Vec::with_capacity(model.object_classes().len());

    for id in model.object_ids() {
        let class = model.object(id);
        let mut methods = KeyRegistry::reserved("wrapper method", WRAPPER_MEMBERS, GENERATED_MEMBER);

        let mut accessors = Vec::new();
        for property in &class.properties {
            let ty = model.resolve_type(&property.type_name, || {
                format!("{}.{}", class.name, property.name)
            })?;
            let TypeRef::Property(inner) = ty else {
                continue;
            };
            if !classes.is_inner(inner) {
                continue;
            }
            let inner_class = &model.property(inner).name;
            let method = field_ident(&property.name);
            methods.claim(&method, format!("{}.{}", class.name, property.name))?;
            accessors.push(Accessor {
                property: property.name.clone(),
                field: field_ident(&property.name),
                method,
                inner_class: inner_class.clone(),
                inner_wrapper: paths.wrapper_name(inner_class),
                rust_type: paths.field_type(model, &class.name, property)?,
                collection: property.collection,
                required: property.required,
            });
        }

        let mut wrapper_relations = Vec::new();
        for edge in relations.edges_touching(id) {
            let relation = wrapper_relation(edge, id, paths);
            methods.claim(
                &relation.method,
                format!("{} {} {}", edge.source, edge.kind.as_str(), edge.target),
            )?;
            wrapper_relations.push(relation);
        }

        let parent_wrapper = class.parent.as_deref().map(|p| paths.wrapper_name(p));
        wrappers.push(WrapperEntry {
            class_name: class.name.clone(),
            ident: snake_case(&class.name),
            wrapper_name: paths.wrapper_name(&class.name),
            qualified: paths.qualify(&class.name),
            parent: class.parent.clone(),
            parent_wrapper,
            accessors,
            relations: wrapper_relations,
        });
    }

    let mut inner_classes = Vec::with_capacity(classes.inner_classes.len());
    for &id in &classes.inner_classes {
        let class = model.property(id);
        let mut getters =
            KeyRegistry::reserved("inner wrapper method", INNER_WRAPPER_MEMBERS, GENERATED_MEMBER);
        let fields = class
            .properties
            .iter()
            .map(|property| {
                let field = field_ident(&property.name);
                getters.claim(&field, format!("{}.{}", class.name, property.name))?;
                Ok(InnerField {
                    property: property.name.clone(),
                    field,
                    rust_type: paths.field_type(model, &class.name, property)?,
                    collection: property.collection,
                    required: property.required,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        inner_classes.push(InnerClassEntry {
            name: class.name.clone(),
            ident: snake_case(&class.name),
            wrapper_name: paths.wrapper_name(&class.name),
            qualified: paths.qualify(&class.name),
            fields,
        });
    }

    tracing::debug!(
        wrappers = wrappers.len(),
        inner_classes = inner_classes.len(),
        "wrappers model built"
    );

    Ok(WrappersModel {
        package: paths.package().to_string(),
        wrappers,
        inner_classes,
    })
}

fn wrapper_relation(edge: &RelationEdge, id: ObjectId, paths: &TypePaths) -> WrapperRelation {
    let outgoing = edge.source_id == id;
    let other = if outgoing { &edge.target } else { &edge.source };
    let other_ident = snake_case(other);
    let method = match (edge.kind, outgoing) {
        (RelationKind::ParentChild, true) => "parent".to_string(),
        (RelationKind::ParentChild, false) => format!("{other_ident}_children"),
        (RelationKind::Reference, true) => format!("{other_ident}_refs"),
        (RelationKind::Reference, false) => format!("{other_ident}_referrers"),
        (RelationKind::BackReference, true) => format!("{other_ident}_back_refs"),
        (RelationKind::BackReference, false) => format!("{other_ident}_back_referrers"),
    };
    WrapperRelation {
        kind: edge.kind,
        outgoing,
        other: other.clone(),
        other_wrapper: paths.wrapper_name(other),
        method,
        explicit: edge.explicit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::error::GenerationError;
    use crate::model::{ObjectClass, Property, PropertyClass};
    use assert_matches::assert_matches;

    fn build(model: &ClassModel) -> Result<WrappersModel> {
        let classes = classify(model)?;
        let relations = RelationsModel::build(model)?;
        generate_wrappers(model, &classes, &relations, &TypePaths::new("gen"))
    }

    #[test]
    fn test_wrapper_per_object_class() {
        let model = ClassModel::new(
            vec![
                PropertyClass::new("Quota")
                    .with_property(Property::new("limit", "long").required())
                    .with_property(Property::new("scope", "string")),
            ],
            vec![
                ObjectClass::new("Project")
                    .with_property(Property::new("quota", "Quota").required())
                    .with_property(Property::new("name", "string")),
                ObjectClass::new("Network").with_parent("Project"),
            ],
        )
        .unwrap();

        let wrappers = build(&model).unwrap();
        assert_eq!(wrappers.wrappers.len(), 2);

        let project = wrappers.wrapper("Project").unwrap();
        assert_eq!(project.wrapper_name, "ProjectWrapper");
        assert_eq!(project.accessors.len(), 1);
        assert_eq!(project.accessors[0].inner_wrapper, "QuotaWrapper");
        assert_eq!(project.accessors[0].rust_type, "gen::Quota");
        assert_eq!(project.relations.len(), 1);
        assert_eq!(project.relations[0].method, "network_children");
        assert!(!project.relations[0].outgoing);

        // No inner classes, still present
        let network = wrappers.wrapper("Network").unwrap();
        assert!(network.accessors.is_empty());
        assert_eq!(network.parent_wrapper.as_deref(), Some("ProjectWrapper"));
        assert_eq!(network.relations[0].method, "parent");

        assert_eq!(wrappers.inner_classes.len(), 1);
        assert_eq!(wrappers.inner_classes[0].fields[0].rust_type, "i64");
        assert_eq!(wrappers.inner_classes[0].fields[1].rust_type, "Option<String>");
    }

    #[test]
    fn test_reference_relations_on_both_ends() {
        let model = ClassModel::new(
            vec![],
            vec![
                ObjectClass::new("Project").with_property(Property::new("network", "Network")),
                ObjectClass::new("Network"),
            ],
        )
        .unwrap();
        let wrappers = build(&model).unwrap();

        let methods = |name: &str| -> Vec<String> {
            wrappers
                .wrapper(name)
                .unwrap()
                .relations
                .iter()
                .map(|r| r.method.clone())
                .collect()
        };
        assert_eq!(methods("Project"), vec!["network_refs", "network_back_referrers"]);
        assert_eq!(methods("Network"), vec!["project_back_refs", "project_referrers"]);
    }

    #[test]
    fn test_accessor_colliding_with_relation_method() {
        let model = ClassModel::new(
            vec![
                PropertyClass::new("Info")
                    .with_property(Property::new("a", "string"))
                    .with_property(Property::new("b", "string")),
            ],
            vec![
                ObjectClass::new("Domain"),
                ObjectClass::new("Project")
                    .with_parent("Domain")
                    .with_property(Property::new("parent", "Info")),
            ],
        )
        .unwrap();
        assert_matches!(
            build(&model),
            Err(GenerationError::DuplicateKey { family: "wrapper method", key, .. }) if key == "parent"
        );
    }

    fn info_model(info: PropertyClass) -> ClassModel {
        ClassModel::new(
            vec![info],
            vec![ObjectClass::new("Project").with_property(Property::new("info", "Info"))],
        )
        .unwrap()
    }

    #[test]
    fn test_inner_field_colliding_with_generated_member() {
        let model = info_model(
            PropertyClass::new("Info")
                .with_property(Property::new("new", "string"))
                .with_property(Property::new("label", "string")),
        );
        assert_matches!(
            build(&model),
            Err(GenerationError::DuplicateKey { family: "inner wrapper method", key, second, .. })
                if key == "new" && second == "Info.new"
        );
    }

    #[test]
    fn test_inner_fields_colliding_after_snake_case() {
        let model = info_model(
            PropertyClass::new("Info")
                .with_property(Property::new("displayName", "string"))
                .with_property(Property::new("display_name", "string")),
        );
        assert_matches!(
            build(&model),
            Err(GenerationError::DuplicateKey { key, first, second, .. })
                if key == "display_name" && first == "Info.displayName" && second == "Info.display_name"
        );
    }

    #[test]
    fn test_accessor_colliding_with_generated_member() {
        let model = ClassModel::new(
            vec![
                PropertyClass::new("Info")
                    .with_property(Property::new("a", "string"))
                    .with_property(Property::new("b", "string")),
            ],
            vec![ObjectClass::new("Project").with_property(Property::new("get", "Info"))],
        )
        .unwrap();
        assert_matches!(
            build(&model),
            Err(GenerationError::DuplicateKey { family: "wrapper method", key, .. }) if key == "get"
        );
    }

    #[test]
    fn test_member_names_cover_the_impl_block() {
        let model = info_model(
            PropertyClass::new("Info")
                .with_property(Property::new("a", "string"))
                .with_property(Property::new("b", "string")),
        );
        let wrappers = build(&model).unwrap();
        let members: Vec<_> = wrappers.wrapper("Project").unwrap().member_names().collect();
        assert_eq!(members, vec!["new", "get", "CLASS", "info"]);
    }
}
