//! Relations Model
//!
//! Resolves every relationship in the class model into a typed, directed
//! [`RelationEdge`] between two object classes:
//!
//! ```text
//! child ──parentChild──▶ parent        (one per non-root class)
//! owner ──reference────▶ target        (property typed by an object class,
//!                                       or a declared reference link)
//! target ─backReference▶ owner         (declared, or synthesised per reference)
//! ```
//!
//! The model is built once and read by three of the derived generators. It is
//! either complete and valid or not built at all.

use crate::error::{GenerationError, Result};
use crate::model::{ClassModel, LinkKind, ObjectId, TypeRef};
use crate::utils::snake_case;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationKind {
    ParentChild,
    Reference,
    BackReference,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::ParentChild => "parentChild",
            RelationKind::Reference => "reference",
            RelationKind::BackReference => "backReference",
        }
    }
}

/// A typed, directed link between two object classes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationEdge {
    #[serde(skip)]
    pub source_id: ObjectId,
    #[serde(skip)]
    pub target_id: ObjectId,
    pub source: String,
    pub target: String,
    pub kind: RelationKind,
    /// False only for back-references synthesised from a reference edge
    pub explicit: bool,
    /// Properties of the source class that produced a reference edge
    pub via: Vec<String>,
}

/// Per-class summary of the edges leaving a class
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassRelations {
    pub name: String,
    pub ident: String,
    pub parent: Option<String>,
    pub children: Vec<String>,
    pub references: Vec<String>,
    pub back_references: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelationsModel {
    pub edges: Vec<RelationEdge>,
    pub classes: Vec<ClassRelations>,
    #[serde(skip)]
    by_source: Vec<Vec<usize>>,
    #[serde(skip)]
    by_target: Vec<Vec<usize>>,
}

#[derive(Debug, Default)]
struct EdgeDraft {
    explicit: bool,
    via: Vec<String>,
}

type EdgeKey = (ObjectId, RelationKind, ObjectId);

impl RelationsModel {
    /// Build the full relations model, failing on the first dangling name.
    pub fn build(model: &ClassModel) -> Result<Self> {
        let mut drafts: BTreeMap<EdgeKey, EdgeDraft> = BTreeMap::new();

        for source in model.object_ids() {
            let class = model.object(source);

            if let Some(parent) = &class.parent {
                let target =
                    model.resolve_object(parent, || format!("{}.parent", class.name))?;
                drafts
                    .entry((source, RelationKind::ParentChild, target))
                    .or_default()
                    .explicit = true;
            }

            for property in &class.properties {
                let ty = model.resolve_type(&property.type_name, || {
                    format!("{}.{}", class.name, property.name)
                })?;
                if let TypeRef::Object(target) = ty {
                    let draft = drafts
                        .entry((source, RelationKind::Reference, target))
                        .or_default();
                    draft.explicit = true;
                    draft.via.push(property.name.clone());
                }
            }

            for link in &class.links {
                let target = model.resolve_object(&link.target, || {
                    format!("{} link", class.name)
                })?;
                match link.kind {
                    LinkKind::Containment => {
                        let child = model.object(target);
                        if child.parent.as_deref() != Some(class.name.as_str()) {
                            return Err(GenerationError::ContainmentMismatch {
                                container: class.name.clone(),
                                child: child.name.clone(),
                                actual: child
                                    .parent
                                    .as_ref()
                                    .map(|p| format!("`{p}`"))
                                    .unwrap_or_else(|| "unset".to_string()),
                            });
                        }
                    }
                    LinkKind::Reference => {
                        drafts
                            .entry((source, RelationKind::Reference, target))
                            .or_default()
                            .explicit = true;
                    }
                    LinkKind::BackReference => {
                        drafts
                            .entry((source, RelationKind::BackReference, target))
                            .or_default()
                            .explicit = true;
                    }
                }
            }
        }

        check_containment_cycles(model)?;

        // Mirror every reference; an explicit back-reference on the pair wins.
        let references: Vec<(ObjectId, ObjectId)> = drafts
            .keys()
            .filter(|(_, kind, _)| *kind == RelationKind::Reference)
            .map(|(source, _, target)| (*source, *target))
            .collect();
        for (source, target) in references {
            drafts
                .entry((target, RelationKind::BackReference, source))
                .or_insert_with(EdgeDraft::default);
        }

        let edges: Vec<RelationEdge> = drafts
            .into_iter()
            .map(|((source, kind, target), draft)| RelationEdge {
                source_id: source,
                target_id: target,
                source: model.object(source).name.clone(),
                target: model.object(target).name.clone(),
                kind,
                explicit: draft.explicit,
                via: draft.via,
            })
            .collect();

        let count = model.object_classes().len();
        let mut by_source = vec![Vec::new(); count];
        let mut by_target = vec![Vec::new(); count];
        for (i, edge) in edges.iter().enumerate() {
            by_source[edge.source_id.0].push(i);
            by_target[edge.target_id.0].push(i);
        }

        let classes = model
            .object_ids()
            .map(|id| {
                let class = model.object(id);
                let outgoing = |kind: RelationKind| -> Vec<String> {
                    by_source[id.0]
                        .iter()
                        .map(|i| &edges[*i])
                        .filter(|edge| edge.kind == kind)
                        .map(|edge| edge.target.clone())
                        .collect()
                };
                ClassRelations {
                    name: class.name.clone(),
                    ident: snake_case(&class.name),
                    parent: class.parent.clone(),
                    children: by_target[id.0]
                        .iter()
                        .map(|i| &edges[*i])
                        .filter(|edge| edge.kind == RelationKind::ParentChild)
                        .map(|edge| edge.source.clone())
                        .collect(),
                    references: outgoing(RelationKind::Reference),
                    back_references: outgoing(RelationKind::BackReference),
                }
            })
            .collect();

        tracing::debug!(edges = edges.len(), "relations model built");

        Ok(Self {
            edges,
            classes,
            by_source,
            by_target,
        })
    }

    pub fn edges_from(&self, id: ObjectId) -> impl Iterator<Item = &RelationEdge> + '_ {
        self.by_source[id.0].iter().map(|i| &self.edges[*i])
    }

    pub fn edges_to(&self, id: ObjectId) -> impl Iterator<Item = &RelationEdge> + '_ {
        self.by_target[id.0].iter().map(|i| &self.edges[*i])
    }

    /// Edges with the class as source or target, each listed once
    pub fn edges_touching(&self, id: ObjectId) -> Vec<&RelationEdge> {
        let mut seen = HashSet::new();
        self.by_source[id.0]
            .iter()
            .chain(&self.by_target[id.0])
            .filter(|i| seen.insert(**i))
            .map(|i| &self.edges[*i])
            .collect()
    }

    pub fn parent_of(&self, id: ObjectId) -> Option<ObjectId> {
        self.edges_from(id)
            .find(|edge| edge.kind == RelationKind::ParentChild)
            .map(|edge| edge.target_id)
    }

    pub fn children_of(&self, id: ObjectId) -> impl Iterator<Item = ObjectId> + '_ {
        self.edges_to(id)
            .filter(|edge| edge.kind == RelationKind::ParentChild)
            .map(|edge| edge.source_id)
    }

    pub fn class(&self, id: ObjectId) -> &ClassRelations {
        &self.classes[id.0]
    }

    /// Look an edge up by class names
    pub fn edge(&self, source: &str, target: &str, kind: RelationKind) -> Option<&RelationEdge> {
        self.edges
            .iter()
            .find(|edge| edge.source == source && edge.target == target && edge.kind == kind)
    }

    pub fn count(&self, kind: RelationKind) -> usize {
        self.edges.iter().filter(|edge| edge.kind == kind).count()
    }
}

fn check_containment_cycles(model: &ClassModel) -> Result<()> {
    // 0 = unvisited, 1 = on the current chain, 2 = known to reach a root
    let mut state = vec![0u8; model.object_classes().len()];
    for start in model.object_ids() {
        let mut chain = Vec::new();
        let mut current = Some(start);
        while let Some(id) = current {
            match state[id.0] {
                2 => break,
                1 => return Err(GenerationError::ContainmentCycle(model.object(id).name.clone())),
                _ => {}
            }
            state[id.0] = 1;
            chain.push(id);
            current = model.object(id).parent.as_deref().and_then(|p| model.object_id(p));
        }
        for id in chain {
            state[id.0] = 2;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ObjectClass, Property, PropertyClass};
    use assert_matches::assert_matches;

    fn project_model() -> ClassModel {
        ClassModel::new(
            vec![PropertyClass::new("Tag").with_property(Property::new("name", "string"))],
            vec![
                ObjectClass::new("Project")
                    .with_property(Property::new("tags", "Tag").collection())
                    .with_property(Property::new("network", "Network")),
                ObjectClass::new("Network"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_reference_and_synthesised_back_reference() {
        let relations = RelationsModel::build(&project_model()).unwrap();

        let reference = relations
            .edge("Project", "Network", RelationKind::Reference)
            .unwrap();
        assert!(reference.explicit);
        assert_eq!(reference.via, vec!["network"]);

        let back = relations
            .edge("Network", "Project", RelationKind::BackReference)
            .unwrap();
        assert!(!back.explicit);
        assert_eq!(relations.edges.len(), 2);
    }

    #[test]
    fn test_parent_child_edge() {
        let model = ClassModel::new(
            vec![],
            vec![ObjectClass::new("A"), ObjectClass::new("B").with_parent("A")],
        )
        .unwrap();
        let relations = RelationsModel::build(&model).unwrap();
        assert!(relations.edge("B", "A", RelationKind::ParentChild).is_some());
        assert_eq!(relations.parent_of(ObjectId(1)), Some(ObjectId(0)));
        assert_eq!(relations.children_of(ObjectId(0)).collect::<Vec<_>>(), vec![ObjectId(1)]);
        assert_eq!(relations.class(ObjectId(0)).children, vec!["B"]);
        assert_eq!(relations.class(ObjectId(1)).parent.as_deref(), Some("A"));
    }

    #[test]
    fn test_explicit_back_reference_wins() {
        let model = ClassModel::new(
            vec![],
            vec![
                ObjectClass::new("Project").with_property(Property::new("network", "Network")),
                ObjectClass::new("Network").with_link("Project", LinkKind::BackReference),
            ],
        )
        .unwrap();
        let relations = RelationsModel::build(&model).unwrap();
        let backs: Vec<_> = relations
            .edges
            .iter()
            .filter(|edge| edge.kind == RelationKind::BackReference)
            .collect();
        assert_eq!(backs.len(), 1);
        assert!(backs[0].explicit);
    }

    #[test]
    fn test_repeated_references_merge() {
        let model = ClassModel::new(
            vec![],
            vec![
                ObjectClass::new("Router")
                    .with_property(Property::new("primary", "Network"))
                    .with_property(Property::new("secondary", "Network"))
                    .with_link("Network", LinkKind::Reference),
                ObjectClass::new("Network"),
            ],
        )
        .unwrap();
        let relations = RelationsModel::build(&model).unwrap();
        assert_eq!(relations.count(RelationKind::Reference), 1);
        assert_eq!(relations.count(RelationKind::BackReference), 1);
        assert_eq!(
            relations
                .edge("Router", "Network", RelationKind::Reference)
                .unwrap()
                .via,
            vec!["primary", "secondary"]
        );
    }

    #[test]
    fn test_dangling_names_are_fatal() {
        let model = ClassModel::new(
            vec![],
            vec![ObjectClass::new("Project").with_parent("Domain")],
        )
        .unwrap();
        assert_matches!(
            RelationsModel::build(&model),
            Err(GenerationError::UnresolvedReference { name, referrer })
                if name == "Domain" && referrer == "Project.parent"
        );

        let model = ClassModel::new(
            vec![],
            vec![ObjectClass::new("Project").with_link("Ghost", LinkKind::Reference)],
        )
        .unwrap();
        assert_matches!(
            RelationsModel::build(&model),
            Err(GenerationError::UnresolvedReference { name, .. }) if name == "Ghost"
        );
    }

    #[test]
    fn test_parent_naming_property_class_is_unresolved() {
        let model = ClassModel::new(
            vec![PropertyClass::new("Tag")],
            vec![ObjectClass::new("Project").with_parent("Tag")],
        )
        .unwrap();
        assert_matches!(
            RelationsModel::build(&model),
            Err(GenerationError::UnresolvedReference { .. })
        );
    }

    #[test]
    fn test_containment_link_must_match_parent() {
        let model = ClassModel::new(
            vec![],
            vec![
                ObjectClass::new("Domain").with_link("Project", LinkKind::Containment),
                ObjectClass::new("Project").with_parent("Domain"),
                ObjectClass::new("Other").with_link("Project", LinkKind::Containment),
            ],
        )
        .unwrap();
        assert_matches!(
            RelationsModel::build(&model),
            Err(GenerationError::ContainmentMismatch { container, child, .. })
                if container == "Other" && child == "Project"
        );
    }

    #[test]
    fn test_containment_cycle_is_fatal() {
        let model = ClassModel::new(
            vec![],
            vec![
                ObjectClass::new("A").with_parent("B"),
                ObjectClass::new("B").with_parent("A"),
            ],
        )
        .unwrap();
        assert_matches!(
            RelationsModel::build(&model),
            Err(GenerationError::ContainmentCycle(_))
        );
    }

    #[test]
    fn test_edges_touching_lists_self_reference_once() {
        let model = ClassModel::new(
            vec![],
            vec![ObjectClass::new("Node").with_property(Property::new("next", "Node"))],
        )
        .unwrap();
        let relations = RelationsModel::build(&model).unwrap();
        assert_eq!(relations.edges.len(), 2);
        assert_eq!(relations.edges_touching(ObjectId(0)).len(), 2);
    }
}
