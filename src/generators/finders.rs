//! Finders model: lookup helpers for non-alias nested classes
//!
//! A finder starts from a known object wrapper and walks a chain of
//! properties down to the nested class. A nested class reachable along
//! several distinct property paths gets one finder per path, so diamond
//! shaped compositions grow the model exponentially with their depth; a
//! warning is logged past [`FINDER_PATH_WARN_THRESHOLD`] paths per class.

use super::{GenerationModel, KeyRegistry, TypePaths, WrappersModel};
use crate::classify::ClassSet;
use crate::error::{GenerationError, Result};
use crate::model::{ClassModel, PropertyId, TypeRef};
use crate::relations::RelationsModel;
use crate::utils::{field_ident, snake_case};
use serde::Serialize;

/// Paths from one object class above which the walk is reported as large
pub const FINDER_PATH_WARN_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, Serialize)]
pub struct FindersModel {
    pub package: String,
    pub finders: Vec<FinderEntry>,
    pub classes: Vec<FinderClass>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinderEntry {
    pub method: String,
    pub nested: String,
    pub nested_ident: String,
    pub nested_qualified: String,
    pub object: String,
    pub wrapper: String,
    pub parent_wrapper: Option<String>,
    pub steps: Vec<FinderStep>,
    /// `Object.prop.prop`, for docs and error messages
    pub path: String,
    /// True when any step is a collection, i.e. the lookup yields many
    pub many: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinderStep {
    pub owner: String,
    pub property: String,
    pub field: String,
    pub target: String,
    pub collection: bool,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinderClass {
    pub name: String,
    pub ident: String,
    pub qualified: String,
    pub finder_count: usize,
}

impl GenerationModel for FindersModel {
    const FAMILY: &'static str = "finders";

    fn entry_count(&self) -> usize {
        self.finders.len()
    }
}

pub fn generate_finders(
    model: &ClassModel,
    classes: &ClassSet,
    wrappers: &WrappersModel,
    relations: &RelationsModel,
    paths: &TypePaths,
) -> Result<FindersModel> {
    let mut found: Vec<(PropertyId, FinderEntry)> = Vec::new();

    for id in model.object_ids() {
        let object = model.object(id);
        let wrapper = wrappers
            .wrapper(&object.name)
            .ok_or_else(|| GenerationError::unresolved(&object.name, "finders model wrapper"))?;
        let parent_wrapper = relations
            .parent_of(id)
            .and_then(|parent| wrappers.wrapper(&model.object(parent).name))
            .map(|parent| parent.wrapper_name.clone());

        let mut walk = PathWalk {
            model,
            classes,
            on_path: vec![false; model.property_classes().len()],
            steps: Vec::new(),
            found: Vec::new(),
        };
        walk.descend(&object.name, &object.properties)?;
        if walk.found.len() > FINDER_PATH_WARN_THRESHOLD {
            tracing::warn!(
                class = %object.name,
                paths = walk.found.len(),
                threshold = FINDER_PATH_WARN_THRESHOLD,
                "object class reaches nested classes along many property paths"
            );
        }

        for (nested, steps) in walk.found {
            let nested_class = model.property(nested);
            let via = steps
                .iter()
                .map(|step| snake_case(&step.property))
                .collect::<Vec<_>>()
                .join("_");
            let path = std::iter::once(object.name.clone())
                .chain(steps.iter().map(|step| step.property.clone()))
                .collect::<Vec<_>>()
                .join(".");
            found.push((
                nested,
                FinderEntry {
                    method: format!(
                        "find_{}_in_{}_via_{}",
                        snake_case(&nested_class.name),
                        snake_case(&object.name),
                        via
                    ),
                    nested: nested_class.name.clone(),
                    nested_ident: snake_case(&nested_class.name),
                    nested_qualified: paths.qualify(&nested_class.name),
                    object: object.name.clone(),
                    wrapper: wrapper.wrapper_name.clone(),
                    parent_wrapper: parent_wrapper.clone(),
                    many: steps.iter().any(|step| step.collection),
                    steps,
                    path,
                },
            ));
        }
    }

    // Group by nested class in declaration order, keeping discovery order
    // within each group.
    found.sort_by_key(|(nested, _)| *nested);

    let mut methods = KeyRegistry::new("finder");
    for (_, entry) in &found {
        methods.claim(&entry.method, entry.path.clone())?;
    }

    // Finders land in the wrapper's impl blocks next to its own members.
    for wrapper in &wrappers.wrappers {
        let origin = format!("`{}` member", wrapper.wrapper_name);
        let mut members = KeyRegistry::reserved("wrapper method", wrapper.member_names(), &origin);
        for (_, entry) in found.iter().filter(|(_, e)| e.wrapper == wrapper.wrapper_name) {
            members.claim(&entry.method, entry.path.clone())?;
        }
    }

    let classes_out = classes
        .non_alias_classes
        .iter()
        .map(|&id| {
            let class = model.property(id);
            FinderClass {
                name: class.name.clone(),
                ident: snake_case(&class.name),
                qualified: paths.qualify(&class.name),
                finder_count: found.iter().filter(|(nested, _)| *nested == id).count(),
            }
        })
        .collect();

    let finders: Vec<FinderEntry> = found.into_iter().map(|(_, entry)| entry).collect();
    tracing::debug!(finders = finders.len(), "finders model built");

    Ok(FindersModel {
        package: paths.package().to_string(),
        finders,
        classes: classes_out,
    })
}

/// Depth-first enumeration of property paths; a class is never revisited
/// along the same path.
struct PathWalk<'a> {
    model: &'a ClassModel,
    classes: &'a ClassSet,
    on_path: Vec<bool>,
    steps: Vec<FinderStep>,
    found: Vec<(PropertyId, Vec<FinderStep>)>,
}

impl PathWalk<'_> {
    fn descend(&mut self, owner: &str, properties: &[crate::model::Property]) -> Result<()> {
        for property in properties {
            let ty = self
                .model
                .resolve_type(&property.type_name, || format!("{}.{}", owner, property.name))?;
            let TypeRef::Property(target) = ty else {
                continue;
            };
            if self.on_path[target.0] || self.classes.is_alias(target) {
                continue;
            }

            let target_class = self.model.property(target);
            self.steps.push(FinderStep {
                owner: owner.to_string(),
                property: property.name.clone(),
                field: field_ident(&property.name),
                target: target_class.name.clone(),
                collection: property.collection,
                required: property.required,
            });
            if self.classes.is_nested(target) {
                self.found.push((target, self.steps.clone()));
            }

            self.on_path[target.0] = true;
            self.descend(&target_class.name, &target_class.properties)?;
            self.on_path[target.0] = false;
            self.steps.pop();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::generators::generate_wrappers;
    use crate::model::{ObjectClass, Property, PropertyClass};
    use assert_matches::assert_matches;

    fn build(model: &ClassModel) -> Result<FindersModel> {
        let classes = classify(model)?;
        let relations = RelationsModel::build(model)?;
        let paths = TypePaths::new("gen");
        let wrappers = generate_wrappers(model, &classes, &relations, &paths)?;
        generate_finders(model, &classes, &wrappers, &relations, &paths)
    }

    fn rule_model() -> ClassModel {
        ClassModel::new(
            vec![
                PropertyClass::new("Rule")
                    .with_property(Property::new("action", "string"))
                    .with_property(Property::new("priority", "int")),
                PropertyClass::new("RuleSet")
                    .with_property(Property::new("rules", "Rule").collection())
                    .with_property(Property::new("name", "string")),
                PropertyClass::new("Label").with_property(Property::new("value", "string")),
            ],
            vec![
                ObjectClass::new("Domain"),
                ObjectClass::new("Policy")
                    .with_parent("Domain")
                    .with_property(Property::new("ingress", "RuleSet"))
                    .with_property(Property::new("egress", "RuleSet"))
                    .with_property(Property::new("default_rule", "Rule").required())
                    .with_property(Property::new("label", "Label")),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_one_finder_per_distinct_path() {
        let finders = build(&rule_model()).unwrap();

        let rule_paths: Vec<_> = finders
            .finders
            .iter()
            .filter(|f| f.nested == "Rule")
            .map(|f| f.path.as_str())
            .collect();
        assert_eq!(
            rule_paths,
            vec![
                "Policy.ingress.rules",
                "Policy.egress.rules",
                "Policy.default_rule"
            ]
        );

        let default_rule = finders
            .finders
            .iter()
            .find(|f| f.path == "Policy.default_rule")
            .unwrap();
        assert_eq!(default_rule.method, "find_rule_in_policy_via_default_rule");
        assert_eq!(default_rule.wrapper, "PolicyWrapper");
        assert_eq!(default_rule.parent_wrapper.as_deref(), Some("DomainWrapper"));
        assert!(!default_rule.many);

        let ingress = finders
            .finders
            .iter()
            .find(|f| f.path == "Policy.ingress.rules")
            .unwrap();
        assert!(ingress.many);
        assert_eq!(ingress.steps.len(), 2);
    }

    #[test]
    fn test_entries_grouped_by_nested_class() {
        let finders = build(&rule_model()).unwrap();
        let nested: Vec<_> = finders.finders.iter().map(|f| f.nested.as_str()).collect();
        assert_eq!(nested, vec!["Rule", "Rule", "Rule", "RuleSet", "RuleSet"]);

        let counts: Vec<_> = finders
            .classes
            .iter()
            .map(|c| (c.name.as_str(), c.finder_count))
            .collect();
        assert_eq!(counts, vec![("Rule", 3), ("RuleSet", 2)]);
        assert!(finders.finders.iter().all(|f| f.nested != "Label"));
    }

    #[test]
    fn test_recursive_property_classes_terminate() {
        let model = ClassModel::new(
            vec![
                PropertyClass::new("TreeNode")
                    .with_property(Property::new("children", "TreeNode").collection())
                    .with_property(Property::new("name", "string")),
            ],
            vec![ObjectClass::new("Tree").with_property(Property::new("root", "TreeNode"))],
        )
        .unwrap();
        let finders = build(&model).unwrap();
        assert_eq!(finders.finders.len(), 1);
        assert_eq!(finders.finders[0].path, "Tree.root");
    }

    #[test]
    fn test_colliding_method_names_are_fatal() {
        // `a_b` and `a.b` both spell `via_a_b`
        let model = ClassModel::new(
            vec![
                PropertyClass::new("Rule")
                    .with_property(Property::new("a", "string"))
                    .with_property(Property::new("b", "string")),
                PropertyClass::new("Hop")
                    .with_property(Property::new("b", "Rule"))
                    .with_property(Property::new("c", "string")),
            ],
            vec![
                ObjectClass::new("Policy")
                    .with_property(Property::new("a_b", "Rule"))
                    .with_property(Property::new("a", "Hop")),
            ],
        )
        .unwrap();
        assert_matches!(
            build(&model),
            Err(GenerationError::DuplicateKey { family: "finder", key, .. })
                if key == "find_rule_in_policy_via_a_b"
        );
    }

    #[test]
    fn test_finder_colliding_with_wrapper_accessor() {
        let model = ClassModel::new(
            vec![
                PropertyClass::new("Rule")
                    .with_property(Property::new("a", "string"))
                    .with_property(Property::new("b", "string")),
                PropertyClass::new("Info")
                    .with_property(Property::new("rule", "Rule"))
                    .with_property(Property::new("note", "string")),
            ],
            vec![
                ObjectClass::new("Project")
                    .with_property(Property::new("info", "Info"))
                    .with_property(Property::new("find_rule_in_project_via_info_rule", "Info")),
            ],
        )
        .unwrap();
        assert_matches!(
            build(&model),
            Err(GenerationError::DuplicateKey { family: "wrapper method", key, first, second })
                if key == "find_rule_in_project_via_info_rule"
                    && first == "`ProjectWrapper` member"
                    && second == "Project.info.rule"
        );
    }

    #[test]
    fn test_diamond_compositions_get_every_path() {
        let model = ClassModel::new(
            vec![
                PropertyClass::new("Top")
                    .with_property(Property::new("x", "Mid"))
                    .with_property(Property::new("y", "Mid")),
                PropertyClass::new("Mid")
                    .with_property(Property::new("x", "Leaf"))
                    .with_property(Property::new("y", "Leaf")),
                PropertyClass::new("Leaf")
                    .with_property(Property::new("v", "string"))
                    .with_property(Property::new("w", "string")),
            ],
            vec![ObjectClass::new("Root").with_property(Property::new("top", "Top"))],
        )
        .unwrap();
        let finders = build(&model).unwrap();

        let counts: Vec<_> = finders
            .classes
            .iter()
            .map(|c| (c.name.as_str(), c.finder_count))
            .collect();
        assert_eq!(counts, vec![("Top", 1), ("Mid", 2), ("Leaf", 4)]);
        assert!(finders.finders.len() < FINDER_PATH_WARN_THRESHOLD);
    }
}
