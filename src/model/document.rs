use super::{ClassModel, ObjectClass, PropertyClass};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Serialized form of a parsed class model (JSON or YAML)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassModelDocument {
    #[serde(default)]
    pub property_classes: Vec<PropertyClass>,
    #[serde(default)]
    pub object_classes: Vec<ObjectClass>,
}

impl ClassModelDocument {
    pub fn parse(contents: &str, format: &str) -> Result<Self> {
        let document = match format {
            "yaml" | "yml" => {
                serde_yaml::from_str(contents).context("failed to parse YAML class model")?
            }
            "json" => serde_json::from_str(contents).context("failed to parse JSON class model")?,
            other => anyhow::bail!("unsupported class model format: {other}"),
        };
        Ok(document)
    }

    pub fn into_model(self) -> Result<ClassModel> {
        Ok(ClassModel::new(self.property_classes, self.object_classes)?)
    }
}

/// Load a class model file, picking the format from its extension.
pub fn load_class_model(path: &Path) -> Result<ClassModel> {
    anyhow::ensure!(path.exists(), "class model {:?} does not exist", path);
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read class model {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|os| os.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let document = ClassModelDocument::parse(&contents, &ext)
        .with_context(|| format!("invalid class model {:?}", path))?;
    tracing::debug!(
        path = %path.display(),
        property_classes = document.property_classes.len(),
        object_classes = document.object_classes.len(),
        "loaded class model"
    );
    document.into_model()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LinkKind;

    #[test]
    fn test_parse_yaml_document() {
        let yaml = r#"
property_classes:
  - name: Tag
    properties:
      - { name: name, type: string, required: true }
object_classes:
  - name: Project
    properties:
      - { name: tags, type: Tag, collection: true }
    links:
      - { target: Network, kind: backReference }
  - name: Network
    parent: Project
"#;
        let document = ClassModelDocument::parse(yaml, "yaml").unwrap();
        assert_eq!(document.property_classes.len(), 1);
        assert!(document.property_classes[0].properties[0].required);
        assert!(document.object_classes[0].properties[0].collection);
        assert_eq!(document.object_classes[0].links[0].kind, LinkKind::BackReference);
        assert_eq!(document.object_classes[1].parent.as_deref(), Some("Project"));

        let model = document.into_model().unwrap();
        assert_eq!(model.object_classes().len(), 2);
    }

    #[test]
    fn test_parse_json_document() {
        let json = r#"{"object_classes":[{"name":"Domain"}]}"#;
        let document = ClassModelDocument::parse(json, "json").unwrap();
        assert!(document.property_classes.is_empty());
        assert_eq!(document.object_classes[0].name, "Domain");
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!(ClassModelDocument::parse("", "xml").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_class_model(Path::new("/nonexistent/model.yaml")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
