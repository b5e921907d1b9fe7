use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::{
    error::ManifestError,
    manifest::{FilterManifest, PolicyManifest},
    Result,
};
use crate::ability::Ability;
use crate::attributes::Attributes;
use crate::class::PolicyClass;
use crate::error::RuleResult;

/// Policy class used for manifest-defined policies.
pub type ManifestClass = PolicyClass<Value, Value>;

/// Named policy classes compiled from a manifest.
#[derive(Debug, Default)]
pub struct PolicyCatalog {
    classes: HashMap<String, Arc<ManifestClass>>,
    order: Vec<String>,
}

impl PolicyCatalog {
    /// Build every class in the manifest.
    pub fn from_manifest(manifest: &PolicyManifest) -> Result<Self> {
        manifest.validate().map_err(ManifestError::InvalidManifest)?;

        let mut catalog = Self::default();
        for entry in &manifest.classes {
            let class = match &entry.extends {
                Some(parent) => catalog.class(parent)?.subclass(entry.name.as_str()),
                None => PolicyClass::new(entry.name.as_str()),
            };

            for (name, filter) in &entry.filters {
                define_filter(&class, name, filter.clone());
            }

            for (index, rule) in entry.rules.iter().enumerate() {
                let granted = rule.abilities.clone();
                class
                    .abilities(rule.guard_options(), move |_| Ok(granted.clone()))
                    .map_err(|source| ManifestError::InvalidRule {
                        class: entry.name.clone(),
                        index,
                        source,
                    })?;
            }

            debug!(class = %entry.name, rules = entry.rules.len(), "compiled manifest class");
            catalog.order.push(entry.name.clone());
            catalog.classes.insert(entry.name.clone(), Arc::new(class));
        }

        info!(classes = catalog.order.len(), "loaded policy catalog");
        Ok(catalog)
    }

    pub fn from_toml_str(input: &str) -> Result<Self> {
        Self::from_manifest(&PolicyManifest::from_toml_str(input)?)
    }

    pub fn from_json_str(input: &str) -> Result<Self> {
        Self::from_manifest(&PolicyManifest::from_json_str(input)?)
    }

    /// Load a manifest file. `.json` files are read as JSON, anything else
    /// as TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "reading policy manifest");

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_toml_str(&content),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ManifestClass>> {
        self.classes.get(name)
    }

    pub fn class(&self, name: &str) -> Result<&Arc<ManifestClass>> {
        self.get(name)
            .ok_or_else(|| ManifestError::ClassNotFound(name.to_string()))
    }

    /// Class names in declaration order.
    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

fn define_filter(class: &ManifestClass, name: &str, filter: FilterManifest) {
    let FilterManifest {
        actor,
        subject,
        equal,
    } = filter;

    class.define_filter(name, move |evaluation| {
        let Some(value) = evaluation.subject().attribute(&subject) else {
            return Ok(false);
        };
        let passes = match (&actor, &equal) {
            (Some(actor), _) => evaluation.actor_attribute(actor) == Some(value),
            (None, Some(expected)) => value == *expected,
            (None, None) => false,
        };
        Ok(passes)
    });
}

/// Evaluate `name` from a catalog, reporting a missing class as an error.
pub fn abilities_for(
    catalog: &PolicyCatalog,
    name: &str,
    actor: Option<&Value>,
    subject: &Value,
) -> RuleResult<Vec<Ability>> {
    let class = catalog.class(name)?;
    class.abilities_for(actor, subject)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TOPICS: &str = r#"
        [[class]]
        name = "topic"

        [class.filters.owner]
        actor = "id"
        subject = "user_id"

        [class.filters.unlocked]
        subject = "is_lock"
        equal = false

        [[class.rules]]
        abilities = ["read_topics"]

        [[class.rules]]
        check = "role"
        equal = "admin"
        abilities = ["create_topic"]

        [[class.rules]]
        pass = "owner"
        abilities = ["edit_topic"]

        [[class]]
        name = "reviewed_topic"
        extends = "topic"

        [[class.rules]]
        check = "role"
        in = ["reviewer", "editor"]
        abilities = ["edit_topic"]

        [[class.rules]]
        pass = "unlocked"
        abilities = ["comment"]
    "#;

    #[test]
    fn test_catalog_from_toml() {
        let catalog = PolicyCatalog::from_toml_str(TOPICS).unwrap();
        assert_eq!(catalog.names(), ["topic", "reviewed_topic"]);
        assert_eq!(catalog.get("topic").unwrap().rules().len(), 3);
        assert_eq!(catalog.get("reviewed_topic").unwrap().rules().len(), 2);
        assert!(catalog.get("missing").is_none());
    }

    #[test]
    fn test_catalog_abilities() {
        let catalog = PolicyCatalog::from_toml_str(TOPICS).unwrap();
        let topic = json!({"user_id": 1, "is_lock": false});
        let owner = json!({"id": 1, "role": "normal"});
        let reviewer = json!({"id": 2, "role": "reviewer"});
        let admin = json!({"id": 3, "role": "admin"});

        assert_eq!(
            abilities_for(&catalog, "topic", Some(&owner), &topic).unwrap(),
            vec!["read_topics", "edit_topic"]
        );
        assert_eq!(
            abilities_for(&catalog, "topic", Some(&admin), &topic).unwrap(),
            vec!["read_topics", "create_topic"]
        );
        assert_eq!(
            abilities_for(&catalog, "reviewed_topic", Some(&reviewer), &topic).unwrap(),
            vec!["read_topics", "edit_topic", "comment"]
        );
        assert_eq!(
            abilities_for(&catalog, "reviewed_topic", None, &topic).unwrap(),
            vec!["read_topics", "comment"]
        );

        let locked = json!({"user_id": 1, "is_lock": true});
        assert_eq!(
            abilities_for(&catalog, "reviewed_topic", None, &locked).unwrap(),
            vec!["read_topics"]
        );
    }

    #[test]
    fn test_missing_class_is_an_error() {
        let catalog = PolicyCatalog::from_toml_str(TOPICS).unwrap();
        let err = abilities_for(&catalog, "nope", None, &json!({})).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ManifestError>(),
            Some(ManifestError::ClassNotFound(_))
        ));
    }

    #[test]
    fn test_invalid_rule_reports_class_and_index() {
        let err = PolicyCatalog::from_toml_str(
            r#"
            [[class]]
            name = "broken"

            [[class.rules]]
            abilities = ["read"]

            [[class.rules]]
            check = "role"
            abilities = ["write"]
            "#,
        )
        .unwrap_err();

        match err {
            ManifestError::InvalidRule { class, index, .. } => {
                assert_eq!(class, "broken");
                assert_eq!(index, 1);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_null_and_unknown_pass_are_rejected() {
        let null_pass = PolicyCatalog::from_json_str(
            r#"{"class": [{"name": "a", "rules": [{"pass": null, "abilities": ["x"]}]}]}"#,
        );
        assert!(matches!(null_pass, Err(ManifestError::InvalidRule { .. })));

        let unknown = PolicyCatalog::from_toml_str(
            r#"
            [[class]]
            name = "a"
            [[class.rules]]
            pass = "owner"
            abilities = ["x"]
            "#,
        );
        assert!(matches!(unknown, Err(ManifestError::InvalidRule { .. })));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(TOPICS.as_bytes()).unwrap();

        let catalog = PolicyCatalog::load(file.path()).unwrap();
        assert_eq!(catalog.len(), 2);

        let err = PolicyCatalog::load("/nonexistent/policies.toml").unwrap_err();
        assert!(matches!(err, ManifestError::ReadError { .. }));
        assert!(err.to_string().contains("/nonexistent/policies.toml"));
    }
}
