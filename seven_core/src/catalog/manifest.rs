use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

use crate::ability::Ability;
use crate::guard::{GuardOptions, Pass};

/// A family of policy classes described declaratively.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyManifest {
    /// Classes, parents before children
    #[serde(default, rename = "class")]
    pub classes: Vec<ClassManifest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassManifest {
    /// The name the class is looked up by
    pub name: String,

    /// Name of the parent class, declared earlier in the manifest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,

    /// Named filters usable from `pass`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filters: BTreeMap<String, FilterManifest>,

    /// Rule blocks in declaration order
    #[serde(default)]
    pub rules: Vec<RuleManifest>,
}

/// A filter compares a subject attribute either with an actor attribute or
/// with a literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterManifest {
    /// Actor attribute that must equal the subject attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,

    /// Subject attribute to read
    pub subject: String,

    /// Literal the subject attribute must equal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equal: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equal: Option<Value>,

    #[serde(default, rename = "in", skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<Value>>,

    /// `Some(None)` records an explicit `null`, which is rejected at
    /// registration.
    #[serde(
        default,
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub pass: Option<Option<String>>,

    /// Abilities granted when the guard passes
    #[serde(default)]
    pub abilities: Vec<Ability>,
}

fn explicit_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl PolicyManifest {
    /// Parse a TOML manifest.
    pub fn from_toml_str(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(input)
    }

    /// Parse a JSON manifest.
    pub fn from_json_str(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }

    /// Validate class names, parents and filters.
    ///
    /// Rule guards are validated when the classes are built.
    pub fn validate(&self) -> Result<(), String> {
        let mut declared = HashSet::new();

        for class in &self.classes {
            if class.name.trim().is_empty() {
                return Err("Class name cannot be empty".to_string());
            }
            if let Some(parent) = &class.extends {
                if !declared.contains(parent.as_str()) {
                    return Err(format!(
                        "Class `{}` extends `{}`, which is not declared before it",
                        class.name, parent
                    ));
                }
            }
            if !declared.insert(class.name.as_str()) {
                return Err(format!("Class `{}` is declared twice", class.name));
            }
            for (name, filter) in &class.filters {
                filter
                    .validate()
                    .map_err(|e| format!("Filter `{}` in class `{}`: {}", name, class.name, e))?;
            }
        }

        Ok(())
    }
}

impl FilterManifest {
    pub fn validate(&self) -> Result<(), String> {
        if self.subject.trim().is_empty() {
            return Err("subject attribute cannot be empty".to_string());
        }
        match (&self.actor, &self.equal) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            (None, None) => Err("requires one of `actor` or `equal`".to_string()),
            (Some(_), Some(_)) => Err("accepts only one of `actor` or `equal`".to_string()),
        }
    }
}

impl RuleManifest {
    /// The guard options this rule declares.
    pub fn guard_options<A, S>(&self) -> GuardOptions<A, S> {
        GuardOptions {
            check: self.check.clone(),
            equal: self.equal.clone(),
            one_of: self.one_of.clone(),
            // A null name compiles like an empty one and is rejected.
            pass: self
                .pass
                .as_ref()
                .map(|name| Pass::Filter(name.clone().unwrap_or_default())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TOPICS: &str = r#"
        [[class]]
        name = "topic"

        [class.filters.owner]
        actor = "id"
        subject = "user_id"

        [[class.rules]]
        abilities = ["read_topics"]

        [[class.rules]]
        check = "role"
        equal = "admin"
        abilities = ["edit_topic"]

        [[class]]
        name = "reviewed_topic"
        extends = "topic"

        [[class.rules]]
        check = "role"
        in = ["reviewer", "editor"]
        abilities = ["edit_topic"]
    "#;

    #[test]
    fn test_parse_toml() {
        let manifest = PolicyManifest::from_toml_str(TOPICS).unwrap();
        assert!(manifest.validate().is_ok());
        assert_eq!(manifest.classes.len(), 2);

        let topic = &manifest.classes[0];
        assert_eq!(topic.name, "topic");
        assert_eq!(topic.filters["owner"].actor.as_deref(), Some("id"));
        assert_eq!(topic.rules.len(), 2);
        assert_eq!(topic.rules[1].equal, Some(json!("admin")));

        let reviewed = &manifest.classes[1];
        assert_eq!(reviewed.extends.as_deref(), Some("topic"));
        assert_eq!(reviewed.rules[0].one_of, Some(vec![json!("reviewer"), json!("editor")]));
    }

    #[test]
    fn test_json_null_pass_is_kept_apart_from_absent() {
        let manifest = PolicyManifest::from_json_str(
            r#"{"class": [{"name": "a", "rules": [{"pass": null}, {"abilities": ["x"]}]}]}"#,
        )
        .unwrap();
        let rules = &manifest.classes[0].rules;
        assert_eq!(rules[0].pass, Some(None));
        assert_eq!(rules[1].pass, None);
    }

    #[test]
    fn test_validation_errors() {
        let unnamed = PolicyManifest::from_toml_str(
            r#"
            [[class]]
            name = " "
            "#,
        )
        .unwrap();
        assert_eq!(unnamed.validate().unwrap_err(), "Class name cannot be empty");

        let unknown_parent = PolicyManifest::from_toml_str(
            r#"
            [[class]]
            name = "child"
            extends = "parent"
            "#,
        )
        .unwrap();
        assert!(unknown_parent.validate().is_err());

        let duplicate = PolicyManifest::from_toml_str(
            r#"
            [[class]]
            name = "a"
            [[class]]
            name = "a"
            "#,
        )
        .unwrap();
        assert!(duplicate.validate().is_err());

        let bad_filter = PolicyManifest::from_toml_str(
            r#"
            [[class]]
            name = "a"
            [class.filters.broken]
            subject = "user_id"
            "#,
        )
        .unwrap();
        assert!(bad_filter.validate().is_err());
    }

    #[test]
    fn test_manifest_serialization() {
        let manifest = PolicyManifest::from_toml_str(TOPICS).unwrap();
        let serialized = serde_json::to_string(&manifest).unwrap();
        let deserialized = PolicyManifest::from_json_str(&serialized).unwrap();

        assert_eq!(deserialized.classes.len(), manifest.classes.len());
        assert_eq!(deserialized.classes[1].rules, manifest.classes[1].rules);
    }
}
