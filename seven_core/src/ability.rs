use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque permission token granted by a rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ability(String);

impl Ability {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build a list of abilities from anything string-like, in order.
    pub fn list<I, T>(names: I) -> Vec<Ability>
    where
        I: IntoIterator<Item = T>,
        T: Into<Ability>,
    {
        names.into_iter().map(Into::into).collect()
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Ability {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for Ability {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl PartialEq<str> for Ability {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Ability {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
