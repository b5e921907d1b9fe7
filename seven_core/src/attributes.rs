use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Named-attribute read access on an actor or subject.
///
/// `None` means the attribute is not present. Attribute guards treat a
/// missing attribute the same as a missing actor: the guard does not pass.
pub trait Attributes {
    fn attribute(&self, name: &str) -> Option<Value>;
}

impl Attributes for Value {
    fn attribute(&self, name: &str) -> Option<Value> {
        self.as_object().and_then(|fields| fields.get(name).cloned())
    }
}

impl Attributes for Map<String, Value> {
    fn attribute(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl Attributes for HashMap<String, Value> {
    fn attribute(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl Attributes for BTreeMap<String, Value> {
    fn attribute(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl<T: Attributes + ?Sized> Attributes for &T {
    fn attribute(&self, name: &str) -> Option<Value> {
        (**self).attribute(name)
    }
}

impl<T: Attributes + ?Sized> Attributes for Box<T> {
    fn attribute(&self, name: &str) -> Option<Value> {
        (**self).attribute(name)
    }
}

impl<T: Attributes + ?Sized> Attributes for std::sync::Arc<T> {
    fn attribute(&self, name: &str) -> Option<Value> {
        (**self).attribute(name)
    }
}
