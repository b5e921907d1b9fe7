//! Policy classes and their rule registries.
//!
//! Every class owns its own append-only rule list and filter table. A
//! subclass starts empty and keeps a handle on its parent; the evaluation
//! engine walks that chain instead of copying rules down.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::ability::Ability;
use crate::attributes::Attributes;
use crate::error::{ArgsError, RuleResult};
use crate::evaluation::{Evaluation, Filter};
use crate::guard::{Guard, GuardOptions};
use crate::rule::{Action, Rule};

/// A type carrying a rule registry.
pub struct PolicyClass<A, S> {
    id: Uuid,
    name: Option<String>,
    parent: Option<Arc<PolicyClass<A, S>>>,
    rules: RwLock<Vec<Arc<Rule<A, S>>>>,
    filters: RwLock<HashMap<String, Filter<A, S>>>,
}

impl<A, S> PolicyClass<A, S> {
    /// Create a root policy class.
    pub fn new(name: impl Into<String>) -> Self {
        Self::build(Some(name.into()), None)
    }

    /// Create a root policy class without a name.
    pub fn anonymous() -> Self {
        Self::build(None, None)
    }

    /// Create a class inheriting this one's rules and filters.
    pub fn subclass(self: &Arc<Self>, name: impl Into<String>) -> Self {
        Self::build(Some(name.into()), Some(Arc::clone(self)))
    }

    /// Build an anonymous class with a single unconditional rule.
    pub fn from_action(action: Action<A, S>) -> Self {
        let class = Self::anonymous();
        class.rules.write().push(Arc::new(Rule::new(Guard::Always, action)));
        class
    }

    fn build(name: Option<String>, parent: Option<Arc<Self>>) -> Self {
        let class = Self {
            id: Uuid::new_v4(),
            name,
            parent,
            rules: RwLock::new(Vec::new()),
            filters: RwLock::new(HashMap::new()),
        };
        debug!(
            class = %class,
            parent = ?class.parent.as_deref().map(ToString::to_string),
            "created policy class"
        );
        class
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn parent(&self) -> Option<&Arc<PolicyClass<A, S>>> {
        self.parent.as_ref()
    }

    /// Register a rule.
    ///
    /// The guard is compiled here; on error nothing is appended.
    pub fn register(&self, options: GuardOptions<A, S>, action: Action<A, S>) -> Result<(), ArgsError> {
        let guard = Guard::compile(options).inspect_err(|e| {
            warn!(class = %self, error = %e, "rejected rule");
        })?;

        if let Some(name) = guard.filter_name() {
            if !self.responds_to(name) {
                warn!(class = %self, filter = name, "rejected rule with unknown filter");
                return Err(ArgsError::UnknownFilter(name.to_string()));
            }
        }

        let mut rules = self.rules.write();
        debug!(class = %self, index = rules.len(), guard = %guard, "registered rule");
        rules.push(Arc::new(Rule::new(guard, action)));
        Ok(())
    }

    /// Declare a rule block.
    ///
    /// ```
    /// use seven_core::{Ability, GuardOptions, PolicyClass};
    /// use serde_json::{json, Value};
    ///
    /// let topics = PolicyClass::<Value, Value>::new("topics");
    /// topics
    ///     .abilities(GuardOptions::new(), |_| Ok(Ability::list(["read_topics"])))
    ///     .unwrap();
    /// topics
    ///     .abilities(GuardOptions::new().check("role").equal("admin"), |_| {
    ///         Ok(Ability::list(["edit_topic"]))
    ///     })
    ///     .unwrap();
    ///
    /// let admin = json!({"role": "admin"});
    /// let granted = topics.abilities_for(Some(&admin), &json!({})).unwrap();
    /// assert_eq!(granted, vec!["read_topics", "edit_topic"]);
    /// ```
    pub fn abilities<F>(&self, options: GuardOptions<A, S>, action: F) -> Result<(), ArgsError>
    where
        F: Fn(&Evaluation<'_, A, S>) -> RuleResult<Vec<Ability>> + Send + Sync + 'static,
    {
        self.register(options, Arc::new(action))
    }

    /// Rules registered directly on this class, in declaration order.
    pub fn rules(&self) -> Vec<Arc<Rule<A, S>>> {
        self.rules.read().clone()
    }

    /// Declare a named zero-arg predicate for `pass` guards.
    ///
    /// Redefining a name replaces the previous filter; a subclass filter
    /// shadows the parent's for evaluations of the subclass.
    pub fn define_filter<F>(&self, name: impl Into<String>, filter: F)
    where
        F: Fn(&Evaluation<'_, A, S>) -> RuleResult<bool> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(class = %self, filter = %name, "defined filter");
        self.filters.write().insert(name, Arc::new(filter));
    }

    /// Whether this class or an ancestor defines the filter.
    pub fn responds_to(&self, name: &str) -> bool {
        self.ancestors()
            .iter()
            .any(|class| class.filters.read().contains_key(name))
    }

    /// This class and its ancestors, most general first.
    pub fn ancestors(&self) -> Vec<&PolicyClass<A, S>> {
        let mut chain = Vec::new();
        let mut current = Some(self);
        while let Some(class) = current {
            chain.push(class);
            current = class.parent.as_deref();
        }
        chain.reverse();
        chain
    }

    /// Filters visible to an instance of this class, derived overriding base.
    pub(crate) fn resolved_filters(&self) -> HashMap<String, Filter<A, S>> {
        let mut resolved = HashMap::new();
        for class in self.ancestors() {
            for (name, filter) in class.filters.read().iter() {
                resolved.insert(name.clone(), Arc::clone(filter));
            }
        }
        resolved
    }

    /// Bind an actor and subject to a fresh evaluation instance.
    pub fn evaluate<'a>(&'a self, actor: Option<&'a A>, subject: &'a S) -> Evaluation<'a, A, S> {
        Evaluation::new(self, actor, subject)
    }
}

impl<A: Attributes, S> PolicyClass<A, S> {
    /// Abilities granted to `actor` over `subject`.
    pub fn abilities_for(&self, actor: Option<&A>, subject: &S) -> RuleResult<Vec<Ability>> {
        self.evaluate(actor, subject).abilities()
    }
}

impl<A, S> fmt::Display for PolicyClass<A, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => f.write_str(name),
            None => write!(f, "<anonymous {}>", self.id),
        }
    }
}

impl<A, S> fmt::Debug for PolicyClass<A, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyClass")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("parent", &self.parent.as_deref().map(ToString::to_string))
            .field("rules", &self.rules.read().len())
            .finish()
    }
}
