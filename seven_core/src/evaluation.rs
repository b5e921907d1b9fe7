//! The evaluation engine.
//!
//! An [`Evaluation`] binds one actor and one subject to a policy class. It
//! lives for a single `abilities()` call and carries no state across calls.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::ability::Ability;
use crate::attributes::Attributes;
use crate::class::PolicyClass;
use crate::error::{ArgsError, RuleResult};

/// Named zero-arg predicate on the evaluation instance.
pub type Filter<A, S> = Arc<dyn Fn(&Evaluation<'_, A, S>) -> RuleResult<bool> + Send + Sync>;

/// An actor/subject pair bound to a policy class.
pub struct Evaluation<'a, A, S> {
    class: &'a PolicyClass<A, S>,
    actor: Option<&'a A>,
    subject: &'a S,
    filters: HashMap<String, Filter<A, S>>,
}

impl<'a, A, S> Evaluation<'a, A, S> {
    pub(crate) fn new(class: &'a PolicyClass<A, S>, actor: Option<&'a A>, subject: &'a S) -> Self {
        Self {
            class,
            actor,
            subject,
            filters: class.resolved_filters(),
        }
    }

    pub fn class(&self) -> &'a PolicyClass<A, S> {
        self.class
    }

    /// The actor, absent for anonymous evaluations.
    pub fn actor(&self) -> Option<&'a A> {
        self.actor
    }

    pub fn subject(&self) -> &'a S {
        self.subject
    }

    /// Run a filter by name.
    ///
    /// Guards only name filters that were checked at registration; a name
    /// that does not resolve here comes from user code and is reported as a
    /// runtime error.
    pub fn filter(&self, name: &str) -> RuleResult<bool> {
        match self.filters.get(name) {
            Some(filter) => filter(self),
            None => Err(ArgsError::UnknownFilter(name.to_string()).into()),
        }
    }
}

impl<'a, A: Attributes, S> Evaluation<'a, A, S> {
    /// Read an attribute off the actor. `None` when there is no actor.
    pub fn actor_attribute(&self, name: &str) -> Option<Value> {
        self.actor.and_then(|actor| actor.attribute(name))
    }

    /// Abilities granted by every matching rule of the class and its
    /// ancestors, ancestors first, each class in declaration order.
    ///
    /// Nothing is removed or deduplicated. The first error raised by a
    /// guard or action aborts the whole evaluation.
    pub fn abilities(&self) -> RuleResult<Vec<Ability>> {
        let mut granted = Vec::new();

        for class in self.class.ancestors() {
            // Snapshot so user code never runs under the registry lock.
            let rules = class.rules();
            for (index, rule) in rules.iter().enumerate() {
                if !rule.guard().passes(self)? {
                    trace!(class = %class, index, guard = %rule.guard(), "guard did not pass");
                    continue;
                }

                let yielded = rule.grant(self)?;
                trace!(class = %class, index, abilities = ?yielded, "rule granted");
                granted.extend(yielded);
            }
        }

        debug!(class = %self.class, granted = granted.len(), "evaluated abilities");
        Ok(granted)
    }
}

impl<A, S> fmt::Debug for Evaluation<'_, A, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut filters: Vec<_> = self.filters.keys().collect();
        filters.sort();
        f.debug_struct("Evaluation")
            .field("class", &self.class.to_string())
            .field("has_actor", &self.actor.is_some())
            .field("filters", &filters)
            .finish()
    }
}
